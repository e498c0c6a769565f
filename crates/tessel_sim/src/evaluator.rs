//! Expression evaluator.
//!
//! [`eval_expr`] walks an [`Expr`] tree and produces its value as a `u64`
//! masked to the expression's width. Signal values are read from a slice
//! indexed by raw [`SignalId`](tessel_ir::SignalId).

use tessel_ir::expr::mask;
use tessel_ir::{BinaryOp, Expr, UnaryOp};

/// Evaluates `expr` against the current signal `values`.
pub fn eval_expr(values: &[u64], expr: &Expr) -> u64 {
    match expr {
        Expr::Const { value, .. } => *value,

        Expr::Signal { id, width } => values
            .get(id.as_raw() as usize)
            .map_or(0, |v| v & mask(*width)),

        Expr::Unary { op, operand } => {
            let width = operand.width();
            let v = eval_expr(values, operand);
            eval_unary(*op, v, width)
        }

        Expr::Binary { op, lhs, rhs } => {
            let width = lhs.width().max(rhs.width());
            let l = eval_expr(values, lhs);
            let r = eval_expr(values, rhs);
            eval_binary(*op, l, r, width)
        }

        Expr::Mux {
            sel,
            on_true,
            on_false,
        } => {
            if eval_expr(values, sel) != 0 {
                eval_expr(values, on_true)
            } else {
                eval_expr(values, on_false)
            }
        }

        Expr::Slice { base, high, low } => {
            let v = eval_expr(values, base);
            if *low >= 64 {
                0
            } else {
                (v >> low) & mask(high - low + 1)
            }
        }

        // Least significant part first.
        Expr::Concat(parts) => {
            let mut result = 0u64;
            let mut offset = 0u32;
            for part in parts {
                if offset < 64 {
                    result |= eval_expr(values, part) << offset;
                }
                offset += part.width();
            }
            result
        }
    }
}

fn eval_unary(op: UnaryOp, v: u64, width: u32) -> u64 {
    let m = mask(width);
    match op {
        UnaryOp::Not => !v & m,
        UnaryOp::Neg => v.wrapping_neg() & m,
        UnaryOp::RedAnd => (v == m) as u64,
        UnaryOp::RedOr => (v != 0) as u64,
        UnaryOp::RedXor => (v.count_ones() % 2) as u64,
    }
}

fn eval_binary(op: BinaryOp, l: u64, r: u64, width: u32) -> u64 {
    let m = mask(width);
    match op {
        BinaryOp::Add => l.wrapping_add(r) & m,
        BinaryOp::Sub => l.wrapping_sub(r) & m,
        BinaryOp::And => l & r,
        BinaryOp::Or => l | r,
        BinaryOp::Xor => l ^ r,
        BinaryOp::Eq => (l == r) as u64,
        BinaryOp::Ne => (l != r) as u64,
        BinaryOp::Lt => (l < r) as u64,
        BinaryOp::Le => (l <= r) as u64,
        BinaryOp::Gt => (l > r) as u64,
        BinaryOp::Ge => (l >= r) as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_ir::SignalId;

    fn sig(n: u32, width: u32) -> Expr {
        Expr::signal(SignalId::from_raw(n), width)
    }

    #[test]
    fn constants_and_signals() {
        let values = [0xff, 3];
        assert_eq!(eval_expr(&values, &Expr::constant(5, 4)), 5);
        assert_eq!(eval_expr(&values, &sig(0, 4)), 0xf);
        assert_eq!(eval_expr(&values, &sig(1, 2)), 3);
    }

    #[test]
    fn missing_signal_reads_zero() {
        assert_eq!(eval_expr(&[], &sig(7, 8)), 0);
    }

    #[test]
    fn not_is_masked() {
        assert_eq!(eval_expr(&[0b0101], &!sig(0, 4)), 0b1010);
    }

    #[test]
    fn add_wraps_at_width() {
        let e = sig(0, 4) + Expr::constant(1, 4);
        assert_eq!(eval_expr(&[15], &e), 0);
        assert_eq!(eval_expr(&[6], &e), 7);
    }

    #[test]
    fn sub_wraps_at_width() {
        let e = sig(0, 3) - Expr::constant(1, 3);
        assert_eq!(eval_expr(&[0], &e), 7);
    }

    #[test]
    fn reductions() {
        let all = Expr::unary(UnaryOp::RedAnd, sig(0, 3));
        let any = sig(0, 3).any_bit();
        let parity = Expr::unary(UnaryOp::RedXor, sig(0, 3));
        assert_eq!(eval_expr(&[0b111], &all), 1);
        assert_eq!(eval_expr(&[0b101], &all), 0);
        assert_eq!(eval_expr(&[0b100], &any), 1);
        assert_eq!(eval_expr(&[0], &any), 0);
        assert_eq!(eval_expr(&[0b110], &parity), 0);
    }

    #[test]
    fn comparisons_are_single_bit() {
        let values = [3, 5];
        assert_eq!(eval_expr(&values, &sig(0, 4).less_than(sig(1, 4))), 1);
        assert_eq!(eval_expr(&values, &sig(0, 4).equals(sig(1, 4))), 0);
        assert_eq!(eval_expr(&values, &sig(0, 4).not_equals(sig(1, 4))), 1);
    }

    #[test]
    fn mux_selects() {
        let e = Expr::mux(sig(0, 1), Expr::constant(1, 2), Expr::constant(2, 2));
        assert_eq!(eval_expr(&[1], &e), 1);
        assert_eq!(eval_expr(&[0], &e), 2);
    }

    #[test]
    fn slice_and_concat() {
        let values = [0b1101_0110];
        assert_eq!(eval_expr(&values, &sig(0, 8).slice(5, 2)), 0b0101);
        let cat = Expr::concat(vec![Expr::constant(0b01, 2), Expr::constant(0b11, 2)]);
        assert_eq!(eval_expr(&values, &cat), 0b1101);
    }

    #[test]
    fn full_width_values() {
        let e = sig(0, 64) + Expr::constant(1, 64);
        assert_eq!(eval_expr(&[u64::MAX], &e), 0);
    }
}
