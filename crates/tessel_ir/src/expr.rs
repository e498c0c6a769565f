//! Combinational expression trees.
//!
//! Every value in a [`Netlist`](crate::Netlist) is an unsigned bit vector of
//! at most [`MAX_WIDTH`] bits, so an [`Expr`] evaluates to a `u64` masked to
//! its [`width`](Expr::width). Operands of different widths are zero-extended
//! to the wider one before the operator applies.
//!
//! The smart constructors ([`Expr::and`], [`Expr::or`], [`Expr::not`],
//! [`Expr::mux`]) fold constant operands. Generated scheduling logic is full of
//! `1 & x` and `mux(0, a, b)` shapes and folding them keeps netlists readable.

use crate::ids::SignalId;
use serde::{Deserialize, Serialize};
use tessel_common::ContentHasher;

/// The widest bit vector an expression may carry.
pub const MAX_WIDTH: u32 = 64;

/// Returns a mask with the low `width` bits set.
pub fn mask(width: u32) -> u64 {
    if width >= MAX_WIDTH {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Bitwise NOT.
    Not,
    /// Two's complement negation.
    Neg,
    /// Reduction AND.
    RedAnd,
    /// Reduction OR.
    RedOr,
    /// Reduction XOR.
    RedXor,
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Bitwise AND.
    And,
    /// Bitwise OR.
    Or,
    /// Bitwise XOR.
    Xor,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Unsigned less than.
    Lt,
    /// Unsigned less than or equal.
    Le,
    /// Unsigned greater than.
    Gt,
    /// Unsigned greater than or equal.
    Ge,
}

impl BinaryOp {
    /// Returns `true` for operators that produce a single-bit result.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

/// A combinational expression over netlist signals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// A literal. `value` never has bits set above `width`.
    Const {
        /// The literal value.
        value: u64,
        /// Width in bits.
        width: u32,
    },
    /// The current value of a signal.
    Signal {
        /// The signal read.
        id: SignalId,
        /// The signal's declared width.
        width: u32,
    },
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// `sel ? on_true : on_false`, where `sel` is true when nonzero.
    Mux {
        /// The select condition.
        sel: Box<Expr>,
        /// Value when `sel` is nonzero.
        on_true: Box<Expr>,
        /// Value when `sel` is zero.
        on_false: Box<Expr>,
    },
    /// Bits `high..=low` of `base`.
    Slice {
        /// The sliced expression.
        base: Box<Expr>,
        /// Most significant bit, inclusive.
        high: u32,
        /// Least significant bit, inclusive.
        low: u32,
    },
    /// Concatenation, least significant part first.
    Concat(Vec<Expr>),
}

impl Expr {
    /// A literal of the given width. Bits above `width` are dropped.
    pub fn constant(value: u64, width: u32) -> Expr {
        Expr::Const {
            value: value & mask(width),
            width,
        }
    }

    /// A single-bit literal.
    pub fn bit(value: bool) -> Expr {
        Expr::constant(value as u64, 1)
    }

    /// The single-bit literal `1`.
    pub fn one() -> Expr {
        Expr::bit(true)
    }

    /// An all-zero literal of the given width.
    pub fn zero(width: u32) -> Expr {
        Expr::constant(0, width)
    }

    /// A read of signal `id`.
    pub fn signal(id: SignalId, width: u32) -> Expr {
        Expr::Signal { id, width }
    }

    /// Returns the width of the value this expression produces.
    pub fn width(&self) -> u32 {
        match self {
            Expr::Const { width, .. } | Expr::Signal { width, .. } => *width,
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not | UnaryOp::Neg => operand.width(),
                UnaryOp::RedAnd | UnaryOp::RedOr | UnaryOp::RedXor => 1,
            },
            Expr::Binary { op, lhs, rhs } => {
                if op.is_comparison() {
                    1
                } else {
                    lhs.width().max(rhs.width())
                }
            }
            Expr::Mux {
                on_true, on_false, ..
            } => on_true.width().max(on_false.width()),
            Expr::Slice { high, low, .. } => high - low + 1,
            Expr::Concat(parts) => parts.iter().map(Expr::width).sum(),
        }
    }

    /// Returns the literal value if this is a constant.
    pub fn as_const(&self) -> Option<u64> {
        match self {
            Expr::Const { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Returns `true` if this is a constant with every bit clear.
    pub fn is_const_zero(&self) -> bool {
        self.as_const() == Some(0)
    }

    /// Returns `true` if this is a constant with every bit of its width set.
    pub fn is_const_ones(&self) -> bool {
        self.as_const() == Some(mask(self.width()))
    }

    /// Builds a binary node without folding.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Builds a unary node without folding.
    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Bitwise AND with constant folding.
    pub fn and(self, rhs: Expr) -> Expr {
        let width = self.width().max(rhs.width());
        if self.is_const_zero() || rhs.is_const_zero() {
            return Expr::zero(width);
        }
        if self.is_const_ones() && self.width() == width {
            return rhs.resize(width);
        }
        if rhs.is_const_ones() && rhs.width() == width {
            return self.resize(width);
        }
        if self == rhs {
            return self;
        }
        Expr::binary(BinaryOp::And, self, rhs)
    }

    /// Bitwise OR with constant folding.
    pub fn or(self, rhs: Expr) -> Expr {
        let width = self.width().max(rhs.width());
        if self.is_const_zero() && self.width() <= rhs.width() {
            return rhs;
        }
        if rhs.is_const_zero() && rhs.width() <= self.width() {
            return self;
        }
        if (self.is_const_ones() && self.width() == width)
            || (rhs.is_const_ones() && rhs.width() == width)
        {
            return Expr::constant(u64::MAX, width);
        }
        if self == rhs {
            return self;
        }
        Expr::binary(BinaryOp::Or, self, rhs)
    }

    /// Bitwise NOT with constant folding.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        match self {
            Expr::Const { value, width } => Expr::constant(!value, width),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => *operand,
            other => Expr::unary(UnaryOp::Not, other),
        }
    }

    /// Bitwise XOR.
    pub fn xor(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Xor, self, rhs)
    }

    /// Single-bit equality comparison.
    pub fn equals(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, self, rhs)
    }

    /// Single-bit inequality comparison.
    pub fn not_equals(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Ne, self, rhs)
    }

    /// Single-bit unsigned less-than comparison.
    pub fn less_than(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Lt, self, rhs)
    }

    /// Single-bit "any bit set".
    pub fn any_bit(self) -> Expr {
        if self.width() == 1 {
            return self;
        }
        match self.as_const() {
            Some(v) => Expr::bit(v != 0),
            None => Expr::unary(UnaryOp::RedOr, self),
        }
    }

    /// `sel ? on_true : on_false`, folding a constant select.
    pub fn mux(sel: Expr, on_true: Expr, on_false: Expr) -> Expr {
        if let Some(v) = sel.as_const() {
            return if v != 0 { on_true } else { on_false };
        }
        if on_true == on_false {
            return on_true;
        }
        Expr::Mux {
            sel: Box::new(sel),
            on_true: Box::new(on_true),
            on_false: Box::new(on_false),
        }
    }

    /// Bits `high..=low` of this expression.
    pub fn slice(self, high: u32, low: u32) -> Expr {
        if low == 0 && high + 1 == self.width() {
            return self;
        }
        Expr::Slice {
            base: Box::new(self),
            high,
            low,
        }
    }

    /// Concatenates `parts`, least significant first.
    pub fn concat(parts: Vec<Expr>) -> Expr {
        match parts.len() {
            0 => Expr::zero(0),
            1 => {
                let mut parts = parts;
                parts.remove(0)
            }
            _ => Expr::Concat(parts),
        }
    }

    /// Zero-extends or truncates to exactly `width` bits.
    pub fn resize(self, width: u32) -> Expr {
        let own = self.width();
        if own == width {
            self
        } else if own > width {
            if width == 0 {
                Expr::zero(0)
            } else {
                self.slice(width - 1, 0)
            }
        } else if let Some(v) = self.as_const() {
            Expr::constant(v, width)
        } else {
            Expr::Concat(vec![self, Expr::zero(width - own)])
        }
    }

    /// OR of every expression in `items`; `0` when empty.
    pub fn any(items: impl IntoIterator<Item = Expr>) -> Expr {
        items.into_iter().fold(Expr::bit(false), Expr::or)
    }

    /// AND of every expression in `items`; `1` when empty.
    pub fn all(items: impl IntoIterator<Item = Expr>) -> Expr {
        items.into_iter().fold(Expr::one(), Expr::and)
    }

    /// Calls `f` for every signal read, in tree order. Repeats are reported.
    pub fn visit_signals(&self, f: &mut impl FnMut(SignalId)) {
        match self {
            Expr::Const { .. } => {}
            Expr::Signal { id, .. } => f(*id),
            Expr::Unary { operand, .. } => operand.visit_signals(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.visit_signals(f);
                rhs.visit_signals(f);
            }
            Expr::Mux {
                sel,
                on_true,
                on_false,
            } => {
                sel.visit_signals(f);
                on_true.visit_signals(f);
                on_false.visit_signals(f);
            }
            Expr::Slice { base, .. } => base.visit_signals(f),
            Expr::Concat(parts) => parts.iter().for_each(|p| p.visit_signals(f)),
        }
    }

    /// Returns the distinct signals read, in first-seen order.
    pub fn signals(&self) -> Vec<SignalId> {
        let mut out = Vec::new();
        self.visit_signals(&mut |id| {
            if !out.contains(&id) {
                out.push(id);
            }
        });
        out
    }

    /// Replaces signal reads for which `f` returns `Some`.
    ///
    /// Replacements are resized to the width of the signal they stand for.
    pub fn substitute(&self, f: &impl Fn(SignalId) -> Option<Expr>) -> Expr {
        match self {
            Expr::Const { .. } => self.clone(),
            Expr::Signal { id, width } => match f(*id) {
                Some(replacement) => replacement.resize(*width),
                None => self.clone(),
            },
            Expr::Unary { op, operand } => Expr::unary(*op, operand.substitute(f)),
            Expr::Binary { op, lhs, rhs } => {
                Expr::binary(*op, lhs.substitute(f), rhs.substitute(f))
            }
            Expr::Mux {
                sel,
                on_true,
                on_false,
            } => Expr::Mux {
                sel: Box::new(sel.substitute(f)),
                on_true: Box::new(on_true.substitute(f)),
                on_false: Box::new(on_false.substitute(f)),
            },
            Expr::Slice { base, high, low } => Expr::Slice {
                base: Box::new(base.substitute(f)),
                high: *high,
                low: *low,
            },
            Expr::Concat(parts) => Expr::Concat(parts.iter().map(|p| p.substitute(f)).collect()),
        }
    }

    /// Feeds the expression's structure into `hasher`.
    ///
    /// Signals contribute only their index and width.
    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        match self {
            Expr::Const { value, width } => {
                hasher.write_tag(0);
                hasher.write_u64(*value);
                hasher.write_u32(*width);
            }
            Expr::Signal { id, width } => {
                hasher.write_tag(1);
                hasher.write_u32(id.as_raw());
                hasher.write_u32(*width);
            }
            Expr::Unary { op, operand } => {
                hasher.write_tag(2);
                hasher.write_tag(*op as u8);
                operand.hash_into(hasher);
            }
            Expr::Binary { op, lhs, rhs } => {
                hasher.write_tag(3);
                hasher.write_tag(*op as u8);
                lhs.hash_into(hasher);
                rhs.hash_into(hasher);
            }
            Expr::Mux {
                sel,
                on_true,
                on_false,
            } => {
                hasher.write_tag(4);
                sel.hash_into(hasher);
                on_true.hash_into(hasher);
                on_false.hash_into(hasher);
            }
            Expr::Slice { base, high, low } => {
                hasher.write_tag(5);
                hasher.write_u32(*high);
                hasher.write_u32(*low);
                base.hash_into(hasher);
            }
            Expr::Concat(parts) => {
                hasher.write_tag(6);
                hasher.write_u32(parts.len() as u32);
                parts.iter().for_each(|p| p.hash_into(hasher));
            }
        }
    }
}

impl std::ops::BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Expr) -> Expr {
        self.and(rhs)
    }
}

impl std::ops::BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Expr) -> Expr {
        self.or(rhs)
    }
}

impl std::ops::BitXor for Expr {
    type Output = Expr;

    fn bitxor(self, rhs: Expr) -> Expr {
        self.xor(rhs)
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::not(self)
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, self, rhs)
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(n: u32, width: u32) -> Expr {
        Expr::signal(SignalId::from_raw(n), width)
    }

    #[test]
    fn mask_edges() {
        assert_eq!(mask(0), 0);
        assert_eq!(mask(1), 1);
        assert_eq!(mask(8), 0xff);
        assert_eq!(mask(64), u64::MAX);
    }

    #[test]
    fn constant_is_masked() {
        assert_eq!(Expr::constant(0x1ff, 8).as_const(), Some(0xff));
    }

    #[test]
    fn widths() {
        let a = sig(0, 8);
        let b = sig(1, 4);
        assert_eq!((a.clone() + b.clone()).width(), 8);
        assert_eq!(a.clone().equals(b.clone()).width(), 1);
        assert_eq!(a.clone().any_bit().width(), 1);
        assert_eq!(a.clone().slice(5, 2).width(), 4);
        assert_eq!(Expr::concat(vec![a.clone(), b.clone()]).width(), 12);
        assert_eq!(Expr::mux(sig(2, 1), a, b).width(), 8);
    }

    #[test]
    fn and_folds_constants() {
        let x = sig(0, 1);
        assert_eq!(Expr::one().and(x.clone()), x);
        assert_eq!(x.clone().and(Expr::bit(false)), Expr::bit(false));
        assert_eq!(x.clone().and(x.clone()), x);
    }

    #[test]
    fn or_folds_constants() {
        let x = sig(0, 1);
        assert_eq!(Expr::bit(false).or(x.clone()), x);
        assert_eq!(x.clone().or(Expr::one()), Expr::one());
        assert_eq!(Expr::any(Vec::new()), Expr::bit(false));
        assert_eq!(Expr::all(Vec::new()), Expr::one());
    }

    #[test]
    fn or_keeps_wider_operand() {
        let x = sig(0, 8);
        assert_eq!(Expr::bit(false).or(x.clone()), x);
    }

    #[test]
    fn double_negation_cancels() {
        let x = sig(3, 1);
        assert_eq!(!!x.clone(), x);
        assert_eq!(!Expr::one(), Expr::bit(false));
    }

    #[test]
    fn mux_folds_constant_select() {
        let a = sig(0, 4);
        let b = sig(1, 4);
        assert_eq!(Expr::mux(Expr::one(), a.clone(), b.clone()), a);
        assert_eq!(Expr::mux(Expr::bit(false), a, b.clone()), b);
    }

    #[test]
    fn resize_extends_and_truncates() {
        let a = sig(0, 4);
        assert_eq!(a.clone().resize(8).width(), 8);
        assert_eq!(a.clone().resize(2).width(), 2);
        assert_eq!(a.clone().resize(4), a);
        assert_eq!(Expr::constant(3, 2).resize(8), Expr::constant(3, 8));
    }

    #[test]
    fn signals_are_deduplicated() {
        let a = sig(0, 1);
        let b = sig(1, 1);
        let e = Expr::mux(a.clone(), b.clone(), a.clone() ^ b);
        let ids: Vec<u32> = e.signals().into_iter().map(SignalId::as_raw).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn substitute_replaces_reads() {
        let e = sig(0, 4) + sig(1, 4);
        let replaced = e.substitute(&|id| (id.as_raw() == 1).then(|| Expr::constant(2, 4)));
        assert_eq!(replaced, sig(0, 4) + Expr::constant(2, 4));
    }

    #[test]
    fn hash_distinguishes_structure() {
        let mut h1 = ContentHasher::new();
        (sig(0, 1) & sig(1, 1)).hash_into(&mut h1);
        let mut h2 = ContentHasher::new();
        (sig(0, 1) | sig(1, 1)).hash_into(&mut h2);
        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn serde_roundtrip() {
        let e = Expr::mux(sig(0, 1), Expr::constant(5, 4), sig(1, 4));
        let json = serde_json::to_string(&e).unwrap();
        let restored: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(e, restored);
    }
}
