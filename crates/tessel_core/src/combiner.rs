//! Argument combiners for nonexclusive methods.

use std::fmt;
use std::rc::Rc;

use tessel_ir::Expr;

type CombineFn = dyn Fn(&[Expr], &[Expr]) -> Expr;

/// Merges the arguments of every caller of a nonexclusive method into one
/// `data_in` value.
///
/// The function receives the callers' arguments and, index for index, the
/// single-bit expressions telling which callers are live this cycle.
#[derive(Clone)]
pub struct Combiner(Rc<CombineFn>);

impl Combiner {
    /// Wraps a user-supplied combining function.
    pub fn custom(f: impl Fn(&[Expr], &[Expr]) -> Expr + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Selects the argument of the lowest-indexed live caller.
    pub fn lowest_active() -> Self {
        Self::custom(|args, runs| {
            let width = args.iter().map(Expr::width).max().unwrap_or(0);
            args.iter()
                .zip(runs)
                .rev()
                .fold(Expr::zero(width), |acc, (arg, run)| {
                    Expr::mux(run.clone(), arg.clone().resize(width), acc)
                })
        })
    }

    /// Sums the arguments of every live caller, wrapping at the widest
    /// argument's width.
    pub fn sum() -> Self {
        Self::custom(|args, runs| {
            let width = args.iter().map(Expr::width).max().unwrap_or(0);
            args.iter()
                .zip(runs)
                .map(|(arg, run)| Expr::mux(run.clone(), arg.clone().resize(width), Expr::zero(width)))
                .reduce(|acc, term| acc + term)
                .unwrap_or_else(|| Expr::zero(width))
        })
    }

    /// Bitwise OR of the arguments of every live caller.
    pub fn or() -> Self {
        Self::custom(|args, runs| {
            let width = args.iter().map(Expr::width).max().unwrap_or(0);
            args.iter()
                .zip(runs)
                .map(|(arg, run)| Expr::mux(run.clone(), arg.clone().resize(width), Expr::zero(width)))
                .fold(Expr::zero(width), Expr::or)
        })
    }

    /// Applies the combiner.
    pub fn combine(&self, args: &[Expr], runs: &[Expr]) -> Expr {
        (self.0)(args, runs)
    }
}

impl fmt::Debug for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Combiner(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_ir::SignalId;
    use tessel_sim::evaluator::eval_expr;

    fn sig(n: u32, width: u32) -> Expr {
        Expr::signal(SignalId::from_raw(n), width)
    }

    /// Signals 0..3 are 8-bit arguments, 3..6 their run bits.
    fn eval(c: &Combiner, values: [u64; 6]) -> u64 {
        let args: Vec<Expr> = (0..3).map(|i| sig(i, 8)).collect();
        let runs: Vec<Expr> = (3..6).map(|i| sig(i, 1)).collect();
        eval_expr(&values, &c.combine(&args, &runs))
    }

    #[test]
    fn lowest_active_picks_first_live() {
        let c = Combiner::lowest_active();
        assert_eq!(eval(&c, [10, 20, 30, 0, 1, 1]), 20);
        assert_eq!(eval(&c, [10, 20, 30, 1, 1, 1]), 10);
        assert_eq!(eval(&c, [10, 20, 30, 0, 0, 0]), 0);
    }

    #[test]
    fn sum_adds_live_arguments() {
        let c = Combiner::sum();
        assert_eq!(eval(&c, [3, 5, 7, 1, 1, 0]), 8);
        assert_eq!(eval(&c, [200, 100, 0, 1, 1, 0]), 44);
    }

    #[test]
    fn or_merges_live_arguments() {
        let c = Combiner::or();
        assert_eq!(eval(&c, [0b001, 0b010, 0b100, 1, 0, 1]), 0b101);
    }

    #[test]
    fn custom_combiner() {
        let c = Combiner::custom(|args, _| args[0].clone());
        assert_eq!(eval(&c, [9, 1, 1, 0, 0, 0]), 9);
        assert_eq!(format!("{c:?}"), "Combiner(..)");
    }
}
