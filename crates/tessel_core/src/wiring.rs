//! Method-side wiring: `run`, `data_in` and transaction readiness.

use tessel_common::InternalError;
use tessel_ir::Expr;

use crate::combiner::Combiner;
use crate::errors::ElabError;
use crate::manager::TransactionManager;
use crate::method_map::MethodMap;
use crate::node::NodeKind;

/// Drives `run` and `data_in` of every method and `runnable` of every
/// transaction.
pub(crate) fn emit(tm: &mut TransactionManager, map: &MethodMap) -> Result<(), ElabError> {
    let methods: Vec<_> = tm
        .nodes()
        .filter(|n| !n.is_transaction())
        .map(|n| n.id)
        .collect();
    for m in methods {
        let mut actives = Vec::new();
        let mut args = Vec::new();
        for parent in map.method_parents(m) {
            let node = tm.node(*parent);
            if !node.is_transaction() && !map.is_reached(*parent) {
                continue;
            }
            let activator = tm.read(node.activator());
            for site in node.sites_to(m) {
                actives.push(activator.clone().and(site.enable.clone()));
                args.push(site.arg.clone());
            }
        }

        let NodeKind::Method(info) = &tm.node(m).kind else {
            continue;
        };
        let info = info.clone();
        tm.drive(info.run, Expr::any(actives.iter().cloned()));

        let Some(data_in) = info.data_in else {
            continue;
        };
        let width = info.input.width();
        let value = if info.nonexclusive {
            let combiner = info.combiner.clone().unwrap_or_else(Combiner::lowest_active);
            combiner.combine(&args, &actives).resize(width)
        } else if let [arg] = args.as_slice() {
            arg.clone()
        } else {
            actives
                .iter()
                .zip(&args)
                .fold(Expr::zero(width), |acc, (active, arg)| {
                    acc.or(Expr::mux(active.clone(), arg.clone(), Expr::zero(width)))
                })
        };
        tm.drive(data_in, value);
    }

    for t in tm.transactions() {
        let runnable = map
            .methods_by_transaction(t)
            .iter()
            .map(|m| {
                map.readiness_by_call(t, *m).cloned().ok_or_else(|| {
                    InternalError::new(format!(
                        "no readiness for `{}` in `{}`",
                        tm.name(*m),
                        tm.name(t)
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let Some(info) = tm.node(t).as_transaction() else {
            continue;
        };
        let target = info.runnable;
        tm.drive(target, Expr::all(runnable));
    }
    Ok(())
}
