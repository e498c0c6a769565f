//! Per-component arbiters driving the `grant` signals.

use tessel_config::SchedulerKind;
use tessel_ir::{Expr, SignalKind, MAX_WIDTH};

use crate::errors::ElabError;
use crate::ids::NodeId;
use crate::manager::{Domain, GuardedAssign, TransactionManager};
use crate::node::TransactionInfo;
use crate::solver::Solution;

/// Emits one arbiter per conflict component.
pub(crate) fn emit(tm: &mut TransactionManager, solution: &Solution) -> Result<(), ElabError> {
    for (index, component) in solution.components.iter().enumerate() {
        if component.len() > 1 && tm.config.scheduler == SchedulerKind::RoundRobin {
            round_robin(tm, index, component)?;
        } else {
            eager(tm, solution, component)?;
        }
    }
    Ok(())
}

fn info(tm: &TransactionManager, t: NodeId) -> Result<TransactionInfo, ElabError> {
    tm.node(t).as_transaction().cloned().ok_or_else(|| {
        tessel_common::InternalError::new(format!("`{}` is not a transaction", tm.name(t))).into()
    })
}

/// Grants every requesting, runnable transaction that does not conflict
/// with an earlier grant in the component.
fn eager(tm: &mut TransactionManager, solution: &Solution, component: &[NodeId]) -> Result<(), ElabError> {
    for (k, t) in component.iter().enumerate() {
        let own = info(tm, *t)?;
        let mut blocked = Vec::new();
        for earlier in &component[..k] {
            if solution.conflict(*earlier, *t) {
                blocked.push(tm.read(info(tm, *earlier)?.grant));
            }
        }
        let grant = tm
            .read(own.request)
            .and(tm.read(own.runnable))
            .and(Expr::any(blocked).not());
        tm.drive(own.grant, grant);
    }
    Ok(())
}

/// Grants at most one transaction per cycle. A one-hot register remembers
/// the last grant; the search for the next one starts just after it.
fn round_robin(tm: &mut TransactionManager, index: usize, component: &[NodeId]) -> Result<(), ElabError> {
    let n = component.len();
    if n as u32 > MAX_WIDTH {
        return Err(ElabError::TooWide {
            what: format!("round-robin arbiter of conflict component {index}"),
            width: n as u32,
            loc: tm.node(component[0]).loc,
        });
    }
    let width = n as u32;
    let last = tm.new_signal(&format!("rr{index}_last"), width, SignalKind::Reg, 1 << (n - 1));
    let last_expr = tm.read(last);

    let infos = component
        .iter()
        .map(|t| info(tm, *t))
        .collect::<Result<Vec<_>, _>>()?;
    let wants: Vec<Expr> = infos
        .iter()
        .map(|i| tm.read(i.request).and(tm.read(i.runnable)))
        .collect();

    let mut grants = Vec::with_capacity(n);
    for k in 0..n {
        let mut terms = Vec::with_capacity(n);
        for i in 0..n {
            // Positions strictly after i and before k, cyclically.
            let between = (1..n)
                .map(|d| (i + d) % n)
                .take_while(|j| *j != k)
                .map(|j| wants[j].clone());
            let term = last_expr
                .clone()
                .slice(i as u32, i as u32)
                .and(wants[k].clone())
                .and(Expr::any(between).not());
            terms.push(term);
        }
        let grant = Expr::any(terms);
        tm.drive(infos[k].grant, grant);
        grants.push(tm.read(infos[k].grant));
    }

    let any_grant = Expr::any(grants.iter().cloned());
    tm.assigns.push(GuardedAssign {
        target: last,
        guard: any_grant,
        value: Expr::concat(grants),
        domain: Domain::Sync,
    });
    log::debug!("round-robin arbiter over {n} transactions");
    Ok(())
}
