//! Lowering of guarded assignments into netlist drivers.
//!
//! Assignments to one target are folded in recording order, later ones
//! taking precedence where their guards hold. A wire falls back to zero and
//! a register keeps its value where no guard holds.

use std::collections::BTreeMap;

use tessel_common::InternalError;
use tessel_ir::{Assign, Expr, Netlist, NetlistError, SignalId};
use tessel_source::SrcLoc;

use crate::errors::ElabError;
use crate::manager::{Domain, GuardedAssign};

/// Writes one driver per assigned signal into `netlist` and checks the
/// result for combinational cycles. A cycle is reported at the first node
/// in `owners` that owns a signal on it.
pub(crate) fn lower(
    netlist: &mut Netlist,
    assigns: Vec<GuardedAssign>,
    owners: &BTreeMap<SignalId, SrcLoc>,
) -> Result<(), ElabError> {
    let mut by_target: BTreeMap<(SignalId, bool), Vec<GuardedAssign>> = BTreeMap::new();
    for assign in assigns {
        let sync = assign.domain == Domain::Sync;
        by_target.entry((assign.target, sync)).or_default().push(assign);
    }

    for ((target, sync), assigns) in by_target {
        let width = netlist.signals[target].width;
        let fallback = if sync {
            netlist.read(target)
        } else {
            Expr::zero(width)
        };
        let value = assigns.into_iter().fold(fallback, |acc, a| {
            Expr::mux(a.guard, a.value.resize(width), acc)
        });
        let assign = Assign { target, value };
        if sync {
            netlist.sync.push(assign);
        } else {
            netlist.comb.push(assign);
        }
    }

    let from_netlist = |err: NetlistError| match err {
        NetlistError::CombLoop(signals) => {
            let loc = signals
                .iter()
                .filter_map(|name| netlist.find(name))
                .find_map(|id| owners.get(&id).copied())
                .unwrap_or(SrcLoc::DUMMY);
            ElabError::CombinationalCycle { signals, loc }
        }
        other => InternalError::new(other.to_string()).into(),
    };
    netlist.validate().map_err(&from_netlist)?;
    netlist.comb_order().map_err(&from_netlist)?;
    let (inputs, wires, regs) = netlist.stats();
    log::debug!(
        "netlist `{}`: {inputs} inputs, {wires} wires, {regs} registers",
        netlist.name
    );
    Ok(())
}
