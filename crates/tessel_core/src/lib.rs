//! Transactions and methods for synchronous hardware.
//!
//! User code declares transactions and methods on a [`TransactionManager`],
//! records their bodies through a [`ModuleCtx`], and calls
//! [`TransactionManager::elaborate`] to turn the graph into a flat
//! [`Netlist`](tessel_ir::Netlist) in which every clock cycle fires a
//! conflict-free subset of the transactions.
//!
//! # Usage
//!
//! ```ignore
//! let mut tm = TransactionManager::new();
//! let push = tm.method(MethodDecl::new("push").input(Layout::bits(8)))?;
//! let producer = tm.transaction("producer");
//! tm.module("top", |cx| {
//!     let data = cx.reg("data", 8, 0)?;
//!     cx.method_body(push, MethodBody::new(), |cx, arg| {
//!         cx.sync(data, arg)?;
//!         Ok(Expr::zero(0))
//!     })?;
//!     cx.transaction_body(producer, Expr::one(), |cx| {
//!         cx.call(push, Expr::constant(42, 8)).map(|_| ())
//!     })
//! })?;
//! let elaborated = tm.elaborate(&sink)?;
//! ```

#![warn(missing_docs)]

pub mod combiner;
pub mod context;
pub mod errors;
pub mod ids;
pub mod layout;
mod lower;
pub mod manager;
pub mod method_map;
pub mod node;
pub mod path;
pub mod report;
mod scheduler;
pub mod simultaneity;
pub mod solver;
mod wiring;

pub use combiner::Combiner;
pub use context::{Fsm, IfChain, MethodBody, ModuleCtx, Scope, Sig, Switch};
pub use errors::ElabError;
pub use ids::{ModuleId, NodeId};
pub use layout::{Field, Layout};
pub use manager::{Method, MethodDecl, Transaction, TransactionManager};
pub use node::{Priority, Validator};
pub use report::{NodeRole, ScheduleReport};
pub use simultaneity::FusedGroup;

use tessel_diagnostics::DiagnosticSink;
use tessel_ir::Netlist;

use method_map::MethodMap;

/// The result of elaboration.
#[derive(Debug)]
pub struct Elaborated {
    /// The synchronous circuit.
    pub netlist: Netlist,
    /// How the transactions were scheduled.
    pub report: ScheduleReport,
}

impl TransactionManager {
    /// Elaborates the recorded graph into a netlist.
    ///
    /// The first fatal error is emitted to `sink` and returned; warnings
    /// are emitted to `sink` only.
    pub fn elaborate(mut self, sink: &DiagnosticSink) -> Result<Elaborated, ElabError> {
        let result = self.run_passes(sink);
        if let Err(err) = &result {
            sink.emit(err.to_diagnostic());
        }
        result
    }

    fn run_passes(&mut self, sink: &DiagnosticSink) -> Result<Elaborated, ElabError> {
        log::debug!(
            "elaborating {} nodes with {} relations",
            self.nodes.len(),
            self.relations.len()
        );
        let map = MethodMap::build(self)?;
        method_map::check_methods(self, &map)?;

        simultaneity::prune_orderings(self);
        let groups = simultaneity::groups(self, &map)?;
        let fused = simultaneity::fuse(self, groups);
        let map = if fused.is_empty() {
            map
        } else {
            MethodMap::build(self)?
        };

        let solution = solver::solve(self, &map, sink)?;
        scheduler::emit(self, &solution)?;
        wiring::emit(self, &map)?;

        if self.config.warn_unused_methods {
            for node in self.nodes() {
                let unused = node
                    .as_method()
                    .is_some_and(|m| m.fused_from.is_none() && !map.is_reached(node.id));
                if unused {
                    sink.emit(errors::warning_unused_method(self.name(node.id), node.loc));
                }
            }
        }

        let report = ScheduleReport::new(self, &solution, &fused);
        let owners = self.signal_owners();
        let mut netlist = std::mem::take(&mut self.netlist);
        lower::lower(&mut netlist, std::mem::take(&mut self.assigns), &owners)?;
        Ok(Elaborated { netlist, report })
    }
}
