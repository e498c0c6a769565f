//! The synchronous netlist produced by transaction-graph elaboration.
//!
//! A [`Netlist`] is a flat set of [`Signal`]s (inputs, wires and registers)
//! with one driver each: a combinational [`Expr`] for wires, a next-state
//! [`Expr`] for registers. There are no processes and no hierarchy left;
//! every scheduling decision has been turned into plain logic.

#![warn(missing_docs)]

pub mod arena;
pub mod expr;
pub mod ids;
pub mod netlist;
pub mod signal;

pub use arena::{Arena, ArenaId};
pub use expr::{BinaryOp, Expr, UnaryOp, MAX_WIDTH};
pub use ids::SignalId;
pub use netlist::{Assign, Netlist, NetlistError};
pub use signal::{Signal, SignalKind};
