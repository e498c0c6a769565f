//! Signal definitions.

use crate::ids::SignalId;
use serde::{Deserialize, Serialize};

/// The storage kind of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Driven from outside the netlist; never assigned inside it.
    Input,
    /// A combinational signal. Reads as `0` when it has no driver.
    Wire,
    /// A clocked register holding its value between ticks.
    Reg,
}

/// A named signal in a netlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// The ID of this signal within its netlist.
    pub id: SignalId,
    /// The unique name of this signal.
    pub name: String,
    /// Width in bits, between 0 and [`MAX_WIDTH`](crate::MAX_WIDTH).
    pub width: u32,
    /// The storage kind.
    pub kind: SignalKind,
    /// Reset value for registers, ignored for other kinds.
    pub init: u64,
}

impl Signal {
    /// Returns `true` if this signal is a register.
    pub fn is_reg(&self) -> bool {
        self.kind == SignalKind::Reg
    }
}
