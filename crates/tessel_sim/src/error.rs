//! Simulation error types.

use std::io;
use tessel_ir::NetlistError;

/// Errors that can occur during simulation setup or execution.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The netlist failed its structural checks or could not be levelized.
    #[error("invalid netlist: {0}")]
    Netlist(#[from] NetlistError),

    /// No signal with the given name exists.
    #[error("no signal named `{0}`")]
    UnknownSignal(String),

    /// Only inputs may be set from outside.
    #[error("signal `{0}` is not an input")]
    NotAnInput(String),

    /// An I/O error occurred while writing waveform data.
    #[error("waveform I/O error: {0}")]
    WaveformIo(#[from] io::Error),
}
