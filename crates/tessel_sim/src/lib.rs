//! Cycle-accurate simulator for tessel netlists.
//!
//! The netlist is levelized once at construction: combinational assignments
//! are evaluated in dependency order, so a single pass settles every wire.
//! A [`SimKernel::tick`] computes every register's next state from the settled
//! values, commits them together and settles again.
//!
//! ```ignore
//! let mut sim = SimKernel::new(&netlist)?;
//! sim.set_by_name("go", 1)?;
//! sim.tick()?;
//! assert_eq!(sim.get_by_name("count")?, 1);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod evaluator;
pub mod kernel;
pub mod waveform;

pub use error::SimError;
pub use kernel::SimKernel;
pub use waveform::{VcdRecorder, WaveformRecorder};
