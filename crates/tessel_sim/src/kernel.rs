//! The simulation kernel.
//!
//! [`SimKernel`] owns the netlist, its levelized evaluation order and the
//! current value of every signal. All state is two-valued: wires without a
//! driver and inputs that were never set read as `0`.

use log::debug;
use tessel_ir::expr::mask;
use tessel_ir::{Netlist, SignalId, SignalKind};

use crate::error::SimError;
use crate::evaluator::eval_expr;
use crate::waveform::WaveformRecorder;

/// A levelized single-clock simulator.
pub struct SimKernel {
    netlist: Netlist,
    /// Indices into `netlist.comb` in dependency order.
    order: Vec<usize>,
    values: Vec<u64>,
    cycle: u64,
    recorder: Option<Box<dyn WaveformRecorder>>,
}

impl SimKernel {
    /// Validates and levelizes `netlist`, then settles its reset state.
    ///
    /// Registers start at their `init` value.
    pub fn new(netlist: &Netlist) -> Result<Self, SimError> {
        netlist.validate()?;
        let order = netlist.comb_order()?;
        let values = netlist
            .signals
            .values()
            .map(|s| if s.is_reg() { s.init } else { 0 })
            .collect();
        let (inputs, wires, regs) = netlist.stats();
        debug!(
            "sim `{}`: {inputs} inputs, {wires} wires, {regs} registers",
            netlist.name
        );
        let mut kernel = Self {
            netlist: netlist.clone(),
            order,
            values,
            cycle: 0,
            recorder: None,
        };
        kernel.settle();
        Ok(kernel)
    }

    /// Attaches a waveform recorder and registers every signal with it.
    ///
    /// The current values are dumped immediately as cycle `0`.
    pub fn set_recorder(&mut self, mut recorder: Box<dyn WaveformRecorder>) -> Result<(), SimError> {
        for signal in self.netlist.signals.values() {
            recorder.register_signal(signal.id, &signal.name, signal.width)?;
        }
        for id in self.netlist.signals.ids() {
            recorder.record_change(self.cycle, id, self.values[id.as_raw() as usize])?;
        }
        self.recorder = Some(recorder);
        Ok(())
    }

    /// Flushes the attached recorder, if any.
    pub fn finish(&mut self) -> Result<(), SimError> {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.finalize()?;
        }
        Ok(())
    }

    /// The simulated netlist.
    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    /// Number of completed clock edges.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Looks up a signal by name.
    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        self.netlist.find(name)
    }

    /// Drives input `id` and re-settles combinational logic.
    pub fn set(&mut self, id: SignalId, value: u64) -> Result<(), SimError> {
        let signal = &self.netlist.signals[id];
        if signal.kind != SignalKind::Input {
            return Err(SimError::NotAnInput(signal.name.clone()));
        }
        self.values[id.as_raw() as usize] = value & mask(signal.width);
        self.settle();
        Ok(())
    }

    /// Drives the input named `name`.
    pub fn set_by_name(&mut self, name: &str, value: u64) -> Result<(), SimError> {
        let id = self
            .find_signal(name)
            .ok_or_else(|| SimError::UnknownSignal(name.to_string()))?;
        self.set(id, value)
    }

    /// Current value of signal `id`.
    pub fn get(&self, id: SignalId) -> u64 {
        self.values[id.as_raw() as usize]
    }

    /// Current value of the signal named `name`.
    pub fn get_by_name(&self, name: &str) -> Result<u64, SimError> {
        self.find_signal(name)
            .map(|id| self.get(id))
            .ok_or_else(|| SimError::UnknownSignal(name.to_string()))
    }

    /// Re-evaluates every combinational assignment in levelized order.
    pub fn settle(&mut self) {
        for &index in &self.order {
            let assign = &self.netlist.comb[index];
            let width = self.netlist.signals[assign.target].width;
            let value = eval_expr(&self.values, &assign.value) & mask(width);
            self.values[assign.target.as_raw() as usize] = value;
        }
    }

    /// Applies one rising clock edge.
    ///
    /// Every register's next state is computed from the settled values before
    /// any register is updated. Registers without a driver hold their value.
    pub fn tick(&mut self) -> Result<(), SimError> {
        let next: Vec<(SignalId, u64)> = self
            .netlist
            .sync
            .iter()
            .map(|assign| {
                let width = self.netlist.signals[assign.target].width;
                (
                    assign.target,
                    eval_expr(&self.values, &assign.value) & mask(width),
                )
            })
            .collect();
        let before = self.recorder.is_some().then(|| self.values.clone());
        for (id, value) in next {
            self.values[id.as_raw() as usize] = value;
        }
        self.settle();
        self.cycle += 1;
        if let (Some(recorder), Some(before)) = (self.recorder.as_mut(), before) {
            for (i, (old, new)) in before.iter().zip(&self.values).enumerate() {
                if old != new {
                    recorder.record_change(self.cycle, SignalId::from_raw(i as u32), *new)?;
                }
            }
        }
        Ok(())
    }

    /// Applies `cycles` clock edges.
    pub fn run(&mut self, cycles: u64) -> Result<(), SimError> {
        for _ in 0..cycles {
            self.tick()?;
        }
        Ok(())
    }
}
