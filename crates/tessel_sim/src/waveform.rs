//! Waveform recording for simulation output.
//!
//! The [`WaveformRecorder`] trait abstracts waveform output. [`VcdRecorder`]
//! writes the Value Change Dump text format with one timestamp per clock
//! cycle, which any VCD viewer can open.

use std::io::Write;

use tessel_ir::SignalId;

use crate::error::SimError;

/// Receives signal changes from a running [`SimKernel`](crate::SimKernel).
pub trait WaveformRecorder {
    /// Registers a signal for recording.
    fn register_signal(&mut self, id: SignalId, name: &str, width: u32) -> Result<(), SimError>;

    /// Records a value change at the given clock cycle.
    fn record_change(&mut self, cycle: u64, id: SignalId, value: u64) -> Result<(), SimError>;

    /// Flushes output and writes any trailer.
    fn finalize(&mut self) -> Result<(), SimError>;
}

/// VCD recorder writing to any [`Write`] sink.
pub struct VcdRecorder<W: Write> {
    writer: W,
    scope: String,
    vars: Vec<(SignalId, String, u32)>,
    current_cycle: Option<u64>,
}

impl<W: Write> VcdRecorder<W> {
    /// Creates a recorder that places all signals in scope `scope`.
    pub fn new(writer: W, scope: impl Into<String>) -> Self {
        Self {
            writer,
            scope: scope.into(),
            vars: Vec::new(),
            current_cycle: None,
        }
    }

    /// Consumes the recorder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Printable identifier codes starting at `!`.
    fn make_id_code(index: usize) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            result.push((b'!' + (idx % 94) as u8) as char);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    fn write_definitions(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$timescale 1ns $end")?;
        writeln!(self.writer, "$scope module {} $end", self.scope)?;
        for (i, (_, name, width)) in self.vars.iter().enumerate() {
            writeln!(
                self.writer,
                "$var wire {width} {} {name} $end",
                Self::make_id_code(i)
            )?;
        }
        writeln!(self.writer, "$upscope $end")?;
        writeln!(self.writer, "$enddefinitions $end")?;
        Ok(())
    }
}

impl<W: Write> WaveformRecorder for VcdRecorder<W> {
    fn register_signal(&mut self, id: SignalId, name: &str, width: u32) -> Result<(), SimError> {
        self.vars.push((id, name.to_string(), width));
        Ok(())
    }

    fn record_change(&mut self, cycle: u64, id: SignalId, value: u64) -> Result<(), SimError> {
        let Some(index) = self.vars.iter().position(|(sid, ..)| *sid == id) else {
            return Ok(());
        };
        if self.current_cycle.is_none() {
            self.write_definitions()?;
        }
        if self.current_cycle != Some(cycle) {
            writeln!(self.writer, "#{cycle}")?;
            self.current_cycle = Some(cycle);
        }
        let code = Self::make_id_code(index);
        let width = self.vars[index].2;
        if width == 1 {
            writeln!(self.writer, "{}{code}", value & 1)?;
        } else {
            writeln!(self.writer, "b{value:b} {code}")?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        if self.current_cycle.is_none() {
            self.write_definitions()?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_codes() {
        assert_eq!(VcdRecorder::<Vec<u8>>::make_id_code(0), "!");
        assert_eq!(VcdRecorder::<Vec<u8>>::make_id_code(93), "~");
        assert_eq!(VcdRecorder::<Vec<u8>>::make_id_code(94), "!!");
    }

    #[test]
    fn writes_header_and_changes() {
        let mut rec = VcdRecorder::new(Vec::new(), "top");
        let a = SignalId::from_raw(0);
        let b = SignalId::from_raw(1);
        rec.register_signal(a, "grant", 1).unwrap();
        rec.register_signal(b, "data", 4).unwrap();
        rec.record_change(0, a, 1).unwrap();
        rec.record_change(0, b, 5).unwrap();
        rec.record_change(1, a, 0).unwrap();
        rec.finalize().unwrap();
        let text = String::from_utf8(rec.into_inner()).unwrap();
        assert!(text.contains("$var wire 1 ! grant $end"));
        assert!(text.contains("$var wire 4 \" data $end"));
        assert!(text.contains("#0\n1!\nb101 \"\n#1\n0!\n"));
    }

    #[test]
    fn unregistered_changes_are_ignored() {
        let mut rec = VcdRecorder::new(Vec::new(), "top");
        rec.record_change(0, SignalId::from_raw(3), 1).unwrap();
        rec.finalize().unwrap();
        let text = String::from_utf8(rec.into_inner()).unwrap();
        assert!(text.contains("$enddefinitions $end"));
        assert!(!text.contains("#0"));
    }
}
