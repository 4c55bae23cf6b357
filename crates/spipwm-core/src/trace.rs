use crate::bus::{PinBus, PinFrame, TickClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEntry {
    pub time_ns: u64,
    pub frame: PinFrame,
}

/// Bounded history of pin frames, oldest dropped first.
#[derive(Debug, Clone)]
pub struct FrameTrace {
    entries: Vec<TraceEntry>,
    max_entries: usize,
}

impl FrameTrace {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn push(&mut self, time_ns: u64, frame: PinFrame) {
        self.entries.push(TraceEntry { time_ns, frame });

        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn words(&self) -> Vec<u8> {
        self.entries.iter().map(|e| e.frame.to_word()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_text(&self, show_timestamp: bool, show_hex: bool) -> String {
        let mut result = String::new();
        for entry in &self.entries {
            if show_timestamp {
                let us = entry.time_ns / 1_000;
                let ns = entry.time_ns % 1_000;
                result.push_str(&format!("[{us:>8}.{ns:03} us] "));
            }
            let word = entry.frame.to_word();
            if show_hex {
                result.push_str(&format!("{word:02X}"));
            } else {
                result.push_str(&format!("{word:08b}"));
            }
            result.push_str(if entry.frame.cs_active { "  cs" } else { "    " });
            result.push('\n');
        }
        result
    }
}

/// Wraps a bus and records every frame written through it.
#[derive(Debug)]
pub struct Recording<B> {
    inner: B,
    trace: FrameTrace,
}

impl<B: PinBus> Recording<B> {
    pub fn new(inner: B, max_entries: usize) -> Self {
        Self {
            inner,
            trace: FrameTrace::new(max_entries),
        }
    }

    pub fn trace(&self) -> &FrameTrace {
        &self.trace
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }

    pub fn into_parts(self) -> (B, FrameTrace) {
        (self.inner, self.trace)
    }
}

impl<B: PinBus> TickClock for Recording<B> {
    type Error = B::Error;

    fn now_ns(&self) -> u64 {
        self.inner.now_ns()
    }

    fn await_ticks(&mut self, ticks: u32) -> Result<(), Self::Error> {
        self.inner.await_ticks(ticks)
    }
}

impl<B: PinBus> PinBus for Recording<B> {
    fn set_pins(&mut self, frame: PinFrame) -> Result<(), Self::Error> {
        self.inner.set_pins(frame)?;
        self.trace.push(self.inner.now_ns(), frame);
        Ok(())
    }

    fn half_period_ns(&self) -> u64 {
        self.inner.half_period_ns()
    }

    fn await_half_period(&mut self) -> Result<(), Self::Error> {
        self.inner.await_half_period()
    }
}
