//! Passive decoder for the three-wire serial control port.
//!
//! Frames open when chip select goes low and close when it returns high. The
//! data line is shifted in on every rising clock edge in between.

use serde::{Deserialize, Serialize};

use crate::{PinSample, TimeSpan};

/// Bit positions of the serial lines inside a sampled word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiLines {
    pub clock_bit: u8,
    pub data_bit: u8,
    pub cs_bit: u8,
    /// Chip select is asserted when its line reads low.
    pub cs_active_low: bool,
}

impl Default for SpiLines {
    fn default() -> Self {
        Self {
            clock_bit: 0,
            data_bit: 1,
            cs_bit: 2,
            cs_active_low: true,
        }
    }
}

/// Positions past bit 7 read as a low line.
fn line(word: u8, bit: u8) -> bool {
    word.checked_shr(u32::from(bit)).unwrap_or(0) & 1 == 1
}

impl SpiLines {
    fn clock(&self, word: u8) -> bool {
        line(word, self.clock_bit)
    }

    fn data(&self, word: u8) -> bool {
        line(word, self.data_bit)
    }

    fn selected(&self, word: u8) -> bool {
        line(word, self.cs_bit) != self.cs_active_low
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiFrame {
    pub span: TimeSpan,
    /// Bits in the order they were clocked in.
    pub bits: Vec<bool>,
    /// `false` when the trace ended with chip select still asserted.
    pub complete: bool,
}

/// Fields of a 16-bit control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlWord {
    pub write: bool,
    pub address: u8,
    pub data: u8,
}

impl SpiFrame {
    /// Clocked bits packed MSB first, for frames of at most 64 bits.
    pub fn value(&self) -> Option<u64> {
        if self.bits.len() > 64 {
            return None;
        }
        Some(
            self.bits
                .iter()
                .fold(0u64, |acc, &bit| (acc << 1) | u64::from(bit)),
        )
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit)))
            .collect()
    }

    /// The control word, when exactly 16 bits were clocked.
    pub fn control_word(&self) -> Option<ControlWord> {
        if self.bits.len() != 16 {
            return None;
        }
        let word = self.value()? as u16;
        Some(ControlWord {
            write: word & 0x8000 != 0,
            address: ((word >> 8) & 0x7F) as u8,
            data: (word & 0xFF) as u8,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpiDecoder {
    lines: SpiLines,
}

impl SpiDecoder {
    pub fn new(lines: SpiLines) -> Self {
        Self { lines }
    }

    pub fn decode(&self, samples: &[PinSample]) -> Vec<SpiFrame> {
        let mut frames = Vec::new();
        let mut open: Option<SpiFrame> = None;
        let mut prev_clock = false;

        for sample in samples {
            let selected = self.lines.selected(sample.word);
            let clock = self.lines.clock(sample.word);

            if !selected {
                if let Some(mut frame) = open.take() {
                    frame.span.end_ns = sample.time_ns;
                    frame.complete = true;
                    frames.push(frame);
                }
            } else if let Some(frame) = open.as_mut() {
                if clock && !prev_clock {
                    frame.bits.push(self.lines.data(sample.word));
                }
                frame.span.end_ns = sample.time_ns;
            } else {
                // The opening sample never shifts a bit; prev_clock picks up
                // its clock level, so a clock already high here is no edge.
                open = Some(SpiFrame {
                    span: TimeSpan {
                        start_ns: sample.time_ns,
                        end_ns: sample.time_ns,
                    },
                    bits: Vec::new(),
                    complete: false,
                });
            }
            prev_clock = clock;
        }

        if let Some(frame) = open {
            frames.push(frame);
        }
        frames
    }
}
