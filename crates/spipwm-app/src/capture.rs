use std::convert::Infallible;

use spipwm_core::{Direction, DriveError, FrameTrace, HarnessConfig, Recording, TraceEntry};
use spipwm_decode::spi::{SpiDecoder, SpiFrame};
use spipwm_decode::PinSample;

use crate::sim::SimBench;

const TRACE_CAPACITY: usize = 4096;

/// Pin activity of one transaction on a fresh bench, and what a passive
/// decoder makes of it.
#[derive(Debug)]
pub struct Capture {
    pub trace: FrameTrace,
    pub frames: Vec<SpiFrame>,
    pub bench: SimBench,
}

pub fn to_samples(entries: &[TraceEntry]) -> Vec<PinSample> {
    entries
        .iter()
        .map(|e| PinSample {
            time_ns: e.time_ns,
            word: e.frame.to_word(),
        })
        .collect()
}

pub fn capture_transaction(
    config: &HarnessConfig,
    direction: Direction,
    address: u32,
    data: u32,
) -> Result<Capture, DriveError<Infallible>> {
    let mut bench = SimBench::new(config);
    bench.reset();

    let mut recording = Recording::new(bench, TRACE_CAPACITY);
    config
        .driver()
        .transmit(&mut recording, direction, address, data)?;
    let (bench, trace) = recording.into_parts();

    let frames = SpiDecoder::default().decode(&to_samples(trace.entries()));
    Ok(Capture {
        trace,
        frames,
        bench,
    })
}
