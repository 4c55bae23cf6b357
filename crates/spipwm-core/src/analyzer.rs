//! PWM waveform classification and measurement.
//!
//! The analyzer polls a single output bit and waits at most ten nominal
//! periods for each edge. A signal that never transitions inside that window
//! is reported as stuck rather than as an error.

use std::convert::Infallible;

use log::{debug, trace};
use serde::Serialize;

use crate::bus::{SignalProbe, TickClock};

/// Nominal periods to wait for an edge before calling the signal stuck.
pub const EDGE_TIMEOUT_PERIODS: f64 = 10.0;

pub const DEFAULT_TOLERANCE_PERCENT: f64 = 1.0;
pub const DEFAULT_DUTY_SLACK: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Edge {
    Rising,
    Falling,
}

impl Edge {
    fn target_level(&self) -> bool {
        matches!(self, Edge::Rising)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeEvent {
    pub edge: Edge,
    pub time_ns: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WaveformVerdict {
    StuckLow,
    StuckHigh,
    Periodic { period_ns: u64, high_ns: u64 },
}

impl WaveformVerdict {
    /// `None` for the stuck cases, where no period was observed.
    pub fn frequency_hz(&self) -> Option<f64> {
        match self {
            WaveformVerdict::Periodic { period_ns, .. } if *period_ns > 0 => {
                Some(1e9 / *period_ns as f64)
            }
            _ => None,
        }
    }

    /// Duty cycle as a fraction of 256, clamped to a byte.
    pub fn duty_byte(&self) -> u8 {
        match self {
            WaveformVerdict::StuckLow => 0x00,
            WaveformVerdict::StuckHigh => 0xFF,
            WaveformVerdict::Periodic { period_ns, high_ns } => {
                if *period_ns == 0 {
                    return 0x00;
                }
                let duty = (*high_ns as f64 / *period_ns as f64 * 256.0).round();
                duty.clamp(0.0, 255.0) as u8
            }
        }
    }

    pub fn is_stuck(&self) -> bool {
        !matches!(self, WaveformVerdict::Periodic { .. })
    }

    pub fn frequency_within(&self, target_hz: f64, tolerance_percent: f64) -> bool {
        self.frequency_hz()
            .map(|freq| within_tolerance(freq, target_hz, tolerance_percent))
            .unwrap_or(false)
    }

    pub fn duty_within(&self, expected: u8, slack: u8) -> bool {
        self.duty_byte().abs_diff(expected) <= slack
    }
}

/// `|value - target| <= target * tolerance_percent / 100`
pub fn within_tolerance(value: f64, target: f64, tolerance_percent: f64) -> bool {
    let tolerance = target * (tolerance_percent / 100.0);
    (target - value).abs() <= tolerance
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformAnalyzer {
    nominal_hz: f64,
}

impl WaveformAnalyzer {
    /// `nominal_hz` must be finite and positive, otherwise the edge timeout
    /// is unbounded.
    pub fn new(nominal_hz: f64) -> Self {
        debug_assert!(
            nominal_hz.is_finite() && nominal_hz > 0.0,
            "nominal frequency must be positive, got {nominal_hz}"
        );
        Self { nominal_hz }
    }

    pub fn nominal_hz(&self) -> f64 {
        self.nominal_hz
    }

    pub fn edge_timeout_ns(&self) -> u64 {
        ((1.0 / self.nominal_hz) * EDGE_TIMEOUT_PERIODS * 1e9).round() as u64
    }

    pub fn analyze<P: SignalProbe>(&self, probe: &mut P) -> Result<WaveformVerdict, P::Error> {
        let timeout = self.edge_timeout_ns();
        let start = probe.now_ns();

        // A rising edge needs a low level first.
        if wait_for_level(probe, false, start, timeout)?.is_none() {
            debug!("pwm stuck high for {timeout} ns");
            return Ok(WaveformVerdict::StuckHigh);
        }

        let rise1 = match wait_for_edge(probe, Edge::Rising, start, timeout)? {
            Some(event) => event,
            None => {
                debug!("pwm stuck low for {timeout} ns");
                return Ok(WaveformVerdict::StuckLow);
            }
        };
        if rise1.time_ns - start > timeout {
            return Ok(WaveformVerdict::StuckHigh);
        }

        let fall = match wait_for_edge(probe, Edge::Falling, rise1.time_ns, timeout)? {
            Some(event) => event,
            None => return Ok(WaveformVerdict::StuckHigh),
        };
        let rise2 = match wait_for_edge(probe, Edge::Rising, fall.time_ns, timeout)? {
            Some(event) => event,
            None => return Ok(WaveformVerdict::StuckLow),
        };

        let verdict = WaveformVerdict::Periodic {
            period_ns: rise2.time_ns - rise1.time_ns,
            high_ns: fall.time_ns - rise1.time_ns,
        };
        debug!("pwm {verdict:?}");
        Ok(verdict)
    }
}

/// Polls until the probe reads `level`. Returns the time it was seen, or
/// `None` once more than `timeout` ns have passed since `since`.
fn wait_for_level<P: SignalProbe>(
    probe: &mut P,
    level: bool,
    since: u64,
    timeout: u64,
) -> Result<Option<u64>, P::Error> {
    loop {
        if probe.sample()? == level {
            return Ok(Some(probe.now_ns()));
        }
        if probe.now_ns().saturating_sub(since) > timeout {
            return Ok(None);
        }
        probe.await_ticks(1)?;
    }
}

fn wait_for_edge<P: SignalProbe>(
    probe: &mut P,
    edge: Edge,
    since: u64,
    timeout: u64,
) -> Result<Option<EdgeEvent>, P::Error> {
    let event = wait_for_level(probe, edge.target_level(), since, timeout)?
        .map(|time_ns| EdgeEvent { edge, time_ns });
    if let Some(event) = &event {
        trace!("{:?} edge at {} ns", event.edge, event.time_ns);
    }
    Ok(event)
}

/// Adapts a pair of closures to [`SignalProbe`].
///
/// The sampling closure owns time: nothing advances between polls unless it
/// does, so `await_ticks` is a no-op.
pub struct FnProbe<S, N> {
    sample: S,
    now: N,
}

impl<S, N> FnProbe<S, N>
where
    S: FnMut() -> bool,
    N: Fn() -> u64,
{
    pub fn new(sample: S, now: N) -> Self {
        Self { sample, now }
    }
}

impl<S, N> TickClock for FnProbe<S, N>
where
    S: FnMut() -> bool,
    N: Fn() -> u64,
{
    type Error = Infallible;

    fn now_ns(&self) -> u64 {
        (self.now)()
    }

    fn await_ticks(&mut self, _ticks: u32) -> Result<(), Infallible> {
        Ok(())
    }
}

impl<S, N> SignalProbe for FnProbe<S, N>
where
    S: FnMut() -> bool,
    N: Fn() -> u64,
{
    fn sample(&mut self) -> Result<bool, Infallible> {
        Ok((self.sample)())
    }
}

/// Runs the analyzer over a sampling closure and a clock closure.
pub fn analyze<S, N>(sample: S, now: N, nominal_hz: f64) -> WaveformVerdict
where
    S: FnMut() -> bool,
    N: Fn() -> u64,
{
    let mut probe = FnProbe::new(sample, now);
    match WaveformAnalyzer::new(nominal_hz).analyze(&mut probe) {
        Ok(verdict) => verdict,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const STEP_NS: u64 = 100;

    /// Square wave sampled every `STEP_NS`, starting `phase_ns` into a period.
    fn square(period_ns: u64, high_ns: u64, phase_ns: u64) -> impl Fn(u64) -> bool {
        move |t| (t + phase_ns) % period_ns < high_ns
    }

    fn run(signal: impl Fn(u64) -> bool, nominal_hz: f64) -> WaveformVerdict {
        let clock = Cell::new(0u64);
        analyze(
            || {
                let t = clock.get();
                clock.set(t + STEP_NS);
                signal(t)
            },
            || clock.get(),
            nominal_hz,
        )
    }

    #[test]
    fn timeout_is_ten_periods() {
        assert_eq!(WaveformAnalyzer::new(3000.0).edge_timeout_ns(), 3_333_333);
        assert_eq!(WaveformAnalyzer::new(1e6).edge_timeout_ns(), 10_000);
    }

    #[test]
    fn constant_low_is_stuck_low() {
        let verdict = run(|_| false, 3000.0);
        assert_eq!(verdict, WaveformVerdict::StuckLow);
        assert_eq!(verdict.duty_byte(), 0x00);
        assert_eq!(verdict.frequency_hz(), None);
    }

    #[test]
    fn constant_high_is_stuck_high() {
        let verdict = run(|_| true, 3000.0);
        assert_eq!(verdict, WaveformVerdict::StuckHigh);
        assert_eq!(verdict.duty_byte(), 0xFF);
        assert!(!verdict.frequency_within(3000.0, 1.0));
    }

    #[test]
    fn rise_after_window_is_stuck_low() {
        // Low for twelve nominal periods, then high for good.
        let verdict = run(|t| t >= 4_000_000, 3000.0);
        assert_eq!(verdict, WaveformVerdict::StuckLow);
    }

    #[test]
    fn edge_on_window_boundary_is_stuck_high() {
        // The rise is seen on the poll that crosses the 3_333_333 ns window.
        let verdict = run(|t| t >= 3_333_300, 3000.0);
        assert_eq!(verdict, WaveformVerdict::StuckHigh);
    }

    #[test]
    fn rise_without_fall_is_stuck_high() {
        let verdict = run(|t| t >= 100_000, 3000.0);
        assert_eq!(verdict, WaveformVerdict::StuckHigh);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "nominal frequency must be positive")]
    fn zero_frequency_is_rejected() {
        WaveformAnalyzer::new(0.0);
    }

    #[test]
    fn half_duty_square_wave() {
        let period = 333_300;
        for phase in [0, 1_000, 166_600, 250_000] {
            let verdict = run(square(period, period / 2, phase), 3000.0);
            assert!(matches!(verdict, WaveformVerdict::Periodic { .. }), "{verdict:?}");
            assert!(verdict.frequency_within(3000.0, DEFAULT_TOLERANCE_PERCENT));
            assert!(verdict.duty_within(0x80, DEFAULT_DUTY_SLACK));
        }
    }

    #[test]
    fn measures_narrow_pulses() {
        let period = 332_800;
        let verdict = run(square(period, 1_300, 50_000), 3000.0);
        assert_eq!(
            verdict,
            WaveformVerdict::Periodic {
                period_ns: period,
                high_ns: 1_300
            }
        );
        assert_eq!(verdict.duty_byte(), 0x01);
    }

    #[test]
    fn signal_that_stops_after_one_pulse() {
        // One pulse, then low forever: no second rising edge.
        let verdict = run(|t| (100_000..200_000).contains(&t), 3000.0);
        assert_eq!(verdict, WaveformVerdict::StuckLow);
    }

    #[test]
    fn duty_byte_clamps() {
        let full = WaveformVerdict::Periodic {
            period_ns: 1_000,
            high_ns: 999,
        };
        assert_eq!(full.duty_byte(), 0xFF);
    }

    #[test]
    fn tolerance_band() {
        assert!(within_tolerance(3029.0, 3000.0, 1.0));
        assert!(within_tolerance(2970.0, 3000.0, 1.0));
        assert!(!within_tolerance(3031.0, 3000.0, 1.0));
        assert!(within_tolerance(3100.0, 3000.0, 5.0));
    }
}
