//! Core of the harness: serial transaction driver, PWM analyzer, pin traces, settings.

pub mod analyzer;
pub mod bus;
pub mod config;
pub mod driver;
pub mod error;
pub mod trace;

pub use analyzer::{analyze, within_tolerance, Edge, EdgeEvent, FnProbe, WaveformAnalyzer, WaveformVerdict};
pub use bus::{Direction, PinBus, PinFrame, SignalProbe, TickClock, Transaction};
pub use config::{HarnessConfig, PwmConfig};
pub use driver::SerialDriver;
pub use error::{ConfigError, DriveError, InvalidArgument};
pub use trace::{FrameTrace, Recording, TraceEntry};
