//! Simulated bench, scenarios and capture tooling around `spipwm-core`.

pub mod capture;
pub mod scenario;
pub mod settings;
pub mod sim;

pub use capture::{capture_transaction, Capture};
pub use scenario::{Harness, Scenario, ScenarioError, ScenarioReport, SCENARIOS};
pub use sim::{ReferencePeripheral, SimBench};
