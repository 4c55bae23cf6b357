use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analyzer::{WaveformAnalyzer, DEFAULT_DUTY_SLACK, DEFAULT_TOLERANCE_PERCENT};
use crate::driver::{SerialDriver, DEFAULT_SETTLE_TICKS};
use crate::error::ConfigError;

/// Timing of the bench and acceptance bands for the PWM checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// System clock period; one tick.
    pub clock_period_ns: u64,
    /// Half of the serial clock period.
    pub half_period_ns: u64,
    pub settle_ticks: u32,
    pub pwm: PwmConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    pub nominal_hz: f64,
    pub tolerance_percent: f64,
    pub duty_slack: u8,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            clock_period_ns: 100,
            half_period_ns: 5_000,
            settle_ticks: DEFAULT_SETTLE_TICKS,
            pwm: PwmConfig::default(),
        }
    }
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            nominal_hz: 3_000.0,
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            duty_slack: DEFAULT_DUTY_SLACK,
        }
    }
}

impl HarnessConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: HarnessConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_period_ns == 0 {
            return Err(ConfigError::Invalid("clock_period_ns must be non-zero".into()));
        }
        if self.half_period_ns == 0 {
            return Err(ConfigError::Invalid("half_period_ns must be non-zero".into()));
        }
        if !(self.pwm.nominal_hz.is_finite() && self.pwm.nominal_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pwm.nominal_hz must be positive, got {}",
                self.pwm.nominal_hz
            )));
        }
        if self.pwm.tolerance_percent.is_nan() || self.pwm.tolerance_percent < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "pwm.tolerance_percent must not be negative, got {}",
                self.pwm.tolerance_percent
            )));
        }
        Ok(())
    }

    pub fn driver(&self) -> SerialDriver {
        SerialDriver::new(self.settle_ticks)
    }

    pub fn analyzer(&self) -> WaveformAnalyzer {
        WaveformAnalyzer::new(self.pwm.nominal_hz)
    }
}
