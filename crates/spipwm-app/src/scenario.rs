//! Scenario orchestration on top of the simulated bench.

use std::convert::Infallible;

use log::{error, info};
use serde::Serialize;
use spipwm_core::{
    Direction, DriveError, HarnessConfig, SerialDriver, WaveformAnalyzer, WaveformVerdict,
};
use thiserror::Error;

use crate::sim::{SimBench, REG_DUTY, REG_EN_OUT_HI, REG_EN_OUT_LO, REG_EN_PWM_HI, REG_EN_PWM_LO};

/// Ticks to let a register write reach the outputs before measuring.
pub const UPDATE_TICKS: u32 = 100;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("assertion failed: {0}")]
    Assertion(String),
    #[error(transparent)]
    Drive(#[from] DriveError<Infallible>),
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ScenarioError> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioError::Assertion(message()))
    }
}

/// Bench plus the two core components, configured from one [`HarnessConfig`].
pub struct Harness {
    bench: SimBench,
    driver: SerialDriver,
    analyzer: WaveformAnalyzer,
    config: HarnessConfig,
}

impl Harness {
    /// A freshly reset bench.
    pub fn new(config: HarnessConfig) -> Self {
        let mut bench = SimBench::new(&config);
        info!("Reset");
        bench.reset();
        Self {
            bench,
            driver: config.driver(),
            analyzer: config.analyzer(),
            config,
        }
    }

    pub fn bench(&self) -> &SimBench {
        &self.bench
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn write(&mut self, address: u32, data: u32) -> Result<(), ScenarioError> {
        info!("Write transaction, address 0x{address:02X}, data 0x{data:02X}");
        self.driver
            .transmit(&mut self.bench, Direction::Write, address, data)?;
        Ok(())
    }

    pub fn read(&mut self, address: u32, data: u32) -> Result<(), ScenarioError> {
        info!("Read transaction, address 0x{address:02X}, data 0x{data:02X}");
        self.driver
            .transmit(&mut self.bench, Direction::Read, address, data)?;
        Ok(())
    }

    pub fn wait(&mut self, ticks: u32) {
        self.bench.run(ticks);
    }

    pub fn measure_pwm(&mut self) -> WaveformVerdict {
        match self.analyzer.analyze(&mut self.bench) {
            Ok(verdict) => verdict,
            Err(never) => match never {},
        }
    }

    /// Route the PWM to every output bit.
    pub fn prime_registers(&mut self) -> Result<(), ScenarioError> {
        for reg in [REG_EN_OUT_LO, REG_EN_OUT_HI, REG_EN_PWM_LO, REG_EN_PWM_HI] {
            self.write(u32::from(reg), 0xFF)?;
        }
        Ok(())
    }

    fn expect_outputs(&self, uo_out: u8, uio_out: u8) -> Result<(), ScenarioError> {
        let got = self.bench.uo_out();
        ensure(got == uo_out, || {
            format!("expected uo_out 0x{uo_out:02X}, got 0x{got:02X}")
        })?;
        let got = self.bench.uio_out();
        ensure(got == uio_out, || {
            format!("expected uio_out 0x{uio_out:02X}, got 0x{got:02X}")
        })
    }
}

pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    run: fn(&mut Harness) -> Result<(), ScenarioError>,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "spi_registers",
        description: "register writes reach the outputs, reads and unmapped addresses do not",
        run: spi_registers,
    },
    Scenario {
        name: "pwm_frequency",
        description: "PWM frequency at 50% duty is within tolerance of nominal",
        run: pwm_frequency,
    },
    Scenario {
        name: "pwm_duty",
        description: "measured duty byte follows the duty register at 0%, 50% and 100%",
        run: pwm_duty,
    },
];

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
    pub sim_time_ns: u64,
}

impl Scenario {
    pub fn run(&self, config: &HarnessConfig) -> ScenarioReport {
        info!("Start {}", self.name);
        let mut harness = Harness::new(config.clone());
        let result = (self.run)(&mut harness);
        let sim_time_ns = spipwm_core::TickClock::now_ns(harness.bench());

        match result {
            Ok(()) => {
                info!("{} completed successfully", self.name);
                ScenarioReport {
                    name: self.name.to_string(),
                    passed: true,
                    message: None,
                    sim_time_ns,
                }
            }
            Err(e) => {
                error!("{} failed: {e}", self.name);
                ScenarioReport {
                    name: self.name.to_string(),
                    passed: false,
                    message: Some(e.to_string()),
                    sim_time_ns,
                }
            }
        }
    }
}

fn spi_registers(h: &mut Harness) -> Result<(), ScenarioError> {
    h.write(0x00, 0xF0)?;
    h.expect_outputs(0xF0, 0x00)?;
    h.wait(1_000);

    h.write(0x01, 0xCC)?;
    h.expect_outputs(0xF0, 0xCC)?;
    h.wait(100);

    h.write(0x30, 0xAA)?;
    h.wait(100);
    h.expect_outputs(0xF0, 0xCC)?;

    h.read(0x30, 0xBE)?;
    h.expect_outputs(0xF0, 0xCC)?;
    h.wait(100);

    h.read(0x41, 0xEF)?;
    h.expect_outputs(0xF0, 0xCC)?;
    h.wait(100);

    // PWM enabled on the upper four uo_out bits, which are already driven.
    h.write(0x02, 0xFF)?;
    h.wait(100);
    for duty in [0xCF, 0xFF, 0x00, 0x01] {
        h.write(u32::from(REG_DUTY), duty)?;
        h.wait(30_000);
    }
    let got = h.bench().uo_out();
    ensure(got & 0x0F == 0, || {
        format!("expected lower uo_out nibble disabled, got 0x{got:02X}")
    })
}

fn pwm_frequency(h: &mut Harness) -> Result<(), ScenarioError> {
    h.prime_registers()?;
    h.write(u32::from(REG_DUTY), 0x80)?;
    h.wait(UPDATE_TICKS);

    let pwm = h.config().pwm.clone();
    let verdict = h.measure_pwm();
    let freq = verdict.frequency_hz();
    info!("measured {verdict:?}, frequency {freq:?} Hz");
    ensure(verdict.frequency_within(pwm.nominal_hz, pwm.tolerance_percent), || {
        format!(
            "frequency {freq:?} Hz not within {}% of {} Hz",
            pwm.tolerance_percent, pwm.nominal_hz
        )
    })
}

fn pwm_duty(h: &mut Harness) -> Result<(), ScenarioError> {
    h.prime_registers()?;
    let slack = h.config().pwm.duty_slack;

    for (duty, percent) in [(0x00u8, "0%"), (0x80, "50%"), (0xFF, "100%")] {
        h.write(u32::from(REG_DUTY), u32::from(duty))?;
        h.wait(UPDATE_TICKS);
        let verdict = h.measure_pwm();
        let got = verdict.duty_byte();
        ensure(verdict.duty_within(duty, slack), || {
            format!("expected duty cycle = {percent} (0x{duty:02X}), got 0x{got:02X}")
        })?;
        h.wait(UPDATE_TICKS);
    }
    Ok(())
}
