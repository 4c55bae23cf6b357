//! End-to-end runs of the driver and analyzer against the simulated bench.

use spipwm_app::scenario::{find, UPDATE_TICKS};
use spipwm_app::{Harness, ScenarioError, SCENARIOS};
use spipwm_core::{HarnessConfig, WaveformVerdict};

type Result = std::result::Result<(), ScenarioError>;

fn primed() -> std::result::Result<Harness, ScenarioError> {
    let mut harness = Harness::new(HarnessConfig::default());
    harness.prime_registers()?;
    Ok(harness)
}

#[test]
fn it_should_pass_every_scenario() {
    let config = HarnessConfig::default();
    for scenario in SCENARIOS {
        let report = scenario.run(&config);
        assert!(report.passed, "{}: {:?}", report.name, report.message);
        assert!(report.sim_time_ns > 0);
    }
}

#[test]
fn it_should_follow_the_duty_register() -> Result {
    let mut harness = primed()?;

    for expected in [0x00u8, 0x80, 0xFF] {
        harness.write(0x04, u32::from(expected))?;
        harness.wait(UPDATE_TICKS);
        let verdict = harness.measure_pwm();
        assert!(
            verdict.duty_within(expected, 1),
            "expected 0x{expected:02X}, got {verdict:?}"
        );
    }

    Ok(())
}

#[test]
fn it_should_classify_constant_duty_as_stuck() -> Result {
    let mut harness = primed()?;

    harness.write(0x04, 0x00)?;
    harness.wait(UPDATE_TICKS);
    assert_eq!(harness.measure_pwm(), WaveformVerdict::StuckLow);

    harness.write(0x04, 0xFF)?;
    harness.wait(UPDATE_TICKS);
    assert_eq!(harness.measure_pwm(), WaveformVerdict::StuckHigh);

    Ok(())
}

#[test]
fn it_should_measure_nominal_frequency() -> Result {
    let mut harness = primed()?;

    harness.write(0x04, 0x80)?;
    harness.wait(UPDATE_TICKS);
    let verdict = harness.measure_pwm();

    assert_eq!(
        verdict,
        WaveformVerdict::Periodic {
            period_ns: 332_800,
            high_ns: 166_400
        }
    );
    assert!(verdict.frequency_within(3_000.0, 1.0));
    assert_eq!(verdict.duty_byte(), 0x80);

    Ok(())
}

#[test]
fn it_should_measure_narrow_duty() -> Result {
    let mut harness = primed()?;

    for expected in [0x01u8, 0xCF] {
        harness.write(0x04, u32::from(expected))?;
        harness.wait(UPDATE_TICKS);
        assert_eq!(harness.measure_pwm().duty_byte(), expected);
    }

    Ok(())
}

#[test]
fn it_should_drive_unmapped_addresses() -> Result {
    let mut harness = Harness::new(HarnessConfig::default());

    harness.write(0x00, 0xF0)?;
    harness.write(0x30, 0xAA)?;
    harness.read(0x41, 0xEF)?;

    assert_eq!(harness.bench().uo_out(), 0xF0);
    assert_eq!(harness.bench().uio_out(), 0x00);

    Ok(())
}

#[test]
fn it_should_reject_wide_fields_without_bus_activity() {
    let mut harness = Harness::new(HarnessConfig::default());
    let before = harness.bench().ticks();

    assert!(matches!(harness.write(0x80, 0x00), Err(ScenarioError::Drive(_))));
    assert!(matches!(harness.write(0x04, 0x100), Err(ScenarioError::Drive(_))));

    assert_eq!(harness.bench().ticks(), before);
    assert_eq!(harness.bench().ui_in(), 0b100);
}

#[test]
fn it_should_fail_when_tolerance_excludes_the_bench() {
    let mut config = HarnessConfig::default();
    config.pwm.nominal_hz = 2_000.0;

    let report = find("pwm_frequency").unwrap().run(&config);
    assert!(!report.passed);
    assert!(report.message.unwrap().contains("not within"));
}
