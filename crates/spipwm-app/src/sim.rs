//! Cycle-stepped bench around a reference model of the PWM peripheral.
//!
//! The model only exists so the driver and analyzer have something to talk
//! to; it follows the register map of the device the harness was written for.

use std::convert::Infallible;

use log::{debug, trace};
use spipwm_core::{HarnessConfig, PinBus, PinFrame, SignalProbe, TickClock, Transaction};

pub const REG_EN_OUT_LO: u8 = 0x00;
pub const REG_EN_OUT_HI: u8 = 0x01;
pub const REG_EN_PWM_LO: u8 = 0x02;
pub const REG_EN_PWM_HI: u8 = 0x03;
pub const REG_DUTY: u8 = 0x04;

/// System clocks per PWM counter step. 256 steps at 10 MHz give ~3004.8 Hz.
pub const PWM_PRESCALE: u32 = 13;

const RESET_TICKS: u32 = 5;

#[derive(Debug, Clone, Default)]
pub struct ReferencePeripheral {
    regs: [u8; 5],
    selected: bool,
    shift: u16,
    bit_count: u8,
    prev_sclk: bool,
    prescale: u32,
    counter: u8,
}

impl ReferencePeripheral {
    /// Advance one system clock with the given input word.
    pub fn clock(&mut self, ui_in: u8, rst_n: bool) {
        if !rst_n {
            *self = Self::default();
            return;
        }

        let pins = PinFrame::from_word(ui_in);
        if pins.cs_active {
            if !self.selected {
                self.selected = true;
                self.shift = 0;
                self.bit_count = 0;
            }
            if pins.clock && !self.prev_sclk && self.bit_count < 16 {
                self.shift = (self.shift << 1) | u16::from(pins.data);
                self.bit_count += 1;
            }
        } else if self.selected {
            self.selected = false;
            if self.bit_count == 16 {
                self.commit(self.shift);
            } else {
                debug!("dropped short frame of {} bits", self.bit_count);
            }
        }
        self.prev_sclk = pins.clock;

        self.prescale += 1;
        if self.prescale == PWM_PRESCALE {
            self.prescale = 0;
            self.counter = self.counter.wrapping_add(1);
        }
    }

    fn commit(&mut self, word: u16) {
        let tx = Transaction::from_word(word);
        let address = usize::from(tx.address());
        match self.regs.get_mut(address) {
            Some(reg) if tx.direction().as_bit() => {
                trace!("reg[0x{address:02X}] <= 0x{:02X}", tx.data());
                *reg = tx.data();
            }
            _ => debug!("ignored {tx}"),
        }
    }

    pub fn register(&self, address: u8) -> Option<u8> {
        self.regs.get(usize::from(address)).copied()
    }

    pub fn pwm(&self) -> bool {
        let duty = self.regs[usize::from(REG_DUTY)];
        duty == 0xFF || self.counter < duty
    }

    pub fn uo_out(&self) -> u8 {
        self.output_byte(REG_EN_OUT_LO, REG_EN_PWM_LO)
    }

    pub fn uio_out(&self) -> u8 {
        self.output_byte(REG_EN_OUT_HI, REG_EN_PWM_HI)
    }

    fn output_byte(&self, en_out: u8, en_pwm: u8) -> u8 {
        let pwm = if self.pwm() { 0xFF } else { 0x00 };
        self.regs[usize::from(en_out)] & (!self.regs[usize::from(en_pwm)] | pwm)
    }
}

/// Test bench: drives `ui_in`, steps the peripheral, exposes `uo_out` bit
/// `probe_bit` as the analyzed signal.
#[derive(Debug, Clone)]
pub struct SimBench {
    peripheral: ReferencePeripheral,
    ui_in: u8,
    rst_n: bool,
    ticks: u64,
    clock_period_ns: u64,
    half_period_ns: u64,
    probe_bit: u8,
}

impl SimBench {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            peripheral: ReferencePeripheral::default(),
            ui_in: PinFrame::IDLE.to_word(),
            rst_n: true,
            ticks: 0,
            clock_period_ns: config.clock_period_ns,
            half_period_ns: config.half_period_ns,
            probe_bit: 0,
        }
    }

    pub fn with_probe_bit(mut self, bit: u8) -> Self {
        self.probe_bit = bit & 7;
        self
    }

    /// Idle pins, reset held for five clocks, then five clocks of run time.
    pub fn reset(&mut self) {
        self.ui_in = PinFrame::IDLE.to_word();
        self.rst_n = false;
        self.run(RESET_TICKS);
        self.rst_n = true;
        self.run(RESET_TICKS);
    }

    pub fn run(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.peripheral.clock(self.ui_in, self.rst_n);
            self.ticks += 1;
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn ui_in(&self) -> u8 {
        self.ui_in
    }

    pub fn uo_out(&self) -> u8 {
        self.peripheral.uo_out()
    }

    pub fn uio_out(&self) -> u8 {
        self.peripheral.uio_out()
    }

    pub fn peripheral(&self) -> &ReferencePeripheral {
        &self.peripheral
    }
}

impl TickClock for SimBench {
    type Error = Infallible;

    fn now_ns(&self) -> u64 {
        self.ticks * self.clock_period_ns
    }

    fn await_ticks(&mut self, ticks: u32) -> Result<(), Infallible> {
        self.run(ticks);
        Ok(())
    }
}

impl PinBus for SimBench {
    fn set_pins(&mut self, frame: PinFrame) -> Result<(), Infallible> {
        self.ui_in = frame.to_word();
        Ok(())
    }

    fn half_period_ns(&self) -> u64 {
        self.half_period_ns
    }
}

impl SignalProbe for SimBench {
    fn sample(&mut self) -> Result<bool, Infallible> {
        Ok((self.uo_out() >> self.probe_bit) & 1 == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spipwm_core::{Direction, SerialDriver};

    fn bench() -> SimBench {
        let mut bench = SimBench::new(&HarnessConfig::default());
        bench.reset();
        bench
    }

    #[test]
    fn reset_leaves_outputs_low() {
        let bench = bench();
        assert_eq!(bench.ticks(), 10);
        assert_eq!(bench.now_ns(), 1_000);
        assert_eq!(bench.uo_out(), 0);
        assert_eq!(bench.uio_out(), 0);
        assert_eq!(bench.ui_in(), 0b100);
    }

    #[test]
    fn half_period_is_fifty_one_ticks() {
        let mut bench = bench();
        let before = bench.ticks();
        bench.await_half_period().unwrap();
        assert_eq!(bench.ticks() - before, 51);
    }

    #[test]
    fn write_lands_in_register() {
        let mut bench = bench();
        SerialDriver::default()
            .transmit(&mut bench, Direction::Write, 0x00, 0xF0)
            .unwrap();
        assert_eq!(bench.peripheral().register(REG_EN_OUT_LO), Some(0xF0));
        assert_eq!(bench.uo_out(), 0xF0);
    }

    #[test]
    fn reads_and_unmapped_writes_are_ignored() {
        let mut bench = bench();
        let driver = SerialDriver::default();
        driver.transmit(&mut bench, Direction::Read, 0x00, 0xBE).unwrap();
        driver.transmit(&mut bench, Direction::Write, 0x30, 0xAA).unwrap();
        for reg in 0..5 {
            assert_eq!(bench.peripheral().register(reg), Some(0));
        }
    }

    #[test]
    fn short_frame_is_dropped() {
        let mut bench = bench();
        bench.set_pins(PinFrame::new(true, false, false)).unwrap();
        for _ in 0..4 {
            bench.set_pins(PinFrame::new(true, true, false)).unwrap();
            bench.run(3);
            bench.set_pins(PinFrame::new(true, true, true)).unwrap();
            bench.run(3);
        }
        bench.set_pins(PinFrame::IDLE).unwrap();
        bench.run(3);
        assert_eq!(bench.uo_out(), 0);
    }

    #[test]
    fn pwm_period_is_prescaled_counter() {
        let mut peripheral = ReferencePeripheral::default();
        peripheral.regs[usize::from(REG_DUTY)] = 0x80;
        let mut high = 0;
        for _ in 0..(256 * PWM_PRESCALE) {
            if peripheral.pwm() {
                high += 1;
            }
            peripheral.clock(PinFrame::IDLE.to_word(), true);
        }
        assert_eq!(high, 128 * PWM_PRESCALE);
    }

    #[test]
    fn probe_follows_selected_bit() {
        let config = HarnessConfig::default();
        let mut bench = SimBench::new(&config).with_probe_bit(4);
        bench.reset();
        let driver = config.driver();
        for (reg, data) in [(REG_EN_OUT_LO, 0x10), (REG_EN_PWM_LO, 0x10), (REG_DUTY, 0x80)] {
            driver
                .transmit(&mut bench, Direction::Write, u32::from(reg), data)
                .unwrap();
        }

        let analyzer = config.analyzer();
        assert!(!analyzer.analyze(&mut bench).unwrap().is_stuck());

        let mut bit0 = bench.clone().with_probe_bit(0);
        assert_eq!(
            analyzer.analyze(&mut bit0).unwrap(),
            spipwm_core::WaveformVerdict::StuckLow
        );
    }
}
