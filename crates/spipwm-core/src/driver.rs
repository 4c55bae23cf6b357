//! Bit-banged transaction driver for the three-wire serial control port.
//!
//! A transaction is one 16-bit frame clocked out most significant bit first
//! while chip select is held low. Data changes only while the clock is low;
//! the peripheral samples on the rising edge.

use log::{debug, trace, warn};

use crate::bus::{Direction, PinBus, PinFrame, Transaction};
use crate::error::DriveError;

/// Ticks to wait after releasing chip select when nothing else is configured.
pub const DEFAULT_SETTLE_TICKS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialDriver {
    settle_ticks: u32,
}

impl Default for SerialDriver {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_TICKS)
    }
}

impl SerialDriver {
    pub fn new(settle_ticks: u32) -> Self {
        Self { settle_ticks }
    }

    pub fn settle_ticks(&self) -> u32 {
        self.settle_ticks
    }

    /// Validates the fields and drives one transaction.
    ///
    /// Out-of-range fields fail before any pin is touched. On success the
    /// returned frame is the idle state the bus was left in.
    pub fn transmit<B: PinBus>(
        &self,
        bus: &mut B,
        direction: Direction,
        address: u32,
        data: u32,
    ) -> Result<PinFrame, DriveError<B::Error>> {
        let tx = Transaction::new(direction, address, data)?;
        self.send(bus, &tx)
    }

    pub fn send<B: PinBus>(
        &self,
        bus: &mut B,
        tx: &Transaction,
    ) -> Result<PinFrame, DriveError<B::Error>> {
        debug!("spi {tx} (word 0x{:04X})", tx.to_word());

        if let Err(e) = clock_out(bus, tx) {
            // Release chip select even though the frame is incomplete.
            if let Err(release) = bus.set_pins(PinFrame::IDLE) {
                warn!("failed to release chip select: {release}");
            }
            return Err(DriveError::Bus(e));
        }

        bus.set_pins(PinFrame::IDLE).map_err(DriveError::Bus)?;
        bus.await_ticks(self.settle_ticks).map_err(DriveError::Bus)?;
        Ok(PinFrame::IDLE)
    }
}

fn clock_out<B: PinBus>(bus: &mut B, tx: &Transaction) -> Result<(), B::Error> {
    bus.set_pins(PinFrame::new(true, false, false))?;
    bus.await_ticks(1)?;

    for (i, bit) in tx.bits().enumerate() {
        trace!("bit {i:2} = {}", u8::from(bit));
        bus.set_pins(PinFrame::new(true, bit, false))?;
        bus.await_half_period()?;
        bus.set_pins(PinFrame::new(true, bit, true))?;
        bus.await_half_period()?;
    }
    Ok(())
}
