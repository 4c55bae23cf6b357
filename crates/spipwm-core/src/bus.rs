//! Bus-level values and the environment traits the driver and analyzer run against.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvalidArgument;

pub const CLOCK_BIT: u8 = 0;
pub const DATA_BIT: u8 = 1;
pub const NCS_BIT: u8 = 2;

/// Number of bits in one serial frame.
pub const FRAME_BITS: usize = 16;

pub const MAX_ADDRESS: u32 = 0x7F;
pub const MAX_DATA: u32 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    pub fn as_bit(&self) -> bool {
        matches!(self, Direction::Write)
    }

    pub fn from_bit(bit: bool) -> Self {
        if bit {
            Direction::Write
        } else {
            Direction::Read
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// A validated (direction, address, data) triple.
///
/// Only constructible through [`Transaction::new`], so the 7-bit address and
/// 8-bit data bounds always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transaction {
    direction: Direction,
    address: u8,
    data: u8,
}

impl Transaction {
    pub fn new(direction: Direction, address: u32, data: u32) -> Result<Self, InvalidArgument> {
        if address > MAX_ADDRESS {
            return Err(InvalidArgument::AddressOutOfRange(address));
        }
        if data > MAX_DATA {
            return Err(InvalidArgument::DataOutOfRange(data));
        }
        Ok(Self {
            direction,
            address: address as u8,
            data: data as u8,
        })
    }

    pub fn write(address: u32, data: u32) -> Result<Self, InvalidArgument> {
        Self::new(Direction::Write, address, data)
    }

    pub fn read(address: u32, data: u32) -> Result<Self, InvalidArgument> {
        Self::new(Direction::Read, address, data)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn data(&self) -> u8 {
        self.data
    }

    /// The 16-bit control word: direction flag, then address, then data.
    pub fn to_word(&self) -> u16 {
        (u16::from(self.direction.as_bit()) << 15) | (u16::from(self.address) << 8) | u16::from(self.data)
    }

    pub fn from_word(word: u16) -> Self {
        Self {
            direction: Direction::from_bit(word & 0x8000 != 0),
            address: ((word >> 8) & 0x7F) as u8,
            data: (word & 0xFF) as u8,
        }
    }

    /// Frame bits in transmission order, most significant first.
    pub fn bits(&self) -> impl Iterator<Item = bool> {
        let word = self.to_word();
        (0..FRAME_BITS).map(move |i| (word >> (FRAME_BITS - 1 - i)) & 1 == 1)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} addr=0x{:02X} data=0x{:02X}",
            self.direction, self.address, self.data
        )
    }
}

/// Instantaneous level of the three serial lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinFrame {
    /// Chip select asserted. The line itself is active low.
    pub cs_active: bool,
    pub data: bool,
    pub clock: bool,
}

impl PinFrame {
    pub const IDLE: PinFrame = PinFrame {
        cs_active: false,
        data: false,
        clock: false,
    };

    pub fn new(cs_active: bool, data: bool, clock: bool) -> Self {
        Self {
            cs_active,
            data,
            clock,
        }
    }

    /// Packs the frame into the input word. Bits 3-7 are always zero.
    pub fn to_word(&self) -> u8 {
        (u8::from(self.clock) << CLOCK_BIT)
            | (u8::from(self.data) << DATA_BIT)
            | (u8::from(!self.cs_active) << NCS_BIT)
    }

    pub fn from_word(word: u8) -> Self {
        Self {
            cs_active: word & (1 << NCS_BIT) == 0,
            data: word & (1 << DATA_BIT) != 0,
            clock: word & (1 << CLOCK_BIT) != 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::IDLE
    }
}

impl Default for PinFrame {
    fn default() -> Self {
        Self::IDLE
    }
}

impl fmt::Display for PinFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08b}", self.to_word())
    }
}

/// Monotonic time source with a way to wait for clock ticks.
pub trait TickClock {
    type Error: std::error::Error + 'static;

    /// Current time in nanoseconds.
    fn now_ns(&self) -> u64;

    /// Suspend until `ticks` cycles of the driving clock have elapsed.
    fn await_ticks(&mut self, ticks: u32) -> Result<(), Self::Error>;
}

/// The serial input lines of the device under test.
pub trait PinBus: TickClock {
    fn set_pins(&mut self, frame: PinFrame) -> Result<(), Self::Error>;

    /// Half of the nominal serial clock period.
    fn half_period_ns(&self) -> u64;

    /// Suspend until more than half a serial clock period has elapsed,
    /// stepping one tick at a time.
    fn await_half_period(&mut self) -> Result<(), Self::Error> {
        let start = self.now_ns();
        loop {
            self.await_ticks(1)?;
            if self.now_ns().saturating_sub(start) > self.half_period_ns() {
                return Ok(());
            }
        }
    }
}

/// A single observable output bit.
pub trait SignalProbe: TickClock {
    fn sample(&mut self) -> Result<bool, Self::Error>;
}

impl<T: TickClock + ?Sized> TickClock for &mut T {
    type Error = T::Error;

    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }

    fn await_ticks(&mut self, ticks: u32) -> Result<(), Self::Error> {
        (**self).await_ticks(ticks)
    }
}

impl<T: PinBus + ?Sized> PinBus for &mut T {
    fn set_pins(&mut self, frame: PinFrame) -> Result<(), Self::Error> {
        (**self).set_pins(frame)
    }

    fn half_period_ns(&self) -> u64 {
        (**self).half_period_ns()
    }

    fn await_half_period(&mut self) -> Result<(), Self::Error> {
        (**self).await_half_period()
    }
}

impl<T: SignalProbe + ?Sized> SignalProbe for &mut T {
    fn sample(&mut self) -> Result<bool, Self::Error> {
        (**self).sample()
    }
}
