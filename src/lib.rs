/*!
    link layer driver for the UART Extension Pack

    the host talks to up to 64 units of the extension pack (gpio banks, timers, spi/i2c bridges, uart passthrough, sram, ...)
    over one serial wire. Every message is a pair of bytes: a [UnitByte] (address and access mode) then a data byte.

    - [ExtPack] is the driver context, owning the hardware and wired to its interrupts
    - [transmit] pairs outbound bytes, optionally through a [RingBuffer]
    - [receive] reassembles inbound pairs and recovers from corrupted or truncated ones
    - [registry] stores what each unit received and flags it in an event word
    - [units] and [service] are conveniences on top of the link
*/
#![no_std]
#[cfg(test)]
extern crate std;

mod utils;
mod mutex;
mod command;
mod config;
mod ringbuffer;
mod driver;

pub mod transmit;
pub mod receive;
pub mod registry;
pub mod units;
#[cfg(feature = "service")]
pub mod service;

pub use command::{UnitByte, UnitId, AccessMode, Pair, RxStatus, MAX_UNITS};
pub use config::{Config, PAIR_BITS, WATCHDOG_MARGIN_TICKS};
pub use mutex::{CriticalGuard, IrqMutex, IrqMutexGuard};
pub use ringbuffer::RingBuffer;
pub use driver::ExtPack;
pub use transmit::Uart;
pub use receive::{Watchdog, RxState};
pub use registry::{UnitType, UnitHandler, Handler};
pub use units::Link;

use thiserror::Error;

/// error regarding the extension pack link
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("transmitter busy, nothing was sent")]
    Busy,
    #[error("outbound queue full, nothing was sent")]
    QueueFull,
    #[error("unit {0} is beyond the registry capacity")]
    InvalidUnit(UnitId),
    #[error("no data arrived in expected time")]
    Timeout,
    #[error("acknowledged {received:#04x} instead of {expected:#04x}")]
    Mismatch {expected: u8, received: u8},
}
impl Error {
    /// the link could not take the pair right now, retrying later can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy | Self::QueueFull)
    }
}
