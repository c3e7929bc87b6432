/*!
    asynchronous conveniences on top of the link

    the link itself never blocks, these helpers retry refused pairs and wait for replies of the extension pack,
    sleeping through any [DelayNs] implementation, so they work the same with an embedded timer or a host runtime.
*/

use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorType, ErrorKind, Write};
use log::*;

use crate::{
    Error,
    command::{UnitByte, UnitId},
    registry::ACK_UNIT,
    units::Link,
    };


/// how to retry a pair refused by a full transmitter
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Retry {
    /// total number of tries, 0 behaves like 1
    pub attempts: u16,
    /// pause between two tries
    pub delay_us: u32,
}
impl Retry {
    /// a single try
    pub const ONCE: Self = Self {attempts: 1, delay_us: 0};

    pub const fn new(attempts: u16, delay_us: u32) -> Self {
        Self {attempts, delay_us}
    }
}
impl Default for Retry {
    /// enough for a full default queue to drain at 1 Mbaud
    fn default() -> Self {Self::new(10, 20)}
}

/// send a pair, trying again while the transmitter is busy or its queue full
pub async fn send_retrying<L: Link + ?Sized>(
    link: &L,
    unit: UnitByte,
    data: u8,
    retry: Retry,
    delay: &mut impl DelayNs,
    ) -> Result<(), Error>
{
    let mut attempt = 1;
    loop {
        match link.send(unit, data) {
            Err(error) if error.is_transient() && attempt < retry.attempts => {
                trace!("unit {} refused pair ({}), attempt {}", unit.id(), error, attempt);
                attempt += 1;
                delay.delay_us(retry.delay_us).await;
            },
            result => return result,
        }
    }
}

/// send a string of data bytes to one unit, pausing `byte_delay_us` between consecutive bytes
pub async fn send_bytes<L: Link + ?Sized>(
    link: &L,
    unit: UnitByte,
    bytes: &[u8],
    byte_delay_us: u32,
    retry: Retry,
    delay: &mut impl DelayNs,
    ) -> Result<(), Error>
{
    for (i, &byte) in bytes.iter().enumerate() {
        if i != 0 {
            delay.delay_us(byte_delay_us).await;
        }
        send_retrying(link, unit, byte, retry, delay).await?;
    }
    Ok(())
}

/**
    wait for the unit to receive data, polling its event every [Config::poll_interval_us](crate::Config::poll_interval_us)

    the event is consumed and the data received returned, or [Error::Timeout] if nothing came in `timeout_us`
*/
pub async fn wait_event<L: Link + ?Sized>(
    link: &L,
    unit: UnitId,
    timeout_us: u32,
    delay: &mut impl DelayNs,
    ) -> Result<u8, Error>
{
    let poll = link.config().poll_interval_us.max(1);
    let mut elapsed = 0;
    loop {
        if link.take_event(unit) {
            return Ok(link.input(unit))
        }
        if elapsed >= timeout_us {
            debug!("no data from unit {} after {} us", unit, elapsed);
            return Err(Error::Timeout)
        }
        delay.delay_us(poll).await;
        elapsed = elapsed.saturating_add(poll);
    }
}

/// wait for an acknowledgment, returning its data
pub async fn wait_ack<L: Link + ?Sized>(link: &L, timeout_us: u32, delay: &mut impl DelayNs) -> Result<u8, Error> {
    wait_event(link, ACK_UNIT, timeout_us, delay).await
}

/// wait for an acknowledgment carrying `expected`
pub async fn wait_ack_data<L: Link + ?Sized>(
    link: &L,
    expected: u8,
    timeout_us: u32,
    delay: &mut impl DelayNs,
    ) -> Result<(), Error>
{
    let received = wait_ack(link, timeout_us, delay).await?;
    if received == expected  {Ok(())}
    else {Err(Error::Mismatch {expected, received})}
}


impl embedded_io_async::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout => ErrorKind::TimedOut,
            Self::InvalidUnit(_) => ErrorKind::InvalidInput,
            _ => ErrorKind::Other,
        }
    }
}

/**
    byte stream to one unit, typically a uart passthrough

    every byte is sent as the data of a pair with the same unit byte. A write blocks only for the first byte,
    and returns as soon as the link refuses the following ones.
*/
pub struct UnitWriter<'l, L: ?Sized, D> {
    link: &'l L,
    unit: UnitByte,
    retry: Retry,
    delay: D,
}
impl<'l, L: Link + ?Sized, D: DelayNs> UnitWriter<'l, L, D> {
    pub fn new(link: &'l L, unit: UnitByte, retry: Retry, delay: D) -> Self {
        Self {link, unit, retry, delay}
    }
    pub fn unit(&self) -> UnitByte {self.unit}
    pub fn into_delay(self) -> D {self.delay}
}
impl<L: ?Sized, D> ErrorType for UnitWriter<'_, L, D> {
    type Error = Error;
}
impl<L: Link + ?Sized, D: DelayNs> Write for UnitWriter<'_, L, D> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let Some((&first, rest)) = buf.split_first()
            else {return Ok(0)};
        send_retrying(self.link, self.unit, first, self.retry, &mut self.delay).await?;
        let mut written = 1;
        for &byte in rest {
            match self.link.send(self.unit, byte) {
                Ok(()) => written += 1,
                Err(error) if error.is_transient() => break,
                Err(error) => return Err(error),
            }
        }
        Ok(written)
    }
    /// wait until the link sent every pair, polling every [Config::poll_interval_us](crate::Config::poll_interval_us)
    async fn flush(&mut self) -> Result<(), Error> {
        let poll = self.link.config().poll_interval_us.max(1);
        while self.link.transmitting() {
            self.delay.delay_us(poll).await;
        }
        Ok(())
    }
}
