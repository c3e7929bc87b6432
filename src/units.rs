/*!
    typed helpers for each kind of unit

    each helper is a lightweight reference to a [Link] and a unit number, created and dropped at no cost.
    Methods map to one pair on the wire with the access mode the unit type expects, the async ones chain several pairs.
*/

use crate::{
    Error, ExtPack, Config, Uart, Watchdog,
    command::{AccessMode, UnitByte, UnitId},
    registry::{AckState, ErrorFlags, ACK_UNIT, ERROR_UNIT, RESET_UNIT, RESET_REQUEST},
    };
#[cfg(feature = "service")]
use embedded_hal_async::delay::DelayNs;
#[cfg(feature = "service")]
use crate::service::{send_bytes, Retry};


/// what unit helpers need from the driver
pub trait Link {
    /// send a pair, recording the unit's output state, see [ExtPack::send]
    fn send(&self, unit: UnitByte, data: u8) -> Result<(), Error>;
    /// last data byte received for the unit, 0 for units beyond capacity
    fn input(&self, unit: UnitId) -> u8;
    /// last value sent to the unit, 0 for units beyond capacity
    fn output(&self, unit: UnitId) -> u8;
    /// read and clear the event flag of the unit
    fn take_event(&self, unit: UnitId) -> bool;
    /// pairs are still waiting to go through the wire
    fn transmitting(&self) -> bool;
    fn config(&self) -> &Config;
}
impl<U: Uart, W: Watchdog, const UNITS: usize, const QUEUE: usize> Link for ExtPack<U, W, UNITS, QUEUE> {
    fn send(&self, unit: UnitByte, data: u8) -> Result<(), Error> {ExtPack::send(self, unit, data)}
    fn input(&self, unit: UnitId) -> u8 {ExtPack::input(self, unit)}
    fn output(&self, unit: UnitId) -> u8 {ExtPack::output(self, unit)}
    fn take_event(&self, unit: UnitId) -> bool {self.registry().take_event(unit)}
    fn transmitting(&self) -> bool {ExtPack::transmitting(self)}
    fn config(&self) -> &Config {ExtPack::config(self)}
}

impl<U: Uart, W: Watchdog, const UNITS: usize, const QUEUE: usize> ExtPack<U, W, UNITS, QUEUE> {
    pub fn gpio(&self, unit: UnitId) -> Gpio<'_, Self> {Gpio::new(self, unit)}
    pub fn timer(&self, unit: UnitId) -> Timer<'_, Self> {Timer::new(self, unit)}
    pub fn spi(&self, unit: UnitId) -> Spi<'_, Self> {Spi::new(self, unit)}
    pub fn i2c(&self, unit: UnitId) -> I2c<'_, Self> {I2c::new(self, unit)}
    pub fn sram(&self, unit: UnitId) -> Sram<'_, Self> {Sram::new(self, unit)}
    pub fn uart(&self, unit: UnitId) -> UartUnit<'_, Self> {UartUnit::new(self, unit)}
    pub fn reset(&self) -> Reset<'_, Self> {Reset::new(self)}
    pub fn ack(&self) -> Ack<'_, Self> {Ack::new(self)}
    pub fn error(&self) -> ErrorUnit<'_, Self> {ErrorUnit::new(self)}
}

/// wait one pair duration, so the extension pack processed the previous pair before the next one
#[cfg(feature = "service")]
async fn pace<L: Link + ?Sized>(link: &L, delay: &mut impl DelayNs) {
    delay.delay_us(link.config().pair_duration_us()).await
}


/// bank of general purpose pins
pub struct Gpio<'l, L: ?Sized> {
    link: &'l L,
    unit: UnitId,
}
impl<'l, L: Link + ?Sized> Gpio<'l, L> {
    pub fn new(link: &'l L, unit: UnitId) -> Self {Self {link, unit}}

    /// drive the output pins
    pub fn set_output(&self, levels: u8) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode0), levels)
    }
    /// ask the extension pack to send the input levels back
    pub fn refresh_input(&self) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode1), 0)
    }
    /// input levels last received
    pub fn input(&self) -> u8 {self.link.input(self.unit)}
    /// output levels last set
    pub fn output(&self) -> u8 {self.link.output(self.unit)}
}

/// 8 bit timer of the extension pack
pub struct Timer<'l, L: ?Sized> {
    link: &'l L,
    unit: UnitId,
}
impl<'l, L: Link + ?Sized> Timer<'l, L> {
    pub fn new(link: &'l L, unit: UnitId) -> Self {Self {link, unit}}

    pub fn enable(&self, enable: bool) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode0), u8::from(enable))
    }
    pub fn restart(&self) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode1), 0)
    }
    pub fn set_prescaler(&self, divisor: u8) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode2), divisor)
    }
    pub fn set_start_value(&self, start: u8) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode3), start)
    }
    /// stop the timer, set prescaler and start value, restart and enable it
    #[cfg(feature = "service")]
    pub async fn configure(&self, divisor: u8, start: u8, delay: &mut impl DelayNs) -> Result<(), Error> {
        self.enable(false)?;
        pace(self.link, delay).await;
        self.set_prescaler(divisor)?;
        pace(self.link, delay).await;
        self.set_start_value(start)?;
        pace(self.link, delay).await;
        self.restart()?;
        pace(self.link, delay).await;
        self.enable(true)
    }
}

/// spi master bridge
pub struct Spi<'l, L: ?Sized> {
    link: &'l L,
    unit: UnitId,
}
impl<'l, L: Link + ?Sized> Spi<'l, L> {
    pub fn new(link: &'l L, unit: UnitId) -> Self {Self {link, unit}}

    /// select the slave subsequent writes go to
    pub fn select(&self, slave: u8) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode1), slave)
    }
    pub fn write(&self, data: u8) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode0), data)
    }
    /// slave last selected
    pub fn selected(&self) -> u8 {self.link.output(self.unit)}
    pub fn last_received(&self) -> u8 {self.link.input(self.unit)}
    #[cfg(feature = "service")]
    pub async fn write_to(&self, slave: u8, data: u8, delay: &mut impl DelayNs) -> Result<(), Error> {
        self.select(slave)?;
        pace(self.link, delay).await;
        self.write(data)
    }
    /// select the slave then send it a string of bytes, `byte_delay_us` apart
    #[cfg(feature = "service")]
    pub async fn write_bytes_to(
        &self,
        slave: u8,
        bytes: &[u8],
        byte_delay_us: u32,
        retry: Retry,
        delay: &mut impl DelayNs,
        ) -> Result<(), Error>
    {
        self.select(slave)?;
        pace(self.link, delay).await;
        send_bytes(self.link, UnitByte::with_mode(self.unit, AccessMode::Mode0), bytes, byte_delay_us, retry, delay).await
    }
}

/// i2c master bridge
pub struct I2c<'l, L: ?Sized> {
    link: &'l L,
    unit: UnitId,
}
impl<'l, L: Link + ?Sized> I2c<'l, L> {
    pub fn new(link: &'l L, unit: UnitId) -> Self {Self {link, unit}}

    /// set the address of the device subsequent transfers talk to
    pub fn set_partner(&self, address: u8) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode1), address)
    }
    pub fn write(&self, data: u8) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode0), data)
    }
    /// ask for one byte from the partner, it arrives as received data of this unit
    pub fn request(&self) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode2), 0)
    }
    /// 7 bit address of the current partner
    pub fn partner(&self) -> u8 {self.link.output(self.unit) & 0x7f}
    pub fn last_received(&self) -> u8 {self.link.input(self.unit)}
    #[cfg(feature = "service")]
    pub async fn write_to(&self, address: u8, data: u8, delay: &mut impl DelayNs) -> Result<(), Error> {
        self.set_partner(address)?;
        pace(self.link, delay).await;
        self.write(data)
    }
    /// address the partner then send it a string of bytes, `byte_delay_us` apart
    #[cfg(feature = "service")]
    pub async fn write_bytes_to(
        &self,
        address: u8,
        bytes: &[u8],
        byte_delay_us: u32,
        retry: Retry,
        delay: &mut impl DelayNs,
        ) -> Result<(), Error>
    {
        self.set_partner(address)?;
        pace(self.link, delay).await;
        send_bytes(self.link, UnitByte::with_mode(self.unit, AccessMode::Mode0), bytes, byte_delay_us, retry, delay).await
    }
    #[cfg(feature = "service")]
    pub async fn request_from(&self, address: u8, delay: &mut impl DelayNs) -> Result<(), Error> {
        self.set_partner(address)?;
        pace(self.link, delay).await;
        self.request()
    }
}

/// external static ram, addressed with a 32 bit pointer shifted in byte by byte
pub struct Sram<'l, L: ?Sized> {
    link: &'l L,
    unit: UnitId,
}
impl<'l, L: Link + ?Sized> Sram<'l, L> {
    pub fn new(link: &'l L, unit: UnitId) -> Self {Self {link, unit}}

    pub fn reset_address(&self) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode0), 0)
    }
    /// shift the next address byte in, least significant first
    pub fn push_address_byte(&self, byte: u8) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode1), byte)
    }
    /// ask for the byte at the current address, it arrives as received data of this unit
    pub fn request(&self) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode2), 0)
    }
    /// write a byte at the current address
    pub fn write(&self, data: u8) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode3), data)
    }
    pub fn last_received(&self) -> u8 {self.link.input(self.unit)}
    /// point the sram to `address`
    #[cfg(feature = "service")]
    pub async fn set_address(&self, address: u32, delay: &mut impl DelayNs) -> Result<(), Error> {
        self.reset_address()?;
        for byte in address.to_le_bytes() {
            pace(self.link, delay).await;
            self.push_address_byte(byte)?;
        }
        Ok(())
    }
}

/// uart passthrough
pub struct UartUnit<'l, L: ?Sized> {
    link: &'l L,
    unit: UnitId,
}
impl<'l, L: Link + ?Sized> UartUnit<'l, L> {
    pub fn new(link: &'l L, unit: UnitId) -> Self {Self {link, unit}}

    pub fn write(&self, data: u8) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(self.unit, AccessMode::Mode0), data)
    }
    pub fn last_received(&self) -> u8 {self.link.input(self.unit)}
}

/// reset channel, unit 0
pub struct Reset<'l, L: ?Sized> {
    link: &'l L,
}
impl<'l, L: Link + ?Sized> Reset<'l, L> {
    pub fn new(link: &'l L) -> Self {Self {link}}

    /// ask the extension pack to reset itself
    pub fn request(&self) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(RESET_UNIT, AccessMode::Mode0), RESET_REQUEST)
    }
    /// the byte received on the reset unit tells that the extension pack was reset
    pub fn is_reset_notice(data: u8) -> bool {
        data == RESET_REQUEST
    }
}

/// acknowledgment channel, unit 2
pub struct Ack<'l, L: ?Sized> {
    link: &'l L,
}
impl<'l, L: Link + ?Sized> Ack<'l, L> {
    pub fn new(link: &'l L) -> Self {Self {link}}

    /// ask the extension pack to acknowledge commands, or stop doing so
    pub fn set_enabled(&self, enable: bool) -> Result<(), Error> {
        self.link.send(UnitByte::with_mode(ACK_UNIT, AccessMode::Mode0), u8::from(enable))
    }
    pub fn enabled(&self) -> bool {
        AckState::from(self.link.output(ACK_UNIT)).enabled()
    }
    /// an acknowledgment arrived since last call
    pub fn take_event(&self) -> bool {self.link.take_event(ACK_UNIT)}
    /// data of the last acknowledgment
    pub fn data(&self) -> u8 {self.link.input(ACK_UNIT)}
}

/// error channel, unit 1
pub struct ErrorUnit<'l, L: ?Sized> {
    link: &'l L,
}
impl<'l, L: Link + ?Sized> ErrorUnit<'l, L> {
    pub fn new(link: &'l L) -> Self {Self {link}}

    /// last error reported by the extension pack
    pub fn last_error(&self) -> ErrorFlags {
        ErrorFlags::from(self.link.input(ERROR_UNIT))
    }
}
