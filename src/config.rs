use crate::utils::div_ceil;


/// bits on the wire for one pair: two frames of start, 8 data and stop bit
pub const PAIR_BITS: u32 = 20;
/// extra timer ticks granted to the second byte of a pair before the watchdog fires
pub const WATCHDOG_MARGIN_TICKS: u32 = 26;

/// run-time settings of the link, compile-time capacities are generic parameters of [crate::ExtPack]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// symbol rate of the serial link
    pub baud_rate: u32,
    /// unit 0 is registered as reset unit by [crate::ExtPack::init]
    pub has_reset_unit: bool,
    /// unit 1 is registered as error unit by [crate::ExtPack::init]
    pub has_error_unit: bool,
    /// unit 2 is registered as acknowledgment unit by [crate::ExtPack::init]
    pub has_ack_unit: bool,
    /// period at which the service helpers poll for events
    pub poll_interval_us: u32,
}

impl Config {
    pub const DEFAULT: Self = Self {
        baud_rate: 1_000_000,
        has_reset_unit: true,
        has_error_unit: true,
        has_ack_unit: true,
        poll_interval_us: 1,
    };

    pub const fn new() -> Self {Self::DEFAULT}

    pub const fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
    pub const fn with_reset_unit(mut self, enable: bool) -> Self {
        self.has_reset_unit = enable;
        self
    }
    pub const fn with_error_unit(mut self, enable: bool) -> Self {
        self.has_error_unit = enable;
        self
    }
    pub const fn with_ack_unit(mut self, enable: bool) -> Self {
        self.has_ack_unit = enable;
        self
    }
    pub const fn with_poll_interval_us(mut self, interval: u32) -> Self {
        self.poll_interval_us = interval;
        self
    }

    /// worst case time for one pair to go through the wire, in microseconds
    pub const fn pair_duration_us(&self) -> u32 {
        div_ceil(PAIR_BITS as u64 * 1_000_000, self.baud_rate as u64) as u32
    }
    /**
        watchdog period in ticks of a timer running at `timer_hz`

        one pair duration rounded up, plus [WATCHDOG_MARGIN_TICKS]. At 1 Mbaud this gives 66 ticks for a 2 MHz timer and 76 for a 2.5 MHz timer.
    */
    pub const fn watchdog_ticks(&self, timer_hz: u32) -> u32 {
        div_ceil(PAIR_BITS as u64 * timer_hz as u64, self.baud_rate as u64) as u32 + WATCHDOG_MARGIN_TICKS
    }
}
impl Default for Config {
    fn default() -> Self {Self::DEFAULT}
}
