/*!
    software model of the hardware around the link, to drive [extpack] from integration tests

    the uart and watchdog are simulated, and a simulated extension pack can answer the pairs the host sends
*/

use std::future::Future;
use std::time::Duration;
use embedded_hal_async::delay::DelayNs;
use futures_concurrency::future::Race;

use extpack::{Config, ExtPack, RxStatus, Uart, UnitByte, Watchdog};


/// uart whose data register empties one frame at a time, when the bench says so
#[derive(Default, Debug)]
pub struct SimUart {
    /// bytes that left through the wire
    pub wire: Vec<u8>,
    /// byte in the data register, not sent yet
    pub holding: Option<u8>,
    /// data register empty interrupt enabled
    pub interrupt: bool,
}
impl SimUart {
    /// shift the held byte out to the wire
    pub fn shift(&mut self) -> bool {
        match self.holding.take() {
            Some(byte) => {self.wire.push(byte); true},
            None => false,
        }
    }
}
impl Uart for SimUart {
    fn write_data(&mut self, byte: u8) {
        assert!(self.holding.is_none(), "data register overwritten before being sent");
        self.holding = Some(byte);
    }
    fn data_register_empty(&self) -> bool {self.holding.is_none()}
    fn tx_interrupt_enabled(&self) -> bool {self.interrupt}
    fn set_tx_interrupt(&mut self, enable: bool) {self.interrupt = enable}
}

/// watchdog timer that only fires when the bench expires it
#[derive(Default, Debug)]
pub struct SimWatchdog {
    pub armed: bool,
    /// number of times the timer was reloaded
    pub arms: usize,
}
impl Watchdog for SimWatchdog {
    fn arm(&mut self) {
        self.armed = true;
        self.arms += 1;
    }
    fn disarm(&mut self) {self.armed = false}
}

pub type Pack<const QUEUE: usize = 10> = ExtPack<SimUart, SimWatchdog, 64, QUEUE>;

pub fn pack<const QUEUE: usize>() -> Pack<QUEUE> {
    ExtPack::new(SimUart::default(), SimWatchdog::default(), Config::new())
}

pub fn init_logs() {
    env_logger::builder().is_test(true).try_init().ok();
}

/**
    advance the transmit hardware by one frame

    the held byte leaves to the wire, then the data register empty interrupt runs if enabled.
    Returns false once the transmitter is idle
*/
pub fn step<const QUEUE: usize>(pack: &Pack<QUEUE>) -> bool {
    let (shifted, ready) = pack.with_uart(|uart| {
        let shifted = uart.shift();
        (shifted, uart.interrupt)
    });
    if ready {
        pack.on_transmit_ready();
    }
    shifted || ready
}
/// run the transmit hardware until everything was sent
pub fn flush<const QUEUE: usize>(pack: &Pack<QUEUE>) {
    while step(pack) {}
}
/// nothing left to send, not even a byte in the data register
pub fn idle<const QUEUE: usize>(pack: &Pack<QUEUE>) -> bool {
    !pack.transmitting() && pack.with_uart(|uart| uart.holding.is_none())
}
/// yield until the simulated partner received everything
pub async fn drained<const QUEUE: usize>(pack: &Pack<QUEUE>) {
    while !idle(pack) {
        tokio::task::yield_now().await;
    }
}
/// bytes sent through the wire since last call
pub fn take_wire<const QUEUE: usize>(pack: &Pack<QUEUE>) -> Vec<u8> {
    pack.with_uart(|uart| core::mem::take(&mut uart.wire))
}
/// received bytes from the wire, clean
pub fn feed<const QUEUE: usize>(pack: &Pack<QUEUE>, bytes: &[u8]) {
    for &byte in bytes {
        pack.on_receive(byte, RxStatus::CLEAN);
    }
}
/// let the watchdog fire if armed, returns whether it fired
pub fn expire<const QUEUE: usize>(pack: &Pack<QUEUE>) -> bool {
    let armed = pack.with_watchdog(|watchdog| watchdog.armed);
    if armed {
        pack.on_watchdog();
    }
    armed
}

/**
    simulated extension pack

    keeps the transmit hardware running and passes every complete pair from the wire to `reply`,
    whose answer if any is received back by the host. Never returns, meant to be raced with the test.
*/
pub async fn partner<const QUEUE: usize>(
    pack: &Pack<QUEUE>,
    mut reply: impl FnMut(UnitByte, u8) -> Option<(UnitByte, u8)>,
    ) {
    let mut pending = Vec::new();
    loop {
        step(pack);
        pending.extend(take_wire(pack));
        while pending.len() >= 2 {
            let data = pending.remove(1);
            let unit = UnitByte::from(pending.remove(0));
            if let Some((unit, data)) = reply(unit, data) {
                feed(pack, &[unit.into(), data]);
            }
        }
        tokio::task::yield_now().await;
    }
}

/// run a test against a simulated extension pack, aborting it if it takes too long
pub async fn with_partner<const QUEUE: usize, F>(
    pack: &Pack<QUEUE>,
    reply: impl FnMut(UnitByte, u8) -> Option<(UnitByte, u8)>,
    test: F,
    )
where F: Future<Output=()>
{
    (
        async {
            tokio::time::timeout(Duration::from_secs(10), test)
            .await.expect("aborted test because took too long");
        },
        partner(pack, reply),
    ).race().await;
}

/// delay yielding to the runtime instead of sleeping, counting the time it was asked to wait
#[derive(Default, Debug)]
pub struct YieldDelay {
    pub elapsed_ns: u64,
}
impl YieldDelay {
    pub fn elapsed_us(&self) -> u64 {self.elapsed_ns / 1000}
}
impl DelayNs for YieldDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
        tokio::task::yield_now().await;
    }
}
