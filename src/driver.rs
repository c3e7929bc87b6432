use log::*;

use crate::{
    Error,
    config::Config,
    command::{Pair, RxStatus, UnitByte, UnitId},
    mutex::IrqMutex,
    receive::{Receiver, RxState, Watchdog},
    registry::{Registry, UnitType, Handler, ERROR_UNIT, ACK_UNIT, RESET_UNIT},
    ringbuffer::RingBuffer,
    transmit::{Transmitter, Uart},
    };


/**
    driver context for one extension pack

    owns the uart and watchdog timer, the outbound queue, the receive state machine and the unit registry.
    It is meant to be created once, usually in a `static`, and shared by the foreground program and the three interrupt handlers:

    - receive complete: [Self::on_receive]
    - transmit data register empty: [Self::on_transmit_ready]
    - watchdog timer overflow: [Self::on_watchdog]

    `UNITS` is the registry capacity (at most 64), `QUEUE` the outbound queue capacity in pairs (even, 0 for no queue).
*/
pub struct ExtPack<U, W, const UNITS: usize = 64, const QUEUE: usize = 10> {
    config: Config,
    transmit: IrqMutex<Transmitter<U>>,
    queue: RingBuffer<QUEUE>,
    receive: IrqMutex<Receiver<W>>,
    registry: Registry<UNITS>,
}

impl<U: Uart, W: Watchdog, const UNITS: usize, const QUEUE: usize> ExtPack<U, W, UNITS, QUEUE> {
    pub const fn new(uart: U, watchdog: W, config: Config) -> Self {
        Self {
            config,
            transmit: IrqMutex::new(Transmitter::new(uart)),
            queue: RingBuffer::new(),
            receive: IrqMutex::new(Receiver::new(watchdog)),
            registry: Registry::new(),
        }
    }

    /**
        register the reserved units with their handlers

        reset on unit 0, error on unit 1, acknowledgment on unit 2, each only if enabled in the [Config]
    */
    pub fn init(&self, reset: Option<Handler>, error: Option<Handler>, ack: Option<Handler>) -> Result<(), Error> {
        if self.config.has_reset_unit {
            self.registry.register(RESET_UNIT, UnitType::Reset, reset)?;
        }
        if self.config.has_error_unit {
            self.registry.register(ERROR_UNIT, UnitType::Error, error)?;
        }
        if self.config.has_ack_unit {
            self.registry.register(ACK_UNIT, UnitType::Ack, ack)?;
        }
        info!("extension pack link ready, {} units, {} queued pairs", UNITS, QUEUE);
        Ok(())
    }

    pub fn config(&self) -> &Config {&self.config}
    pub fn registry(&self) -> &Registry<UNITS> {&self.registry}

    pub fn register(&self, unit: UnitId, kind: UnitType, handler: Option<Handler>) -> Result<(), Error> {
        self.registry.register(unit, kind, handler)
    }
    pub fn set_handler(&self, unit: UnitId, handler: Option<Handler>) -> Result<(), Error> {
        self.registry.set_handler(unit, handler)
    }
    /// last data byte received for the unit, 0 beyond capacity
    pub fn input(&self, unit: UnitId) -> u8 {self.registry.input(unit)}
    /// last value sent to the unit, 0 beyond capacity
    pub fn output(&self, unit: UnitId) -> u8 {self.registry.output(unit)}

    /**
        hand a pair to the transmit engine, without blocking

        this is the bare link operation: nothing is recorded and the address is not checked against the registry.
        On error, nothing was sent and the caller may retry later.
    */
    pub fn submit(&self, unit: UnitByte, data: u8) -> Result<(), Error> {
        self.transmit.lock().submit(&self.queue, Pair::new(unit, data))
    }
    /**
        send a pair to a unit within registry capacity, recording it as the unit's output state on success

        see [Registry::record_output] for which unit types and modes keep an output state
    */
    pub fn send(&self, unit: UnitByte, data: u8) -> Result<(), Error> {
        if usize::from(unit.id()) >= UNITS
            {return Err(Error::InvalidUnit(unit.id()))}
        self.submit(unit, data)?;
        self.registry.record_output(unit, data);
        Ok(())
    }
    /// a pair is still partially sent or queued
    pub fn transmitting(&self) -> bool {
        self.transmit.lock().is_busy(&self.queue)
    }
    /// free slots in the outbound queue
    pub fn free_slots(&self) -> usize {self.queue.free_slots()}

    /// current framing state of the receive path
    pub fn receive_state(&self) -> RxState {
        self.receive.lock().state()
    }

    /// to call from the receive complete interrupt, with the byte read and its error flags
    pub fn on_receive(&self, byte: u8, status: RxStatus) {
        let Some(pair) = self.receive.lock().receive(byte, status)
            else {return};
        // storage is done under lock, the handler runs once every lock is released
        if let Some(handler) = self.registry.dispatch(pair) {
            handler.on_data(pair.unit, pair.data);
        }
    }
    /// to call from the transmit data register empty interrupt
    pub fn on_transmit_ready(&self) {
        self.transmit.lock().on_ready(&self.queue);
    }
    /// to call from the watchdog timer overflow interrupt
    pub fn on_watchdog(&self) {
        self.receive.lock().timeout();
    }

    /// direct access to the uart, for instance to service it in a critical section
    pub fn with_uart<R>(&self, f: impl FnOnce(&mut U) -> R) -> R {
        f(self.transmit.lock().uart_mut())
    }
    /// direct access to the watchdog timer
    pub fn with_watchdog<R>(&self, f: impl FnOnce(&W) -> R) -> R {
        f(self.receive.lock().watchdog())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command::AccessMode,
        transmit::tests::MockUart,
        receive::tests::MockWatchdog,
        };
    use core::sync::atomic::{AtomicUsize, Ordering::*};

    type Pack<const QUEUE: usize> = ExtPack<MockUart, MockWatchdog, 64, QUEUE>;

    fn link<const QUEUE: usize>() -> Pack<QUEUE> {
        ExtPack::new(MockUart::default(), MockWatchdog::default(), Config::new())
    }

    #[test]
    fn received_pair_reaches_storage() {
        let pack = link::<10>();
        pack.register(5, UnitType::Gpio, None).unwrap();
        pack.on_receive(5, RxStatus::CLEAN);
        pack.on_receive(0x0a, RxStatus::CLEAN);
        assert_eq!(pack.input(5), 0x0a);
        assert!(pack.registry().event(5));
        assert_eq!(pack.receive_state(), RxState::AwaitUnit);
    }

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    fn count(_unit: UnitByte, _data: u8) {
        CALLS.fetch_add(1, SeqCst);
    }

    #[test]
    fn handler_gets_unit_and_data() {
        static SEEN: IrqMutex<Option<(u8, u8)>> = IrqMutex::new(None);
        fn seen(unit: UnitByte, data: u8) {
            // critical sections nest, the handler may take its own locks
            *SEEN.lock() = Some((unit.into(), data));
            count(unit, data);
        }
        let pack = link::<10>();
        pack.register(7, UnitType::Uart, Some(&seen)).unwrap();
        pack.on_receive(7 | 0x40, RxStatus::CLEAN);
        pack.on_receive(b'x', RxStatus::CLEAN);
        assert_eq!(*SEEN.lock(), Some((0x47, b'x')));
        assert_eq!(pack.input(7), b'x');
        assert!(CALLS.load(SeqCst) >= 1);
    }

    #[test]
    fn init_follows_capabilities() {
        let pack: Pack<10> = ExtPack::new(MockUart::default(), MockWatchdog::default(), Config::new().with_error_unit(false));
        pack.init(None, None, None).unwrap();
        assert_eq!(pack.registry().unit_type(RESET_UNIT), UnitType::Reset);
        assert_eq!(pack.registry().unit_type(ERROR_UNIT), UnitType::Undefined);
        assert_eq!(pack.registry().unit_type(ACK_UNIT), UnitType::Ack);
    }

    #[test]
    fn send_checks_range_and_records() {
        let pack: ExtPack<MockUart, MockWatchdog, 8, 2> = ExtPack::new(MockUart::default(), MockWatchdog::default(), Config::new());
        pack.register(3, UnitType::Gpio, None).unwrap();

        assert_eq!(pack.send(UnitByte::with_mode(9, AccessMode::Mode0), 1), Err(Error::InvalidUnit(9)));
        assert_eq!(pack.free_slots(), 2);

        pack.send(UnitByte::with_mode(3, AccessMode::Mode0), 0xc3).unwrap();
        pack.send(UnitByte::with_mode(3, AccessMode::Mode0), 0x3c).unwrap();
        assert_eq!(pack.output(3), 0x3c);
        // a refused send leaves the recorded output alone
        assert_eq!(pack.send(UnitByte::with_mode(3, AccessMode::Mode0), 0xff), Err(Error::QueueFull));
        assert_eq!(pack.output(3), 0x3c);
        assert!(pack.transmitting());
    }

    #[test]
    fn watchdog_entry_point_resets_receiver() {
        let pack = link::<0>();
        pack.on_receive(5, RxStatus::CLEAN);
        assert!(pack.with_watchdog(|w| w.armed));
        pack.on_watchdog();
        assert_eq!(pack.receive_state(), RxState::AwaitUnit);
        assert!(!pack.with_watchdog(|w| w.armed));
    }

    #[test]
    fn transmit_entry_point_sends_second_byte() {
        let pack = link::<0>();
        pack.submit(UnitByte::with_mode(3, AccessMode::Mode0), 0x41).unwrap();
        assert_eq!(pack.submit(UnitByte::with_mode(3, AccessMode::Mode0), 0x42), Err(Error::Busy));
        pack.with_uart(|uart| uart.shift());
        pack.on_transmit_ready();
        pack.with_uart(|uart| uart.shift());
        assert_eq!(pack.with_uart(|uart| uart.wire.clone()), [3, 0x41]);
        assert!(!pack.transmitting());
    }
}
