/*!
    unit registry and event store

    one descriptor and one pair of stored bytes per unit, plus a 64 bit event word flagging units with unconsumed received data.
    Everything here is written by the receive interrupt and read by the foreground, always under critical section.
*/

use bilge::prelude::*;
use log::*;

use crate::{
    Error,
    command::{AccessMode, MAX_UNITS, Pair, UnitByte, UnitId},
    mutex::IrqMutex,
    utils::unit_bit,
    };


/// unit receiving reset requests and reset notices
pub const RESET_UNIT: UnitId = 0;
/// unit through which the extension pack reports errors
pub const ERROR_UNIT: UnitId = 1;
/// unit carrying acknowledgments
pub const ACK_UNIT: UnitId = 2;

/// data byte sent to or received from the reset unit to signal a reset
pub const RESET_REQUEST: u8 = 0xff;

/// kind of peripheral behind a unit
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum UnitType {
    /// not registered, everything received for it is ignored
    #[default]
    Undefined = 0,
    Reset = 1,
    Error = 2,
    Ack = 3,
    Gpio = 4,
    Uart = 5,
    Timer = 6,
    Spi = 7,
    I2c = 8,
    Sram = 9,
}

/**
    receiver of the data addressed to one unit

    called from the receive interrupt once the pair is stored, so it must be short.
    Any `Fn(UnitByte, u8) + Sync` is a handler, including plain functions.
*/
pub trait UnitHandler: Sync {
    fn on_data(&self, unit: UnitByte, data: u8);
}
impl<F: Fn(UnitByte, u8) + Sync> UnitHandler for F {
    fn on_data(&self, unit: UnitByte, data: u8) {
        self(unit, data)
    }
}
/// handlers are supplied by the application and live as long as the program
pub type Handler = &'static dyn UnitHandler;

/// layout of the output byte stored for the acknowledgment unit
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct AckState {
    /// the extension pack was asked to acknowledge commands
    pub enabled: bool,
    _reserved: u6,
    /// an acknowledgment arrived and was not consumed yet
    pub received: bool,
}

/// layout of the data byte sent by the error unit
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct ErrorFlags {
    /// the extension pack failed receiving from this host
    pub receiving: bool,
    /// the extension pack failed sending to this host
    pub sending: bool,
    /// the extension pack failed processing a command
    pub processing: bool,
    _reserved: u5,
}

#[derive(Copy, Clone)]
struct UnitSlot {
    kind: UnitType,
    handler: Option<Handler>,
    /// last data byte received for this unit
    input: u8,
    /// last value sent to this unit, layout depends on the unit type
    output: u8,
}
impl UnitSlot {
    const EMPTY: Self = Self {
        kind: UnitType::Undefined,
        handler: None,
        input: 0,
        output: 0,
    };
}

pub struct Registry<const UNITS: usize> {
    table: IrqMutex<Table<UNITS>>,
}
/// unit slots and event word share one lock, so the ack bookkeeping spread over both never tears
struct Table<const UNITS: usize> {
    slots: [UnitSlot; UNITS],
    events: u64,
}
impl<const UNITS: usize> Table<UNITS> {
    /// event bit of a unit within capacity
    fn bit(unit: UnitId) -> Option<u64> {
        if usize::from(unit) < UNITS  {unit_bit(unit)}
        else {None}
    }
    fn take_event(&mut self, unit: UnitId) -> bool {
        let Some(bit) = Self::bit(unit)
            else {return false};
        let set = self.events & bit != 0;
        self.events &= !bit;
        self.clear_ack_received(unit);
        set
    }
    fn clear_ack_received(&mut self, unit: UnitId) {
        if let Some(slot) = self.slots.get_mut(usize::from(unit)) {
            if slot.kind == UnitType::Ack {
                let mut state = AckState::from(slot.output);
                state.set_received(false);
                slot.output = state.into();
            }
        }
    }
}

impl<const UNITS: usize> Registry<UNITS> {
    const CAPACITY: () = assert!(UNITS > 0 && UNITS <= MAX_UNITS, "between 1 and 64 units can be addressed");

    pub const fn new() -> Self {
        let () = Self::CAPACITY;
        Self {
            table: IrqMutex::new(Table {
                slots: [UnitSlot::EMPTY; UNITS],
                events: 0,
                }),
        }
    }

    fn check(unit: UnitId) -> Result<usize, Error> {
        let index = usize::from(unit);
        if index < UNITS  {Ok(index)}
        else {Err(Error::InvalidUnit(unit))}
    }

    /// declare a unit, replacing whatever was registered before
    pub fn register(&self, unit: UnitId, kind: UnitType, handler: Option<Handler>) -> Result<(), Error> {
        let index = Self::check(unit)?;
        {
            let mut table = self.table.lock();
            table.slots[index].kind = kind;
            table.slots[index].handler = handler;
        }
        debug!("registered unit {} as {:?}", unit, kind);
        Ok(())
    }
    /// swap the handler of a unit, `None` to stop being notified
    pub fn set_handler(&self, unit: UnitId, handler: Option<Handler>) -> Result<(), Error> {
        let index = Self::check(unit)?;
        self.table.lock().slots[index].handler = handler;
        debug!("unit {} handler {}", unit, if handler.is_some() {"set"} else {"removed"});
        Ok(())
    }
    /// type of a unit, [UnitType::Undefined] beyond capacity
    pub fn unit_type(&self, unit: UnitId) -> UnitType {
        self.table.lock().slots
            .get(usize::from(unit))
            .map_or(UnitType::Undefined, |slot| slot.kind)
    }
    /// last data byte received for the unit, 0 beyond capacity
    pub fn input(&self, unit: UnitId) -> u8 {
        self.table.lock().slots
            .get(usize::from(unit))
            .map_or(0, |slot| slot.input)
    }
    /// last value sent to the unit, 0 beyond capacity
    pub fn output(&self, unit: UnitId) -> u8 {
        self.table.lock().slots
            .get(usize::from(unit))
            .map_or(0, |slot| slot.output)
    }

    /// remember what was just sent, for the unit types and modes that have a meaningful output state
    pub(crate) fn record_output(&self, unit: UnitByte, data: u8) {
        let mut table = self.table.lock();
        let Some(slot) = table.slots.get_mut(usize::from(unit.id()))
            else {return};
        match (slot.kind, unit.mode()) {
            (UnitType::Gpio, AccessMode::Mode0)
            | (UnitType::Uart, AccessMode::Mode0)
            | (UnitType::Spi, AccessMode::Mode1)
            | (UnitType::I2c, AccessMode::Mode1)
                => slot.output = data,
            (UnitType::Ack, _) => {
                let mut state = AckState::from(slot.output);
                state.set_enabled(data != 0);
                slot.output = state.into();
            },
            _ => {},
        }
    }

    /**
        store a received pair and flag its unit

        returns the handler to call, if any. Units beyond capacity or not registered are left untouched.
    */
    pub(crate) fn dispatch(&self, pair: Pair) -> Option<Handler> {
        let unit = pair.unit.id();
        let mut table = self.table.lock();
        let bit = Table::<UNITS>::bit(unit)?;
        let slot = table.slots.get_mut(usize::from(unit))?;
        match slot.kind {
            UnitType::Undefined => {
                trace!("dropped {:#04x} for unregistered unit {}", pair.data, unit);
                return None;
            },
            UnitType::Ack => {
                let mut state = AckState::from(slot.output);
                state.set_received(true);
                slot.output = state.into();
            },
            _ => {},
        }
        slot.input = pair.data;
        let handler = slot.handler;
        table.events |= bit;
        handler
    }

    /// flag a unit, no effect beyond capacity
    pub fn set_event(&self, unit: UnitId) {
        if let Some(bit) = Table::<UNITS>::bit(unit) {
            self.table.lock().events |= bit;
        }
    }
    /// the unit received data not consumed yet
    pub fn event(&self, unit: UnitId) -> bool {
        Table::<UNITS>::bit(unit)
            .is_some_and(|bit| self.table.lock().events & bit != 0)
    }
    pub fn clear_event(&self, unit: UnitId) {
        self.table.lock().take_event(unit);
    }
    /// read and clear the event of a unit in one go
    pub fn take_event(&self, unit: UnitId) -> bool {
        self.table.lock().take_event(unit)
    }
    pub fn clear_events(&self) {
        let mut table = self.table.lock();
        table.events = 0;
        table.clear_ack_received(ACK_UNIT);
    }
    /// raw event word, bit `i` set when unit `i` has unconsumed data
    pub fn events(&self) -> u64 {
        self.table.lock().events
    }
    /// units with a pending event, their events are cleared
    pub fn drain_events(&self) -> heapless::Vec<UnitId, MAX_UNITS> {
        let word = {
            let mut table = self.table.lock();
            if table.events & unit_bit(ACK_UNIT).unwrap_or(0) != 0 {
                table.clear_ack_received(ACK_UNIT);
            }
            core::mem::take(&mut table.events)
        };
        let mut units = heapless::Vec::new();
        for unit in 0 .. UNITS as UnitId {
            if unit_bit(unit).is_some_and(|bit| word & bit != 0) {
                // cannot overflow, one entry per bit
                units.push(unit).ok();
            }
        }
        units
    }
}
impl<const UNITS: usize> Default for Registry<UNITS> {
    fn default() -> Self {Self::new()}
}


#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU16, Ordering::*};

    fn pair(unit: u8, mode: AccessMode, data: u8) -> Pair {
        Pair::new(UnitByte::with_mode(unit, mode), data)
    }

    static LAST: AtomicU16 = AtomicU16::new(0);
    fn remember(unit: UnitByte, data: u8) {
        LAST.store(u16::from(Pair::new(unit, data)), SeqCst);
    }

    #[test]
    fn gpio_input_is_stored_and_flagged() {
        let registry = Registry::<64>::new();
        registry.register(5, UnitType::Gpio, None).unwrap();
        assert!(registry.dispatch(pair(5, AccessMode::Mode0, 0x0a)).is_none());
        assert_eq!(registry.input(5), 0x0a);
        assert!(registry.event(5));
        assert_eq!(registry.events(), 1 << 5);
    }

    #[test]
    fn unregistered_unit_is_silent() {
        let registry = Registry::<8>::new();
        registry.set_handler(4, Some(&remember)).unwrap();
        assert!(registry.dispatch(pair(4, AccessMode::Mode0, 0x33)).is_none());
        assert_eq!(registry.input(4), 0);
        assert_eq!(registry.events(), 0);
        // beyond capacity
        assert!(registry.dispatch(pair(40, AccessMode::Mode0, 0x33)).is_none());
        assert_eq!(registry.register(8, UnitType::Gpio, None), Err(Error::InvalidUnit(8)));
    }

    #[test]
    fn handler_is_returned_with_mode() {
        let registry = Registry::<8>::new();
        registry.register(6, UnitType::Timer, Some(&remember)).unwrap();
        let received = pair(6, AccessMode::Mode3, 0x7f);
        let handler = registry.dispatch(received).unwrap();
        handler.on_data(received.unit, received.data);
        assert_eq!(LAST.load(SeqCst), 0xc67f);
    }

    #[test]
    fn ack_sets_received_bit() {
        let registry = Registry::<8>::new();
        registry.register(ACK_UNIT, UnitType::Ack, None).unwrap();
        registry.record_output(UnitByte::with_mode(ACK_UNIT, AccessMode::Mode0), 1);
        registry.dispatch(pair(ACK_UNIT, AccessMode::Mode0, 0x42));

        let state = AckState::from(registry.output(ACK_UNIT));
        assert!(state.enabled());
        assert!(state.received());
        assert_eq!(registry.input(ACK_UNIT), 0x42);

        assert!(registry.take_event(ACK_UNIT));
        assert!(!registry.take_event(ACK_UNIT));
        assert_eq!(registry.output(ACK_UNIT), 0b0000_0001);
    }

    #[test]
    fn output_follows_type_and_mode() {
        let registry = Registry::<16>::new();
        registry.register(3, UnitType::Gpio, None).unwrap();
        registry.register(4, UnitType::Spi, None).unwrap();
        registry.register(5, UnitType::Timer, None).unwrap();

        registry.record_output(UnitByte::with_mode(3, AccessMode::Mode0), 0xf0);
        registry.record_output(UnitByte::with_mode(3, AccessMode::Mode1), 0x00);
        registry.record_output(UnitByte::with_mode(4, AccessMode::Mode1), 2);
        registry.record_output(UnitByte::with_mode(4, AccessMode::Mode0), 0x55);
        registry.record_output(UnitByte::with_mode(5, AccessMode::Mode2), 8);

        assert_eq!(registry.output(3), 0xf0);
        assert_eq!(registry.output(4), 2);
        assert_eq!(registry.output(5), 0);
    }

    #[test]
    fn events_clear_idempotently() {
        let registry = Registry::<64>::new();
        registry.clear_event(9);
        assert!(!registry.event(9));
        registry.set_event(9);
        registry.set_event(63);
        registry.clear_event(9);
        registry.clear_event(9);
        assert!(!registry.event(9));
        assert!(registry.event(63));
        registry.clear_events();
        assert_eq!(registry.events(), 0);
    }

    #[test]
    fn drain_lists_and_clears() {
        let registry = Registry::<64>::new();
        for unit in [0, 7, 63] {
            registry.set_event(unit);
        }
        assert_eq!(registry.drain_events().as_slice(), &[0, 7, 63]);
        assert!(registry.drain_events().is_empty());
    }

    #[test]
    fn units_beyond_capacity_do_not_alias() {
        let registry = Registry::<64>::new();
        registry.set_event(0);
        assert!(!registry.event(64));
        assert!(!registry.take_event(64));
        registry.clear_event(64 + 2);
        registry.set_event(64);
        registry.set_event(0xff);
        assert_eq!(registry.events(), 1);
        assert!(registry.event(0));

        let small = Registry::<8>::new();
        small.set_event(8);
        assert_eq!(small.events(), 0);
        assert!(!small.event(8));
        assert_eq!(small.input(8), 0);
        assert_eq!(small.output(200), 0);
    }

    #[test]
    fn ack_event_and_received_bit_agree() {
        let registry = Registry::<8>::new();
        registry.register(ACK_UNIT, UnitType::Ack, None).unwrap();
        let received = || AckState::from(registry.output(ACK_UNIT)).received();

        registry.dispatch(pair(ACK_UNIT, AccessMode::Mode0, 1));
        assert!(registry.take_event(ACK_UNIT));
        // a new acknowledgment right after consumption is flagged in both places
        registry.dispatch(pair(ACK_UNIT, AccessMode::Mode0, 2));
        assert!(registry.event(ACK_UNIT));
        assert!(received());

        assert_eq!(registry.drain_events().as_slice(), &[ACK_UNIT]);
        assert!(!received());
        registry.dispatch(pair(ACK_UNIT, AccessMode::Mode0, 3));
        registry.clear_events();
        assert!(!received());
        assert!(!registry.event(ACK_UNIT));
    }

    #[test]
    fn error_flags_layout() {
        let flags = ErrorFlags::from(0b0000_0101u8);
        assert!(flags.receiving());
        assert!(!flags.sending());
        assert!(flags.processing());
    }
}
