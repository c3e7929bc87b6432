/*!
    receive state machine

    bytes arrive one by one from the receive-complete interrupt. A pair is only handed over once both of its bytes
    arrived clean and close enough together, a hardware timer (the watchdog) brings the machine back to a known state
    when the second byte never comes.
*/

use log::*;

use crate::command::{Pair, RxStatus, UnitByte};


/// what the receive state machine needs from the timer used as watchdog
pub trait Watchdog {
    /// reload the timer for one pair duration and enable its overflow interrupt
    fn arm(&mut self);
    /// disable the overflow interrupt
    fn disarm(&mut self);
}

/// framing state of the receive path
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RxState {
    /// next byte is a unit byte
    #[default]
    AwaitUnit,
    /// a clean unit byte arrived, next byte is its data
    AwaitData,
    /// the unit byte was corrupted, next byte is dropped whatever it is
    ResyncDiscard,
}

pub struct Receiver<W> {
    watchdog: W,
    state: RxState,
    /// unit byte waiting for its data
    pending: u8,
}

impl<W: Watchdog> Receiver<W> {
    pub const fn new(watchdog: W) -> Self {
        Self {
            watchdog,
            state: RxState::AwaitUnit,
            pending: 0,
        }
    }

    /// body of the receive-complete interrupt, returns the pair to dispatch if one completed
    pub fn receive(&mut self, byte: u8, status: RxStatus) -> Option<Pair> {
        match self.state {
            RxState::AwaitUnit => {
                self.pending = byte;
                self.state = if status.is_corrupted() {
                    trace!("corrupted unit byte {:#04x}, discarding its data", byte);
                    RxState::ResyncDiscard
                } else {
                    RxState::AwaitData
                };
                self.watchdog.arm();
                None
            },
            RxState::AwaitData => {
                self.state = RxState::AwaitUnit;
                self.watchdog.disarm();
                if status.is_corrupted() {
                    trace!("corrupted data byte for unit {:#04x}, pair dropped", self.pending);
                    return None;
                }
                Some(Pair::new(UnitByte::from(self.pending), byte))
            },
            RxState::ResyncDiscard => {
                self.state = RxState::AwaitUnit;
                self.watchdog.disarm();
                None
            },
        }
    }

    /// body of the watchdog overflow interrupt
    pub fn timeout(&mut self) {
        if self.state != RxState::AwaitUnit {
            trace!("pair incomplete after {:?}, resynchronizing", self.state);
        }
        self.state = RxState::AwaitUnit;
        self.watchdog.disarm();
    }

    pub fn state(&self) -> RxState {self.state}
    pub fn watchdog(&self) -> &W {&self.watchdog}
}
