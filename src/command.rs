use bilge::prelude::*;
use packbytes::{FromBytes, ToBytes};

use crate::pack_bilge;


/// integer identifying a unit, only its lower 6 bits address the unit
pub type UnitId = u8;

/// highest number of units that can be addressed on the wire
pub const MAX_UNITS: usize = 64;

/// first byte of a pair: which unit is addressed and how
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq, Default)]
pub struct UnitByte {
    /// unit number, 0 to 63
    pub address: u6,
    /// sub-function of the unit, meaning depends on the unit type
    pub mode: AccessMode,
}
pack_bilge!(UnitByte);

/** access mode bits of a unit byte

    their meaning is unit-type dependent, for instance
    - gpio: `Mode0` sets outputs, `Mode1` requests an input refresh
    - timer: `Mode0` enable, `Mode1` restart, `Mode2` prescaler, `Mode3` start value
*/
#[bitsize(2)]
#[derive(Copy, Clone, FromBits, Debug, PartialEq, Default)]
pub enum AccessMode {
    #[default]
    Mode0 = 0,
    Mode1 = 1,
    Mode2 = 2,
    Mode3 = 3,
}

impl UnitByte {
    /// unit byte addressing `unit` (masked to its address bits) in the given access mode
    pub fn with_mode(unit: UnitId, mode: AccessMode) -> Self {
        Self::new(u6::new(unit & 0x3f), mode)
    }
    /// unit number as a plain integer
    pub fn id(self) -> UnitId {
        self.address().value()
    }
}

/// the message atom of the wire: a unit byte followed by a data byte
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq, Default)]
pub struct Pair {
    pub unit: UnitByte,
    pub data: u8,
}
impl Pair {
    pub fn new(unit: UnitByte, data: u8) -> Self {
        Self {unit, data}
    }
}
/// packed form `(unit << 8) | data`, as queued for transmission
impl From<Pair> for u16 {
    fn from(pair: Pair) -> Self {
        u16::from_be_bytes(pair.to_be_bytes())
    }
}
impl From<u16> for Pair {
    fn from(packed: u16) -> Self {
        Pair::from_be_bytes(packed.to_be_bytes())
    }
}

/// hardware reception flags accompanying each received byte
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct RxStatus {
    /// stop bit was not where expected
    pub frame_error: bool,
    /// parity bit mismatch
    pub parity_error: bool,
}
impl RxStatus {
    /// byte received without any error
    pub const CLEAN: Self = Self {frame_error: false, parity_error: false};
    /// byte received with a broken stop bit
    pub const FRAME_ERROR: Self = Self {frame_error: true, parity_error: false};

    /// the received byte cannot be trusted
    pub fn is_corrupted(self) -> bool {
        self.frame_error || self.parity_error
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_byte_layout() {
        let unit = UnitByte::with_mode(5, AccessMode::Mode2);
        assert_eq!(u8::from(unit), 0b1000_0101);
        assert_eq!(unit.id(), 5);

        let parsed = UnitByte::from(0b0111_1111u8);
        assert_eq!(parsed.id(), 63);
        assert_eq!(parsed.mode(), AccessMode::Mode1);
    }

    #[test]
    fn with_mode_masks_address() {
        let unit = UnitByte::with_mode(0xc3, AccessMode::Mode0);
        assert_eq!(u8::from(unit), 0x03);
    }

    #[test]
    fn pair_wire_order() {
        let pair = Pair::new(UnitByte::with_mode(3, AccessMode::Mode1), 0x41);
        assert_eq!(pair.to_be_bytes(), [0x43, 0x41]);
        assert_eq!(u16::from(pair), 0x4341);
        assert_eq!(Pair::from(0x4341u16), pair);
    }
}
