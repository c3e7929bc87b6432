/// implement [packbytes] traits for a [bilge] bitfield struct, so it can be embedded in packed wire types
#[macro_export]
macro_rules! pack_bilge {
    ($t:ty) => {

        impl packbytes::ToBytes for $t {
            type Bytes = [u8; core::mem::size_of::<$t>()];

            fn to_le_bytes(self) -> Self::Bytes {
                self.value.value().to_le_bytes()
            }
            fn to_be_bytes(self) -> Self::Bytes {
                self.value.value().to_be_bytes()
            }
        }
        impl packbytes::FromBytes for $t {
            type Bytes = [u8; core::mem::size_of::<$t>()];

            fn from_le_bytes(bytes: Self::Bytes) -> Self {
                <$t>::from(<$t as bilge::Bitsized>::ArbitraryInt::from_le_bytes(bytes))
            }
            fn from_be_bytes(bytes: Self::Bytes) -> Self {
                <$t>::from(<$t as bilge::Bitsized>::ArbitraryInt::from_be_bytes(bytes))
            }
        }
    };
}

/// number of whole `unit` needed to cover `value`
pub(crate) const fn div_ceil(value: u64, unit: u64) -> u64 {
    (value + unit - 1) / unit
}

/// bit mask selecting one unit in a 64 bit word, `None` for units that do not fit
pub(crate) const fn unit_bit(unit: u8) -> Option<u64> {
    1u64.checked_shl(unit as u32)
}
