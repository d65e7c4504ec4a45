//! Tuples of value types, sharing element-wise.
//!
//! Native Rust tuples of up to five [`DpfValue`] elements are supported
//! directly. Elements are laid out back to back in little-endian order, each
//! occupying its own byte size, so a `(u8, u16)` tuple takes 3 bytes and five
//! of them pack into one 128-bit block.

use crate::error::{Error, Result};
use crate::proto::{value, value_type, Value, ValueType};
use crate::value::DpfValue;

macro_rules! impl_dpf_value_for_tuple {
    ($(($($t:ident . $idx:tt),+)),+ $(,)?) => {$(
        impl<$($t: DpfValue),+> DpfValue for ($($t,)+) {
            fn total_bitsize() -> usize {
                0 $(+ $t::total_bitsize())+
            }

            fn value_type() -> ValueType {
                ValueType {
                    r#type: Some(value_type::Type::Tuple(value_type::Tuple {
                        elements: vec![$($t::value_type()),+],
                    })),
                }
            }

            fn add(self, rhs: Self) -> Self {
                ($(self.$idx.add(rhs.$idx),)+)
            }

            fn sub(self, rhs: Self) -> Self {
                ($(self.$idx.sub(rhs.$idx),)+)
            }

            fn negate(self) -> Self {
                ($(self.$idx.negate(),)+)
            }

            fn to_value(self) -> Value {
                Value {
                    value: Some(value::Value::Tuple(value::Tuple {
                        elements: vec![$(self.$idx.to_value()),+],
                    })),
                }
            }

            fn try_from_value(value: &Value) -> Result<Self> {
                let elements = match &value.value {
                    Some(value::Value::Tuple(tuple)) => &tuple.elements,
                    _ => {
                        return Err(Error::invalid_argument(
                            "the given Value is not a tuple",
                        ))
                    }
                };
                let expected = [$(stringify!($t)),+].len();
                if elements.len() != expected {
                    return Err(Error::invalid_argument(format!(
                        "the tuple in the given Value has {} elements, expected {}",
                        elements.len(),
                        expected
                    )));
                }
                let mut elements = elements.iter();
                Ok(($(
                    {
                        let element = elements.next().ok_or_else(|| {
                            Error::internal("tuple element count changed during conversion")
                        })?;
                        $t::try_from_value(element)?
                    },
                )+))
            }

            #[allow(unused_assignments)]
            fn read_le(bytes: &[u8]) -> Self {
                let mut offset = 0;
                ($(
                    {
                        let size = $t::byte_size();
                        let element = $t::read_le(&bytes[offset..offset + size]);
                        offset += size;
                        element
                    },
                )+)
            }

            fn write_le(self, out: &mut Vec<u8>) {
                $(self.$idx.write_le(out);)+
            }
        }
    )+};
}

impl_dpf_value_for_tuple!(
    (A.0),
    (A.0, B.1),
    (A.0, B.1, C.2),
    (A.0, B.1, C.2, D.3),
    (A.0, B.1, C.2, D.3, E.4),
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{block_to_elements, bytes_to_elements};
    use proptest::prelude::*;

    check_group_laws!(
        (u32, u64),
        any::<(u32, u64)>(),
        tuple_u32_u64_group_laws
    );
    check_group_laws!(
        (u8, u16, u32),
        any::<(u8, u16, u32)>(),
        tuple_u8_u16_u32_group_laws
    );

    #[test]
    fn bitsize_sums_elements() {
        assert_eq!(<(u8, u16)>::total_bitsize(), 24);
        assert_eq!(<(u8, u16)>::byte_size(), 3);
        assert_eq!(<(u8, u16)>::elements_per_block(), 5);
        assert_eq!(<(u32, u64)>::total_bitsize(), 96);
        assert_eq!(<(u32, u64)>::elements_per_block(), 1);
    }

    proptest! {
        #[test]
        fn value_round_trips(x: (u8, u16, u32)) {
            let value = x.to_value();
            prop_assert_eq!(<(u8, u16, u32)>::try_from_value(&value).unwrap(), x);
        }

        #[test]
        fn bytes_round_trip(x: (u8, u16, u32, u64)) {
            let mut bytes = Vec::new();
            x.write_le(&mut bytes);
            prop_assert_eq!(bytes.len(), <(u8, u16, u32, u64)>::byte_size());
            prop_assert_eq!(<(u8, u16, u32, u64)>::read_le(&bytes), x);
        }

        #[test]
        fn elements_are_packed_back_to_back(block: u128) {
            let elements = block_to_elements::<(u8, u16)>(block);
            let bytes = block.to_le_bytes();
            prop_assert_eq!(elements.len(), 5);
            for (i, (a, b)) in elements.into_iter().enumerate() {
                prop_assert_eq!(a, bytes[3 * i]);
                prop_assert_eq!(b, u16::from_le_bytes([bytes[3 * i + 1], bytes[3 * i + 2]]));
            }
        }
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let value = (1u32, 2u32, 3u32).to_value();
        assert!(<(u32, u32)>::try_from_value(&value).is_err());
    }

    #[test]
    fn partial_final_block_layout_reads_first_elements() {
        // 15 of 16 bytes hold (u8, u16) elements; the last byte is unused.
        let bytes: Vec<u8> = (1..=16).collect();
        let elements = bytes_to_elements::<(u8, u16)>(&bytes);
        assert_eq!(elements[0], (1, u16::from_le_bytes([2, 3])));
        assert_eq!(elements[4], (13, u16::from_le_bytes([14, 15])));
    }
}
