//! Typed values that can appear as DPF outputs.
//!
//! Every supported type forms a commutative group under [`DpfValue::add`],
//! can be losslessly converted to and from the wire [`Value`] message, and
//! has a fixed little-endian byte encoding used to derive pseudorandom
//! elements from PRG output blocks.

use crate::error::{Error, Result};
use crate::proto::{value, value_type, Block, Value, ValueType};

#[cfg(test)]
macro_rules! check_group_laws {
    ($type:ty, $strat:expr, $mod_name:ident) => {
        mod $mod_name {
            #![allow(unused_imports)]
            use super::*;
            use crate::value::DpfValue;
            use proptest::prelude::*;
            proptest! {
                #[test]
                fn test_associative(a in $strat, b in $strat, c in $strat) {
                    prop_assert_eq!(a.add(b).add(c), a.add(b.add(c)));
                }

                #[test]
                fn test_commutative(a in $strat, b in $strat) {
                    prop_assert_eq!(a.add(b), b.add(a));
                }

                #[test]
                fn test_zero(a in $strat) {
                    prop_assert_eq!(a.add(<$type as DpfValue>::zero()), a);
                }

                #[test]
                fn test_inverse(a in $strat) {
                    prop_assert_eq!(a.add(a.negate()), <$type as DpfValue>::zero());
                }

                #[test]
                fn test_sub_is_add_inverse(a in $strat, b in $strat) {
                    prop_assert_eq!(a.sub(b), a.add(b.negate()));
                }
            }
        }
    };
}

mod int_mod_n;
mod tuple;
mod xor_wrapper;

pub use int_mod_n::IntModN;
pub use xor_wrapper::XorWrapper;

/// A type usable as the output of a DPF.
///
/// `add`, `sub` and `negate` are the operations of the type's group. The wire
/// and byte conversions must be mutually consistent: reading the bytes this
/// type writes yields an equal value.
pub trait DpfValue: Copy + Eq + std::fmt::Debug + Default {
    /// Number of bits needed to represent a value, ignoring alignment.
    fn total_bitsize() -> usize;

    /// Wire-level description of this type.
    fn value_type() -> ValueType;

    /// Domain size (as a log) at and above which comparison-function
    /// evaluation keeps an evaluation context alive across prefix lengths.
    /// The defaults were established with benchmarks; the fallback of -1
    /// means "always keep".
    const EVALUATION_CONTEXT_CUTOFF: i32 = -1;

    fn zero() -> Self {
        Self::default()
    }

    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn negate(self) -> Self;

    fn to_value(self) -> Value;
    fn try_from_value(value: &Value) -> Result<Self>;

    /// Reads a value from exactly [`byte_size`](Self::byte_size) bytes in
    /// little-endian order.
    fn read_le(bytes: &[u8]) -> Self;

    /// Appends the little-endian encoding of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    fn byte_size() -> usize {
        (Self::total_bitsize() + 7) / 8
    }

    /// How many elements of this type are packed into a 128-bit block.
    fn elements_per_block() -> usize {
        if Self::total_bitsize() <= 128 {
            128 / Self::total_bitsize()
        } else {
            1
        }
    }
}

/// Unsigned integer types that can serve as the base of `IntModN` and
/// `XorWrapper`.
pub trait BaseInteger: DpfValue + Into<u128> + Ord {
    /// Truncating conversion.
    fn from_u128(value: u128) -> Self;
}

macro_rules! impl_dpf_value_for_int {
    ($t:ty, $bits:expr, $cutoff:expr) => {
        impl DpfValue for $t {
            fn total_bitsize() -> usize {
                $bits
            }

            fn value_type() -> ValueType {
                integer_type($bits as i32)
            }

            const EVALUATION_CONTEXT_CUTOFF: i32 = $cutoff;

            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }

            fn negate(self) -> Self {
                self.wrapping_neg()
            }

            fn to_value(self) -> Value {
                Value {
                    value: Some(value::Value::Integer(integer_value_from_u128(
                        self as u128,
                    ))),
                }
            }

            fn try_from_value(value: &Value) -> Result<Self> {
                let integer = match &value.value {
                    Some(value::Value::Integer(integer)) => integer,
                    _ => {
                        return Err(Error::invalid_argument(
                            "the given Value is not an integer",
                        ))
                    }
                };
                integer_in_range(integer_value_to_u128(integer)?, $bits).map(|v| v as $t)
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }

        impl BaseInteger for $t {
            fn from_u128(value: u128) -> Self {
                value as $t
            }
        }
    };
}

impl_dpf_value_for_int!(u8, 8, 50);
impl_dpf_value_for_int!(u16, 16, 34);
impl_dpf_value_for_int!(u32, 32, 28);
impl_dpf_value_for_int!(u64, 64, 24);
impl_dpf_value_for_int!(u128, 128, 22);

pub(crate) fn integer_type(bitsize: i32) -> ValueType {
    ValueType {
        r#type: Some(value_type::Type::Integer(value_type::Integer { bitsize })),
    }
}

pub(crate) fn integer_value_from_u128(x: u128) -> value::Integer {
    let inner = if x <= u64::MAX as u128 {
        value::integer::Value::ValueUint64(x as u64)
    } else {
        value::integer::Value::ValueUint128(Block::from(x))
    };
    value::Integer { value: Some(inner) }
}

pub(crate) fn integer_value_to_u128(integer: &value::Integer) -> Result<u128> {
    match &integer.value {
        Some(value::integer::Value::ValueUint64(x)) => Ok(*x as u128),
        Some(value::integer::Value::ValueUint128(block)) => Ok(u128::from(block)),
        None => Err(Error::invalid_argument(
            "unknown value case for the given integer Value",
        )),
    }
}

pub(crate) fn integer_in_range(value: u128, bitsize: usize) -> Result<u128> {
    if bitsize < 128 && value >= 1u128 << bitsize {
        return Err(Error::invalid_argument(format!(
            "value (= {}) too large for an integer with bitsize = {}",
            value, bitsize
        )));
    }
    Ok(value)
}

/// Validates `value_type` and returns the total size in bits of its values.
pub(crate) fn validate_value_type(value_type: &ValueType) -> Result<usize> {
    match &value_type.r#type {
        Some(value_type::Type::Integer(integer)) => validate_integer_bitsize(integer.bitsize),
        Some(value_type::Type::XorWrapper(wrapper)) => validate_integer_bitsize(wrapper.bitsize),
        Some(value_type::Type::Tuple(tuple)) => {
            if tuple.elements.is_empty() {
                return Err(Error::invalid_argument("tuple value types must not be empty"));
            }
            let mut bitsize = 0;
            for element in &tuple.elements {
                bitsize += validate_value_type(element)?;
            }
            Ok(bitsize)
        }
        Some(value_type::Type::IntModN(int_mod_n)) => {
            let base = int_mod_n
                .base_integer
                .as_ref()
                .ok_or_else(|| Error::invalid_argument("IntModN must specify a base integer"))?;
            let bitsize = validate_integer_bitsize(base.bitsize)?;
            let modulus = int_mod_n
                .modulus
                .as_ref()
                .ok_or_else(|| Error::invalid_argument("IntModN must specify a modulus"))?;
            let modulus = integer_value_to_u128(modulus)?;
            if modulus < 2 {
                return Err(Error::invalid_argument("IntModN modulus must be at least 2"));
            }
            if bitsize < 128 && modulus > 1u128 << bitsize {
                return Err(Error::invalid_argument(
                    "IntModN modulus must fit in the base integer",
                ));
            }
            Ok(bitsize)
        }
        None => Err(Error::invalid_argument("unknown value type")),
    }
}

fn validate_integer_bitsize(bitsize: i32) -> Result<usize> {
    if bitsize <= 0 {
        return Err(Error::invalid_argument("bitsize must be positive"));
    }
    if bitsize > 128 {
        return Err(Error::invalid_argument("bitsize must be at most 128"));
    }
    if !(bitsize as u32).is_power_of_two() || bitsize < 8 {
        return Err(Error::invalid_argument(
            "bitsize must be a power of two and at least 8",
        ));
    }
    Ok(bitsize as usize)
}

/// Structural equality on value types, comparing moduli by value rather than
/// by wire representation.
pub(crate) fn value_types_are_equal(lhs: &ValueType, rhs: &ValueType) -> bool {
    match (&lhs.r#type, &rhs.r#type) {
        (Some(value_type::Type::Integer(l)), Some(value_type::Type::Integer(r))) => {
            l.bitsize == r.bitsize
        }
        (Some(value_type::Type::XorWrapper(l)), Some(value_type::Type::XorWrapper(r))) => {
            l.bitsize == r.bitsize
        }
        (Some(value_type::Type::Tuple(l)), Some(value_type::Type::Tuple(r))) => {
            l.elements.len() == r.elements.len()
                && l.elements
                    .iter()
                    .zip(&r.elements)
                    .all(|(l, r)| value_types_are_equal(l, r))
        }
        (Some(value_type::Type::IntModN(l)), Some(value_type::Type::IntModN(r))) => {
            let bases_equal = match (&l.base_integer, &r.base_integer) {
                (Some(l), Some(r)) => l.bitsize == r.bitsize,
                _ => false,
            };
            let moduli_equal = match (&l.modulus, &r.modulus) {
                (Some(l), Some(r)) => {
                    integer_value_to_u128(l).ok() == integer_value_to_u128(r).ok()
                }
                _ => false,
            };
            bases_equal && moduli_equal
        }
        _ => false,
    }
}

/// Checks that `value` is a valid element of `value_type`.
pub(crate) fn validate_value(value: &Value, value_type: &ValueType) -> Result<()> {
    match (&value_type.r#type, &value.value) {
        (Some(value_type::Type::Integer(integer)), Some(value::Value::Integer(v))) => {
            integer_in_range(integer_value_to_u128(v)?, integer.bitsize as usize)?;
        }
        (Some(value_type::Type::XorWrapper(wrapper)), Some(value::Value::XorWrapper(v))) => {
            integer_in_range(integer_value_to_u128(v)?, wrapper.bitsize as usize)?;
        }
        (Some(value_type::Type::Tuple(tuple)), Some(value::Value::Tuple(v))) => {
            if tuple.elements.len() != v.elements.len() {
                return Err(Error::invalid_argument(format!(
                    "expected tuple value of size {} but got size {}",
                    tuple.elements.len(),
                    v.elements.len()
                )));
            }
            for (element, element_type) in v.elements.iter().zip(&tuple.elements) {
                validate_value(element, element_type)?;
            }
        }
        (Some(value_type::Type::IntModN(int_mod_n)), Some(value::Value::IntModN(v))) => {
            let modulus = int_mod_n
                .modulus
                .as_ref()
                .ok_or_else(|| Error::invalid_argument("IntModN must specify a modulus"))?;
            let modulus = integer_value_to_u128(modulus)?;
            if integer_value_to_u128(v)? >= modulus {
                return Err(Error::invalid_argument(format!(
                    "IntModN value must be less than the modulus (= {})",
                    modulus
                )));
            }
        }
        _ => {
            return Err(Error::invalid_argument(
                "value does not match the given value type",
            ))
        }
    }
    Ok(())
}

/// Returns the identity element of `value_type` as a wire value.
pub(crate) fn zero_value(value_type: &ValueType) -> Result<Value> {
    let zero_integer = integer_value_from_u128(0);
    let inner = match &value_type.r#type {
        Some(value_type::Type::Integer(_)) => value::Value::Integer(zero_integer),
        Some(value_type::Type::XorWrapper(_)) => value::Value::XorWrapper(zero_integer),
        Some(value_type::Type::IntModN(_)) => value::Value::IntModN(zero_integer),
        Some(value_type::Type::Tuple(tuple)) => value::Value::Tuple(value::Tuple {
            elements: tuple
                .elements
                .iter()
                .map(zero_value)
                .collect::<Result<Vec<_>>>()?,
        }),
        None => return Err(Error::invalid_argument("unknown value type")),
    };
    Ok(Value { value: Some(inner) })
}

/// Splits the 16 little-endian bytes of `block` into packed elements.
pub(crate) fn block_to_elements<T: DpfValue>(block: u128) -> Vec<T> {
    bytes_to_elements(&block.to_le_bytes())
}

pub(crate) fn bytes_to_elements<T: DpfValue>(bytes: &[u8]) -> Vec<T> {
    let stride = T::byte_size();
    (0..T::elements_per_block())
        .map(|i| T::read_le(&bytes[i * stride..(i + 1) * stride]))
        .collect()
}

pub(crate) fn values_to_elements<T: DpfValue>(values: &[Value]) -> Result<Vec<T>> {
    if values.len() != T::elements_per_block() {
        return Err(Error::invalid_argument(format!(
            "number of values (= {}) does not match the elements per block (= {})",
            values.len(),
            T::elements_per_block()
        )));
    }
    values.iter().map(T::try_from_value).collect()
}

/// Computes the value correction for a block of packed elements of type `T`,
/// given the hashed seeds of both parties. The correction makes the parties'
/// shares at `block_index` sum to `beta` and cancel everywhere else; `invert`
/// is set for the party whose control bit is 1 on the evaluation path.
pub(crate) fn compute_value_correction_for<T: DpfValue>(
    seed_a: &[u8],
    seed_b: &[u8],
    block_index: usize,
    beta: &Value,
    invert: bool,
) -> Result<Vec<Value>> {
    let beta = T::try_from_value(beta)?;
    let elements_a = bytes_to_elements::<T>(seed_a);
    let mut elements_b = bytes_to_elements::<T>(seed_b);
    elements_b[block_index] = elements_b[block_index].add(beta);
    for (b, a) in elements_b.iter_mut().zip(elements_a) {
        *b = b.sub(a);
        if invert {
            *b = b.negate();
        }
    }
    Ok(elements_b.into_iter().map(DpfValue::to_value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    check_group_laws!(u8, any::<u8>(), u8_group_laws);
    check_group_laws!(u64, any::<u64>(), u64_group_laws);
    check_group_laws!(u128, any::<u128>(), u128_group_laws);

    proptest! {
        #[test]
        fn integer_value_round_trips(x: u128) {
            let value = x.to_value();
            prop_assert_eq!(u128::try_from_value(&value).unwrap(), x);
        }

        #[test]
        fn small_integer_values_use_the_uint64_arm(x: u64) {
            let integer = integer_value_from_u128(x as u128);
            prop_assert_eq!(
                integer.value,
                Some(value::integer::Value::ValueUint64(x))
            );
        }

        #[test]
        fn bytes_round_trip(x: u64) {
            let mut bytes = Vec::new();
            x.write_le(&mut bytes);
            prop_assert_eq!(bytes.len(), u64::byte_size());
            prop_assert_eq!(u64::read_le(&bytes), x);
        }

        #[test]
        fn block_unpacking_is_little_endian(block: u128) {
            let elements = block_to_elements::<u32>(block);
            prop_assert_eq!(elements.len(), 4);
            for (i, e) in elements.into_iter().enumerate() {
                prop_assert_eq!(e, (block >> (32 * i)) as u32);
            }
        }
    }

    #[test]
    fn value_too_large_for_type_is_rejected() {
        let value = (1u128 << 32).to_value();
        assert!(matches!(
            u32::try_from_value(&value),
            Err(Error::InvalidArgument(_))
        ));
        assert!(validate_value(&value, &u32::value_type()).is_err());
    }

    #[test]
    fn value_type_mismatch_is_rejected() {
        let value = 42u32.to_value();
        let tuple_type = <(u16, u16)>::value_type();
        assert!(validate_value(&value, &tuple_type).is_err());
    }

    #[test]
    fn value_types_compare_structurally() {
        assert!(value_types_are_equal(&u32::value_type(), &u32::value_type()));
        assert!(!value_types_are_equal(&u32::value_type(), &u64::value_type()));
        assert!(!value_types_are_equal(
            &u32::value_type(),
            &XorWrapper::<u32>::value_type()
        ));
        assert!(value_types_are_equal(
            &<(u32, u64)>::value_type(),
            &<(u32, u64)>::value_type()
        ));
    }

    #[test]
    fn invalid_bitsizes_are_rejected() {
        for bitsize in [0, 4, 12, 129, -8] {
            assert!(validate_value_type(&integer_type(bitsize)).is_err());
        }
        for bitsize in [8, 16, 32, 64, 128] {
            assert_eq!(
                validate_value_type(&integer_type(bitsize)).unwrap(),
                bitsize as usize
            );
        }
    }

    #[test]
    fn zero_value_matches_type() {
        let tuple_type = <(u32, u64)>::value_type();
        let zero = zero_value(&tuple_type).unwrap();
        assert_eq!(<(u32, u64)>::try_from_value(&zero).unwrap(), (0, 0));
    }

    #[test]
    fn value_correction_places_beta_at_block_index() {
        let seed_a = [0u8; 16];
        let seed_b = [0u8; 16];
        let beta = 42u32.to_value();
        let correction =
            compute_value_correction_for::<u32>(&seed_a, &seed_b, 2, &beta, false).unwrap();
        let elements = values_to_elements::<u32>(&correction).unwrap();
        assert_eq!(elements, vec![0, 0, 42, 0]);

        let inverted =
            compute_value_correction_for::<u32>(&seed_a, &seed_b, 2, &beta, true).unwrap();
        let elements = values_to_elements::<u32>(&inverted).unwrap();
        assert_eq!(elements, vec![0, 0, 42u32.wrapping_neg(), 0]);
    }
}
