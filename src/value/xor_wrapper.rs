//! Integers under XOR.

use std::ops::BitXor;

use crate::error::{Error, Result};
use crate::proto::{value, value_type, Value, ValueType};
use crate::value::{
    integer_in_range, integer_value_from_u128, integer_value_to_u128, BaseInteger, DpfValue,
};

/// An unsigned integer whose group operation is XOR. Negation is the
/// identity, so shares of 0 are equal rather than opposite.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
pub struct XorWrapper<T>(pub T);

impl<T> XorWrapper<T> {
    pub fn new(value: T) -> Self {
        XorWrapper(value)
    }

    pub fn value(self) -> T {
        self.0
    }
}

impl<T: BaseInteger + BitXor<Output = T>> DpfValue for XorWrapper<T> {
    fn total_bitsize() -> usize {
        T::total_bitsize()
    }

    fn value_type() -> ValueType {
        ValueType {
            r#type: Some(value_type::Type::XorWrapper(value_type::XorWrapper {
                bitsize: T::total_bitsize() as i32,
            })),
        }
    }

    const EVALUATION_CONTEXT_CUTOFF: i32 = T::EVALUATION_CONTEXT_CUTOFF;

    fn add(self, rhs: Self) -> Self {
        XorWrapper(self.0 ^ rhs.0)
    }

    fn sub(self, rhs: Self) -> Self {
        XorWrapper(self.0 ^ rhs.0)
    }

    fn negate(self) -> Self {
        self
    }

    fn to_value(self) -> Value {
        Value {
            value: Some(value::Value::XorWrapper(integer_value_from_u128(
                self.0.into(),
            ))),
        }
    }

    fn try_from_value(value: &Value) -> Result<Self> {
        let integer = match &value.value {
            Some(value::Value::XorWrapper(integer)) => integer,
            _ => {
                return Err(Error::invalid_argument(
                    "the given Value is not a XOR wrapper",
                ))
            }
        };
        let raw = integer_in_range(integer_value_to_u128(integer)?, T::total_bitsize())?;
        Ok(XorWrapper(T::from_u128(raw)))
    }

    fn read_le(bytes: &[u8]) -> Self {
        XorWrapper(T::read_le(bytes))
    }

    fn write_le(self, out: &mut Vec<u8>) {
        self.0.write_le(out);
    }
}
