//! Integers modulo a fixed (usually prime) modulus.

use crate::error::{Error, Result};
use crate::proto::{value, value_type, Value, ValueType};
use crate::value::{
    integer_value_from_u128, integer_value_to_u128, BaseInteger, DpfValue,
};

/// An element of the ring of integers modulo `M`, stored in a base integer
/// `B` that the modulus must fit into.
///
/// The modulus is part of the type, so elements of different rings cannot be
/// mixed up at runtime.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
pub struct IntModN<B, const M: u128>(B);

impl<B: BaseInteger, const M: u128> IntModN<B, M> {
    /// Creates an element, reducing `value` modulo `M`.
    pub fn new(value: B) -> Self {
        IntModN(B::from_u128(value.into() % M))
    }

    pub fn value(self) -> B {
        self.0
    }

    pub fn modulus() -> u128 {
        M
    }

    /// Number of (pseudo)random bytes needed to extract `num_samples`
    /// elements whose joint distribution is within total variation distance
    /// `2^-security_parameter` of uniform.
    ///
    /// Returns `InvalidArgument` if that security level is unachievable with
    /// this sampling scheme.
    pub fn num_bytes_required(num_samples: usize, security_parameter: f64) -> Result<usize> {
        if num_samples == 0 {
            return Err(Error::invalid_argument(
                "the number of samples required must be > 0",
            ));
        }
        // The first sample consumes a full 128-bit block; every further
        // sample shifts in sizeof(B) fresh bytes, losing log2(M) bits of
        // entropy per extraction.
        let sigma = 131.0
            - (M as f64).log2()
            - (num_samples as f64).log2()
            - ((num_samples + 1) as f64).log2();
        if security_parameter > sigma {
            return Err(Error::invalid_argument(format!(
                "for num_samples = {} and modulus = {} this approach can only provide {} \
                 bits of statistical security; try calling this function several times \
                 with smaller values of num_samples",
                num_samples, M, sigma
            )));
        }
        Ok(16 + B::byte_size() * (num_samples - 1))
    }

    /// Extracts `num_samples` elements from `bytes`.
    ///
    /// The first 16 bytes seed a 128-bit accumulator `r`; each sample is
    /// `r mod M`, after which `r` is divided by `M` and refilled with the
    /// next `sizeof(B)` bytes. Fails if `bytes` is too short for the
    /// requested statistical security.
    pub fn sample_from_bytes(
        bytes: &[u8],
        security_parameter: f64,
        num_samples: usize,
    ) -> Result<Vec<Self>> {
        let required = Self::num_bytes_required(num_samples, security_parameter)?;
        if bytes.len() < required {
            return Err(Error::invalid_argument(format!(
                "the number of bytes provided (= {}) is insufficient for the required \
                 statistical security and number of samples (= {})",
                bytes.len(),
                required
            )));
        }
        let mut block = [0u8; 16];
        block.copy_from_slice(&bytes[..16]);
        let mut r = u128::from_le_bytes(block);
        let stride = B::byte_size();
        let mut samples = Vec::with_capacity(num_samples);
        for i in 0..num_samples {
            samples.push(IntModN(B::from_u128(r % M)));
            if i < num_samples - 1 {
                let next = B::read_le(&bytes[16 + i * stride..16 + (i + 1) * stride]);
                // A 128-bit base integer replaces the accumulator entirely.
                r = if 8 * stride < 128 {
                    ((r / M) << (8 * stride)) | next.into()
                } else {
                    next.into()
                };
            }
        }
        Ok(samples)
    }
}

impl<B: BaseInteger, const M: u128> DpfValue for IntModN<B, M> {
    fn total_bitsize() -> usize {
        B::total_bitsize()
    }

    fn value_type() -> ValueType {
        ValueType {
            r#type: Some(value_type::Type::IntModN(value_type::IntModN {
                base_integer: Some(value_type::Integer {
                    bitsize: B::total_bitsize() as i32,
                }),
                modulus: Some(integer_value_from_u128(M)),
            })),
        }
    }

    fn add(self, rhs: Self) -> Self {
        let a: u128 = self.0.into();
        let b: u128 = rhs.0.into();
        // a + b < 2M, so one conditional subtraction suffices. The wrapping
        // add handles moduli above 2^127.
        let mut sum = a.wrapping_add(b);
        if sum < a || sum >= M {
            sum = sum.wrapping_sub(M);
        }
        IntModN(B::from_u128(sum))
    }

    fn sub(self, rhs: Self) -> Self {
        let a: u128 = self.0.into();
        let b: u128 = rhs.0.into();
        let difference = if a >= b { a - b } else { M - b + a };
        IntModN(B::from_u128(difference))
    }

    fn negate(self) -> Self {
        let a: u128 = self.0.into();
        let negated = if a == 0 { 0 } else { M - a };
        IntModN(B::from_u128(negated))
    }

    fn to_value(self) -> Value {
        Value {
            value: Some(value::Value::IntModN(integer_value_from_u128(
                self.0.into(),
            ))),
        }
    }

    fn try_from_value(value: &Value) -> Result<Self> {
        let integer = match &value.value {
            Some(value::Value::IntModN(integer)) => integer,
            _ => {
                return Err(Error::invalid_argument(
                    "the given Value is not an IntModN",
                ))
            }
        };
        let raw = integer_value_to_u128(integer)?;
        if raw >= M {
            return Err(Error::invalid_argument(format!(
                "IntModN value must be less than the modulus (= {})",
                M
            )));
        }
        Ok(IntModN(B::from_u128(raw)))
    }

    fn read_le(bytes: &[u8]) -> Self {
        Self::new(B::read_le(bytes))
    }

    fn write_le(self, out: &mut Vec<u8>) {
        self.0.write_le(out);
    }
}
