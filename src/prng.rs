//! Secure randomness for protocols built on the FSS primitives.

use openssl::rand::rand_bytes;

use crate::error::Result;

/// A cryptographically secure source of fixed-width random integers.
pub trait SecurePrng {
    fn rand8(&mut self) -> Result<u8>;
    fn rand64(&mut self) -> Result<u64>;
    fn rand128(&mut self) -> Result<u128>;
}

/// Unseeded randomness straight from OpenSSL's `RAND_bytes`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicRng;

impl BasicRng {
    pub fn new() -> Self {
        BasicRng
    }
}

impl SecurePrng for BasicRng {
    fn rand8(&mut self) -> Result<u8> {
        let mut buffer = [0u8; 1];
        rand_bytes(&mut buffer)?;
        Ok(buffer[0])
    }

    fn rand64(&mut self) -> Result<u64> {
        let mut buffer = [0u8; 8];
        rand_bytes(&mut buffer)?;
        Ok(u64::from_le_bytes(buffer))
    }

    fn rand128(&mut self) -> Result<u128> {
        let mut buffer = [0u8; 16];
        rand_bytes(&mut buffer)?;
        Ok(u128::from_le_bytes(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn outputs_vary() {
        let mut rng = BasicRng::new();
        let samples: HashSet<u128> = (0..10).map(|_| rng.rand128().unwrap()).collect();
        assert!(samples.len() > 1);
    }

    #[test]
    fn all_widths_sample() {
        let mut rng = BasicRng::new();
        rng.rand8().unwrap();
        rng.rand64().unwrap();
        rng.rand128().unwrap();
    }

    #[test]
    fn rand64_covers_all_byte_positions() {
        // Every byte of the output must be filled from fresh randomness;
        // with 64 samples the chance of any fixed byte staying zero
        // throughout is below 2^-500.
        let mut rng = BasicRng::new();
        let mut accumulated = 0u64;
        for _ in 0..64 {
            accumulated |= rng.rand64().unwrap();
        }
        for byte_index in 0..8 {
            assert_ne!((accumulated >> (8 * byte_index)) & 0xff, 0);
        }
    }
}
