//! Fixed-key AES-128 hashing, used as the PRG of the evaluation tree.

use derivative::Derivative;
use openssl::symm::{Cipher, Crypter, Mode};

use crate::error::{Error, Result};

/// Number of blocks encrypted per OpenSSL call. AES-NI pipelines several
/// blocks at a time, so feeding the crypter long runs is noticeably faster
/// than block-at-a-time calls.
const HASH_BATCH_SIZE: usize = 64;

/// A correlation-robust hash `H(x) = AES_k(x) ^ x` with a fixed, public key
/// (the Davies-Meyer construction with the key roles swapped).
///
/// The key is not secret; distinct instances with distinct keys act as
/// independent random oracles on 128-bit blocks.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Aes128FixedKeyHash {
    key: [u8; 16],
    #[derivative(Debug = "ignore")]
    cipher: Cipher,
}

impl Aes128FixedKeyHash {
    pub fn new(key: u128) -> Self {
        Aes128FixedKeyHash {
            key: key.to_le_bytes(),
            cipher: Cipher::aes_128_ecb(),
        }
    }

    /// Hashes `input` element-wise into `output`. The two slices must have
    /// the same length.
    pub fn evaluate(&self, input: &[u128], output: &mut [u128]) -> Result<()> {
        if input.len() != output.len() {
            return Err(Error::invalid_argument(
                "input and output must have the same length",
            ));
        }
        if input.is_empty() {
            return Ok(());
        }
        let mut crypter = Crypter::new(self.cipher, Mode::Encrypt, &self.key, None)?;
        crypter.pad(false);

        let mut plain = [0u8; 16 * HASH_BATCH_SIZE];
        // One extra block of slack, as required by Crypter::update.
        let mut encrypted = [0u8; 16 * (HASH_BATCH_SIZE + 1)];
        for (in_chunk, out_chunk) in input
            .chunks(HASH_BATCH_SIZE)
            .zip(output.chunks_mut(HASH_BATCH_SIZE))
        {
            for (block, plain) in in_chunk.iter().zip(plain.chunks_exact_mut(16)) {
                plain.copy_from_slice(&block.to_le_bytes());
            }
            let byte_len = 16 * in_chunk.len();
            let written = crypter.update(&plain[..byte_len], &mut encrypted)?;
            if written != byte_len {
                return Err(Error::internal(format!(
                    "AES-ECB encrypted {} bytes, expected {}",
                    written, byte_len
                )));
            }
            for i in 0..in_chunk.len() {
                let mut block = [0u8; 16];
                block.copy_from_slice(&encrypted[16 * i..16 * (i + 1)]);
                out_chunk[i] = u128::from_le_bytes(block) ^ in_chunk[i];
            }
        }
        Ok(())
    }
}
