//! The client side: split queries into key shares and recombine responses.

use crate::dpf::DistributedPointFunction;
use crate::error::{Error, Result};
use crate::pir::{pir_dpf_parameters, BITS_PER_BLOCK};
use crate::proto::DpfKey;
use crate::value::{DpfValue, XorWrapper};

pub struct DensePirClient {
    dpf: DistributedPointFunction,
    database_size: usize,
}

impl DensePirClient {
    pub fn new(database_size: usize) -> Result<Self> {
        if database_size == 0 {
            return Err(Error::invalid_argument("`database_size` must be positive"));
        }
        let dpf = DistributedPointFunction::create(pir_dpf_parameters(database_size))?;
        Ok(DensePirClient {
            dpf,
            database_size,
        })
    }

    /// Builds the two servers' requests for the given record indices. The
    /// selected record is bit `index % 128` of block `index / 128`, so the
    /// DPF shares a one-hot 128-bit block at the block index.
    pub fn create_request(
        &self,
        query_indices: &[usize],
    ) -> Result<(Vec<DpfKey>, Vec<DpfKey>)> {
        let mut keys_0 = Vec::with_capacity(query_indices.len());
        let mut keys_1 = Vec::with_capacity(query_indices.len());
        for &index in query_indices {
            if index >= self.database_size {
                return Err(Error::invalid_argument(format!(
                    "query index {} out of bounds for database of size {}",
                    index, self.database_size
                )));
            }
            let alpha = (index / BITS_PER_BLOCK) as u128;
            let beta = XorWrapper(1u128 << (index % BITS_PER_BLOCK));
            let (key_0, key_1) = self.dpf.generate_keys(alpha, beta.to_value())?;
            keys_0.push(key_0);
            keys_1.push(key_1);
        }
        Ok((keys_0, keys_1))
    }

    /// Recovers the queried records from the two servers' responses.
    pub fn handle_response(
        &self,
        response_0: &[Vec<u8>],
        response_1: &[Vec<u8>],
    ) -> Result<Vec<Vec<u8>>> {
        if response_0.len() != response_1.len() {
            return Err(Error::invalid_argument(
                "responses must have the same number of entries",
            ));
        }
        response_0
            .iter()
            .zip(response_1)
            .map(|(masked_0, masked_1)| {
                if masked_0.len() != masked_1.len() {
                    return Err(Error::invalid_argument(
                        "response entries must have the same length",
                    ));
                }
                Ok(masked_0
                    .iter()
                    .zip(masked_1)
                    .map(|(a, b)| a ^ b)
                    .collect())
            })
            .collect()
    }
}
