//! The server side: expand each key share and combine it with the database.

use crate::dpf::DistributedPointFunction;
use crate::error::{Error, Result};
use crate::pir::database::DenseDatabase;
use crate::pir::pir_dpf_parameters;
use crate::proto::DpfKey;
use crate::value::XorWrapper;

pub struct DensePirServer {
    dpf: DistributedPointFunction,
    database: DenseDatabase,
}

impl DensePirServer {
    pub fn new(database: DenseDatabase) -> Result<Self> {
        let dpf = DistributedPointFunction::create(pir_dpf_parameters(database.len()))?;
        Ok(DensePirServer { dpf, database })
    }

    pub fn database(&self) -> &DenseDatabase {
        &self.database
    }

    /// Computes this server's share of the response: one masked record per
    /// request key. The server learns nothing about the queried indices
    /// beyond the number of queries.
    pub fn handle_request(&self, dpf_keys: &[DpfKey]) -> Result<Vec<Vec<u8>>> {
        if dpf_keys.is_empty() {
            return Err(Error::invalid_argument("`dpf_keys` must not be empty"));
        }
        let mut responses = Vec::with_capacity(dpf_keys.len());
        for key in dpf_keys {
            let mut ctx = self.dpf.create_evaluation_context(key.clone())?;
            let selections: Vec<XorWrapper<u128>> = self.dpf.evaluate_next(&[], &mut ctx)?;
            responses.push(self.database.inner_product_with(&selections)?);
        }
        Ok(responses)
    }
}
