//! Two-server private information retrieval with a dense key space.
//!
//! Records are indexed 0..n and selected by a secret-shared bit vector: the
//! client splits a one-hot selection into two DPF keys, each server XORs
//! together the records its share selects, and the client XORs the two
//! responses to recover the record. Neither server learns the queried index.

mod client;
mod database;
mod server;

pub use client::DensePirClient;
pub use database::DenseDatabase;
pub use server::DensePirServer;

use crate::proto::DpfParameters;
use crate::value::{DpfValue, XorWrapper};

/// Selection bits per 128-bit DPF output block.
pub(crate) const BITS_PER_BLOCK: usize = 128;

/// DPF parameters shared by client and server: one hierarchy level over the
/// domain of selection blocks.
pub(crate) fn pir_dpf_parameters(num_records: usize) -> DpfParameters {
    let num_blocks = num_records.div_ceil(BITS_PER_BLOCK);
    let log_domain_size = num_blocks.next_power_of_two().trailing_zeros() as i32;
    DpfParameters {
        log_domain_size,
        value_type: Some(XorWrapper::<u128>::value_type()),
        ..Default::default()
    }
}
