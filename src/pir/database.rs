//! The server-side record store.

use crate::error::{Error, Result};
use crate::pir::BITS_PER_BLOCK;
use crate::value::XorWrapper;

/// A dense database: record `j` is selected by bit `j % 128` of selection
/// block `j / 128`. All records are padded to the length of the longest one,
/// since the response must not reveal which record was combined.
pub struct DenseDatabase {
    records: Vec<Vec<u8>>,
    record_size: usize,
}

impl DenseDatabase {
    pub fn new(records: Vec<Vec<u8>>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::invalid_argument("database must not be empty"));
        }
        let record_size = records.iter().map(Vec::len).max().unwrap_or_default();
        let records = records
            .into_iter()
            .map(|mut record| {
                record.resize(record_size, 0);
                record
            })
            .collect();
        Ok(DenseDatabase {
            records,
            record_size,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Length of every (padded) record in bytes.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub(crate) fn num_selection_blocks(&self) -> usize {
        self.len().div_ceil(BITS_PER_BLOCK)
    }

    /// XORs together all records whose selection bit is set. `selections`
    /// must cover at least [`num_selection_blocks`](Self::num_selection_blocks)
    /// blocks.
    pub fn inner_product_with(&self, selections: &[XorWrapper<u128>]) -> Result<Vec<u8>> {
        if selections.len() < self.num_selection_blocks() {
            return Err(Error::invalid_argument(format!(
                "expected at least {} selection blocks, got {}",
                self.num_selection_blocks(),
                selections.len()
            )));
        }
        let mut accumulator = vec![0u8; self.record_size];
        for (block_index, selection) in
            selections[..self.num_selection_blocks()].iter().enumerate()
        {
            let bits = selection.value();
            if bits == 0 {
                continue;
            }
            for bit_index in 0..BITS_PER_BLOCK {
                let record_index = block_index * BITS_PER_BLOCK + bit_index;
                if record_index >= self.len() {
                    break;
                }
                if (bits >> bit_index) & 1 == 1 {
                    for (accumulated, byte) in
                        accumulator.iter_mut().zip(&self.records[record_index])
                    {
                        *accumulated ^= byte;
                    }
                }
            }
        }
        Ok(accumulator)
    }
}
