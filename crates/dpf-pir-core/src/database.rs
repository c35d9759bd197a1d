//! Record database and its builder
//!
//! Records are stored as fixed-width frames so that every server computes
//! inner products of the same length:
//!
//! ```text
//! | len: u32 LE | record bytes | zero padding to record_width |
//! ```
//!
//! `record_width` is the longest frame rounded up to a whole number of
//! blocks. The client strips the frame with [`unframe_record`] after
//! combining both servers' responses.

use crate::block::{Block, BLOCK_BYTES};
use crate::error::{try_reserve, Error};
use crate::params::ceil_log2;

/// Size of the length prefix in each frame
pub const FRAME_HEADER_BYTES: usize = 4;

/// Framed width in bytes of a record of `record_len` bytes, rounded to blocks
pub fn frame_width(record_len: usize) -> usize {
    let framed = FRAME_HEADER_BYTES + record_len;
    framed.div_ceil(BLOCK_BYTES) * BLOCK_BYTES
}

/// Strip the length frame from a reconstructed record
pub fn unframe_record(framed: &[u8]) -> crate::Result<Vec<u8>> {
    if framed.len() < FRAME_HEADER_BYTES {
        return Err(Error::Internal(format!(
            "reconstructed record too short for frame header: {} bytes",
            framed.len()
        )));
    }
    let mut header = [0u8; FRAME_HEADER_BYTES];
    header.copy_from_slice(&framed[..FRAME_HEADER_BYTES]);
    let len = u32::from_le_bytes(header) as usize;

    let body = &framed[FRAME_HEADER_BYTES..];
    if len > body.len() {
        return Err(Error::Internal(format!(
            "record frame declares {} bytes but only {} are present",
            len,
            body.len()
        )));
    }
    Ok(body[..len].to_vec())
}

/// Mutable accumulator of records
#[derive(Debug, Clone, Default)]
pub struct DatabaseBuilder {
    records: Vec<Vec<u8>>,
    expected_size: Option<usize>,
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `build` to see exactly `size` records
    pub fn with_expected_size(mut self, size: usize) -> Self {
        self.expected_size = Some(size);
        self
    }

    pub fn insert(&mut self, record: impl Into<Vec<u8>>) -> &mut Self {
        self.records.push(record.into());
        self
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot the accumulated records into an immutable database
    pub fn build(&self) -> crate::Result<Database> {
        if self.records.is_empty() {
            return Err(Error::FailedPrecondition(
                "cannot build a database with no records".to_string(),
            ));
        }
        if let Some(expected) = self.expected_size {
            if expected != self.records.len() {
                return Err(Error::FailedPrecondition(format!(
                    "expected {} records, builder holds {}",
                    expected,
                    self.records.len()
                )));
            }
        }

        let mut max_len = 0usize;
        for (i, record) in self.records.iter().enumerate() {
            if record.len() > u32::MAX as usize {
                return Err(Error::InvalidArgument(format!(
                    "record {} is {} bytes, frames hold at most {}",
                    i,
                    record.len(),
                    u32::MAX
                )));
            }
            max_len = max_len.max(record.len());
        }

        let record_width = frame_width(max_len);
        let blocks_per_record = record_width / BLOCK_BYTES;
        let total = self
            .records
            .len()
            .checked_mul(blocks_per_record)
            .ok_or_else(|| Error::ResourceExhausted("database too large".to_string()))?;

        let mut blocks = Vec::new();
        try_reserve(&mut blocks, total, "database blocks")?;

        let mut frame = vec![0u8; record_width];
        for record in &self.records {
            frame.fill(0);
            frame[..FRAME_HEADER_BYTES].copy_from_slice(&(record.len() as u32).to_le_bytes());
            frame[FRAME_HEADER_BYTES..FRAME_HEADER_BYTES + record.len()].copy_from_slice(record);
            blocks.extend(frame.chunks_exact(BLOCK_BYTES).map(Block::from_partial));
        }

        tracing::info!(
            records = self.records.len(),
            record_width,
            "Database built"
        );

        Ok(Database {
            size: self.records.len(),
            blocks_per_record,
            blocks,
        })
    }
}

/// Immutable, fixed-size sequence of framed records
#[derive(Debug, Clone)]
pub struct Database {
    size: usize,
    blocks_per_record: usize,
    blocks: Vec<Block>,
}

impl Database {
    /// Number of records
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bits needed to address every record, `ceil(log2(size))`
    pub fn num_selection_bits(&self) -> u32 {
        ceil_log2(self.size as u64)
    }

    /// Padded width of every record in bytes
    pub fn record_width(&self) -> usize {
        self.blocks_per_record * BLOCK_BYTES
    }

    pub fn blocks_per_record(&self) -> usize {
        self.blocks_per_record
    }

    fn record_blocks(&self, index: usize) -> &[Block] {
        let start = index * self.blocks_per_record;
        &self.blocks[start..start + self.blocks_per_record]
    }

    /// Plain read of one record, without the frame
    ///
    /// `Ok(None)` when `index` is past the end; a corrupt frame is an error.
    pub fn get(&self, index: usize) -> crate::Result<Option<Vec<u8>>> {
        if index >= self.size {
            return Ok(None);
        }
        let framed: Vec<u8> = self
            .record_blocks(index)
            .iter()
            .flat_map(|b| b.to_le_bytes())
            .collect();
        unframe_record(&framed).map(Some)
    }

    /// XOR over `i` of `selection[i] AND record[i]`, once per selection vector
    ///
    /// Each output is `record_width()` bytes.
    pub fn inner_product(&self, selections: &[Vec<Block>]) -> crate::Result<Vec<Vec<u8>>> {
        let mut results = Vec::new();
        try_reserve(&mut results, selections.len(), "inner products")?;

        for (n, selection) in selections.iter().enumerate() {
            if selection.len() != self.size {
                return Err(Error::InvalidArgument(format!(
                    "selection vector {} has length {}, database has {} records",
                    n,
                    selection.len(),
                    self.size
                )));
            }

            let mut acc = vec![Block::ZERO; self.blocks_per_record];
            for (i, &mask) in selection.iter().enumerate() {
                for (a, &b) in acc.iter_mut().zip(self.record_blocks(i)) {
                    *a ^= mask & b;
                }
            }

            results.push(acc.iter().flat_map(|b| b.to_le_bytes()).collect());
        }

        Ok(results)
    }
}
