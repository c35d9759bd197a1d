//! DPF parameters
//!
//! Both servers and the client must derive the same parameters from the
//! database size; keys generated under one domain size are rejected by a
//! server expecting another.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Output group width in bits (one `Block`)
pub const VALUE_BIT_SIZE: u32 = 128;

/// Largest supported domain, in bits
pub const MAX_LOG_DOMAIN_SIZE: u32 = 32;

/// Smallest `k` such that `2^k >= n`; zero for `n <= 1`
pub fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        64 - (n - 1).leading_zeros()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpfParameters {
    pub log_domain_size: u32,
    pub value_bit_size: u32,
}

impl DpfParameters {
    pub fn new(log_domain_size: u32, value_bit_size: u32) -> crate::Result<Self> {
        if log_domain_size == 0 || log_domain_size > MAX_LOG_DOMAIN_SIZE {
            return Err(Error::InvalidArgument(format!(
                "log_domain_size must be in [1, {}], got {}",
                MAX_LOG_DOMAIN_SIZE, log_domain_size
            )));
        }
        if value_bit_size != VALUE_BIT_SIZE {
            return Err(Error::InvalidArgument(format!(
                "value_bit_size must be {}, got {}",
                VALUE_BIT_SIZE, value_bit_size
            )));
        }
        Ok(Self {
            log_domain_size,
            value_bit_size,
        })
    }

    /// Parameters covering a database of `num_records` records
    ///
    /// A single-record database still gets a one-bit domain.
    pub fn for_database_size(num_records: u64) -> crate::Result<Self> {
        if num_records == 0 {
            return Err(Error::InvalidArgument(
                "database size must be positive".to_string(),
            ));
        }
        Self::new(ceil_log2(num_records).max(1), VALUE_BIT_SIZE)
    }

    /// Number of points in the domain
    pub fn domain_size(&self) -> u64 {
        1u64 << self.log_domain_size
    }
}
