//! dpf-pir: Two-server private information retrieval over DPFs
//!
//! Re-exports the workspace crates under one roof:
//!
//! - [`core`]: database, DPF backend, wire envelopes, transport capabilities
//! - [`client`]: request construction and response reconstruction
//! - [`server`]: Plain/Leader/Helper request handling

pub use dpf_pir_client as client;
pub use dpf_pir_core as core;
pub use dpf_pir_server as server;

use dpf_pir_core::{Database, DatabaseBuilder};

/// Records `"{prefix}0"`, `"{prefix}1"`, ... used for demos and tests
pub fn counting_records(prefix: &str, count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| format!("{}{}", prefix, i).into_bytes())
        .collect()
}

/// Database holding `records` in order
pub fn database_from_records(records: Vec<Vec<u8>>) -> dpf_pir_core::Result<Database> {
    let mut builder = DatabaseBuilder::new().with_expected_size(records.len());
    for record in records {
        builder.insert(record);
    }
    builder.build()
}

/// Database holding `counting_records(prefix, count)`
pub fn counting_database(prefix: &str, count: usize) -> dpf_pir_core::Result<Database> {
    database_from_records(counting_records(prefix, count))
}
