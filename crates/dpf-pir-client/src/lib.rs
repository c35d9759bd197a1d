//! dpf-pir-client: Client engine for two-server DPF PIR
//!
//! Builds one DPF key pair per requested index, splits the shares into two
//! requests (or one Leader request with the Helper's share sealed inside),
//! and recovers records by XORing the servers' masked responses.

pub mod client;
pub mod error;

pub use client::{ClientBuilder, DpfPirClient, OutputMode, RetrievedOutput};
pub use error::ClientError;
