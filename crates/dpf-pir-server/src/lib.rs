//! dpf-pir-server: Two-server DPF PIR server engine
//!
//! Answers PIR requests against an immutable database in one of three modes:
//!
//! - Plain: one of two independent servers, each receiving one request
//! - Leader: receives the client's single request, answers its own share and
//!   forwards the sealed Helper request through an injected forwarder
//! - Helper: opens forwarded requests with an injected decrypter
//!
//! Transport between client, Leader and Helper is left to the embedding
//! process.
//!
//! Records can also come from a [`BucketStore`], which places fixed-size
//! items in a cuckoo table and serves each bucket as one record.

pub mod cuckoo;
pub mod error;
pub mod metrics;
pub mod server;
pub mod state;

pub use cuckoo::{BucketStore, CuckooItem, CuckooTable};
pub use error::ServerError;
pub use server::{
    DpfPirServer, HelperForwarder, ServerBuilder, ServerMode, ServerStats, ServerStatus,
};
pub use state::RecordStore;
