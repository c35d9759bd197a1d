//! dpf-pir-core: Shared building blocks for two-server DPF PIR
//!
//! A client retrieves one or more records from a database replicated on two
//! non-colluding servers. Each query index is hidden by splitting a point
//! function into two keys, one per server:
//!
//! - Client: generates a DPF key pair per index (beta = all-ones mask)
//! - Server: expands its key into a selection vector and returns the
//!   inner product of that vector with the database
//! - Client: XORs both masked responses to recover the record
//!
//! # Privacy & Threat Model
//!
//! ## Adversary Model
//!
//! - **Server model**: Two servers, honest-but-curious, non-colluding
//! - **Security goal**: Query index confidentiality against either server alone
//! - **Non-goals**: Transport security, integrity, availability
//!
//! ## What a Single Server Learns
//!
//! | Information | Server Knowledge |
//! |-------------|------------------|
//! | Number of indices per request | **YES** - one key share per index |
//! | Database size | **YES** - public parameter |
//! | Queried index | NO - key share is pseudorandom |
//! | Retrieved record | NO - response is masked |
//!
//! In Leader/Helper deployments the client sends a single request to the
//! Leader; the Helper's share travels inside it encrypted to the Helper, so
//! the Leader never sees both shares. The Helper pads its response with a
//! keystream seeded by the client, so the Leader's combined response stays
//! masked too.

mod block;
mod config;
mod database;
mod error;
mod framing;
mod messages;
mod params;
mod transport;

pub mod dpf;

pub use block::{Block, BLOCK_BYTES};
pub use config::{PirConfig, DEFAULT_CONTEXT_INFO, DEFAULT_DELIMITER};
pub use database::{frame_width, unframe_record, Database, DatabaseBuilder, FRAME_HEADER_BYTES};
pub use dpf::{DistributedPointFunction, DpfKey, PointFunction};
pub use error::{Error, StatusKind};
pub use framing::{RequestPair, ResponsePair};
pub use messages::{
    ClientState, LeaderRequest, PadSeed, PirRequest, PirResponse, Role, WIRE_VERSION,
};
pub use params::{ceil_log2, DpfParameters, MAX_LOG_DOMAIN_SIZE, VALUE_BIT_SIZE};
pub use transport::{AeadSealer, RequestDecrypter, RequestEncrypter};

pub type Result<T> = std::result::Result<T, Error>;
