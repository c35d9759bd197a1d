//! Wire envelopes exchanged between client, Leader and Helper
//!
//! Binary encoding is bincode with fixed-width integers. Decoding is bounded
//! by the input length and rejects trailing bytes.

use bincode::Options;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::dpf::DpfKey;
use crate::error::Error;

/// Envelope format version
pub const WIRE_VERSION: u16 = 1;

/// Which server a request is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Plain,
    Leader,
    Helper,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Plain => "plain",
            Role::Leader => "leader",
            Role::Helper => "helper",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

fn encode<T: Serialize>(value: &T) -> crate::Result<Vec<u8>> {
    bincode_options()
        .serialize(value)
        .map_err(|e| Error::Internal(format!("encoding failed: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> crate::Result<T> {
    bincode_options()
        .with_limit(bytes.len() as u64)
        .deserialize(bytes)
        .map_err(|e| Error::Decode(e.to_string()))
}

/// Seed of the one-time pad the Helper applies to its response
///
/// The client picks a fresh seed per Leader request and seals it together
/// with the Helper's shares. The Leader only ever combines padded Helper
/// values, so its combined response is still masked; the client removes the
/// pad with the seed it kept in [`ClientState`].
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadSeed([u8; 32]);

impl PadSeed {
    pub fn new(seed: [u8; 32]) -> Self {
        Self(seed)
    }

    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self(seed)
    }

    /// XOR the ChaCha8 keystream into every value, in order
    ///
    /// Applying the same seed twice restores the input.
    pub fn apply(&self, response: &mut PirResponse) {
        let mut rng = ChaCha8Rng::from_seed(self.0);
        for value in &mut response.masked_values {
            let mut pad = vec![0u8; value.len()];
            rng.fill_bytes(&mut pad);
            for (v, p) in value.iter_mut().zip(&pad) {
                *v ^= p;
            }
        }
    }
}

impl std::fmt::Debug for PadSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PadSeed(..)")
    }
}

/// One DPF key share per queried index, in query order
///
/// Requests addressed to the Helper also carry the response pad seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PirRequest {
    pub version: u16,
    pub role: Role,
    pub shares: Vec<DpfKey>,
    pub pad_seed: Option<PadSeed>,
}

impl PirRequest {
    pub fn new(role: Role, shares: Vec<DpfKey>) -> Self {
        Self {
            version: WIRE_VERSION,
            role,
            shares,
            pad_seed: None,
        }
    }

    pub fn with_pad_seed(mut self, pad_seed: PadSeed) -> Self {
        self.pad_seed = Some(pad_seed);
        self
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Check version, addressee and that at least one share is present
    pub fn validate(&self, expected_role: Role) -> crate::Result<()> {
        if self.version != WIRE_VERSION {
            return Err(Error::VersionMismatch {
                expected: WIRE_VERSION,
                actual: self.version,
            });
        }
        if self.role != expected_role {
            return Err(Error::InvalidArgument(format!(
                "request addressed to {} server, this is a {} server",
                self.role, expected_role
            )));
        }
        if self.shares.is_empty() {
            return Err(Error::InvalidArgument("request carries no key shares".to_string()));
        }
        if self.role == Role::Helper && self.pad_seed.is_none() {
            return Err(Error::InvalidArgument("helper request carries no pad seed".to_string()));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        decode(bytes)
    }
}

/// Request sent to the Leader
///
/// The Helper's request is opaque to the Leader: it is encrypted by the client
/// and only forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderRequest {
    pub leader_request: PirRequest,
    pub encrypted_helper_request: Option<Vec<u8>>,
}

impl LeaderRequest {
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        decode(bytes)
    }
}

/// Masked inner products, positionally aligned with the request shares
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PirResponse {
    pub masked_values: Vec<Vec<u8>>,
}

impl PirResponse {
    pub fn new(masked_values: Vec<Vec<u8>>) -> Self {
        Self { masked_values }
    }

    pub fn len(&self) -> usize {
        self.masked_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masked_values.is_empty()
    }

    /// XOR two responses position by position
    ///
    /// Fails without partial output when the counts or any per-position
    /// lengths differ.
    pub fn combine(&self, other: &PirResponse) -> crate::Result<PirResponse> {
        if self.len() != other.len() {
            return Err(Error::InvalidArgument(format!(
                "responses carry {} and {} values",
                self.len(),
                other.len()
            )));
        }
        for (i, (a, b)) in self.masked_values.iter().zip(&other.masked_values).enumerate() {
            if a.len() != b.len() {
                return Err(Error::InvalidArgument(format!(
                    "response value {} has lengths {} and {}",
                    i,
                    a.len(),
                    b.len()
                )));
            }
        }

        let masked_values = self
            .masked_values
            .iter()
            .zip(&other.masked_values)
            .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x ^ y).collect())
            .collect();
        Ok(PirResponse { masked_values })
    }

    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        decode(bytes)
    }
}

/// What the client keeps between sending requests and combining responses
///
/// Holds the queried indices and, for Leader requests, the Helper's pad
/// seed. Never holds DPF keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    pub indices: Vec<u64>,
    pub pad_seed: Option<PadSeed>,
}

impl ClientState {
    pub fn new(indices: Vec<u64>) -> Self {
        Self {
            indices,
            pad_seed: None,
        }
    }

    pub fn with_pad_seed(mut self, pad_seed: PadSeed) -> Self {
        self.pad_seed = Some(pad_seed);
        self
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        decode(bytes)
    }
}
