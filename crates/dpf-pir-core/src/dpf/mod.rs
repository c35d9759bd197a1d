//! Distributed point functions
//!
//! A point function `f(alpha) = beta, f(x) = 0 otherwise` is split into two
//! keys. Each key alone is pseudorandom; XORing the two keys' evaluations at
//! any point yields `f` at that point.
//!
//! The PIR engines only talk to the [`PointFunction`] trait.
//! [`DistributedPointFunction`] is the tree-based (GGM) backend shipped with
//! this crate.

mod prg;
mod tree;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::params::DpfParameters;

pub use tree::DistributedPointFunction;

/// Correction word for one level of the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionWord {
    pub seed: Block,
    pub control_left: bool,
    pub control_right: bool,
}

/// One party's share of a point function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpfKey {
    /// 0 or 1
    pub party: u8,
    pub log_domain_size: u32,
    pub root_seed: Block,
    pub correction_words: Vec<CorrectionWord>,
    pub output_correction: Block,
}

/// Capability required by the PIR client and servers
pub trait PointFunction: Send + Sync {
    fn params(&self) -> &DpfParameters;

    /// Generate a key pair for `f(alpha) = beta` from the given CSPRNG
    fn generate_keys_with<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        alpha: u64,
        beta: Block,
    ) -> crate::Result<(DpfKey, DpfKey)>;

    /// Generate a key pair from fresh thread-local randomness
    fn generate_keys(&self, alpha: u64, beta: Block) -> crate::Result<(DpfKey, DpfKey)> {
        self.generate_keys_with(&mut rand::thread_rng(), alpha, beta)
    }

    fn evaluate_at(&self, key: &DpfKey, x: u64) -> crate::Result<Block>;

    /// Evaluate the key on every point of the domain, in order
    fn expand(&self, key: &DpfKey) -> crate::Result<Vec<Block>>;
}
