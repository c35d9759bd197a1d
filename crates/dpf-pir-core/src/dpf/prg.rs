//! Length-doubling PRG for DPF tree expansion
//!
//! Expands a 128-bit node seed into two child seeds and two control bits.
//! The node seed keys a ChaCha8 stream (upper half of the 256-bit key is zero).

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::block::{Block, BLOCK_BYTES};

/// Children of one tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Expansion {
    pub left_seed: Block,
    pub left_t: bool,
    pub right_seed: Block,
    pub right_t: bool,
}

pub(crate) fn expand(seed: Block) -> Expansion {
    let mut key = [0u8; 32];
    key[..BLOCK_BYTES].copy_from_slice(&seed.to_le_bytes());
    let mut rng = ChaCha8Rng::from_seed(key);

    let mut out = [0u8; 2 * BLOCK_BYTES + 1];
    rng.fill_bytes(&mut out);

    let mut left = [0u8; BLOCK_BYTES];
    let mut right = [0u8; BLOCK_BYTES];
    left.copy_from_slice(&out[..BLOCK_BYTES]);
    right.copy_from_slice(&out[BLOCK_BYTES..2 * BLOCK_BYTES]);
    let bits = out[2 * BLOCK_BYTES];

    Expansion {
        left_seed: Block::from_le_bytes(left),
        left_t: bits & 1 == 1,
        right_seed: Block::from_le_bytes(right),
        right_t: bits & 2 == 2,
    }
}
