//! 128-bit XOR group element

use std::ops::{BitAnd, BitXor, BitXorAssign};

use serde::{Deserialize, Serialize};

/// Size of one block in bytes
pub const BLOCK_BYTES: usize = 16;

/// Element of the XOR group over 128-bit strings
///
/// DPF outputs, PRG seeds and database storage all use this type. AND with a
/// block distributes over XOR, which is what makes the two servers' masked
/// inner products combine into the selected record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block(pub u128);

impl Block {
    pub const ZERO: Block = Block(0);
    pub const ONES: Block = Block(u128::MAX);

    pub fn from_le_bytes(bytes: [u8; BLOCK_BYTES]) -> Self {
        Block(u128::from_le_bytes(bytes))
    }

    pub fn to_le_bytes(self) -> [u8; BLOCK_BYTES] {
        self.0.to_le_bytes()
    }

    /// Read a block from a slice of up to 16 bytes, zero-padding the tail
    pub fn from_partial(bytes: &[u8]) -> Self {
        let mut buf = [0u8; BLOCK_BYTES];
        let n = bytes.len().min(BLOCK_BYTES);
        buf[..n].copy_from_slice(&bytes[..n]);
        Self::from_le_bytes(buf)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl BitXor for Block {
    type Output = Block;

    fn bitxor(self, rhs: Block) -> Block {
        Block(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Block {
    fn bitxor_assign(&mut self, rhs: Block) {
        self.0 ^= rhs.0;
    }
}

impl BitAnd for Block {
    type Output = Block;

    fn bitand(self, rhs: Block) -> Block {
        Block(self.0 & rhs.0)
    }
}

impl From<u128> for Block {
    fn from(value: u128) -> Self {
        Block(value)
    }
}
