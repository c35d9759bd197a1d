//! Tree-based DPF over the 128-bit XOR group

use rand::{CryptoRng, RngCore};

use super::prg;
use super::{CorrectionWord, DpfKey, PointFunction};
use crate::block::Block;
use crate::error::{try_reserve, Error};
use crate::params::DpfParameters;

/// DPF with `log_domain_size` tree levels and one `Block` of output
///
/// Keys have size `O(log_domain_size)`; full-domain expansion costs one PRG
/// call per tree node.
#[derive(Debug, Clone)]
pub struct DistributedPointFunction {
    params: DpfParameters,
}

impl DistributedPointFunction {
    pub fn create(params: DpfParameters) -> crate::Result<Self> {
        // Re-run validation in case the struct was built by hand
        let params = DpfParameters::new(params.log_domain_size, params.value_bit_size)?;
        Ok(Self { params })
    }

    /// DPF sized for a database of `num_records` records
    pub fn for_database_size(num_records: u64) -> crate::Result<Self> {
        Self::create(DpfParameters::for_database_size(num_records)?)
    }

    fn check_key(&self, key: &DpfKey) -> crate::Result<()> {
        if key.log_domain_size != self.params.log_domain_size {
            return Err(Error::InvalidArgument(format!(
                "key domain is {} bits, expected {}",
                key.log_domain_size, self.params.log_domain_size
            )));
        }
        if key.correction_words.len() != key.log_domain_size as usize {
            return Err(Error::InvalidArgument(format!(
                "key has {} correction words, expected {}",
                key.correction_words.len(),
                key.log_domain_size
            )));
        }
        if key.party > 1 {
            return Err(Error::InvalidArgument(format!("invalid party {}", key.party)));
        }
        Ok(())
    }
}

/// Advance one node to its two corrected children
fn children(seed: Block, t: bool, cw: &CorrectionWord) -> ((Block, bool), (Block, bool)) {
    let out = prg::expand(seed);
    if t {
        (
            (out.left_seed ^ cw.seed, out.left_t ^ cw.control_left),
            (out.right_seed ^ cw.seed, out.right_t ^ cw.control_right),
        )
    } else {
        ((out.left_seed, out.left_t), (out.right_seed, out.right_t))
    }
}

fn leaf_value(seed: Block, t: bool, output_correction: Block) -> Block {
    if t {
        seed ^ output_correction
    } else {
        seed
    }
}

impl PointFunction for DistributedPointFunction {
    fn params(&self) -> &DpfParameters {
        &self.params
    }

    fn generate_keys_with<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        alpha: u64,
        beta: Block,
    ) -> crate::Result<(DpfKey, DpfKey)> {
        let bits = self.params.log_domain_size;
        if alpha >= self.params.domain_size() {
            return Err(Error::InvalidArgument(format!(
                "alpha {} outside domain of {} bits",
                alpha, bits
            )));
        }

        let root0 = Block(((rng.next_u64() as u128) << 64) | rng.next_u64() as u128);
        let root1 = Block(((rng.next_u64() as u128) << 64) | rng.next_u64() as u128);

        let (mut s0, mut t0) = (root0, false);
        let (mut s1, mut t1) = (root1, true);
        let mut correction_words = Vec::with_capacity(bits as usize);

        for level in 0..bits {
            let bit = (alpha >> (bits - 1 - level)) & 1 == 1;
            let out0 = prg::expand(s0);
            let out1 = prg::expand(s1);

            let (lose0, lose1) = if bit {
                (out0.left_seed, out1.left_seed)
            } else {
                (out0.right_seed, out1.right_seed)
            };
            let cw = CorrectionWord {
                seed: lose0 ^ lose1,
                control_left: out0.left_t ^ out1.left_t ^ !bit,
                control_right: out0.right_t ^ out1.right_t ^ bit,
            };

            let ((l0, r0), (l1, r1)) = (children(s0, t0, &cw), children(s1, t1, &cw));
            (s0, t0) = if bit { r0 } else { l0 };
            (s1, t1) = if bit { r1 } else { l1 };
            correction_words.push(cw);
        }

        let output_correction = beta ^ s0 ^ s1;

        let key0 = DpfKey {
            party: 0,
            log_domain_size: bits,
            root_seed: root0,
            correction_words: correction_words.clone(),
            output_correction,
        };
        let key1 = DpfKey {
            party: 1,
            log_domain_size: bits,
            root_seed: root1,
            correction_words,
            output_correction,
        };
        Ok((key0, key1))
    }

    fn evaluate_at(&self, key: &DpfKey, x: u64) -> crate::Result<Block> {
        self.check_key(key)?;
        let bits = key.log_domain_size;
        if x >= self.params.domain_size() {
            return Err(Error::InvalidArgument(format!(
                "point {} outside domain of {} bits",
                x, bits
            )));
        }

        let (mut seed, mut t) = (key.root_seed, key.party == 1);
        for (level, cw) in key.correction_words.iter().enumerate() {
            let (left, right) = children(seed, t, cw);
            let bit = (x >> (bits as usize - 1 - level)) & 1 == 1;
            (seed, t) = if bit { right } else { left };
        }
        Ok(leaf_value(seed, t, key.output_correction))
    }

    fn expand(&self, key: &DpfKey) -> crate::Result<Vec<Block>> {
        self.check_key(key)?;
        let domain = self.params.domain_size() as usize;

        let mut level_nodes: Vec<(Block, bool)> = vec![(key.root_seed, key.party == 1)];
        for cw in &key.correction_words {
            let mut next = Vec::new();
            try_reserve(&mut next, level_nodes.len() * 2, "DPF tree level")?;
            for &(seed, t) in &level_nodes {
                let (left, right) = children(seed, t, cw);
                next.push(left);
                next.push(right);
            }
            level_nodes = next;
        }

        let mut out = Vec::new();
        try_reserve(&mut out, domain, "DPF expansion")?;
        out.extend(
            level_nodes
                .into_iter()
                .map(|(seed, t)| leaf_value(seed, t, key.output_correction)),
        );
        Ok(out)
    }
}
