//! Test instances (Feistel networks and random permutations) and their serialization.

use feistel_core::{FeistelNetwork, KeySchedule, TableRound};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DetectError, Result};

/// Largest table index width an instance may carry (`2^24` entries).
pub const MAX_TABLE_BITS: u32 = 24;

/// Rounds in the networks the distinguisher targets.
pub const DEFAULT_ROUNDS: usize = 3;

/// A permutation of `[0, 2^bits)` stored as one owned lookup table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermutationTable {
    bits: u32,
    table: Box<[u64]>,
}

impl PermutationTable {
    /// Draws a uniformly random permutation of `[0, 2^bits)`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, bits: u32) -> Result<Self> {
        check_table_bits(bits)?;
        let mut table: Vec<u64> = (0..1u64 << bits).collect();
        table.shuffle(rng);
        Ok(Self {
            bits,
            table: table.into_boxed_slice(),
        })
    }

    /// Wraps an existing table after checking it is a permutation.
    pub fn from_table(bits: u32, table: Vec<u64>) -> Result<Self> {
        check_table_bits(bits)?;
        let out = Self {
            bits,
            table: table.into_boxed_slice(),
        };
        out.validate()?;
        Ok(out)
    }

    /// Index width.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Image of `x`; bits above the index width are ignored.
    #[inline]
    pub fn apply(&self, x: u64) -> u64 {
        self.table[(x & ((1u64 << self.bits) - 1)) as usize]
    }

    /// The table, indexed by input.
    pub fn as_slice(&self) -> &[u64] {
        &self.table
    }

    fn validate(&self) -> Result<()> {
        check_table_bits(self.bits)?;
        let size = 1usize << self.bits;
        if self.table.len() != size {
            return Err(DetectError::InvalidInstance(format!(
                "table has {} entries, expected {size}",
                self.table.len()
            )));
        }
        let mut seen = vec![false; size];
        for &value in self.table.iter() {
            let slot = seen.get_mut(value as usize).ok_or_else(|| {
                DetectError::InvalidInstance(format!("table value {value:#x} out of range"))
            })?;
            if *slot {
                return Err(DetectError::InvalidInstance(format!(
                    "table value {value:#x} repeated"
                )));
            }
            *slot = true;
        }
        Ok(())
    }
}

fn check_table_bits(bits: u32) -> Result<()> {
    if bits == 0 || bits > MAX_TABLE_BITS {
        return Err(DetectError::UnsupportedWidth {
            bits,
            max: MAX_TABLE_BITS,
        });
    }
    Ok(())
}

/// A block oracle on `2·bits`-bit blocks, in serializable form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instance {
    /// Feistel network with a table round function `F(x, k) = table[x ⊕ k]`.
    Feistel {
        /// Half width.
        bits: u32,
        /// Round keys in encryption order.
        keys: Vec<u64>,
        /// Round-function table on `bits`-bit values.
        round_table: PermutationTable,
    },
    /// Uniformly random permutation of `2·bits`-bit blocks.
    RandomPermutation {
        /// Half width.
        bits: u32,
        /// Permutation table on `2·bits`-bit values.
        table: PermutationTable,
    },
}

impl Instance {
    /// Half width of the blocks.
    pub fn bits(&self) -> u32 {
        match self {
            Instance::Feistel { bits, .. } | Instance::RandomPermutation { bits, .. } => *bits,
        }
    }

    /// Short name of the instance kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Instance::Feistel { .. } => "feistel",
            Instance::RandomPermutation { .. } => "random-permutation",
        }
    }

    /// Checks widths, key ranges and table shapes.
    pub fn validate(&self) -> Result<()> {
        match self {
            Instance::Feistel {
                bits,
                keys,
                round_table,
            } => {
                check_table_bits(*bits)?;
                if round_table.bits() != *bits {
                    return Err(DetectError::InvalidInstance(format!(
                        "round table covers {} bits, expected {bits}",
                        round_table.bits()
                    )));
                }
                if keys.is_empty() {
                    return Err(DetectError::InvalidInstance("no round keys".into()));
                }
                if let Some(key) = keys.iter().find(|&&k| k >> bits != 0) {
                    return Err(DetectError::InvalidInstance(format!(
                        "round key {key:#x} wider than {bits} bits"
                    )));
                }
                round_table.validate()
            }
            Instance::RandomPermutation { bits, table } => {
                let block_bits = bits.checked_mul(2).ok_or_else(|| {
                    DetectError::InvalidInstance(format!("half width {bits} too large"))
                })?;
                if table.bits() != block_bits {
                    return Err(DetectError::InvalidInstance(format!(
                        "permutation covers {} bits, expected {block_bits}",
                        table.bits()
                    )));
                }
                table.validate()
            }
        }
    }

    /// Builds an evaluator for the instance.
    pub fn oracle(&self) -> BlockOracle {
        match self {
            Instance::Feistel {
                bits,
                keys,
                round_table,
            } => BlockOracle::Feistel(FeistelNetwork::new(
                *bits,
                TableRound::new(round_table.as_slice().to_vec()),
                KeySchedule::new(keys.clone()),
            )),
            Instance::RandomPermutation { table, .. } => BlockOracle::Permutation(table.clone()),
        }
    }

    /// Serializes the instance with `bincode`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserializes and validates an instance.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let instance: Self = bincode::deserialize(bytes)?;
        instance.validate()?;
        Ok(instance)
    }
}

/// Evaluator for an [`Instance`].
#[derive(Clone, Debug)]
pub enum BlockOracle {
    /// Feistel network.
    Feistel(FeistelNetwork<TableRound>),
    /// Lookup-table permutation.
    Permutation(PermutationTable),
}

impl BlockOracle {
    /// Maps one block.
    pub fn evaluate(&self, block: u64) -> u64 {
        match self {
            BlockOracle::Feistel(network) => network.encrypt(block),
            BlockOracle::Permutation(table) => table.apply(block),
        }
    }
}

/// Instance generator parametrized by an RNG.
pub struct InstanceGenerator<R: Rng> {
    rng: R,
}

impl<R: Rng> InstanceGenerator<R> {
    /// Creates a generator.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Generates a Feistel network with a random round table and keys.
    pub fn feistel(&mut self, bits: u32, rounds: usize) -> Result<Instance> {
        if rounds == 0 {
            return Err(DetectError::InvalidInstance("no round keys".into()));
        }
        let round_table = PermutationTable::random(&mut self.rng, bits)?;
        let keys = (0..rounds)
            .map(|_| self.rng.gen_range(0..1u64 << bits))
            .collect();
        Ok(Instance::Feistel {
            bits,
            keys,
            round_table,
        })
    }

    /// Generates a random permutation of `2·bits`-bit blocks.
    pub fn random_permutation(&mut self, bits: u32) -> Result<Instance> {
        let block_bits = bits.checked_mul(2).ok_or(DetectError::UnsupportedWidth {
            bits,
            max: MAX_TABLE_BITS / 2,
        })?;
        let table = PermutationTable::random(&mut self.rng, block_bits)?;
        Ok(Instance::RandomPermutation { bits, table })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn serialize_roundtrip() {
        let mut gen = InstanceGenerator::new(ChaCha20Rng::from_seed([60u8; 32]));
        for instance in [
            gen.feistel(4, DEFAULT_ROUNDS).unwrap(),
            gen.random_permutation(4).unwrap(),
        ] {
            let bytes = instance.to_bytes().expect("serialize");
            let decoded = Instance::from_bytes(&bytes).expect("deserialize");
            assert_eq!(decoded, instance);
        }
    }

    #[test]
    fn generated_feistel_matches_direct_network() {
        let mut gen = InstanceGenerator::new(ChaCha20Rng::from_seed([61u8; 32]));
        let instance = gen.feistel(5, 3).unwrap();
        let Instance::Feistel {
            keys, round_table, ..
        } = &instance
        else {
            panic!("expected a Feistel instance");
        };
        let oracle = instance.oracle();
        for x in [0u64, 1, 0x155, 0x3ff] {
            let f = |h: u64, k: u64| round_table.apply(h ^ k);
            let direct = feistel_core::encrypt(x, 5, &f, &KeySchedule::new(keys.clone()));
            assert_eq!(oracle.evaluate(x), direct);
        }
    }

    #[test]
    fn random_permutation_is_bijective() {
        let mut gen = InstanceGenerator::new(ChaCha20Rng::from_seed([62u8; 32]));
        let instance = gen.random_permutation(3).unwrap();
        let oracle = instance.oracle();
        let mut seen = [false; 64];
        for x in 0..64u64 {
            let y = oracle.evaluate(x) as usize;
            assert!(!seen[y]);
            seen[y] = true;
        }
    }

    #[test]
    fn tampered_instances_are_rejected() {
        let repeated = PermutationTable::from_table(2, vec![0, 1, 1, 3]);
        assert!(matches!(repeated, Err(DetectError::InvalidInstance(_))));

        let mut gen = InstanceGenerator::new(ChaCha20Rng::from_seed([63u8; 32]));
        let Instance::Feistel {
            bits, round_table, ..
        } = gen.feistel(4, 3).unwrap()
        else {
            panic!("expected a Feistel instance");
        };
        let wide_key = Instance::Feistel {
            bits,
            keys: vec![0x10],
            round_table,
        };
        let bytes = wide_key.to_bytes().unwrap();
        assert!(matches!(
            Instance::from_bytes(&bytes),
            Err(DetectError::InvalidInstance(_))
        ));
    }

    #[test]
    fn oversized_widths_in_files_are_errors() {
        let mut gen = InstanceGenerator::new(ChaCha20Rng::from_seed([65u8; 32]));
        let Instance::RandomPermutation { table, .. } = gen.random_permutation(1).unwrap() else {
            panic!("expected a random permutation");
        };
        let huge_half = Instance::RandomPermutation {
            bits: 1 << 31,
            table,
        };
        let bytes = huge_half.to_bytes().unwrap();
        assert!(matches!(
            Instance::from_bytes(&bytes),
            Err(DetectError::InvalidInstance(_))
        ));

        let Instance::Feistel {
            keys, round_table, ..
        } = gen.feistel(2, 3).unwrap()
        else {
            panic!("expected a Feistel instance");
        };
        let huge_feistel = Instance::Feistel {
            bits: 200,
            keys,
            round_table,
        };
        let bytes = huge_feistel.to_bytes().unwrap();
        assert!(matches!(
            Instance::from_bytes(&bytes),
            Err(DetectError::UnsupportedWidth { bits: 200, .. })
        ));
        assert!(matches!(
            gen.random_permutation(u32::MAX),
            Err(DetectError::UnsupportedWidth { .. })
        ));
    }

    #[test]
    fn oversized_tables_are_refused() {
        let mut gen = InstanceGenerator::new(ChaCha20Rng::from_seed([64u8; 32]));
        assert!(matches!(
            gen.random_permutation(13),
            Err(DetectError::UnsupportedWidth { bits: 26, .. })
        ));
    }
}
