//! Feistel round functions.

/// A keyed function applied to one half of the Feistel state each round.
///
/// Any `Fn(u64, u64) -> u64` closure taking `(half, key)` is a round function.
pub trait RoundFunction {
    /// Evaluates the round function on `half` under `key`.
    fn apply(&self, half: u64, key: u64) -> u64;
}

impl<F> RoundFunction for F
where
    F: Fn(u64, u64) -> u64,
{
    #[inline]
    fn apply(&self, half: u64, key: u64) -> u64 {
        self(half, key)
    }
}

/// Table-driven round function `F(x, k) = table[x ⊕ k]`.
///
/// With a permutation table this is a minimal Pearson-style hash over one half.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRound {
    table: Box<[u64]>,
    mask: u64,
}

impl TableRound {
    /// Wraps a lookup table. The length must be a power of two.
    pub fn new(table: impl Into<Vec<u64>>) -> Self {
        let table = table.into().into_boxed_slice();
        assert!(
            table.len().is_power_of_two(),
            "round table length must be a power of two"
        );
        let mask = (table.len() - 1) as u64;
        Self { table, mask }
    }

    /// Returns the underlying table.
    pub fn table(&self) -> &[u64] {
        &self.table
    }
}

impl RoundFunction for TableRound {
    #[inline]
    fn apply(&self, half: u64, key: u64) -> u64 {
        self.table[((half ^ key) & self.mask) as usize]
    }
}
