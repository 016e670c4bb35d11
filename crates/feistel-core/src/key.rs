//! Round key schedule.

/// Ordered round keys of a Feistel network, immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySchedule(Box<[u64]>);

impl KeySchedule {
    /// Builds a schedule from keys in encryption order.
    pub fn new(keys: impl Into<Vec<u64>>) -> Self {
        Self(keys.into().into_boxed_slice())
    }

    /// Returns the round key at the requested index.
    #[inline]
    pub fn get(&self, round: usize) -> u64 {
        self.0[round]
    }

    /// Number of rounds.
    #[inline]
    pub fn rounds(&self) -> usize {
        self.0.len()
    }

    /// Keys in encryption order.
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }
}

impl<const R: usize> From<[u64; R]> for KeySchedule {
    fn from(value: [u64; R]) -> Self {
        Self::new(value.to_vec())
    }
}

impl From<Vec<u64>> for KeySchedule {
    fn from(value: Vec<u64>) -> Self {
        Self::new(value)
    }
}
