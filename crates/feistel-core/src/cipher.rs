//! Feistel encryption and decryption over `2·bits`-bit blocks.

use crate::block::{half_mask, join, split, MAX_HALF_BITS};
use crate::key::KeySchedule;
use crate::round::RoundFunction;

/// Encrypts `input` with one Feistel round per key, in schedule order.
///
/// Each round maps `(L, R)` to `(R, L ⊕ F(R, k))`. Round-function output is
/// truncated to `bits`, so `F` may return arbitrary wide values.
pub fn encrypt<F: RoundFunction + ?Sized>(
    input: u64,
    bits: u32,
    round_fn: &F,
    keys: &KeySchedule,
) -> u64 {
    let mask = half_mask(bits);
    let (mut left, mut right) = split(input, bits);
    for &key in keys.as_slice() {
        let next_right = (left ^ round_fn.apply(right, key)) & mask;
        left = right;
        right = next_right;
    }
    join(left, right, bits)
}

/// Decrypts `input`, walking the schedule backwards.
///
/// Each round maps `(L, R)` to `(R ⊕ F(L, k), L)`. This inverts [`encrypt`] for
/// every round function, invertible or not.
pub fn decrypt<F: RoundFunction + ?Sized>(
    input: u64,
    bits: u32,
    round_fn: &F,
    keys: &KeySchedule,
) -> u64 {
    let mask = half_mask(bits);
    let (mut left, mut right) = split(input, bits);
    for &key in keys.as_slice().iter().rev() {
        let prev_left = (right ^ round_fn.apply(left, key)) & mask;
        right = left;
        left = prev_left;
    }
    join(left, right, bits)
}

/// A Feistel network with its round function and keys bound.
#[derive(Clone, Debug)]
pub struct FeistelNetwork<F> {
    bits: u32,
    round_fn: F,
    keys: KeySchedule,
}

impl<F: RoundFunction> FeistelNetwork<F> {
    /// Binds a round function and key schedule for `bits`-wide halves.
    ///
    /// # Panics
    ///
    /// Panics if `bits` exceeds [`MAX_HALF_BITS`].
    pub fn new(bits: u32, round_fn: F, keys: KeySchedule) -> Self {
        assert!(
            bits <= MAX_HALF_BITS,
            "half width {bits} exceeds {MAX_HALF_BITS} bits"
        );
        Self {
            bits,
            round_fn,
            keys,
        }
    }

    /// Half width in bits.
    pub fn half_bits(&self) -> u32 {
        self.bits
    }

    /// Number of rounds.
    pub fn rounds(&self) -> usize {
        self.keys.rounds()
    }

    /// Round function.
    pub fn round_fn(&self) -> &F {
        &self.round_fn
    }

    /// Key schedule.
    pub fn keys(&self) -> &KeySchedule {
        &self.keys
    }

    /// Encrypts one block.
    pub fn encrypt(&self, input: u64) -> u64 {
        encrypt(input, self.bits, &self.round_fn, &self.keys)
    }

    /// Decrypts one block.
    pub fn decrypt(&self, input: u64) -> u64 {
        decrypt(input, self.bits, &self.round_fn, &self.keys)
    }
}
