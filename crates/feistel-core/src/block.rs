//! Half-block helpers for `2·bits`-wide Feistel states packed into a `u64`.

/// Largest supported half width; a full block must fit in a `u64`.
pub const MAX_HALF_BITS: u32 = 32;

/// Returns the mask selecting the low `bits` bits.
#[inline]
pub fn half_mask(bits: u32) -> u64 {
    assert!(
        bits <= MAX_HALF_BITS,
        "half width {bits} exceeds {MAX_HALF_BITS} bits"
    );
    (1u64 << bits) - 1
}

/// Splits a block into `(left, right)`, the left half being the high `bits` bits.
#[inline]
pub fn split(block: u64, bits: u32) -> (u64, u64) {
    let mask = half_mask(bits);
    ((block >> bits) & mask, block & mask)
}

/// Joins two halves back into a block.
#[inline]
pub fn join(left: u64, right: u64, bits: u32) -> u64 {
    let mask = half_mask(bits);
    ((left & mask) << bits) | (right & mask)
}
