//! Fixed-width bit vectors over GF(2), packed into `u64` segments.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Fixed-width bit vector; bit `i` lives in segment `i / 64` at offset `i % 64`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVector {
    segments: Vec<u64>,
    width: usize,
}

impl BitVector {
    /// Returns the all-zero vector of the given width.
    pub fn zero(width: usize) -> Self {
        Self {
            segments: vec![0u64; width.div_ceil(64)],
            width,
        }
    }

    /// Builds a vector from the low `width` bits of `value` (bit `i` ↦ component `i`).
    pub fn from_u64(value: u64, width: usize) -> Self {
        assert!(width <= 64, "width {width} does not fit in a u64");
        let mut out = Self::zero(width);
        if width > 0 {
            let mask = if width == 64 {
                u64::MAX
            } else {
                (1u64 << width) - 1
            };
            out.segments[0] = value & mask;
        }
        out
    }

    /// Builds a vector from individual components.
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut out = Self::zero(bits.len());
        for (i, &bit) in bits.iter().enumerate() {
            out.set(i, bit);
        }
        out
    }

    /// Packs the vector into a `u64`; `None` if it is wider than 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        match self.width {
            0 => Some(0),
            1..=64 => Some(self.segments[0]),
            _ => None,
        }
    }

    /// Number of components.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Reads component `index`.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.width, "bit index out of range");
        (self.segments[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Writes component `index`.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.width, "bit index out of range");
        let mask = 1u64 << (index % 64);
        if value {
            self.segments[index / 64] |= mask;
        } else {
            self.segments[index / 64] &= !mask;
        }
    }

    /// Adds `other` in place (component-wise XOR).
    pub fn xor_assign(&mut self, other: &Self) {
        debug_assert_eq!(self.width, other.width);
        for (d, s) in self.segments.iter_mut().zip(other.segments.iter()) {
            *d ^= *s;
        }
    }

    /// Inner product modulo 2.
    pub fn dot(&self, other: &Self) -> bool {
        debug_assert_eq!(self.width, other.width);
        let mut acc = 0u32;
        for (a, b) in self.segments.iter().zip(other.segments.iter()) {
            acc ^= (a & b).count_ones();
        }
        acc & 1 == 1
    }

    /// Returns true if every component is zero.
    pub fn is_zero(&self) -> bool {
        self.segments.iter().all(|&s| s == 0)
    }

    /// Index of the first set component at or after `from`, if any.
    pub fn first_one_from(&self, from: usize) -> Option<usize> {
        (from..self.width).find(|&i| self.get(i))
    }

    /// Iterates over the components in order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.width).map(move |i| self.get(i))
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({self})")
    }
}

/// Components in index order, component 0 first.
impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}
