//! Masked probe function built from a block oracle.
//!
//! For a block oracle `V` on `2·bits`-bit blocks and constants `(alpha, beta)`,
//! the probe maps `x = (a, b)` (with `b` the low selector bit) to
//! `high(V(a ‖ m_b)) ⊕ m_b`, where `m_0 = alpha` and `m_1 = beta`.
//!
//! If `V` is a 3-round Feistel network with round keys `k0, k1, k2`, the probe
//! collapses to `F(a ⊕ F(m_b, k0), k1)`, so `probe(x) = probe(x ⊕ s)` for
//! `s = 1 | (F(alpha, k0) ⊕ F(beta, k0)) << 1`. A random permutation has no
//! such period except with negligible probability.

use feistel_core::{half_mask, MAX_HALF_BITS};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DetectError, Result};

/// Masking constants chosen once per detection run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Masks {
    /// Mask used when the selector bit is 0.
    pub alpha: u64,
    /// Mask used when the selector bit is 1.
    pub beta: u64,
}

impl Masks {
    /// Validates both masks against the half width.
    pub fn new(alpha: u64, beta: u64, bits: u32) -> Result<Self> {
        check_half_bits(bits)?;
        let mask = half_mask(bits);
        for value in [alpha, beta] {
            if value & !mask != 0 {
                return Err(DetectError::MaskOutOfRange { value, bits });
            }
        }
        Ok(Self { alpha, beta })
    }

    /// Draws both masks uniformly from `[0, 2^bits)`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, bits: u32) -> Result<Self> {
        check_half_bits(bits)?;
        let mask = half_mask(bits);
        Ok(Self {
            alpha: rng.gen_range(0..=mask),
            beta: rng.gen_range(0..=mask),
        })
    }

    /// Returns the mask selected by the low bit of `selector`.
    #[inline]
    pub fn select(&self, selector: u64) -> u64 {
        if selector & 1 == 1 {
            self.beta
        } else {
            self.alpha
        }
    }
}

/// Largest half width a probe supports: its input `bits + 1` must stay encodable.
pub const MAX_PROBE_BITS: u32 = MAX_HALF_BITS - 1;

fn check_half_bits(bits: u32) -> Result<()> {
    if bits == 0 || bits > MAX_PROBE_BITS {
        return Err(DetectError::UnsupportedWidth {
            bits,
            max: MAX_PROBE_BITS,
        });
    }
    Ok(())
}

/// The probe `[0, 2^(bits+1)) → [0, 2^bits)` over a block oracle.
#[derive(Clone, Debug)]
pub struct MaskedProbe<V> {
    bits: u32,
    masks: Masks,
    oracle: V,
}

impl<V: Fn(u64) -> u64> MaskedProbe<V> {
    /// Wraps `oracle`, a function on `2·bits`-bit blocks.
    pub fn new(bits: u32, masks: Masks, oracle: V) -> Result<Self> {
        let masks = Masks::new(masks.alpha, masks.beta, bits)?;
        Ok(Self {
            bits,
            masks,
            oracle,
        })
    }

    /// Half width of the underlying oracle.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Input width of the probe (`bits + 1`).
    pub fn input_bits(&self) -> u32 {
        self.bits + 1
    }

    /// Masking constants.
    pub fn masks(&self) -> Masks {
        self.masks
    }

    /// Evaluates the probe on `x`; bits above `bits + 1` are ignored.
    pub fn evaluate(&self, x: u64) -> u64 {
        let half = half_mask(self.bits);
        let a = (x >> 1) & half;
        let mask = self.masks.select(x);
        let w = ((self.oracle)((a << self.bits) | mask) >> self.bits) & half;
        w ^ mask
    }

    /// Returns true if `probe(u) == probe(u ⊕ secret)`.
    pub fn is_period(&self, u: u64, secret: u64) -> bool {
        self.evaluate(u) == self.evaluate(u ^ secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feistel_core::{FeistelNetwork, KeySchedule, RoundFunction, TableRound};
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn random_network(rng: &mut ChaCha20Rng, bits: u32) -> FeistelNetwork<TableRound> {
        let mut table: Vec<u64> = (0..1u64 << bits).collect();
        table.shuffle(rng);
        let keys: Vec<u64> = (0..3).map(|_| rng.gen_range(0..1u64 << bits)).collect();
        FeistelNetwork::new(bits, TableRound::new(table), KeySchedule::from(keys))
    }

    #[test]
    fn mask_selection_follows_low_bit() {
        let masks = Masks::new(0x3, 0xc, 4).unwrap();
        assert_eq!(masks.select(0b10), 0x3);
        assert_eq!(masks.select(0b11), 0xc);
    }

    #[test]
    fn masks_must_fit_half_width() {
        assert!(matches!(
            Masks::new(0x10, 0, 4),
            Err(DetectError::MaskOutOfRange { value: 0x10, bits: 4 })
        ));
        assert!(Masks::new(0xf, 0xf, 4).is_ok());
        assert!(matches!(
            Masks::new(0, 0, 0),
            Err(DetectError::UnsupportedWidth { .. })
        ));
    }

    #[test]
    fn probe_on_identity_oracle_returns_high_input_half() {
        let masks = Masks::new(0x5, 0xa, 4).unwrap();
        let probe = MaskedProbe::new(4, masks, |x: u64| x).unwrap();
        // a = 0b1011, b = 0: V(a ‖ alpha) = a ‖ alpha, high half a, xor alpha.
        assert_eq!(probe.evaluate(0b1011_0), 0b1011 ^ 0x5);
        assert_eq!(probe.evaluate(0b1011_1), 0b1011 ^ 0xa);
        assert_eq!(probe.input_bits(), 5);
    }

    #[test]
    fn three_round_feistel_probe_has_predicted_period() {
        let mut rng = ChaCha20Rng::from_seed([40u8; 32]);
        for bits in [3u32, 6, 8] {
            let network = random_network(&mut rng, bits);
            let masks = Masks::random(&mut rng, bits).unwrap();
            let k0 = network.keys().get(0);
            let f1 = |m: u64| network.round_fn().apply(m, k0);
            let secret = 1 | ((f1(masks.alpha) ^ f1(masks.beta)) << 1);

            let probe = MaskedProbe::new(bits, masks, |x| network.encrypt(x)).unwrap();
            for u in 0..1u64 << (bits + 1) {
                assert!(probe.is_period(u, secret), "u = {u:#x}, bits = {bits}");
            }
        }
    }

    #[test]
    fn three_round_feistel_probe_is_two_to_one() {
        let mut rng = ChaCha20Rng::from_seed([41u8; 32]);
        let bits = 5;
        let network = random_network(&mut rng, bits);
        let masks = Masks::random(&mut rng, bits).unwrap();
        let probe = MaskedProbe::new(bits, masks, |x| network.encrypt(x)).unwrap();
        let mut counts = vec![0usize; 1 << bits];
        for u in 0..1u64 << (bits + 1) {
            counts[probe.evaluate(u) as usize] += 1;
        }
        assert!(counts.iter().all(|&c| c == 2));
    }
}
