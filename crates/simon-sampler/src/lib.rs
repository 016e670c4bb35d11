//! Classical stand-in for the Simon sampling subroutine.
//!
//! Simon's circuit prepares `Σ_x |x⟩|0⟩`, applies the bit-flip oracle, applies
//! Hadamards to the input register and measures. Measuring the output register
//! first does not change the input-register statistics, so a sample can be
//! drawn as:
//!
//! 1. pick `x0` uniformly and set `z = f(x0)` (the output measurement);
//! 2. let `P = f⁻¹(z)`; outcome `y` then has probability
//!    `(Σ_{p ∈ P} (-1)^{p·y})² / (|P| · 2^n)`.
//!
//! When `f` has a period `s`, `P` is a union of cosets of `{0, s}` and every
//! outcome with nonzero probability satisfies `y · s = 0`. A bijection gives
//! `|P| = 1` and a uniform outcome. The simulation is exact but costs
//! `O(2^n · |P|)` per sample.

#![forbid(unsafe_code)]

use feistel_detect::{BitflipOracle, DetectError, Measurement, Result, Sampler};
use rand::Rng;
use tracing::trace;

/// Largest input register the simulation accepts.
pub const MAX_SIMULATED_INPUT_BITS: u32 = 16;

/// Samples Simon measurements from an oracle's truth table.
pub struct SimonSampler<R> {
    rng: R,
}

impl<R: Rng> SimonSampler<R> {
    /// Creates a sampler drawing its randomness from `rng`.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draws one measurement for the function given as a truth table on `n` input bits.
    pub fn sample_table(&mut self, table: &[u64], n: u32) -> Measurement {
        let x0 = self.rng.gen_range(0..table.len());
        let output = table[x0];
        let preimages: Vec<u64> = table
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value == output)
            .map(|(x, _)| x as u64)
            .collect();

        let input = if preimages.len() == 1 {
            self.rng.gen_range(0..1u64 << n)
        } else {
            self.draw_interference(&preimages, n)
        };
        trace!(input, output, preimages = preimages.len(), "simon sample");
        Measurement { input, output }
    }

    fn draw_interference(&mut self, preimages: &[u64], n: u32) -> u64 {
        // Weights sum to |P| · 2^n by Parseval.
        let total = (preimages.len() as u64) << n;
        let mut remaining = self.rng.gen_range(0..total);
        let mut last_nonzero = 0;
        for y in 0..1u64 << n {
            let weight = interference_weight(preimages, y);
            if weight == 0 {
                continue;
            }
            if remaining < weight {
                return y;
            }
            remaining -= weight;
            last_nonzero = y;
        }
        last_nonzero
    }
}

/// Squared signed sum `(Σ_{p ∈ P} (-1)^{p·y})²`.
pub fn interference_weight(preimages: &[u64], y: u64) -> u64 {
    let signed: i64 = preimages
        .iter()
        .map(|&p| if (p & y).count_ones() % 2 == 0 { 1 } else { -1 })
        .sum();
    signed.unsigned_abs().pow(2)
}

impl<R: Rng> Sampler for SimonSampler<R> {
    fn sample(&mut self, oracle: &BitflipOracle) -> Result<Measurement> {
        let n = oracle.input_bits();
        if n > MAX_SIMULATED_INPUT_BITS {
            return Err(DetectError::UnsupportedWidth {
                bits: n,
                max: MAX_SIMULATED_INPUT_BITS,
            });
        }
        Ok(self.sample_table(oracle.truth_table(), n))
    }
}

/// Inner product of two packed vectors modulo 2.
pub fn dot(a: u64, b: u64) -> bool {
    (a & b).count_ones() % 2 == 1
}

/// Draws `samples` measurements and returns the first input with `input · secret = 1`.
///
/// `None` means every sample was orthogonal to `secret`, as Simon's algorithm
/// guarantees when `secret` is a period of the oracle's function.
pub fn find_non_orthogonal<S: Sampler>(
    sampler: &mut S,
    oracle: &BitflipOracle,
    secret: u64,
    samples: usize,
) -> Result<Option<u64>> {
    for _ in 0..samples {
        let measurement = sampler.sample(oracle)?;
        if dot(measurement.input, secret) {
            return Ok(Some(measurement.input));
        }
    }
    Ok(None)
}
