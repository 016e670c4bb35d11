//! Distinguisher controller: sampling, solving and verification.

use core::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::oracle::to_reversible;
use crate::probe::{Masks, MaskedProbe};
use crate::sampler::Sampler;
use crate::solver::{Insertion, LinearSolver};

/// Configuration for the distinguisher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Half width of the oracle's blocks.
    pub bits: u32,
    /// Consistent samples allowed per unknown before giving up.
    pub budget_factor: usize,
    /// Stop with an inconclusive verdict after this many rejected samples.
    pub max_rejections: Option<usize>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            bits: 8,
            budget_factor: 2,
            max_rejections: None,
        }
    }
}

impl DetectorConfig {
    /// Config for `bits`-wide halves with the default budget.
    pub fn for_bits(bits: u32) -> Self {
        Self {
            bits,
            ..Self::default()
        }
    }

    /// Number of non-rejected samples a run may consume.
    pub fn attempt_budget(&self) -> usize {
        self.budget_factor * self.bits as usize
    }
}

/// Outcome of a detection run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Consistent with a 3-round Feistel network.
    Feistel,
    /// Behaves like a random permutation.
    RandomPermutation,
    /// The run stopped before reaching a decision.
    Inconclusive,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Feistel => "3-round Feistel",
            Verdict::RandomPermutation => "random permutation",
            Verdict::Inconclusive => "inconclusive",
        })
    }
}

/// How the verdict was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// The system reached full rank and the candidate period was checked.
    Solved,
    /// The sample budget ran out before full rank; defaults to Feistel.
    BudgetExhausted,
    /// Too many inconsistent samples were discarded.
    RejectionLimit,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resolution::Solved => "solved equation",
            Resolution::BudgetExhausted => "sample budget exhausted",
            Resolution::RejectionLimit => "rejection limit reached",
        })
    }
}

/// Everything a run learned, beyond the bare verdict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Final verdict.
    pub verdict: Verdict,
    /// Path that produced the verdict.
    pub resolution: Resolution,
    /// Masking constants used by the probe.
    pub masks: Masks,
    /// Candidate period in encoded form, if the system was solved.
    pub secret: Option<u64>,
    /// Probe input used for the consistency check, if one was made.
    pub probe_input: Option<u64>,
    /// Samples that counted against the budget.
    pub attempts: usize,
    /// Samples discarded as inconsistent.
    pub rejected: usize,
    /// Solver rank at the end of the run.
    pub rank: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Sampling,
    Solving,
    Verifying { secret: u64 },
    Done(Verdict, Resolution),
}

/// Decides whether a block oracle is a 3-round Feistel network.
///
/// Each run owns its solver and masks; nothing is shared between runs.
pub struct Distinguisher<S, R> {
    config: DetectorConfig,
    sampler: S,
    rng: R,
}

impl<S: Sampler, R: Rng> Distinguisher<S, R> {
    /// Creates a distinguisher with the default configuration.
    pub fn new(sampler: S, rng: R) -> Self {
        Self::with_config(DetectorConfig::default(), sampler, rng)
    }

    /// Creates a distinguisher with explicit configuration.
    pub fn with_config(config: DetectorConfig, sampler: S, rng: R) -> Self {
        Self {
            config,
            sampler,
            rng,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Returns a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut DetectorConfig {
        &mut self.config
    }

    /// Returns the sampler.
    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Runs one detection against `oracle` with freshly drawn masks.
    pub fn run<V: Fn(u64) -> u64>(&mut self, oracle: V) -> Result<DetectionReport> {
        let masks = Masks::random(&mut self.rng, self.config.bits)?;
        self.run_with_masks(oracle, masks)
    }

    /// Runs one detection with fixed masks.
    pub fn run_with_masks<V: Fn(u64) -> u64>(
        &mut self,
        oracle: V,
        masks: Masks,
    ) -> Result<DetectionReport> {
        let bits = self.config.bits;
        let probe = MaskedProbe::new(bits, masks, oracle)?;
        let bitflip = to_reversible(|x| probe.evaluate(x), probe.input_bits(), bits)?;
        let mut solver = LinearSolver::new(bits as usize);
        let budget = self.config.attempt_budget();

        let mut attempts = 0usize;
        let mut rejected = 0usize;
        let mut secret = None;
        let mut probe_input = None;
        let mut phase = Phase::Sampling;

        let (verdict, resolution) = loop {
            phase = match phase {
                Phase::Sampling if attempts >= budget => {
                    Phase::Done(Verdict::Feistel, Resolution::BudgetExhausted)
                }
                Phase::Sampling => {
                    let measurement = self.sampler.sample(&bitflip)?;
                    match solver.add_encoded(measurement.input)? {
                        Insertion::Inconsistent => {
                            rejected += 1;
                            debug!(sample = measurement.input, rejected, "discarded inconsistent sample");
                            match self.config.max_rejections {
                                Some(limit) if rejected >= limit => {
                                    warn!(limit, "rejection limit reached");
                                    Phase::Done(Verdict::Inconclusive, Resolution::RejectionLimit)
                                }
                                _ => Phase::Sampling,
                            }
                        }
                        outcome => {
                            attempts += 1;
                            debug!(
                                sample = measurement.input,
                                ?outcome,
                                rank = solver.rank(),
                                attempt = attempts,
                                "added sample"
                            );
                            if solver.is_full_rank() {
                                Phase::Solving
                            } else {
                                Phase::Sampling
                            }
                        }
                    }
                }
                Phase::Solving => {
                    let candidate = solver.solve_encoded()?;
                    debug!(secret = candidate, "solved for candidate period");
                    secret = Some(candidate);
                    Phase::Verifying { secret: candidate }
                }
                Phase::Verifying { secret } => {
                    let u = self.rng.gen_range(0..1u64 << probe.input_bits());
                    probe_input = Some(u);
                    let verdict = if probe.is_period(u, secret) {
                        Verdict::Feistel
                    } else {
                        Verdict::RandomPermutation
                    };
                    Phase::Done(verdict, Resolution::Solved)
                }
                Phase::Done(verdict, resolution) => break (verdict, resolution),
            };
        };

        info!(%verdict, %resolution, attempts, rejected, "detection finished");
        Ok(DetectionReport {
            verdict,
            resolution,
            masks,
            secret,
            probe_input,
            attempts,
            rejected,
            rank: solver.rank(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectError;
    use crate::oracle::BitflipOracle;
    use crate::sampler::Measurement;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::collections::VecDeque;

    /// Replays a fixed list of input-register values.
    struct ScriptedSampler {
        script: VecDeque<u64>,
        calls: usize,
    }

    impl ScriptedSampler {
        fn new(script: &[u64]) -> Self {
            Self {
                script: script.iter().copied().collect(),
                calls: 0,
            }
        }
    }

    impl Sampler for ScriptedSampler {
        fn sample(&mut self, oracle: &BitflipOracle) -> Result<Measurement> {
            assert_eq!(oracle.input_bits(), 4);
            assert_eq!(oracle.output_bits(), 3);
            self.calls += 1;
            let input = self.script.pop_front().expect("script exhausted");
            Ok(Measurement { input, output: 0 })
        }
    }

    const BITS: u32 = 3;
    const SHIFT: u64 = 0b101;
    // Encoded period 1 | SHIFT << 1.
    const SECRET: u64 = 0b1011;
    // One sample per unit vector, each satisfying `y · SECRET = 0`.
    const UNIT_SAMPLES: [u64; 3] = [0b0011, 0b0100, 0b1001];

    fn masks() -> Masks {
        Masks::new(0, 1, BITS).unwrap()
    }

    /// Block oracle whose probe (with masks 0/1) is `a` for selector 0 and
    /// `a ⊕ SHIFT ⊕ twist` for selector 1; periodic only when `twist == 0`.
    fn toy_oracle(twist: u64) -> impl Fn(u64) -> u64 {
        move |x| {
            let a = x >> BITS;
            let m = x & 0b111;
            let high = if m == 1 { a ^ SHIFT ^ twist ^ 1 } else { a };
            (high << BITS) | m
        }
    }

    fn distinguisher(
        script: &[u64],
        config: DetectorConfig,
    ) -> Distinguisher<ScriptedSampler, ChaCha20Rng> {
        Distinguisher::with_config(
            config,
            ScriptedSampler::new(script),
            ChaCha20Rng::from_seed([50u8; 32]),
        )
    }

    #[test]
    fn periodic_probe_is_reported_as_feistel() {
        let mut d = distinguisher(&UNIT_SAMPLES, DetectorConfig::for_bits(BITS));
        let report = d.run_with_masks(toy_oracle(0), masks()).unwrap();
        assert_eq!(report.verdict, Verdict::Feistel);
        assert_eq!(report.resolution, Resolution::Solved);
        assert_eq!(report.secret, Some(SECRET));
        assert_eq!(report.attempts, 3);
        assert_eq!(report.rank, 3);
        assert!(report.probe_input.is_some());
    }

    #[test]
    fn aperiodic_probe_is_reported_as_random() {
        let mut d = distinguisher(&UNIT_SAMPLES, DetectorConfig::for_bits(BITS));
        let report = d.run_with_masks(toy_oracle(1), masks()).unwrap();
        assert_eq!(report.verdict, Verdict::RandomPermutation);
        assert_eq!(report.resolution, Resolution::Solved);
        assert_eq!(report.secret, Some(SECRET));
    }

    #[test]
    fn inconsistent_samples_do_not_consume_budget() {
        // 0b0001 reads 0 = 1; 0b0010 reads x0 = 0 after x0 = 1 was accepted.
        let script = [0b0001, 0b0011, 0b0010, 0b0100, 0b0010, 0b1001];
        let mut d = distinguisher(&script, DetectorConfig::for_bits(BITS));
        let report = d.run_with_masks(toy_oracle(0), masks()).unwrap();
        assert_eq!(report.verdict, Verdict::Feistel);
        assert_eq!(report.resolution, Resolution::Solved);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.rejected, 3);
        assert_eq!(d.sampler().calls, 6);
    }

    #[test]
    fn exhausted_budget_defaults_to_feistel() {
        let script = [0b0000; 6];
        let mut d = distinguisher(&script, DetectorConfig::for_bits(BITS));
        let report = d.run_with_masks(toy_oracle(1), masks()).unwrap();
        assert_eq!(report.verdict, Verdict::Feistel);
        assert_eq!(report.resolution, Resolution::BudgetExhausted);
        assert_eq!(report.attempts, 6);
        assert_eq!(report.rank, 0);
        assert_eq!(report.secret, None);
        assert_eq!(d.sampler().calls, 6);
    }

    #[test]
    fn full_rank_on_last_budgeted_sample_still_solves() {
        let script = [0b0000, 0b0000, 0b0000, 0b0011, 0b0100, 0b1001];
        let mut d = distinguisher(&script, DetectorConfig::for_bits(BITS));
        let report = d.run_with_masks(toy_oracle(1), masks()).unwrap();
        assert_eq!(report.resolution, Resolution::Solved);
        assert_eq!(report.verdict, Verdict::RandomPermutation);
        assert_eq!(report.attempts, 6);
    }

    #[test]
    fn rejection_limit_ends_inconclusive() {
        let config = DetectorConfig {
            max_rejections: Some(2),
            ..DetectorConfig::for_bits(BITS)
        };
        let mut d = distinguisher(&[0b0001, 0b0001], config);
        let report = d.run_with_masks(toy_oracle(0), masks()).unwrap();
        assert_eq!(report.verdict, Verdict::Inconclusive);
        assert_eq!(report.resolution, Resolution::RejectionLimit);
        assert_eq!(report.attempts, 0);
        assert_eq!(report.rejected, 2);
    }

    #[test]
    fn random_masks_respect_half_width() {
        let mut d = distinguisher(&[0; 6], DetectorConfig::for_bits(BITS));
        let report = d.run(toy_oracle(0)).unwrap();
        assert!(report.masks.alpha < 8 && report.masks.beta < 8);
    }

    #[test]
    fn invalid_width_is_reported_before_sampling() {
        let mut d = distinguisher(&[], DetectorConfig::for_bits(0));
        assert!(matches!(
            d.run(toy_oracle(0)),
            Err(DetectError::UnsupportedWidth { .. })
        ));
        assert_eq!(d.sampler().calls, 0);
    }

    #[test]
    fn default_budget_is_twice_the_width() {
        assert_eq!(DetectorConfig::default().attempt_budget(), 16);
        assert_eq!(DetectorConfig::for_bits(5).attempt_budget(), 10);
    }
}
