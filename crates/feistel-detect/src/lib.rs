//! Distinguishing 3-round Feistel networks from random permutations.
//!
//! This crate provides the classical engine of the Simon-based distinguisher:
//! an incremental GF(2) solver, the masked probe built from a block oracle,
//! the adapter that describes a classical function as a bit-flip oracle, and
//! the controller that turns samples into a verdict. The sampling subroutine
//! itself sits behind the [`Sampler`] trait.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod bitvec;
mod controller;
mod error;
mod instance;
mod oracle;
mod probe;
mod sampler;
mod solver;

pub use bitvec::BitVector;
pub use controller::{DetectionReport, DetectorConfig, Distinguisher, Resolution, Verdict};
pub use error::{DetectError, Result};
pub use instance::{
    BlockOracle, Instance, InstanceGenerator, PermutationTable, DEFAULT_ROUNDS, MAX_TABLE_BITS,
};
pub use oracle::{
    masked_controlled_not, to_reversible, BitflipOracle, ConditionalFlip, Gate,
    MAX_ORACLE_INPUT_BITS,
};
pub use probe::{MaskedProbe, Masks, MAX_PROBE_BITS};
pub use sampler::{Measurement, Sampler};
pub use solver::{Equation, Insertion, LinearSolver, MAX_ENCODED_WIDTH};
