//! Error types for the distinguisher.

use thiserror::Error;

/// Failures surfaced by the solver, probe, oracle adapter and instances.
#[derive(Error, Debug)]
pub enum DetectError {
    /// An equation or vector does not match the solver width.
    #[error("equation width mismatch: expected {expected}, got {actual}")]
    WidthMismatch {
        /// Width the solver was built for.
        expected: usize,
        /// Width that was supplied.
        actual: usize,
    },

    /// `solve` was called before the system reached full rank.
    #[error("system is underdetermined: rank {rank} of {width}")]
    UnderdeterminedSystem {
        /// Current rank.
        rank: usize,
        /// Required rank.
        width: usize,
    },

    /// A masking constant does not fit in the half width.
    #[error("mask {value:#x} does not fit in {bits} bits")]
    MaskOutOfRange {
        /// Offending mask.
        value: u64,
        /// Half width.
        bits: u32,
    },

    /// A half width or register width outside the supported range.
    #[error("unsupported width {bits} (maximum {max})")]
    UnsupportedWidth {
        /// Requested width.
        bits: u32,
        /// Largest supported width.
        max: u32,
    },

    /// Serialising or deserialising an instance failed.
    #[error("instance encoding failed: {0}")]
    InstanceEncoding(#[from] bincode::Error),

    /// A deserialised instance violates its own invariants.
    #[error("invalid instance: {0}")]
    InvalidInstance(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, DetectError>;
