//! Boundary to the external sampling subroutine.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::oracle::BitflipOracle;

/// One measurement of both registers after a sampling round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Input register, the vector the controller feeds to the solver.
    pub input: u64,
    /// Output register.
    pub output: u64,
}

/// Source of Simon-style samples for a bit-flip oracle.
///
/// If the oracle's function has a hidden XOR period `s`, every returned
/// `input` must satisfy `input · s = 0 (mod 2)`; otherwise the inputs should
/// be close to uniform. Any implementation meeting this contract can drive the
/// [`Distinguisher`](crate::Distinguisher).
pub trait Sampler {
    /// Draws one measurement for `oracle`.
    fn sample(&mut self, oracle: &BitflipOracle) -> Result<Measurement>;
}

impl<S: Sampler + ?Sized> Sampler for &mut S {
    fn sample(&mut self, oracle: &BitflipOracle) -> Result<Measurement> {
        (**self).sample(oracle)
    }
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    fn sample(&mut self, oracle: &BitflipOracle) -> Result<Measurement> {
        (**self).sample(oracle)
    }
}
