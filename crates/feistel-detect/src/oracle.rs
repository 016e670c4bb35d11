//! Bit-flip oracle descriptions of classical functions.
//!
//! A function `f: [0, 2^n) → [0, 2^m)` becomes a reversible map on an
//! `n + m`-bit register, `|x⟩|y⟩ → |x⟩|y ⊕ f(x)⟩`. The adapter only enumerates
//! the conditional flips that realise it; executing them is the sampler's job.
//!
//! Register layout: input bit `i` is qubit `i`, output bit `j` is qubit `n + j`.

use serde::{Deserialize, Serialize};

use crate::error::{DetectError, Result};

/// Largest input register the adapter will enumerate (`2^n` evaluations).
pub const MAX_ORACLE_INPUT_BITS: u32 = 20;

/// Flip output bit `target` when the input register equals `control`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalFlip {
    /// Input value that triggers the flip.
    pub control: u64,
    /// Output bit to flip (relative to the output register).
    pub target: u32,
}

/// Gate primitives a conditional flip decomposes into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gate {
    /// Unconditional flip of one qubit.
    Not {
        /// Absolute qubit index.
        qubit: u32,
    },
    /// Flip `target` when every control qubit is set.
    MultiControlledNot {
        /// Absolute control qubit indices.
        controls: Vec<u32>,
        /// Absolute target qubit index.
        target: u32,
    },
}

impl Gate {
    /// Applies the gate to a classical basis state packed into a `u64`.
    pub fn apply_basis(&self, state: u64) -> u64 {
        match self {
            Gate::Not { qubit } => state ^ (1u64 << qubit),
            Gate::MultiControlledNot { controls, target } => {
                if controls.iter().all(|&c| (state >> c) & 1 == 1) {
                    state ^ (1u64 << target)
                } else {
                    state
                }
            }
        }
    }
}

/// Multi-controlled flip over the qubits selected by `mask`, shifted by `offset`.
///
/// A zero mask has no controls and degenerates to an unconditional flip.
pub fn masked_controlled_not(mask: u64, offset: u32, target: u32) -> Gate {
    let mut controls = Vec::with_capacity(mask.count_ones() as usize);
    let mut bits = mask;
    while bits != 0 {
        controls.push(bits.trailing_zeros() + offset);
        bits &= bits - 1;
    }
    if controls.is_empty() {
        Gate::Not { qubit: target }
    } else {
        Gate::MultiControlledNot { controls, target }
    }
}

/// Reversible description of a classical function.
///
/// The truth table is kept alongside the flips, so samplers can read the
/// function without replaying the flip list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitflipOracle {
    input_bits: u32,
    output_bits: u32,
    flips: Vec<ConditionalFlip>,
    table: Box<[u64]>,
}

/// Enumerates the conditional flips realising `function` on `input_bits → output_bits`.
///
/// Output bits at or above `output_bits` are dropped. Cost is `2^input_bits`
/// evaluations.
pub fn to_reversible<F>(function: F, input_bits: u32, output_bits: u32) -> Result<BitflipOracle>
where
    F: Fn(u64) -> u64,
{
    if input_bits > MAX_ORACLE_INPUT_BITS {
        return Err(DetectError::UnsupportedWidth {
            bits: input_bits,
            max: MAX_ORACLE_INPUT_BITS,
        });
    }
    if input_bits + output_bits > 64 {
        return Err(DetectError::UnsupportedWidth {
            bits: input_bits + output_bits,
            max: 64,
        });
    }

    let output_mask = register_mask(output_bits);
    let mut flips = Vec::new();
    let mut table = Vec::with_capacity(1usize << input_bits);
    for input in 0..1u64 << input_bits {
        let value = function(input) & output_mask;
        table.push(value);
        for target in 0..output_bits {
            if (value >> target) & 1 == 1 {
                flips.push(ConditionalFlip {
                    control: input,
                    target,
                });
            }
        }
    }
    Ok(BitflipOracle {
        input_bits,
        output_bits,
        flips,
        table: table.into_boxed_slice(),
    })
}

fn register_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

impl BitflipOracle {
    /// Input register width `n`.
    pub fn input_bits(&self) -> u32 {
        self.input_bits
    }

    /// Output register width `m`.
    pub fn output_bits(&self) -> u32 {
        self.output_bits
    }

    /// Total register width `n + m`.
    pub fn register_bits(&self) -> u32 {
        self.input_bits + self.output_bits
    }

    /// Conditional flips in enumeration order.
    pub fn flips(&self) -> &[ConditionalFlip] {
        &self.flips
    }

    /// The classical function as a table indexed by input.
    pub fn truth_table(&self) -> &[u64] {
        &self.table
    }

    /// Gate sequence for one flip: NOT the input bits that are 0 in the
    /// control value, flip the target under all input bits, undo the NOTs.
    pub fn flip_gates(&self, flip: &ConditionalFlip) -> Vec<Gate> {
        let zeros: Vec<Gate> = (0..self.input_bits)
            .filter(|&i| (flip.control >> i) & 1 == 0)
            .map(|qubit| Gate::Not { qubit })
            .collect();
        let all_inputs = (1u64 << self.input_bits) - 1;
        let mut gates = Vec::with_capacity(2 * zeros.len() + 1);
        gates.extend(zeros.iter().cloned());
        gates.push(masked_controlled_not(
            all_inputs,
            0,
            self.input_bits + flip.target,
        ));
        gates.extend(zeros);
        gates
    }

    /// Full gate sequence of the oracle.
    pub fn gates(&self) -> impl Iterator<Item = Gate> + '_ {
        self.flips.iter().flat_map(move |flip| self.flip_gates(flip))
    }

    /// Runs the gate sequence on the basis state `|x⟩|y⟩`.
    pub fn apply_basis(&self, x: u64, y: u64) -> (u64, u64) {
        let input_mask = register_mask(self.input_bits);
        let output_mask = register_mask(self.output_bits);
        let mut state = (x & input_mask) | ((y & output_mask) << self.input_bits);
        for gate in self.gates() {
            state = gate.apply_basis(state);
        }
        (state & input_mask, (state >> self.input_bits) & output_mask)
    }
}
