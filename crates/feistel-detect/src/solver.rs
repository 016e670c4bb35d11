//! Incremental GF(2) linear equation solver.
//!
//! Equations arrive one at a time. Each candidate is checked against the
//! independent rows accepted so far, so the rank is known after every
//! insertion and the caller can stop sampling as soon as it reaches the width.

use serde::{Deserialize, Serialize};

use crate::bitvec::BitVector;
use crate::error::{DetectError, Result};

/// Largest width accepted by the single-integer equation encoding.
pub const MAX_ENCODED_WIDTH: usize = 63;

/// One equation `coefficients · x = target (mod 2)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equation {
    coefficients: BitVector,
    target: bool,
}

impl Equation {
    /// Builds an equation from its unpacked form.
    pub fn new(coefficients: BitVector, target: bool) -> Self {
        Self {
            coefficients,
            target,
        }
    }

    /// Decodes the single-integer form: bit 0 is the target, bit `i + 1` is coefficient `i`.
    pub fn from_encoded(encoded: u64, width: usize) -> Self {
        assert!(
            width <= MAX_ENCODED_WIDTH,
            "encoded equations hold at most {MAX_ENCODED_WIDTH} coefficients"
        );
        Self {
            coefficients: BitVector::from_u64(encoded >> 1, width),
            target: encoded & 1 == 1,
        }
    }

    /// Encodes the equation back into the single-integer form, if it fits.
    pub fn encode(&self) -> Option<u64> {
        if self.width() > MAX_ENCODED_WIDTH {
            return None;
        }
        let coefficients = self.coefficients.to_u64()?;
        Some((coefficients << 1) | u64::from(self.target))
    }

    /// Coefficient vector.
    pub fn coefficients(&self) -> &BitVector {
        &self.coefficients
    }

    /// Right-hand side.
    pub fn target(&self) -> bool {
        self.target
    }

    /// Number of unknowns.
    pub fn width(&self) -> usize {
        self.coefficients.width()
    }

    /// Returns true if `solution` satisfies the equation.
    pub fn is_satisfied_by(&self, solution: &BitVector) -> bool {
        self.coefficients.dot(solution) == self.target
    }

    /// Coefficients with the target appended as the last column.
    fn augmented(&self) -> BitVector {
        let width = self.width();
        let mut row = BitVector::zero(width + 1);
        for (i, bit) in self.coefficients.iter().enumerate() {
            row.set(i, bit);
        }
        row.set(width, self.target);
        row
    }
}

/// Outcome of submitting one equation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Insertion {
    /// Linearly independent of the accepted rows; the rank grew by one.
    Independent,
    /// Implied by the accepted rows; stored as a pending row, rank unchanged.
    Redundant,
    /// Contradicts the accepted rows; rejected and not stored.
    Inconsistent,
}

impl Insertion {
    /// Returns true if the equation was rejected.
    pub fn is_inconsistent(self) -> bool {
        matches!(self, Self::Inconsistent)
    }
}

/// GF(2) system over `width` unknowns with online rank tracking.
///
/// `equations[..rank]` is the independent prefix; everything after it is a
/// pending (redundant) row.
#[derive(Clone, Debug)]
pub struct LinearSolver {
    width: usize,
    equations: Vec<Equation>,
    rank: usize,
}

impl LinearSolver {
    /// Creates an empty system over `width` unknowns.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            equations: Vec::new(),
            rank: 0,
        }
    }

    /// Number of unknowns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of linearly independent equations held.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Returns true once the system determines a unique solution.
    pub fn is_full_rank(&self) -> bool {
        self.rank == self.width
    }

    /// Stored equations, independent prefix first.
    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    /// Adds an equation given its coefficient vector and target bit.
    pub fn add_row(&mut self, coefficients: BitVector, target: bool) -> Result<Insertion> {
        self.add_equation(Equation::new(coefficients, target))
    }

    /// Adds an equation in single-integer form.
    pub fn add_encoded(&mut self, encoded: u64) -> Result<Insertion> {
        if self.width > MAX_ENCODED_WIDTH {
            return Err(DetectError::UnsupportedWidth {
                bits: self.width as u32,
                max: MAX_ENCODED_WIDTH as u32,
            });
        }
        self.add_equation(Equation::from_encoded(encoded, self.width))
    }

    /// Adds an equation, classifying it against the independent prefix.
    ///
    /// Inconsistent equations leave the solver untouched.
    pub fn add_equation(&mut self, equation: Equation) -> Result<Insertion> {
        if equation.width() != self.width {
            return Err(DetectError::WidthMismatch {
                expected: self.width,
                actual: equation.width(),
            });
        }

        let outcome = self.classify(&equation);
        match outcome {
            Insertion::Independent => {
                self.equations.push(equation);
                let last = self.equations.len() - 1;
                self.equations.swap(self.rank, last);
                self.rank += 1;
            }
            Insertion::Redundant => self.equations.push(equation),
            Insertion::Inconsistent => {}
        }
        Ok(outcome)
    }

    /// Eliminates over a snapshot of the independent rows plus `candidate`.
    ///
    /// The target bit is the last column, so an inconsistent candidate
    /// reduces to `0 … 0 | 1` and a redundant one to all zeros.
    fn classify(&self, candidate: &Equation) -> Insertion {
        let mut rows: Vec<BitVector> = self.equations[..self.rank]
            .iter()
            .map(Equation::augmented)
            .collect();
        rows.push(candidate.augmented());

        let columns = self.width + 1;
        let mut offset = 0;
        for col in 0..columns {
            let Some(pivot) = (offset..rows.len()).find(|&r| rows[r].get(col)) else {
                continue;
            };
            rows.swap(pivot, offset);
            let (head, tail) = rows.split_at_mut(offset + 1);
            let pivot_row = &head[offset];
            for row in tail.iter_mut() {
                if row.get(col) {
                    row.xor_assign(pivot_row);
                }
            }
            offset += 1;
        }

        // The prefix is independent, so only the last echelon row can vanish.
        let last = &rows[rows.len() - 1];
        match last.first_one_from(0) {
            None => Insertion::Redundant,
            Some(col) if col == self.width => Insertion::Inconsistent,
            Some(_) => Insertion::Independent,
        }
    }

    /// Returns the unique solution of a full-rank system.
    ///
    /// Works on a copy of the independent rows, so repeated calls return the
    /// same vector.
    pub fn solve(&self) -> Result<BitVector> {
        if !self.is_full_rank() {
            return Err(self.underdetermined());
        }

        let n = self.width;
        let mut rows: Vec<BitVector> = Vec::with_capacity(n);
        let mut targets: Vec<bool> = Vec::with_capacity(n);
        for equation in &self.equations[..n] {
            rows.push(equation.coefficients.clone());
            targets.push(equation.target);
        }

        for col in 0..n {
            let pivot = (col..n)
                .find(|&r| rows[r].get(col))
                .ok_or_else(|| self.underdetermined())?;
            rows.swap(pivot, col);
            targets.swap(pivot, col);
            for row in col + 1..n {
                if rows[row].get(col) {
                    let (head, tail) = rows.split_at_mut(row);
                    tail[0].xor_assign(&head[col]);
                    targets[row] ^= targets[col];
                }
            }
        }

        let mut solution = BitVector::zero(n);
        for row in (0..n).rev() {
            let mut value = targets[row];
            for col in row + 1..n {
                value ^= rows[row].get(col) & solution.get(col);
            }
            solution.set(row, value);
        }
        Ok(solution)
    }

    fn underdetermined(&self) -> DetectError {
        DetectError::UnderdeterminedSystem {
            rank: self.rank,
            width: self.width,
        }
    }

    /// Solves and returns the solution in encoded form.
    ///
    /// Bit 0 is always set and bit `i + 1` carries solution bit `i`, which is
    /// the secret string of a `width + 1`-bit Simon problem whose samples
    /// were fed in with [`LinearSolver::add_encoded`].
    pub fn solve_encoded(&self) -> Result<u64> {
        if self.width > MAX_ENCODED_WIDTH {
            return Err(DetectError::UnsupportedWidth {
                bits: self.width as u32,
                max: MAX_ENCODED_WIDTH as u32,
            });
        }
        let solution = self.solve()?;
        let mut encoded = 1u64;
        for (i, bit) in solution.iter().enumerate() {
            encoded |= u64::from(bit) << (i + 1);
        }
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn random_vector<R: RngCore>(rng: &mut R, width: usize) -> BitVector {
        let bits: Vec<bool> = (0..width).map(|_| rng.gen()).collect();
        BitVector::from_bits(&bits)
    }

    #[test]
    fn literal_three_bit_system() {
        let mut solver = LinearSolver::new(3);
        for encoded in [0b0110u64, 0b0101, 0b1001] {
            assert_eq!(solver.add_encoded(encoded).unwrap(), Insertion::Independent);
        }
        assert_eq!(solver.rank(), 3);

        let solution = solver.solve().unwrap();
        assert_eq!(solution, BitVector::from_bits(&[true, true, true]));
        for encoded in [0b0110u64, 0b0101, 0b1001] {
            assert!(Equation::from_encoded(encoded, 3).is_satisfied_by(&solution));
        }
        assert_eq!(solver.solve_encoded().unwrap(), 0b1111);
    }

    #[test]
    fn contradiction_is_rejected_without_changing_rank() {
        let mut solver = LinearSolver::new(3);
        solver.add_encoded(0b0110).unwrap();
        solver.add_encoded(0b0101).unwrap();
        assert_eq!(solver.rank(), 2);

        // x0 ^ x1 = 1 contradicts x0 ^ x1 = 0.
        assert_eq!(solver.add_encoded(0b0111).unwrap(), Insertion::Inconsistent);
        // x0 = 1 follows from the first two rows.
        assert_eq!(solver.add_encoded(0b0011).unwrap(), Insertion::Redundant);
        assert_eq!(solver.add_encoded(0b0010).unwrap(), Insertion::Inconsistent);
        assert_eq!(solver.rank(), 2);
        assert_eq!(solver.equations().len(), 3);
    }

    #[test]
    fn zero_equals_one_is_inconsistent_on_empty_system() {
        let mut solver = LinearSolver::new(4);
        assert_eq!(solver.add_encoded(0b1).unwrap(), Insertion::Inconsistent);
        assert_eq!(solver.add_encoded(0b0).unwrap(), Insertion::Redundant);
        assert_eq!(solver.rank(), 0);
    }

    #[test]
    fn solve_requires_full_rank() {
        let mut solver = LinearSolver::new(3);
        solver.add_encoded(0b0110).unwrap();
        match solver.solve() {
            Err(DetectError::UnderdeterminedSystem { rank, width }) => {
                assert_eq!((rank, width), (1, 3));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn width_mismatch_is_an_error() {
        let mut solver = LinearSolver::new(3);
        let err = solver
            .add_row(BitVector::zero(4), false)
            .expect_err("width 4 into width 3");
        assert!(matches!(
            err,
            DetectError::WidthMismatch {
                expected: 3,
                actual: 4
            }
        ));
    }

    #[test]
    fn random_consistent_systems_recover_the_secret() {
        let mut rng = ChaCha20Rng::from_seed([30u8; 32]);
        for width in [1usize, 5, 16, 70] {
            let secret = random_vector(&mut rng, width);
            let mut solver = LinearSolver::new(width);
            let mut submitted = Vec::new();
            let mut previous_rank = 0;
            while !solver.is_full_rank() {
                let coefficients = random_vector(&mut rng, width);
                let target = coefficients.dot(&secret);
                let equation = Equation::new(coefficients, target);
                let outcome = solver.add_equation(equation.clone()).unwrap();
                assert_ne!(outcome, Insertion::Inconsistent);
                assert!(solver.rank() >= previous_rank);
                assert!(solver.rank() <= width);
                previous_rank = solver.rank();
                submitted.push(equation);
            }

            let solution = solver.solve().unwrap();
            assert_eq!(solution, secret);
            assert!(submitted.iter().all(|eq| eq.is_satisfied_by(&solution)));
        }
    }

    #[test]
    fn full_rank_system_only_accepts_implied_equations() {
        let mut rng = ChaCha20Rng::from_seed([31u8; 32]);
        let width = 8;
        let secret = random_vector(&mut rng, width);
        let mut solver = LinearSolver::new(width);
        while !solver.is_full_rank() {
            let coefficients = random_vector(&mut rng, width);
            let target = coefficients.dot(&secret);
            solver.add_row(coefficients, target).unwrap();
        }
        for _ in 0..64 {
            let coefficients = random_vector(&mut rng, width);
            let target = coefficients.dot(&secret);
            let flipped = solver.add_row(coefficients.clone(), !target).unwrap();
            let kept = solver.add_row(coefficients, target).unwrap();
            assert_eq!(flipped, Insertion::Inconsistent);
            assert_eq!(kept, Insertion::Redundant);
        }
        assert_eq!(solver.rank(), width);
    }

    #[test]
    fn solve_is_idempotent() {
        let mut solver = LinearSolver::new(3);
        for encoded in [0b1001u64, 0b0110, 0b0101, 0b0000] {
            solver.add_encoded(encoded).unwrap();
        }
        let before = solver.equations().to_vec();
        let first = solver.solve().unwrap();
        let second = solver.solve().unwrap();
        assert_eq!(first, second);
        assert_eq!(solver.equations(), &before[..]);
    }

    #[test]
    fn encoding_roundtrip() {
        let equation = Equation::from_encoded(0b1011, 3);
        assert!(equation.target());
        assert_eq!(equation.coefficients(), &BitVector::from_u64(0b101, 3));
        assert_eq!(equation.encode(), Some(0b1011));
    }
}
