//! Generic Feistel network model.
//!
//! This crate provides:
//! - Half-block split/join helpers for blocks packed into a `u64`.
//! - An immutable round key schedule.
//! - The [`RoundFunction`] abstraction plus a table-driven round function.
//! - Feistel encryption and decryption, free-standing or bound in a
//!   [`FeistelNetwork`].
//!
//! The model targets test instances for the distinguisher; it makes no
//! constant-time or side-channel claims.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod block;
mod cipher;
mod key;
mod round;

pub use crate::block::{half_mask, join, split, MAX_HALF_BITS};
pub use crate::cipher::{decrypt, encrypt, FeistelNetwork};
pub use crate::key::KeySchedule;
pub use crate::round::{RoundFunction, TableRound};
