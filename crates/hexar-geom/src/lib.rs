// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hexar geometry primitives.
//!
//! This crate provides:
//! - Axial hex coordinates with L1 metric (`Hex`).
//! - Exact-distance ring iteration (`L1Ring`).
//! - A BFS distance field over a bounded region with a greedy
//!   descend-toward-origin stepper (`DistanceField`, `StepPath`).
//!
//! Design notes:
//! - Deterministic: neighbour enumeration order is fixed and doubles as the
//!   tie-breaker for every consumer; no ambient RNG, no floats.
//! - The distance field is the only place a hash map appears, and it is
//!   query-only; all iteration that affects outputs walks fixed orders.
#![forbid(unsafe_code)]

/// Axial hex coordinates and the fixed neighbour order.
pub mod hex;
/// Iteration over all hexes at an exact L1 distance.
pub mod ring;
/// BFS distance fields and greedy step-back paths.
pub mod path;

pub use hex::{Hex, DIRECTIONS};
pub use path::{DistanceField, PathError, Step, StepPath};
pub use ring::L1Ring;
