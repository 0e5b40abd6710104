// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! BFS distance fields and greedy step-back paths.
//!
//! Movement does not store explicit paths. Each block it recomputes a
//! distance field from the current waypoint and then steps greedily toward
//! distance zero. The field itself lives in a hash map, but it is strictly
//! query-only; the stepper consults neighbours in the fixed
//! [`DIRECTIONS`](crate::hex::DIRECTIONS) order, which makes every produced
//! path deterministic.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use thiserror::Error;

use crate::hex::Hex;

/// Errors produced when requesting a path from a distance field.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// The requested source tile has no finite distance to any origin.
    #[error("no connection from ({0}, {1})")]
    NoConnection(i32, i32),
}

/// One step of a greedy path, moving one tile closer to the origin set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    /// The tile entered by this step.
    pub to: Hex,
    /// Edge cost consumed by the step. Uniform BFS cost, always 1.
    pub cost: u32,
}

/// A BFS distance field over a bounded region.
///
/// Built from one or more origin tiles with uniform edge cost 1. The edge
/// relation is supplied by the caller (static passability, faction rules);
/// expansion stops at `limit` so the field never grows past the region a
/// caller cares about.
#[derive(Debug)]
pub struct DistanceField {
    dist: FxHashMap<Hex, u32>,
}

impl DistanceField {
    /// Computes the field from `origins` outward.
    ///
    /// `edge(from, to)` decides whether the step from `from` onto `to` is
    /// traversable. Origins always receive distance 0, even if unreachable
    /// by their own edge relation. Expansion visits neighbours in the fixed
    /// direction order, so the resulting distances are identical across
    /// platforms and runs.
    pub fn compute<E>(origins: &[Hex], limit: u32, edge: E) -> Self
    where
        E: Fn(Hex, Hex) -> bool,
    {
        let mut dist = FxHashMap::default();
        let mut queue = VecDeque::new();
        for &o in origins {
            if !dist.contains_key(&o) {
                dist.insert(o, 0);
                queue.push_back(o);
            }
        }
        while let Some(cur) = queue.pop_front() {
            let d = dist[&cur];
            if d == limit {
                continue;
            }
            for n in cur.neighbours() {
                if !dist.contains_key(&n) && edge(cur, n) {
                    dist.insert(n, d + 1);
                    queue.push_back(n);
                }
            }
        }
        Self { dist }
    }

    /// Distance of `tile` from the origin set, if the tile was reached.
    #[must_use]
    pub fn get(&self, tile: Hex) -> Option<u32> {
        self.dist.get(&tile).copied()
    }

    /// Number of tiles with a finite distance.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dist.len()
    }

    /// Whether the field is empty (no origins were supplied).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dist.is_empty()
    }

    /// Begins a greedy walk from `source` toward the origin set.
    ///
    /// Fails with [`PathError::NoConnection`] when `source` has no finite
    /// distance.
    pub fn step_path(&self, source: Hex) -> Result<StepPath<'_>, PathError> {
        if self.dist.contains_key(&source) {
            Ok(StepPath {
                field: self,
                position: source,
            })
        } else {
            Err(PathError::NoConnection(source.x, source.y))
        }
    }
}

/// Greedy descend-toward-origin iterator over a [`DistanceField`].
///
/// From any tile with a known distance the walk moves to the first
/// neighbour (in direction-table order) whose distance is strictly
/// smaller. The iterator ends at an origin tile (distance 0).
#[derive(Debug)]
pub struct StepPath<'a> {
    field: &'a DistanceField,
    position: Hex,
}

impl StepPath<'_> {
    /// The tile the walk currently stands on.
    #[must_use]
    pub const fn position(&self) -> Hex {
        self.position
    }
}

impl Iterator for StepPath<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        let here = self.field.get(self.position)?;
        if here == 0 {
            return None;
        }
        for n in self.position.neighbours() {
            if let Some(d) = self.field.get(n) {
                if d < here {
                    self.position = n;
                    return Some(Step { to: n, cost: 1 });
                }
            }
        }
        // A finite, non-zero distance always has a strictly smaller
        // neighbour by BFS construction.
        None
    }
}
