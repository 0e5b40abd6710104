// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Static map access.
//!
//! The real map ships as static data files owned by an outer layer; the
//! engine only needs passability and the fixed region partition. Both are
//! behind a trait so tests and regtest can run on a small procedural map.

use hexar_geom::Hex;
use rustc_hash::FxHashSet;

use crate::ident::Id;

/// Read-only static map queries.
pub trait MapData {
    /// Whether `tile` exists and is traversable terrain.
    fn passable(&self, tile: Hex) -> bool;

    /// The region containing `tile`.
    ///
    /// Regions partition the whole map; every tile maps to exactly one
    /// non-zero region id, and the partition never changes.
    fn region_id(&self, tile: Hex) -> Id;
}

/// A bounded procedural map: a passable L1 disk with a coarse axial-block
/// region tiling.
///
/// Region cells are `region_size × region_size` parallelograms in axial
/// space. That is not how the production map tiles regions, but it has the
/// same contract (fixed partition, cheap lookup) and gives tests easy
/// region boundaries.
#[derive(Clone, Debug)]
pub struct DiskMap {
    radius: u32,
    region_size: i32,
    obstacles: FxHashSet<Hex>,
}

impl DiskMap {
    /// Creates a map of the given radius with `region_size` axial tiling.
    #[must_use]
    pub fn new(radius: u32, region_size: i32) -> Self {
        assert!(region_size > 0, "region size must be positive");
        Self {
            radius,
            region_size,
            obstacles: FxHashSet::default(),
        }
    }

    /// Adds impassable terrain tiles.
    #[must_use]
    pub fn with_obstacles<I: IntoIterator<Item = Hex>>(mut self, tiles: I) -> Self {
        self.obstacles.extend(tiles);
        self
    }

    /// The map radius.
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }
}

// Offset folding signed cell coordinates into the packed id; supports cell
// coordinates in ±2^20, far beyond any real map.
const CELL_OFFSET: i64 = 1 << 20;

impl MapData for DiskMap {
    fn passable(&self, tile: Hex) -> bool {
        tile.distance(Hex::ORIGIN) <= self.radius && !self.obstacles.contains(&tile)
    }

    fn region_id(&self, tile: Hex) -> Id {
        let rx = i64::from(tile.x).div_euclid(i64::from(self.region_size)) + CELL_OFFSET;
        let ry = i64::from(tile.y).div_euclid(i64::from(self.region_size)) + CELL_OFFSET;
        // +1 keeps zero reserved for "none".
        ((rx as u64) << 21 | ry as u64) + 1
    }
}
