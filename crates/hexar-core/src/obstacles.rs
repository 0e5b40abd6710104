// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The per-block dynamic obstacle map.
//!
//! Built once at block start from the character and building tables, then
//! kept current by the phases that move vehicles, place foundations or
//! process kills. Building tiles never change mid-block except for newly
//! founded foundations, which start blocking the moment the founding
//! intent succeeds.

use hexar_geom::Hex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ident::Faction;
use crate::params::Params;
use crate::store::Store;

/// Tile occupancy for one block.
#[derive(Debug, Default)]
pub struct DynObstacles {
    vehicles: FxHashMap<Hex, Faction>,
    building_tiles: FxHashSet<Hex>,
}

impl DynObstacles {
    /// Builds the map from current character positions and building
    /// footprints.
    #[must_use]
    pub fn build(store: &Store, params: &Params) -> Self {
        let mut out = Self::default();
        for id in store.characters.keys() {
            store.characters.read(&id, |c| {
                if let Some(pos) = c.position {
                    out.vehicles.insert(pos, c.faction);
                }
            });
        }
        for id in store.buildings.keys() {
            store.buildings.read(&id, |b| {
                out.building_tiles.extend(b.tiles(params));
            });
        }
        out
    }

    /// Faction of the vehicle on `tile`, if any.
    #[must_use]
    pub fn vehicle_at(&self, tile: Hex) -> Option<Faction> {
        self.vehicles.get(&tile).copied()
    }

    /// Whether a building occupies `tile`.
    #[must_use]
    pub fn building_at(&self, tile: Hex) -> bool {
        self.building_tiles.contains(&tile)
    }

    /// Whether `tile` is free of vehicles and buildings alike.
    #[must_use]
    pub fn free(&self, tile: Hex) -> bool {
        !self.building_at(tile) && self.vehicle_at(tile).is_none()
    }

    /// Moves a vehicle one step.
    pub fn move_vehicle(&mut self, from: Hex, to: Hex, faction: Faction) {
        self.vehicles.remove(&from);
        self.vehicles.insert(to, faction);
    }

    /// Registers a newly placed vehicle.
    pub fn add_vehicle(&mut self, at: Hex, faction: Faction) {
        self.vehicles.insert(at, faction);
    }

    /// Removes a vehicle (killed or entered a building).
    pub fn remove_vehicle(&mut self, at: Hex) {
        self.vehicles.remove(&at);
    }

    /// Registers the tiles of a newly founded foundation.
    pub fn add_building_tiles<I: IntoIterator<Item = Hex>>(&mut self, tiles: I) {
        self.building_tiles.extend(tiles);
    }
}
