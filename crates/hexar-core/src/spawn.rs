// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic spawn placement.
//!
//! New characters are queued during move processing (ids already
//! allocated) and placed after movement has settled: a random point in
//! the faction's spawn disk is drawn from the block stream, then L1 rings
//! expand outward from it until a passable, unoccupied tile appears.

use hexar_geom::{Hex, L1Ring};
use tracing::warn;

use crate::character::Character;
use crate::ident::{Faction, Id};
use crate::map::MapData;
use crate::obstacles::DynObstacles;
use crate::params::Params;
use crate::rng::BlockRng;
use crate::store::Store;

/// A character bought this block, waiting for placement.
#[derive(Clone, Debug)]
pub(crate) struct PendingSpawn {
    /// Pre-allocated row id.
    pub id: Id,
    /// Owning account.
    pub owner: String,
    /// Faction of the new character.
    pub faction: Faction,
}

/// Upper bound on the ring expansion; reaching it means the map is
/// essentially full around the spawn area.
const MAX_SEARCH_RADIUS: u32 = 512;

/// Phase: place every queued spawn, in queue order.
pub(crate) fn place_spawns(
    store: &Store,
    params: &Params,
    map: &dyn MapData,
    obstacles: &mut DynObstacles,
    rng: &mut BlockRng,
    queue: &[PendingSpawn],
) {
    for spawn in queue {
        let centre = params.spawn_centre(spawn.faction);
        let d = rng.next_int(0, u64::from(params.spawn_radius)) as u32;
        let ring: Vec<Hex> = L1Ring::new(centre, d).collect();
        let idx = rng.next_int(0, ring.len() as u64 - 1) as usize;
        let start = ring[idx];

        let Some(tile) = find_free_tile(map, obstacles, start) else {
            warn!(owner = %spawn.owner, "no free spawn tile; dropping spawn");
            continue;
        };

        let mut character = Character::create(spawn.id, &spawn.owner, spawn.faction);
        character.position = Some(tile);
        store.characters.insert(character);
        obstacles.add_vehicle(tile, spawn.faction);
    }
}

fn find_free_tile(map: &dyn MapData, obstacles: &DynObstacles, start: Hex) -> Option<Hex> {
    for r in 0..=MAX_SEARCH_RADIUS {
        for tile in L1Ring::new(start, r) {
            if map.passable(tile) && obstacles.free(tile) {
                return Some(tile);
            }
        }
    }
    None
}
