// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Movement: waypoint stepping, building entry and exit.
//!
//! Speed is credited into a millitile accumulator each block; every full
//! 1000 millitiles buys one step along a freshly computed distance field
//! toward the current waypoint. Static terrain and building tiles shape
//! the field; vehicles are checked per step, so a tile freed earlier in
//! the same phase can be entered later in it.

use hexar_geom::{DistanceField, Hex, L1Ring};
use tracing::{debug, trace};

use crate::ident::{Faction, Id};
use crate::map::MapData;
use crate::obstacles::DynObstacles;
use crate::params::Params;
use crate::store::table::columns;
use crate::store::Store;

/// Extra search slack beyond the straight-line distance when computing the
/// per-waypoint field: detours longer than this count as no connection.
const PATH_SLACK: u32 = 10;

/// Millitiles per tile step.
const STEP_COST: u32 = 1000;

/// Phase: advance every moving character.
pub(crate) fn step_characters(
    store: &Store,
    params: &Params,
    map: &dyn MapData,
    obstacles: &mut DynObstacles,
) {
    for id in store.characters.keys_with(columns::MOVING) {
        step_one(store, params, map, obstacles, id);
    }
}

fn step_one(
    store: &Store,
    params: &Params,
    map: &dyn MapData,
    obstacles: &mut DynObstacles,
    id: Id,
) {
    let Some(mut c) = store.characters.checkout(&id) else {
        return;
    };
    let Some(mut pos) = c.position else {
        // Inside a building; stale queue, just drop it.
        c.payload_mut().proto.waypoints.clear();
        return;
    };
    let faction = c.faction;
    let speed = c.effective_speed(params.min_speed);
    c.columns_mut().partial_step += speed;

    while c.partial_step >= STEP_COST {
        let Some(&waypoint) = c.proto.waypoints.first() else {
            break;
        };
        if pos == waypoint {
            c.payload_mut().proto.waypoints.remove(0);
            continue;
        }

        let limit = pos.distance(waypoint) + PATH_SLACK;
        let field = DistanceField::compute(&[waypoint], limit, |_, to| {
            map.passable(to) && !obstacles.building_at(to)
        });
        // The field seeds its origin even when the origin itself is not
        // traversable (a waypoint on a foundation tile), so the step
        // target is re-checked against both obstacle kinds here.
        let next = field
            .step_path(pos)
            .ok()
            .and_then(|mut walk| walk.next())
            .filter(|step| {
                obstacles.vehicle_at(step.to).is_none() && !obstacles.building_at(step.to)
            });

        match next {
            Some(step) => {
                obstacles.move_vehicle(pos, step.to, faction);
                pos = step.to;
                let row = c.columns_mut();
                row.position = Some(step.to);
                row.partial_step -= STEP_COST * step.cost;
                row.blocked_turns = 0;
                if pos == waypoint {
                    c.payload_mut().proto.waypoints.remove(0);
                }
            }
            None => {
                // Blocked by a vehicle or no connection at all. Wait a few
                // blocks, then give the waypoint up.
                let patience = params.blocked_step_patience;
                let row = c.columns_mut();
                row.blocked_turns += 1;
                if row.blocked_turns > patience {
                    debug!(id, "dropping unreachable waypoint");
                    let payload = c.payload_mut();
                    payload.proto.waypoints.remove(0);
                    payload.blocked_turns = 0;
                }
                break;
            }
        }
    }

    if c.proto.waypoints.is_empty() {
        let row = c.columns_mut();
        row.partial_step = 0;
        row.blocked_turns = 0;
    }
}

/// Phase: resolve enter-building intents, after all steps of the block.
///
/// A character adjacent to (or on a tile of) its target building is
/// teleported inside: position cleared, movement dropped, intent consumed.
/// Intents against vanished or no-longer-enterable buildings are dropped.
pub(crate) fn resolve_building_entries(
    store: &Store,
    params: &Params,
    obstacles: &mut DynObstacles,
) {
    for id in store.characters.keys() {
        let wants = store
            .characters
            .read(&id, |c| (c.enter_building != 0).then_some(c.enter_building))
            .flatten();
        let Some(target) = wants else { continue };

        let Some(mut c) = store.characters.checkout(&id) else {
            continue;
        };
        let Some(pos) = c.position else {
            c.columns_mut().enter_building = 0;
            continue;
        };

        let enterable = store
            .buildings
            .read(&target, |b| {
                (!b.foundation && b.faction == c.faction).then(|| b.range_to(params, pos))
            })
            .flatten();
        match enterable {
            None => {
                c.columns_mut().enter_building = 0;
            }
            Some(range) if range <= 1 => {
                trace!(id, building = target, "character enters building");
                obstacles.remove_vehicle(pos);
                let row = c.columns_mut();
                row.position = None;
                row.building_id = target;
                row.enter_building = 0;
                c.payload_mut().clear_movement();
            }
            Some(_) => {}
        }
    }
}

/// Finds the first free tile around a building, scanning rings outward
/// from the centre in the fixed ring order.
pub(crate) fn free_tile_around(
    map: &dyn MapData,
    obstacles: &DynObstacles,
    centre: Hex,
    max_radius: u32,
) -> Option<Hex> {
    for r in 1..=max_radius {
        for tile in L1Ring::new(centre, r) {
            if map.passable(tile) && obstacles.free(tile) {
                return Some(tile);
            }
        }
    }
    None
}

/// Applies an exit-building intent: places the character on a free tile
/// adjacent to the building it is inside.
///
/// Invalid while not inside a building (in particular, an `eb` intent in
/// the same move has not teleported the character yet, so `eb` plus `xb`
/// resolves to enter-only).
pub(crate) fn exit_building(
    store: &Store,
    params: &Params,
    map: &dyn MapData,
    obstacles: &mut DynObstacles,
    id: Id,
) {
    let Some(mut c) = store.characters.checkout(&id) else {
        return;
    };
    if c.building_id == 0 || c.busy {
        debug!(id, "dropping exit intent of character not idle inside");
        return;
    }
    let centre = store.buildings.read(&c.building_id, |b| b.centre);
    let Some(centre) = centre else {
        return;
    };
    let faction: Faction = c.faction;
    // Shape radii are small; scanning a handful of rings is plenty.
    let Some(tile) = free_tile_around(map, obstacles, centre, 6) else {
        debug!(id, "no free tile to exit onto");
        return;
    };
    obstacles.add_vehicle(tile, faction);
    let row = c.columns_mut();
    row.position = Some(tile);
    row.building_id = 0;
}
