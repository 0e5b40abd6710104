// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Prospecting and resource extraction.
//!
//! Prospecting is an ongoing operation that pins the character to its
//! region; at most one character may prospect a region at a time, and a
//! finished prospection blocks re-prospecting until it goes stale. Mining
//! is a per-block tick that moves units from the region's yield into the
//! miner's cargo.

use tracing::debug;

use crate::ident::{Height, Id};
use crate::map::MapData;
use crate::ongoing::{Ongoing, Op};
use crate::params::Params;
use crate::store::table::columns;
use crate::store::Store;

/// Handles a `prospect` intent for `id`.
///
/// Preconditions, all silently enforced: the character can prospect, is
/// not busy, stands on the map; the region has no live prospection (or a
/// stale one) and nobody else is prospecting it. Success clears movement,
/// marks the character busy and schedules the operation.
pub(crate) fn start_prospecting(
    store: &Store,
    params: &Params,
    map: &dyn MapData,
    height: Height,
    id: Id,
) {
    let Some(mut c) = store.characters.checkout(&id) else {
        return;
    };
    if c.busy || !c.proto.can_prospect {
        debug!(id, "dropping prospect intent of busy or unfit character");
        return;
    }
    let Some(pos) = c.position else {
        debug!(id, "dropping prospect intent inside building");
        return;
    };
    let region_id = map.region_id(pos);
    // Untouched regions have no row yet; they count as free and stale.
    let (occupied, stale) = store
        .regions
        .read(&region_id, |r| {
            (
                r.prospecting_character != 0,
                r.prospection_stale(height, params.stale_prospection_age),
            )
        })
        .unwrap_or((false, true));
    if occupied {
        debug!(id, region = region_id, "region already being prospected");
        return;
    }
    if !stale {
        debug!(id, region = region_id, "region prospection still fresh");
        return;
    }

    let mut region = store.region_mut(region_id, height);
    let op_id = store.next_id();
    store.ongoings.insert(Ongoing::for_character(
        op_id,
        id,
        height,
        height + params.prospecting_blocks,
        Op::Prospection { region: region_id },
    ));

    let region_row = region.payload_mut();
    region_row.prospecting_character = id;
    region_row.modified = height;

    let row = c.columns_mut();
    row.busy = true;
    row.ongoing = op_id;
    c.payload_mut().clear_movement();
    if let Some(m) = c.payload_mut().proto.mining.as_mut() {
        m.active = false;
    }
}

/// Handles a `mine` intent for `id`.
///
/// Requires a mining fit, an idle stationary character, and a freshly
/// prospected region with yield left.
pub(crate) fn start_mining(
    store: &Store,
    params: &Params,
    map: &dyn MapData,
    height: Height,
    id: Id,
) {
    let Some(mut c) = store.characters.checkout(&id) else {
        return;
    };
    if c.busy || !c.proto.waypoints.is_empty() {
        debug!(id, "dropping mine intent of busy or moving character");
        return;
    }
    let Some(pos) = c.position else {
        return;
    };
    if c.proto.mining.is_none() {
        debug!(id, "dropping mine intent without mining fit");
        return;
    }
    let region_id = map.region_id(pos);
    let minable = store
        .regions
        .read(&region_id, |r| {
            r.prospection.is_some()
                && !r.prospection_stale(height, params.stale_prospection_age)
                && r.resource_left > 0
        })
        .unwrap_or(false);
    if !minable {
        debug!(id, region = region_id, "region not minable");
        return;
    }
    if let Some(m) = c.payload_mut().proto.mining.as_mut() {
        m.active = true;
    }
}

/// Phase: extract resources for every actively mining character.
///
/// The yield roll is capped by the region's remaining resource and by free
/// cargo space; an empty region or a full hold stops the drill.
pub(crate) fn mining_tick(
    store: &Store,
    params: &Params,
    map: &dyn MapData,
    rng: &mut crate::rng::BlockRng,
    height: Height,
) {
    for id in store.characters.keys_with(columns::MINING) {
        let Some(mut c) = store.characters.checkout(&id) else {
            continue;
        };
        let Some(pos) = c.position else { continue };
        let Some((rate_min, rate_max)) =
            c.proto.mining.as_ref().map(|m| (m.rate_min, m.rate_max))
        else {
            continue;
        };
        let region_id = map.region_id(pos);

        let mut region = store.region_mut(region_id, height);
        let resource = region.prospection.as_ref().map(|p| p.resource.clone());
        let (Some(resource), true) = (resource, region.resource_left > 0) else {
            if let Some(m) = c.payload_mut().proto.mining.as_mut() {
                m.active = false;
            }
            continue;
        };

        let roll = rng.next_int(rate_min, rate_max);
        let free = c
            .proto
            .cargo_space
            .saturating_sub(c.proto.cargo.used_space(params));
        let extracted = roll.min(region.resource_left).min(free);
        if extracted == 0 {
            if let Some(m) = c.payload_mut().proto.mining.as_mut() {
                m.active = false;
            }
            continue;
        }

        let region_row = region.payload_mut();
        region_row.resource_left -= extracted;
        region_row.modified = height;
        c.payload_mut().proto.cargo.add(&resource, extracted);

        let owner = c.owner.clone();
        store.account_mut(&owner).payload_mut().add_xp("mining", extracted);
    }
}
