// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Combat: target acquisition, damage, kills and regeneration.
//!
//! Characters and buildings fight through the same code paths; a
//! [`TargetKey`] tags which table a fighter lives in and `(kind, id)`
//! ascending is the canonical iteration order everywhere in this module.
//!
//! Phase ordering inside a block is load-bearing: targets are acquired
//! before damage so two mutually-lethal fighters both die; kills are
//! enqueued during damage and only processed afterwards so identity
//! resolution stays stable; regeneration runs after kills so the dead do
//! not regenerate. Effects applied by hits become active the *next* block.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use hexar_geom::{Hex, L1Ring};
use tracing::trace;

use crate::dex;
use crate::ident::{Faction, Height, Id};
use crate::obstacles::DynObstacles;
use crate::ongoing::Op;
use crate::params::Params;
use crate::proto::{ActiveEffects, Attack, FighterKind, Hp, TargetKey};
use crate::rng::BlockRng;
use crate::store::table::columns;
use crate::store::Store;

/// Result of the damage phase: enqueued kills and the effects staged for
/// the next block.
#[derive(Debug, Default)]
pub(crate) struct CombatOutcome {
    /// Fighters whose HP reached zero, in detection order.
    pub kills: Vec<TargetKey>,
    /// Per-character effects that activate next block.
    pub staged_effects: BTreeMap<Id, ActiveEffects>,
}

/// Armed fighters in `(kind, id)` ascending order.
///
/// Characters inside buildings are excluded: they can neither attack nor
/// be attacked.
fn armed_fighters(store: &Store) -> Vec<TargetKey> {
    let mut out = Vec::new();
    for id in store.characters.keys_with(columns::ARMED) {
        let on_map = store
            .characters
            .read(&id, |c| c.position.is_some())
            .unwrap_or(false);
        if on_map {
            out.push(TargetKey::character(id));
        }
    }
    for id in store.buildings.keys_with(columns::ARMED) {
        out.push(TargetKey::building(id));
    }
    out
}

/// All targetable fighters' data needed during the phases.
struct FighterView {
    faction: Faction,
    pos: Hex,
    attacks: Vec<Attack>,
    effects: ActiveEffects,
    target: Option<TargetKey>,
    friendly_target: Option<TargetKey>,
}

fn view(store: &Store, key: TargetKey) -> Option<FighterView> {
    match key.kind {
        FighterKind::Character => store.characters.read(&key.id, |c| {
            c.position.map(|pos| FighterView {
                faction: c.faction,
                pos,
                attacks: c.proto.combat.attacks.clone(),
                effects: c.proto.effects,
                target: c.proto.target,
                friendly_target: c.proto.friendly_target,
            })
        })?,
        FighterKind::Building => store.buildings.read(&key.id, |b| {
            Some(FighterView {
                faction: b.faction,
                pos: b.centre,
                attacks: b.proto.combat.attacks.clone(),
                effects: ActiveEffects::default(),
                target: b.proto.target,
                friendly_target: b.proto.friendly_target,
            })
        })?,
    }
}

fn faction_of(store: &Store, key: TargetKey) -> Option<Faction> {
    match key.kind {
        FighterKind::Character => store.characters.read(&key.id, |c| c.faction),
        FighterKind::Building => store.buildings.read(&key.id, |b| b.faction),
    }
}

fn position_of(store: &Store, key: TargetKey) -> Option<Hex> {
    match key.kind {
        FighterKind::Character => store.characters.read(&key.id, |c| c.position)?,
        FighterKind::Building => store.buildings.read(&key.id, |b| b.centre),
    }
}

/// Candidates on `tile`, characters before buildings, ids ascending.
fn candidates_at(
    store: &Store,
    tile: Hex,
    own: TargetKey,
    faction: Faction,
    friendly: bool,
) -> Vec<TargetKey> {
    let mut out = Vec::new();
    for id in store.characters.keys_at(tile) {
        let key = TargetKey::character(id);
        if key == own {
            continue;
        }
        if let Some(f) = faction_of(store, key) {
            if (f == faction) == friendly {
                out.push(key);
            }
        }
    }
    for id in store.buildings.keys_at(tile) {
        let key = TargetKey::building(id);
        if key == own {
            continue;
        }
        if let Some(f) = faction_of(store, key) {
            if (f == faction) == friendly {
                out.push(key);
            }
        }
    }
    out
}

/// Picks a target among the strictly closest candidates, uniformly at
/// random, scanning rings outward from the fighter's own tile.
fn pick_target(
    store: &Store,
    rng: &mut BlockRng,
    own: TargetKey,
    pos: Hex,
    faction: Faction,
    range: u32,
    friendly: bool,
) -> Option<TargetKey> {
    for r in 0..=range {
        let mut ring_candidates = Vec::new();
        for tile in L1Ring::new(pos, r) {
            ring_candidates.extend(candidates_at(store, tile, own, faction, friendly));
        }
        if !ring_candidates.is_empty() {
            ring_candidates.sort_unstable();
            let idx = rng.next_int(0, ring_candidates.len() as u64 - 1) as usize;
            return Some(ring_candidates[idx]);
        }
    }
    None
}

fn effective_range(base: u32, boost: i32) -> u32 {
    u32::try_from(i64::from(base) + i64::from(boost)).unwrap_or(0)
}

/// Phase C1: acquire hostile and friendly targets for every armed fighter.
pub(crate) fn acquire_targets(store: &Store, rng: &mut BlockRng) {
    for key in armed_fighters(store) {
        let Some(v) = view(store, key) else { continue };
        let hostile_range = v
            .attacks
            .iter()
            .filter(|a| !a.friendlies && a.area == 0)
            .map(|a| effective_range(a.range, v.effects.range_boost))
            .max();
        let friendly_range = v
            .attacks
            .iter()
            .filter(|a| a.friendlies && a.area == 0)
            .map(|a| effective_range(a.range, v.effects.range_boost))
            .max();

        let new_target = hostile_range
            .and_then(|r| pick_target(store, rng, key, v.pos, v.faction, r, false));
        let new_friendly = friendly_range
            .and_then(|r| pick_target(store, rng, key, v.pos, v.faction, r, true));

        if new_target == v.target && new_friendly == v.friendly_target {
            continue;
        }
        match key.kind {
            FighterKind::Character => {
                if let Some(mut c) = store.characters.checkout(&key.id) {
                    let proto = &mut c.payload_mut().proto;
                    proto.target = new_target;
                    proto.friendly_target = new_friendly;
                }
            }
            FighterKind::Building => {
                if let Some(mut b) = store.buildings.checkout(&key.id) {
                    let proto = &mut b.payload_mut().proto;
                    proto.target = new_target;
                    proto.friendly_target = new_friendly;
                }
            }
        }
    }
}

/// Applies `dmg` whole points, shield first, then armour. Returns the HP
/// after the hit.
fn apply_raw_damage(store: &Store, key: TargetKey, dmg: u32) -> Option<Hp> {
    let mutate = |hp: &mut Hp| {
        let to_shield = dmg.min(hp.shield);
        hp.shield -= to_shield;
        let rest = dmg - to_shield;
        hp.armour = hp.armour.saturating_sub(rest);
    };
    match key.kind {
        FighterKind::Character => {
            let mut c = store.characters.checkout(&key.id)?;
            mutate(&mut c.columns_mut().hp);
            Some(c.hp)
        }
        FighterKind::Building => {
            let mut b = store.buildings.checkout(&key.id)?;
            mutate(&mut b.columns_mut().hp);
            Some(b.hp)
        }
    }
}

struct KillQueue {
    queue: Vec<TargetKey>,
    seen: BTreeSet<TargetKey>,
}

impl KillQueue {
    fn new() -> Self {
        Self {
            queue: Vec::new(),
            seen: BTreeSet::new(),
        }
    }

    fn push(&mut self, key: TargetKey) {
        if self.seen.insert(key) {
            self.queue.push(key);
        }
    }
}

/// Phase C2: mentecon drains, then damage rolls and effect staging.
///
/// Fighters killed earlier in the phase still fire their own attacks: the
/// queue keeps identities stable until kill processing, which is what lets
/// two mutually-lethal fighters take each other down in one block.
pub(crate) fn deal_damage(
    store: &Store,
    rng: &mut BlockRng,
    height: Height,
) -> CombatOutcome {
    let mut kills = KillQueue::new();
    let mut staged: BTreeMap<Id, ActiveEffects> = BTreeMap::new();

    // Mentecon drains armour directly, one point per active block.
    for id in store.characters.keys() {
        let active = store
            .characters
            .read(&id, |c| c.position.is_some() && c.proto.effects.mentecon)
            .unwrap_or(false);
        if !active {
            continue;
        }
        let key = TargetKey::character(id);
        if let Some(hp) = apply_raw_damage(store, key, 1) {
            trace!(id, "mentecon drain");
            if hp.is_dead() {
                kills.push(key);
            }
        }
    }

    for attacker in armed_fighters(store) {
        let Some(v) = view(store, attacker) else {
            continue;
        };
        for attack in &v.attacks {
            let victims: Vec<TargetKey> = if attack.area > 0 {
                let mut out = Vec::new();
                for r in 0..=attack.area {
                    for tile in L1Ring::new(v.pos, r) {
                        out.extend(candidates_at(
                            store,
                            tile,
                            attacker,
                            v.faction,
                            attack.friendlies,
                        ));
                    }
                }
                out
            } else {
                let chosen = if attack.friendlies {
                    v.friendly_target
                } else {
                    v.target
                };
                let in_range = chosen.and_then(|t| {
                    let pos = position_of(store, t)?;
                    let reach = effective_range(attack.range, v.effects.range_boost);
                    (v.pos.distance(pos) <= reach).then_some(t)
                });
                in_range.into_iter().collect()
            };

            // One roll per attack; area hits share it.
            let dmg = match attack.damage {
                Some(range) if attack.area > 0 || !victims.is_empty() => {
                    Some(rng.next_int(u64::from(range.min), u64::from(range.max)) as u32)
                }
                _ => None,
            };

            for victim in &victims {
                if let Some(dmg) = dmg {
                    if let Some(hp) = apply_raw_damage(store, *victim, dmg) {
                        if !attack.friendlies {
                            store.damage.record(victim.id, attacker.id, height);
                        }
                        if hp.is_dead() {
                            kills.push(*victim);
                        }
                    }
                }
                if !attack.effects.is_empty() && victim.kind == FighterKind::Character {
                    let slot = staged.entry(victim.id).or_default();
                    slot.speed_pct += attack.effects.speed_pct;
                    slot.range_boost += attack.effects.range_boost;
                    slot.mentecon |= attack.effects.mentecon;
                }
            }
        }
    }

    CombatOutcome {
        kills: kills.queue,
        staged_effects: staged,
    }
}

/// Resolves the owner account of a fighter, if it still exists.
fn owner_of(store: &Store, id: Id) -> Option<String> {
    if let Some(owner) = store.characters.read(&id, |c| c.owner.clone()) {
        return Some(owner);
    }
    store.buildings.read(&id, |b| b.owner.clone())
}

fn credit_kill(store: &Store, params: &Params, victim: Id) {
    let mut owners: BTreeSet<String> = BTreeSet::new();
    for attacker in store.damage.attackers(victim) {
        if let Some(owner) = owner_of(store, attacker) {
            if !owner.is_empty() {
                owners.insert(owner);
            }
        }
    }
    for owner in owners {
        let mut acc = store.account_mut(&owner);
        let row = acc.payload_mut();
        row.kills += 1;
        row.fame += params.fame_per_kill;
        row.add_xp("combat", params.fame_per_kill);
    }
}

/// Phase C3: process enqueued kills, cascading building destruction onto
/// the characters sheltered inside.
///
/// Credits are resolved for every victim *before* any row is deleted:
/// two mutually-lethal fighters each appear in the other's damage list,
/// and deleting the first would otherwise orphan the second's credit.
pub(crate) fn process_kills(
    store: &Store,
    params: &Params,
    obstacles: &mut DynObstacles,
    kills: Vec<TargetKey>,
    height: Height,
) {
    // Expand the queue with cascades first: a destroyed building takes
    // the characters sheltered inside down with it.
    let mut queue: VecDeque<TargetKey> = kills.iter().copied().collect();
    let mut victims: Vec<TargetKey> = Vec::new();
    let mut seen: BTreeSet<TargetKey> = kills.into_iter().collect();
    while let Some(victim) = queue.pop_front() {
        if victim.kind == FighterKind::Building {
            for id in store.characters.keys() {
                let inside = store
                    .characters
                    .read(&id, |c| c.building_id == victim.id)
                    .unwrap_or(false);
                if inside {
                    let key = TargetKey::character(id);
                    if seen.insert(key) {
                        queue.push_back(key);
                    }
                }
            }
        }
        victims.push(victim);
    }

    for victim in &victims {
        credit_kill(store, params, victim.id);
    }
    for victim in victims {
        match victim.kind {
            FighterKind::Character => {
                kill_character(store, params, obstacles, victim.id, height);
            }
            FighterKind::Building => {
                kill_building(store, params, victim.id, height);
            }
        }
    }
}

fn kill_character(
    store: &Store,
    params: &Params,
    obstacles: &mut DynObstacles,
    id: Id,
    height: Height,
) {
    let Some(handle) = store.characters.checkout(&id) else {
        return;
    };
    let position = handle.position;
    let building_id = handle.building_id;
    let owner = handle.owner.clone();
    let ongoing = handle.ongoing;
    let mut cargo = handle.proto.cargo.clone();
    handle.delete();

    // Inventory drops where the victim last was: on the ground, or into
    // the sheltering building's per-account storage.
    if let Some(pos) = position {
        store.loot.with(pos, |pile| cargo.drain_into(pile));
        obstacles.remove_vehicle(pos);
    } else if building_id != 0 {
        store
            .building_inv
            .with(building_id, &owner, |inv| cargo.drain_into(inv));
    }

    if ongoing != 0 {
        if let Some(op) = store.ongoings.checkout(&ongoing) {
            if let Op::Prospection { region } = op.op {
                let mut r = store.region_mut(region, height);
                let row = r.payload_mut();
                row.prospecting_character = 0;
                row.modified = height;
            }
            op.delete();
        }
    }

    store.damage.remove_victim(id);
}

fn kill_building(store: &Store, params: &Params, id: Id, height: Height) {
    let Some(handle) = store.buildings.checkout(&id) else {
        return;
    };
    let centre = handle.centre;
    let ongoing = handle.ongoing_construction;
    let mut construction = handle.construction_inventory.clone();
    handle.delete();

    // Release order reservations first so ask stock rejoins the
    // inventories and drops with them.
    dex::cancel_building_orders(store, id);
    for (_, mut inv) in store.building_inv.drain_building(id) {
        store.loot.with(centre, |pile| inv.drain_into(pile));
    }
    store.loot.with(centre, |pile| construction.drain_into(pile));

    if ongoing != 0 {
        if let Some(op) = store.ongoings.checkout(&ongoing) {
            op.delete();
        }
    }

    store.damage.remove_victim(id);
}

/// Phase C4: shield regeneration in milli-HP, capped at the maximum.
///
/// Runs after kill processing, so the dead never regenerate.
pub(crate) fn regenerate(store: &Store) {
    for id in store.characters.keys_with(columns::CAN_REGEN) {
        if let Some(mut c) = store.characters.checkout(&id) {
            let (regen, max) = (
                c.proto.combat.shield_regen_mhp,
                c.proto.combat.max_hp.shield,
            );
            regen_hp(&mut c.columns_mut().hp, regen, max);
        }
    }
    for id in store.buildings.keys_with(columns::CAN_REGEN) {
        if let Some(mut b) = store.buildings.checkout(&id) {
            let (regen, max) = (
                b.proto.combat.shield_regen_mhp,
                b.proto.combat.max_hp.shield,
            );
            regen_hp(&mut b.columns_mut().hp, regen, max);
        }
    }
}

fn regen_hp(hp: &mut Hp, regen_mhp: u32, max_shield: u32) {
    if hp.shield >= max_shield {
        return;
    }
    let total = hp.shield_mhp + regen_mhp;
    hp.shield += total / 1000;
    hp.shield_mhp = total % 1000;
    if hp.shield >= max_shield {
        hp.shield = max_shield;
        hp.shield_mhp = 0;
    }
}

/// Writes the staged effects of this block onto the character rows,
/// replacing whatever was active. Effects last exactly one block unless
/// re-applied.
pub(crate) fn apply_staged_effects(store: &Store, staged: &BTreeMap<Id, ActiveEffects>) {
    for id in store.characters.keys() {
        let current = store.characters.read(&id, |c| c.proto.effects);
        let new = staged.get(&id).copied().unwrap_or_default();
        if current == Some(new) {
            continue;
        }
        if let Some(mut c) = store.characters.checkout(&id) {
            c.payload_mut().proto.effects = new;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regen_accumulates_milli_hp() {
        let mut hp = Hp {
            armour: 10,
            shield: 0,
            shield_mhp: 0,
        };
        regen_hp(&mut hp, 400, 3);
        regen_hp(&mut hp, 400, 3);
        assert_eq!((hp.shield, hp.shield_mhp), (0, 800));
        regen_hp(&mut hp, 400, 3);
        assert_eq!((hp.shield, hp.shield_mhp), (1, 200));
    }

    #[test]
    fn regen_caps_and_clears_fraction() {
        let mut hp = Hp {
            armour: 10,
            shield: 2,
            shield_mhp: 900,
        };
        regen_hp(&mut hp, 5_000, 3);
        assert_eq!((hp.shield, hp.shield_mhp), (3, 0));
        // At cap: no-op.
        regen_hp(&mut hp, 5_000, 3);
        assert_eq!((hp.shield, hp.shield_mhp), (3, 0));
    }
}
