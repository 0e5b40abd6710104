// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Building services and ongoing-operation completion.
//!
//! Services are started by `s` moves against a finished building: armour
//! repair, blueprint copying, item construction and the delayed config
//! update. Every service charges `service_cost_per_block × duration` as a
//! burnt base cost plus the building's `service_fee_percent` surcharge to
//! its owner — at the fee in effect *now*, which is why config updates
//! deliberately take `building_update_delay` blocks to land.
//!
//! Completion runs at the start of each block, before moves, so a
//! prospection finishing at height H can be chained into a `mine` intent
//! within the same block.

use tracing::debug;

use crate::building::BuildingConfig;
use crate::ident::{Amount, Height, Id};
use crate::ongoing::{Ongoing, Op};
use crate::params::Params;
use crate::rng::BlockRng;
use crate::store::Store;

/// Charges `payer` the base cost plus owner surcharge for a service of
/// `duration` blocks at `building`. Returns false (and charges nothing)
/// if the balance does not cover it.
fn charge_service(
    store: &Store,
    params: &Params,
    payer: &str,
    building: Id,
    duration: u64,
) -> bool {
    let base: Amount = params.service_cost_per_block * duration;
    let (owner, fee_percent) = match store
        .buildings
        .read(&building, |b| (b.owner.clone(), b.config.service_fee_percent))
    {
        Some(v) => v,
        None => return false,
    };
    let surcharge = base * Amount::from(fee_percent) / 100;
    let total = base + surcharge;
    {
        let mut acc = store.account_mut(payer);
        if acc.balance < total {
            debug!(payer, building, total, "service unaffordable");
            return false;
        }
        acc.payload_mut().balance -= total;
    }
    store.money.borrow_mut().burnt += base;
    if surcharge > 0 && !owner.is_empty() {
        store.account_mut(&owner).payload_mut().balance += surcharge;
    } else if surcharge > 0 {
        store.money.borrow_mut().burnt += surcharge;
    }
    true
}

fn building_slot_free(store: &Store, building: Id) -> bool {
    store
        .buildings
        .read(&building, |b| !b.foundation && b.ongoing_construction == 0)
        .unwrap_or(false)
}

/// Starts an armour repair for `character`, which must be idle inside
/// `building` and owned by `payer`.
pub(crate) fn start_armour_repair(
    store: &Store,
    params: &Params,
    height: Height,
    payer: &str,
    building: Id,
    character: Id,
) {
    let finished = store
        .buildings
        .read(&building, |b| !b.foundation)
        .unwrap_or(false);
    if !finished {
        return;
    }
    let repairable = store.characters.read(&character, |c| {
        c.owner == payer
            && c.building_id == building
            && !c.busy
            && c.hp.armour < c.proto.combat.max_hp.armour
    });
    if repairable != Some(true) {
        debug!(payer, character, "dropping repair intent");
        return;
    }
    let missing = store
        .characters
        .read(&character, |c| {
            u64::from(c.proto.combat.max_hp.armour - c.hp.armour)
        })
        .unwrap_or(0);
    let duration = missing.div_ceil(u64::from(params.armour_repair_hp_per_block));
    if !charge_service(store, params, payer, building, duration) {
        return;
    }
    let op_id = store.next_id();
    store.ongoings.insert(Ongoing::for_character(
        op_id,
        character,
        height,
        height + duration,
        Op::ArmourRepair,
    ));
    if let Some(mut c) = store.characters.checkout(&character) {
        let row = c.columns_mut();
        row.busy = true;
        row.ongoing = op_id;
    }
}

/// Starts a blueprint-copy run for `payer` at `building`.
pub(crate) fn start_blueprint_copy(
    store: &Store,
    params: &Params,
    height: Height,
    payer: &str,
    building: Id,
    blueprint: &str,
    copies: u64,
) {
    if copies == 0 || !building_slot_free(store, building) {
        return;
    }
    let Some(original) = blueprint.strip_suffix(" bp") else {
        debug!(payer, blueprint, "not a blueprint item");
        return;
    };
    if params.item(original).is_none() {
        debug!(payer, blueprint, "unknown blueprint");
        return;
    }
    if store.building_inv.count(building, payer, blueprint) == 0 {
        debug!(payer, blueprint, "no original deposited");
        return;
    }
    let duration = copies * params.bp_copy_blocks;
    if !charge_service(store, params, payer, building, duration) {
        return;
    }
    let op_id = store.next_id();
    store.ongoings.insert(Ongoing::for_building(
        op_id,
        building,
        height,
        height + duration,
        Op::BlueprintCopy {
            account: payer.to_owned(),
            blueprint: blueprint.to_owned(),
            copies,
        },
    ));
    if let Some(mut b) = store.buildings.checkout(&building) {
        b.columns_mut().ongoing_construction = op_id;
    }
}

/// Starts an item-construction run for `payer` at `building`, consuming
/// the recipe resources from the payer's inventory there.
pub(crate) fn start_item_construction(
    store: &Store,
    params: &Params,
    height: Height,
    payer: &str,
    building: Id,
    output: &str,
    count: u64,
) {
    if count == 0 || !building_slot_free(store, building) {
        return;
    }
    let Some(def) = params.item(output) else {
        debug!(payer, output, "unknown item");
        return;
    };
    let blueprint = format!("{output} bp");
    if store.building_inv.count(building, payer, &blueprint) == 0 {
        debug!(payer, output, "no blueprint deposited");
        return;
    }
    let enough = def
        .resources
        .iter()
        .all(|(res, n)| store.building_inv.count(building, payer, res) >= n * count);
    if !enough {
        debug!(payer, output, "missing construction resources");
        return;
    }
    let duration = count * def.complexity;
    if !charge_service(store, params, payer, building, duration) {
        return;
    }
    let resources = def.resources.clone();
    store.building_inv.with(building, payer, |inv| {
        for (res, n) in &resources {
            inv.remove(res, n * count);
        }
    });
    let op_id = store.next_id();
    store.ongoings.insert(Ongoing::for_building(
        op_id,
        building,
        height,
        height + duration,
        Op::ItemConstruction {
            account: payer.to_owned(),
            output: output.to_owned(),
            count,
        },
    ));
    if let Some(mut b) = store.buildings.checkout(&building) {
        b.columns_mut().ongoing_construction = op_id;
    }
}

/// Starts a delayed config update; only the building owner may do this.
pub(crate) fn start_config_update(
    store: &Store,
    params: &Params,
    height: Height,
    payer: &str,
    building: Id,
    fee_percent: Option<u32>,
    dex_fee_bps: Option<u32>,
) {
    if !building_slot_free(store, building) {
        return;
    }
    let current = store
        .buildings
        .read(&building, |b| (b.owner == payer).then_some(b.config));
    let Some(Some(current)) = current else {
        debug!(payer, building, "config update by non-owner");
        return;
    };
    let new_config = BuildingConfig {
        service_fee_percent: fee_percent.unwrap_or(current.service_fee_percent),
        dex_fee_bps: dex_fee_bps.unwrap_or(current.dex_fee_bps),
    };
    if new_config.service_fee_percent > 100 || new_config.dex_fee_bps > 10_000 {
        debug!(payer, building, "config values out of range");
        return;
    }
    let op_id = store.next_id();
    store.ongoings.insert(Ongoing::for_building(
        op_id,
        building,
        height,
        height + params.building_update_delay,
        Op::BuildingUpdate { config: new_config },
    ));
    if let Some(mut b) = store.buildings.checkout(&building) {
        b.columns_mut().ongoing_construction = op_id;
    }
}

/// Phase: complete every operation whose end height is `height`, in id
/// order.
pub(crate) fn complete_due_ops(
    store: &Store,
    params: &Params,
    rng: &mut BlockRng,
    height: Height,
) {
    for id in store.ongoings.keys() {
        let due = store
            .ongoings
            .read(&id, |o| o.end == height)
            .unwrap_or(false);
        if !due {
            continue;
        }
        let Some(handle) = store.ongoings.checkout(&id) else {
            continue;
        };
        let op = Ongoing::clone(&handle);
        handle.delete();
        complete_one(store, params, rng, height, &op);
    }
}

fn release_character(store: &Store, character: Id) {
    if let Some(mut c) = store.characters.checkout(&character) {
        let row = c.columns_mut();
        row.busy = false;
        row.ongoing = 0;
    }
}

fn release_building(store: &Store, building: Id) {
    if let Some(mut b) = store.buildings.checkout(&building) {
        b.columns_mut().ongoing_construction = 0;
    }
}

fn complete_one(
    store: &Store,
    params: &Params,
    rng: &mut BlockRng,
    height: Height,
    op: &Ongoing,
) {
    match &op.op {
        Op::Prospection { region } => {
            finish_prospection(store, params, rng, height, op.character_id, *region);
            release_character(store, op.character_id);
        }
        Op::ArmourRepair => {
            if let Some(mut c) = store.characters.checkout(&op.character_id) {
                let max = c.proto.combat.max_hp.armour;
                c.columns_mut().hp.armour = max;
            }
            release_character(store, op.character_id);
        }
        Op::BlueprintCopy {
            account,
            blueprint,
            copies,
        } => {
            store
                .building_inv
                .with(op.building_id, account, |inv| inv.add(blueprint, *copies));
            release_building(store, op.building_id);
        }
        Op::ItemConstruction {
            account,
            output,
            count,
        } => {
            store
                .building_inv
                .with(op.building_id, account, |inv| inv.add(output, *count));
            release_building(store, op.building_id);
        }
        Op::BuildingConstruction => {
            if let Some(mut b) = store.buildings.checkout(&op.building_id) {
                let def = params.building(&b.btype).cloned();
                let row = b.payload_mut();
                row.foundation = false;
                row.age.finished = Some(height);
                row.construction_inventory = crate::inventory::Inventory::new();
                row.ongoing_construction = 0;
                if let Some(def) = def {
                    row.proto.combat.attacks = def.attacks;
                    row.proto.combat.max_hp = def.max_hp;
                    row.proto.combat.shield_regen_mhp = def.shield_regen_mhp;
                    row.hp.armour = def.max_hp.armour;
                    row.hp.shield = def.max_hp.shield;
                    row.hp.shield_mhp = 0;
                }
            }
        }
        Op::BuildingUpdate { config } => {
            if let Some(mut b) = store.buildings.checkout(&op.building_id) {
                b.payload_mut().config = *config;
            }
            release_building(store, op.building_id);
        }
    }
}

/// Rolls the region's resource, writes the prospection result and hands
/// out any prize the finder wins.
fn finish_prospection(
    store: &Store,
    params: &Params,
    rng: &mut BlockRng,
    height: Height,
    character: Id,
    region: Id,
) {
    let owner = store
        .characters
        .read(&character, |c| c.owner.clone())
        .unwrap_or_default();

    let total_weight: u64 = params.resources.iter().map(|r| r.weight).sum();
    let mut roll = rng.next_int(0, total_weight.saturating_sub(1));
    let mut chosen = &params.resources[0];
    for res in &params.resources {
        if roll < res.weight {
            chosen = res;
            break;
        }
        roll -= res.weight;
    }
    let amount = rng.next_int(chosen.yield_min, chosen.yield_max);

    {
        let mut r = store.region_mut(region, height);
        let row = r.payload_mut();
        row.prospecting_character = 0;
        row.prospection = Some(crate::region::Prospection {
            name: owner.clone(),
            height,
            resource: chosen.name.clone(),
        });
        row.resource_left = amount;
        row.modified = height;
    }

    // Prize rolls, in table order, limited by the global stock.
    for prize in &params.prize_table {
        let left = store.prizes.borrow().get(&prize.name).copied().unwrap_or(0);
        if left == 0 {
            continue;
        }
        if !rng.chance(prize.chance) {
            continue;
        }
        let fits = store
            .characters
            .read(&character, |c| {
                c.proto.cargo.used_space(params) + params.item_space(&prize.name)
                    <= c.proto.cargo_space
            })
            .unwrap_or(false);
        if !fits {
            continue;
        }
        if let Some(mut c) = store.characters.checkout(&character) {
            c.payload_mut().proto.cargo.add(&prize.name, 1);
        }
        if let Some(stock) = store.prizes.borrow_mut().get_mut(&prize.name) {
            *stock -= 1;
        }
    }

    if !owner.is_empty() {
        store
            .account_mut(&owner)
            .payload_mut()
            .add_xp("prospecting", 1);
    }
}
