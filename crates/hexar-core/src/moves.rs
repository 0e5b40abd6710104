// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Move parsing, validation and application.
//!
//! A block carries an ordered array of per-player move bundles. The
//! envelope (heights, hashes, `out` amounts) is chain data and fails the
//! whole block when malformed; everything inside `move` is adversarial
//! player input and is dropped *silently* at sub-intent granularity —
//! sibling intents in the same bundle still apply. Raising an error for
//! bad player input would fork consensus.
//!
//! Sub-intents of a `c` entry apply in a fixed order: `send`, `prospect`,
//! `mine`, `wp`, `drop`, `pu`, `eb`, `xb`, `fb`. The order is part of
//! consensus; it is why a waypoint update in the same move as a prospect
//! loses to the prospect (prospecting clears movement and marks the
//! character busy, and busy characters reject waypoints).

use serde_json::Value;
use tracing::debug;

use hexar_geom::Hex;

use crate::building::{Building, BuildingConfig};
use crate::dex;
use crate::error::StateError;
use crate::ident::{parse_id_key, Amount, Faction, Height, Id, COIN};
use crate::map::MapData;
use crate::mining;
use crate::obstacles::DynObstacles;
use crate::ongoing::{Ongoing, Op};
use crate::params::{Chain, Params};
use crate::proto::{Hp, MaxHp};
use crate::services;
use crate::movement;
use crate::spawn::PendingSpawn;
use crate::store::Store;

/// Metadata of the block being processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockMeta {
    /// Chain height.
    pub height: Height,
    /// Block timestamp (informational; never used in game logic).
    pub timestamp: i64,
    /// Canonical block hash string; seeds the block's random stream.
    pub hash: String,
}

/// One player's move bundle.
#[derive(Clone, Debug)]
pub struct MoveEntry {
    /// Sending account name.
    pub name: String,
    /// The move body; arbitrary player-controlled JSON.
    pub mv: Value,
    /// Amount paid to the developer address alongside the move.
    pub dev_paid: Amount,
}

/// A parsed block: metadata plus the ordered move bundles.
#[derive(Clone, Debug)]
pub struct BlockData {
    /// Block metadata.
    pub meta: BlockMeta,
    /// Moves in chain order.
    pub moves: Vec<MoveEntry>,
    /// Admin commands; reserved for an outer extension hook.
    pub admin: Vec<Value>,
}

/// Parses a currency amount from a JSON number with fixed 8-decimal
/// scaling. Exponent notation, signs and deeper fractions are not
/// something the chain emits, so they are treated as malformed.
fn parse_amount(value: &Value) -> Option<Amount> {
    let number = value.as_number()?;
    let text = number.to_string();
    if text.contains(['e', 'E', '-', '+']) {
        return None;
    }
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text.as_str(), ""),
    };
    if frac_part.len() > 8 || int_part.is_empty() {
        return None;
    }
    let int: Amount = int_part.parse().ok()?;
    let mut frac: Amount = 0;
    if !frac_part.is_empty() {
        frac = frac_part.parse().ok()?;
        for _ in frac_part.len()..8 {
            frac *= 10;
        }
    }
    int.checked_mul(COIN)?.checked_add(frac)
}

/// Parses the block envelope. Envelope errors are fatal: they mean the
/// chain fed us garbage, not that a player misbehaved.
pub fn parse_block_data(root: &Value, params: &Params) -> Result<BlockData, StateError> {
    let obj = root
        .as_object()
        .ok_or(StateError::MalformedBlock("root is not an object"))?;
    let block = obj
        .get("block")
        .and_then(Value::as_object)
        .ok_or(StateError::MalformedBlock("missing block metadata"))?;
    let height = block
        .get("height")
        .and_then(Value::as_u64)
        .ok_or(StateError::MalformedBlock("missing or negative height"))?;
    let hash = block
        .get("hash")
        .and_then(Value::as_str)
        .ok_or(StateError::MalformedBlock("missing block hash"))?
        .to_owned();
    let timestamp = block
        .get("timestamp")
        .and_then(Value::as_i64)
        .unwrap_or_default();

    let mut moves = Vec::new();
    if let Some(entries) = obj.get("moves") {
        let entries = entries
            .as_array()
            .ok_or(StateError::MalformedBlock("moves is not an array"))?;
        for entry in entries {
            let entry = entry
                .as_object()
                .ok_or(StateError::MalformedBlock("move entry is not an object"))?;
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or(StateError::MalformedBlock("move entry without name"))?
                .to_owned();
            let mv = entry.get("move").cloned().unwrap_or(Value::Null);
            let mut dev_paid = 0;
            if let Some(out) = entry.get("out") {
                let out = out
                    .as_object()
                    .ok_or(StateError::MalformedBlock("out is not an object"))?;
                for (addr, amount) in out {
                    let amount = parse_amount(amount)
                        .ok_or(StateError::MalformedBlock("non-numeric out amount"))?;
                    if *addr == params.developer_address {
                        dev_paid += amount;
                    }
                }
            }
            moves.push(MoveEntry { name, mv, dev_paid });
        }
    }

    let admin = obj
        .get("admin")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(BlockData {
        meta: BlockMeta {
            height,
            timestamp,
            hash,
        },
        moves,
        admin,
    })
}

/// Parses a waypoint list: an array of `{x, y}` objects with integer
/// coordinates. Any malformed element rejects the whole list.
pub(crate) fn parse_waypoints(value: &Value) -> Option<Vec<Hex>> {
    let array = value.as_array()?;
    let mut out = Vec::with_capacity(array.len());
    for wp in array {
        let obj = wp.as_object()?;
        let x = i32::try_from(obj.get("x")?.as_i64()?).ok()?;
        let y = i32::try_from(obj.get("y")?.as_i64()?).ok()?;
        if obj.len() != 2 {
            return None;
        }
        out.push(Hex::new(x, y));
    }
    Some(out)
}

fn as_id(value: &Value) -> Option<Id> {
    let id = value.as_u64()?;
    (id != 0).then_some(id)
}

/// Whether `item` is something the game knows how to price and carry.
fn tradeable(params: &Params, item: &str) -> bool {
    params.resource(item).is_some()
        || params.item(item).is_some()
        || item
            .strip_suffix(" bp")
            .is_some_and(|base| params.item(base).is_some())
        || params.prize_table.iter().any(|p| p.name == item)
}

/// Live characters owned by `owner`.
fn live_characters(store: &Store, owner: &str) -> u32 {
    let mut count = 0;
    for id in store.characters.keys() {
        if store
            .characters
            .read(&id, |c| c.owner == owner)
            .unwrap_or(false)
        {
            count += 1;
        }
    }
    count
}

/// Applies every move bundle of a block in order. Returns the spawn queue
/// built from accepted character creations.
pub(crate) fn apply_moves(
    store: &Store,
    params: &Params,
    map: &dyn MapData,
    obstacles: &mut DynObstacles,
    height: Height,
    moves: &[MoveEntry],
) -> Vec<PendingSpawn> {
    let mut spawns = Vec::new();
    for entry in moves {
        apply_one(store, params, map, obstacles, height, entry, &mut spawns);
    }
    spawns
}

fn apply_one(
    store: &Store,
    params: &Params,
    map: &dyn MapData,
    obstacles: &mut DynObstacles,
    height: Height,
    entry: &MoveEntry,
    spawns: &mut Vec<PendingSpawn>,
) {
    // The account exists from its first move on, valid or not.
    drop(store.account_mut(&entry.name));

    let mut dev_left = entry.dev_paid;

    if let Some(obj) = entry.mv.as_object() {
        if let Some(nc) = obj.get("nc") {
            handle_new_characters(store, params, &entry.name, nc, &mut dev_left, spawns);
        }
        if let Some(c) = obj.get("c").and_then(Value::as_object) {
            for (key, intents) in c {
                let Some(id) = parse_id_key(key) else {
                    debug!(%key, "dropping non-canonical character id key");
                    continue;
                };
                handle_character_update(
                    store, params, map, obstacles, height, &entry.name, id, intents,
                );
            }
        }
        if let Some(x) = obj.get("x").and_then(Value::as_array) {
            for order in x {
                handle_dex_op(store, params, height, &entry.name, order);
            }
        }
        if let Some(s) = obj.get("s").and_then(Value::as_array) {
            for op in s {
                handle_service_op(store, params, height, &entry.name, op);
            }
        }
    }

    // Developer payment not consumed by character purchases converts
    // through the burnsale into in-game coin.
    if dev_left > 0 {
        burnsale(store, params, &entry.name, dev_left);
    }
}

fn handle_new_characters(
    store: &Store,
    params: &Params,
    name: &str,
    nc: &Value,
    dev_left: &mut Amount,
    spawns: &mut Vec<PendingSpawn>,
) {
    let Some(list) = nc.as_array() else {
        debug!(name, "dropping malformed nc");
        return;
    };
    let queued_before = spawns.iter().filter(|s| s.owner == name).count() as u32;
    let mut live = live_characters(store, name) + queued_before;

    for creation in list {
        let Some(obj) = creation.as_object() else {
            continue;
        };
        if *dev_left < params.character_cost {
            debug!(name, "character creation without remaining payment");
            break;
        }

        let account_faction = store.accounts.read(&name.to_owned(), |a| a.faction).flatten();
        let wanted = obj
            .get("faction")
            .and_then(Value::as_str)
            .and_then(|s| {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Faction::from_wire(c),
                    _ => None,
                }
            });
        let faction = match (account_faction, wanted) {
            (Some(f), None) => f,
            (Some(f), Some(w)) if w == f => f,
            (Some(_), Some(_)) => {
                debug!(name, "creation faction mismatch");
                continue;
            }
            (None, Some(w)) => w,
            (None, None) => {
                debug!(name, "creation without faction on fresh account");
                continue;
            }
        };

        if live >= params.character_limit {
            debug!(name, "character limit reached");
            continue;
        }

        *dev_left -= params.character_cost;
        live += 1;
        if account_faction.is_none() {
            store.account_mut(name).payload_mut().faction = Some(faction);
        }
        spawns.push(PendingSpawn {
            id: store.next_id(),
            owner: name.to_owned(),
            faction,
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_character_update(
    store: &Store,
    params: &Params,
    map: &dyn MapData,
    obstacles: &mut DynObstacles,
    height: Height,
    name: &str,
    id: Id,
    intents: &Value,
) {
    let owned = store
        .characters
        .read(&id, |c| c.owner == name)
        .unwrap_or(false);
    if !owned {
        debug!(name, id, "dropping update of foreign or unknown character");
        return;
    }
    let Some(intents) = intents.as_object() else {
        return;
    };

    if let Some(send) = intents.get("send") {
        handle_send(store, id, send);
    }
    if intents.get("prospect").is_some_and(Value::is_object) {
        mining::start_prospecting(store, params, map, height, id);
    }
    if intents.get("mine").is_some_and(Value::is_object) {
        mining::start_mining(store, params, map, height, id);
    }
    if let Some(wp) = intents.get("wp") {
        handle_waypoints(store, id, wp);
    }
    if let Some(drop_) = intents.get("drop") {
        handle_item_transfer(store, params, id, drop_, Direction::Drop);
    }
    if let Some(pu) = intents.get("pu") {
        handle_item_transfer(store, params, id, pu, Direction::PickUp);
    }
    if let Some(eb) = intents.get("eb") {
        handle_enter_building(store, id, eb);
    }
    if intents.get("xb").is_some_and(Value::is_object) {
        movement::exit_building(store, params, map, obstacles, id);
    }
    if let Some(fb) = intents.get("fb") {
        handle_found_building(store, params, map, obstacles, height, name, id, fb);
    }
}

fn handle_send(store: &Store, id: Id, value: &Value) {
    let Some(recipient) = value.as_str() else {
        return;
    };
    let faction = match store.characters.read(&id, |c| c.faction) {
        Some(f) => f,
        None => return,
    };
    let ok = store
        .accounts
        .read(&recipient.to_owned(), |a| a.faction == Some(faction))
        .unwrap_or(false);
    if !ok {
        debug!(id, recipient, "dropping transfer to unfit account");
        return;
    }
    if let Some(mut c) = store.characters.checkout(&id) {
        c.columns_mut().owner = recipient.to_owned();
    }
}

fn handle_waypoints(store: &Store, id: Id, value: &Value) {
    let Some(waypoints) = parse_waypoints(value) else {
        debug!(id, "rejecting malformed waypoint list");
        return;
    };
    let Some(mut c) = store.characters.checkout(&id) else {
        return;
    };
    if c.busy {
        debug!(id, "busy character rejects waypoints");
        return;
    }
    if c.position.is_none() {
        debug!(id, "character inside building rejects waypoints");
        return;
    }
    let payload = c.payload_mut();
    payload.proto.waypoints = waypoints;
    payload.partial_step = 0;
    payload.blocked_turns = 0;
    // Mining is impossible while moving.
    if let Some(m) = payload.proto.mining.as_mut() {
        m.active = false;
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Drop,
    PickUp,
}

/// Moves fungible items between the character's cargo and whatever
/// storage is at its location: ground loot outside, the owner's
/// per-building inventory inside.
fn handle_item_transfer(
    store: &Store,
    params: &Params,
    id: Id,
    value: &Value,
    direction: Direction,
) {
    let Some(fungible) = value.as_object().and_then(|o| o.get("f")).and_then(Value::as_object)
    else {
        return;
    };
    let Some(mut c) = store.characters.checkout(&id) else {
        return;
    };
    for (item, count) in fungible {
        let Some(count) = count.as_u64().filter(|n| *n > 0) else {
            continue;
        };
        match direction {
            Direction::Drop => {
                let moved = c.payload_mut().proto.cargo.remove(item, count);
                if moved == 0 {
                    continue;
                }
                if let Some(pos) = c.position {
                    store.loot.with(pos, |pile| pile.add(item, moved));
                } else {
                    let (bid, owner) = (c.building_id, c.owner.clone());
                    store
                        .building_inv
                        .with(bid, &owner, |inv| inv.add(item, moved));
                }
            }
            Direction::PickUp => {
                let space = params.item_space(item).max(1);
                let free = c
                    .proto
                    .cargo_space
                    .saturating_sub(c.proto.cargo.used_space(params));
                let fit = free / space;
                let want = count.min(fit);
                if want == 0 {
                    continue;
                }
                let taken = if let Some(pos) = c.position {
                    store.loot.with(pos, |pile| pile.remove(item, want))
                } else {
                    let (bid, owner) = (c.building_id, c.owner.clone());
                    store
                        .building_inv
                        .with(bid, &owner, |inv| inv.remove(item, want))
                };
                if taken > 0 {
                    c.payload_mut().proto.cargo.add(item, taken);
                }
            }
        }
    }
}

fn handle_enter_building(store: &Store, id: Id, value: &Value) {
    let Some(target) = value.as_u64() else {
        return;
    };
    let Some(mut c) = store.characters.checkout(&id) else {
        return;
    };
    if target == 0 {
        c.columns_mut().enter_building = 0;
        return;
    }
    let ok = store
        .buildings
        .read(&target, |b| !b.foundation && b.faction == c.faction)
        .unwrap_or(false);
    if !ok {
        debug!(id, target, "dropping enter intent for unfit building");
        return;
    }
    c.columns_mut().enter_building = target;
}

#[allow(clippy::too_many_arguments)]
fn handle_found_building(
    store: &Store,
    params: &Params,
    map: &dyn MapData,
    obstacles: &mut DynObstacles,
    height: Height,
    name: &str,
    id: Id,
    value: &Value,
) {
    let Some(obj) = value.as_object() else {
        return;
    };
    let Some(btype) = obj.get("t").and_then(Value::as_str) else {
        return;
    };
    // Out-of-range rotations are rejected rather than normalised; a
    // client that sends rot 7 is broken and gets nothing.
    let Some(rotation) = obj.get("rot").and_then(Value::as_u64).filter(|r| *r <= 5) else {
        debug!(id, "rejecting foundation with bad rotation");
        return;
    };
    let Some(def) = params.building(btype) else {
        debug!(id, btype, "unknown building type");
        return;
    };

    let Some(mut c) = store.characters.checkout(&id) else {
        return;
    };
    if c.busy {
        return;
    }
    let Some(centre) = c.position else {
        debug!(id, "cannot found from inside a building");
        return;
    };
    let faction = c.faction;

    let tiles: Vec<Hex> = def
        .shape
        .iter()
        .map(|&o| centre + o.rotate(rotation as i32))
        .collect();
    let clear = tiles.iter().all(|&t| {
        map.passable(t)
            && !obstacles.building_at(t)
            && (t == centre || obstacles.vehicle_at(t).is_none())
    });
    if !clear {
        debug!(id, btype, "foundation site not clear");
        return;
    }
    let affordable = def
        .cost
        .iter()
        .all(|(res, n)| c.proto.cargo.has(res, *n));
    if !affordable {
        debug!(id, btype, "missing foundation resources");
        return;
    }

    let mut construction_inventory = crate::inventory::Inventory::new();
    {
        let cargo = &mut c.payload_mut().proto.cargo;
        for (res, n) in &def.cost {
            cargo.remove(res, *n);
            construction_inventory.add(res, *n);
        }
    }

    let building_id = store.next_id();
    let op_id = store.next_id();
    store.buildings.insert(Building {
        id: building_id,
        btype: btype.to_owned(),
        owner: name.to_owned(),
        faction,
        centre,
        rotation: rotation as u8,
        age: crate::building::AgeData {
            founded: height,
            finished: None,
        },
        config: BuildingConfig::default(),
        foundation: true,
        construction_inventory,
        ongoing_construction: op_id,
        hp: Hp {
            armour: (def.max_hp.armour / 10).max(1),
            shield: 0,
            shield_mhp: 0,
        },
        proto: crate::building::BuildingProto {
            combat: crate::proto::CombatData {
                attacks: vec![],
                max_hp: MaxHp {
                    armour: (def.max_hp.armour / 10).max(1),
                    shield: 0,
                },
                shield_regen_mhp: 0,
            },
            target: None,
            friendly_target: None,
        },
    });
    store.ongoings.insert(Ongoing::for_building(
        op_id,
        building_id,
        height,
        height + def.construction_blocks,
        Op::BuildingConstruction,
    ));
    // Foundations block movement from this very block on.
    obstacles.add_building_tiles(tiles);
}

fn handle_dex_op(store: &Store, params: &Params, height: Height, name: &str, value: &Value) {
    let Some(obj) = value.as_object() else {
        return;
    };
    let Some(kind) = obj.get("t").and_then(Value::as_str) else {
        return;
    };
    if kind == "cancel" {
        if let Some(order) = obj.get("o").and_then(as_id) {
            dex::cancel_order(store, name, order);
        }
        return;
    }
    let (Some(building), Some(item)) = (
        obj.get("b").and_then(as_id),
        obj.get("i").and_then(Value::as_str),
    ) else {
        return;
    };
    if !tradeable(params, item) {
        debug!(name, item, "dropping order for unknown item");
        return;
    }
    let quantity = obj.get("n").and_then(Value::as_u64).unwrap_or(0);
    let price = obj.get("p").and_then(Value::as_u64).unwrap_or(0);
    match kind {
        "bid" => dex::place_bid(store, height, building, name, item, quantity, price),
        "ask" => dex::place_ask(store, height, building, name, item, quantity, price),
        _ => debug!(name, kind, "unknown dex op"),
    }
}

fn handle_service_op(store: &Store, params: &Params, height: Height, name: &str, value: &Value) {
    let Some(obj) = value.as_object() else {
        return;
    };
    let (Some(kind), Some(building)) = (
        obj.get("t").and_then(Value::as_str),
        obj.get("b").and_then(as_id),
    ) else {
        return;
    };
    match kind {
        "rep" => {
            if let Some(character) = obj.get("c").and_then(as_id) {
                services::start_armour_repair(store, params, height, name, building, character);
            }
        }
        "cp" => {
            let (Some(item), Some(n)) = (
                obj.get("i").and_then(Value::as_str),
                obj.get("n").and_then(Value::as_u64),
            ) else {
                return;
            };
            services::start_blueprint_copy(store, params, height, name, building, item, n);
        }
        "bld" => {
            let (Some(item), Some(n)) = (
                obj.get("i").and_then(Value::as_str),
                obj.get("n").and_then(Value::as_u64),
            ) else {
                return;
            };
            services::start_item_construction(store, params, height, name, building, item, n);
        }
        "cfg" => {
            let fee = obj
                .get("fee")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok());
            let dex_fee = obj
                .get("dex_fee")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok());
            services::start_config_update(store, params, height, name, building, fee, dex_fee);
        }
        _ => debug!(name, kind, "unknown service op"),
    }
}

/// Converts surplus developer payment into coin through the burnsale
/// stages, in order, until the payment or the schedule runs out.
fn burnsale(store: &Store, params: &Params, name: &str, mut chi: Amount) {
    let mut bought: Amount = 0;
    {
        let mut money = store.money.borrow_mut();
        for (i, stage) in params.burnsale_stages.iter().enumerate() {
            if chi == 0 {
                break;
            }
            let sold = money.stage_sold.get(i).copied().unwrap_or(0);
            let cap_left = stage.coins.saturating_sub(sold);
            if cap_left == 0 {
                continue;
            }
            let by_money =
                (u128::from(chi) * u128::from(COIN) / u128::from(stage.price)) as Amount;
            let coins = cap_left.min(by_money);
            if coins == 0 {
                break;
            }
            let cost = (u128::from(coins) * u128::from(stage.price) / u128::from(COIN)) as Amount;
            chi -= cost.min(chi);
            money.stage_sold[i] = sold + coins;
            money.total += coins;
            bought += coins;
        }
    }
    if bought > 0 {
        let mut acc = store.account_mut(name);
        let row = acc.payload_mut();
        row.balance += bought;
        row.burnsale_balance += bought;
    }
}

/// Dispatches the block's admin commands, before user moves.
///
/// Admin commands come from the chain operator, not from players. The
/// only implemented command is the test-chain `gift` (god-mode coin
/// minting); everything else is deliberately ignored so outer layers can
/// extend the surface without forking this engine.
pub(crate) fn handle_admin(store: &Store, params: &Params, commands: &[Value]) {
    for cmd in commands {
        let Some(obj) = cmd.as_object() else { continue };
        for (key, body) in obj {
            match key.as_str() {
                "gift" => handle_gift(store, params, body),
                _ => debug!(command = %key, "ignoring unknown admin command"),
            }
        }
    }
}

/// Mints coins into an account on test chains. Gifts never exist on the
/// main chain; there the command is dropped.
fn handle_gift(store: &Store, params: &Params, body: &Value) {
    if params.chain == Chain::Main {
        debug!("dropping gift command on mainnet");
        return;
    }
    let Some(obj) = body.as_object() else { return };
    let (Some(name), Some(amount)) = (
        obj.get("name").and_then(Value::as_str),
        obj.get("amount").and_then(parse_amount),
    ) else {
        debug!("dropping malformed gift command");
        return;
    };
    if amount == 0 {
        return;
    }
    store.account_mut(name).payload_mut().balance += amount;
    let mut money = store.money.borrow_mut();
    money.total += amount;
    money.gifted += amount;
}
