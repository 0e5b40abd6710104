// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, dead_code)]

use serde_json::{json, Value};

use hexar_core::building::{AgeData, Building, BuildingConfig, BuildingProto};
use hexar_core::character::Character;
use hexar_core::ident::{Amount, Faction, Id};
use hexar_core::inventory::Inventory;
use hexar_core::proto::{CombatData, Hp};
use hexar_core::{DiskMap, Engine, Params};
use hexar_geom::Hex;

/// A regtest engine on a small disk map with 8-tile region cells.
pub fn engine() -> Engine<DiskMap> {
    Engine::new(Params::regtest(), DiskMap::new(32, 8))
}

/// Builds a block envelope; the hash derives from the height so replays
/// of the same heights draw the same random streams.
pub fn block_json(height: u64, moves: Value) -> Value {
    json!({
        "block": {
            "height": height,
            "timestamp": 1_000 + height,
            "hash": format!("000000{height:08x}"),
        },
        "moves": moves,
    })
}

/// Attaches a block with the given moves array.
pub fn attach(engine: &mut Engine<DiskMap>, height: u64, moves: Value) {
    engine
        .process_block_json(&block_json(height, moves))
        .unwrap_or_else(|e| panic!("block {height} failed: {e}"));
}

/// Attaches a block with no moves.
pub fn attach_empty(engine: &mut Engine<DiskMap>, height: u64) {
    attach(engine, height, json!([]));
}

/// Ensures `name` exists with the given faction.
pub fn put_account(engine: &Engine<DiskMap>, name: &str, faction: Faction) {
    let mut acc = engine.store().account_mut(name);
    if acc.faction != Some(faction) {
        acc.payload_mut().faction = Some(faction);
    }
}

/// Inserts a character directly at `pos` and returns its id.
pub fn put_character(
    engine: &Engine<DiskMap>,
    owner: &str,
    faction: Faction,
    pos: Hex,
) -> Id {
    put_account(engine, owner, faction);
    let id = engine.store().next_id();
    let mut c = Character::create(id, owner, faction);
    c.position = Some(pos);
    engine.store().characters.insert(c);
    id
}

/// Inserts a finished building and returns its id.
pub fn put_building(
    engine: &Engine<DiskMap>,
    owner: &str,
    faction: Faction,
    btype: &str,
    centre: Hex,
) -> Id {
    put_account(engine, owner, faction);
    let def = engine
        .params()
        .building(btype)
        .unwrap_or_else(|| panic!("unknown building type {btype}"))
        .clone();
    let id = engine.store().next_id();
    engine.store().buildings.insert(Building {
        id,
        btype: btype.to_owned(),
        owner: owner.to_owned(),
        faction,
        centre,
        rotation: 0,
        age: AgeData {
            founded: 0,
            finished: Some(0),
        },
        config: BuildingConfig::default(),
        foundation: false,
        construction_inventory: Inventory::new(),
        ongoing_construction: 0,
        hp: Hp {
            armour: def.max_hp.armour,
            shield: def.max_hp.shield,
            shield_mhp: 0,
        },
        proto: BuildingProto {
            combat: CombatData {
                attacks: def.attacks,
                max_hp: def.max_hp,
                shield_regen_mhp: def.shield_regen_mhp,
            },
            target: None,
            friendly_target: None,
        },
    });
    id
}

/// Credits coins to an account, keeping the supply equation balanced.
pub fn fund(engine: &Engine<DiskMap>, name: &str, amount: Amount) {
    engine.store().account_mut(name).payload_mut().balance += amount;
    engine.store().money.borrow_mut().total += amount;
    engine.store().money.borrow_mut().gifted += amount;
}

/// Current position of a character.
pub fn char_pos(engine: &Engine<DiskMap>, id: Id) -> Option<Hex> {
    engine
        .store()
        .characters
        .read(&id, |c| c.position)
        .flatten()
}

/// Reads arbitrary character state.
pub fn read_char<T>(
    engine: &Engine<DiskMap>,
    id: Id,
    f: impl FnOnce(&Character) -> T,
) -> T {
    engine
        .store()
        .characters
        .read(&id, f)
        .unwrap_or_else(|| panic!("character {id} missing"))
}

/// A `c` move for one character.
pub fn char_move(id: Id, intents: Value) -> Value {
    json!({"c": {id.to_string(): intents}})
}

/// Waypoint list JSON from coordinates.
pub fn wp_json(points: &[(i32, i32)]) -> Value {
    let list: Vec<Value> = points.iter().map(|(x, y)| json!({"x": x, "y": y})).collect();
    Value::Array(list)
}
