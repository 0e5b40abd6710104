// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON state export.
//!
//! Everything rendered here feeds hashing and client sync on the other
//! side of the chain interface, so the output must be byte-stable:
//! objects are key-sorted (`serde_json::Map` is a BTree map), collections
//! are emitted in table order, and the only non-integer numbers are
//! milli-HP shield values with fixed `/1000` scaling.

use serde_json::{json, Map, Value};

use crate::dex::Side;
use crate::ident::Id;
use crate::inventory::Inventory;
use crate::ongoing::Op;
use crate::params::Params;
use crate::proto::{FighterKind, Hp, TargetKey};
use crate::store::Store;

fn hp_json(hp: Hp) -> Value {
    let shield = if hp.shield_mhp == 0 {
        json!(hp.shield)
    } else {
        json!(f64::from(hp.shield) + f64::from(hp.shield_mhp) / 1000.0)
    };
    json!({"armour": hp.armour, "shield": shield})
}

fn inventory_json(inv: &Inventory) -> Value {
    let mut obj = Map::new();
    for (item, count) in inv.iter() {
        obj.insert(item.to_owned(), json!(count));
    }
    Value::Object(obj)
}

fn target_json(t: TargetKey) -> Value {
    let kind = match t.kind {
        FighterKind::Character => "character",
        FighterKind::Building => "building",
    };
    json!({"kind": kind, "id": t.id})
}

fn characters_json(store: &Store) -> Value {
    let mut out = Map::new();
    for c in store.characters.snapshot() {
        let mut obj = Map::new();
        obj.insert("owner".to_owned(), json!(c.owner));
        obj.insert("faction".to_owned(), json!(c.faction.to_wire().to_string()));
        if let Some(pos) = c.position {
            obj.insert("position".to_owned(), json!({"x": pos.x, "y": pos.y}));
        } else {
            obj.insert("inbuilding".to_owned(), json!(c.building_id));
        }
        if c.enter_building != 0 {
            obj.insert("enterbuilding".to_owned(), json!(c.enter_building));
        }
        obj.insert("hp".to_owned(), hp_json(c.hp));
        obj.insert(
            "maxhp".to_owned(),
            json!({
                "armour": c.proto.combat.max_hp.armour,
                "shield": c.proto.combat.max_hp.shield,
            }),
        );
        obj.insert("speed".to_owned(), json!(c.proto.speed));
        obj.insert("busy".to_owned(), json!(c.busy));
        if !c.proto.waypoints.is_empty() {
            let wps: Vec<Value> = c
                .proto
                .waypoints
                .iter()
                .map(|h| json!({"x": h.x, "y": h.y}))
                .collect();
            obj.insert(
                "movement".to_owned(),
                json!({
                    "partialstep": c.partial_step,
                    "blockedturns": c.blocked_turns,
                    "waypoints": wps,
                }),
            );
        }
        obj.insert(
            "cargo".to_owned(),
            json!({
                "space": c.proto.cargo_space,
                "items": inventory_json(&c.proto.cargo),
            }),
        );
        if let Some(m) = &c.proto.mining {
            obj.insert(
                "mining".to_owned(),
                json!({"min": m.rate_min, "max": m.rate_max, "active": m.active}),
            );
        }
        if let Some(t) = c.proto.target {
            obj.insert("target".to_owned(), target_json(t));
        }
        if !c.proto.effects.is_empty() {
            obj.insert(
                "effects".to_owned(),
                json!({
                    "speed": c.proto.effects.speed_pct,
                    "range": c.proto.effects.range_boost,
                    "mentecon": c.proto.effects.mentecon,
                }),
            );
        }
        out.insert(c.id.to_string(), Value::Object(obj));
    }
    Value::Object(out)
}

fn buildings_json(store: &Store) -> Value {
    let mut out = Map::new();
    for b in store.buildings.snapshot() {
        let mut obj = Map::new();
        obj.insert("type".to_owned(), json!(b.btype));
        if !b.owner.is_empty() {
            obj.insert("owner".to_owned(), json!(b.owner));
        }
        obj.insert("faction".to_owned(), json!(b.faction.to_wire().to_string()));
        obj.insert(
            "centre".to_owned(),
            json!({"x": b.centre.x, "y": b.centre.y}),
        );
        obj.insert("rotation".to_owned(), json!(b.rotation));
        obj.insert("foundation".to_owned(), json!(b.foundation));
        obj.insert("founded".to_owned(), json!(b.age.founded));
        if let Some(f) = b.age.finished {
            obj.insert("finished".to_owned(), json!(f));
        }
        obj.insert(
            "config".to_owned(),
            json!({
                "servicefee": b.config.service_fee_percent,
                "dexfee": b.config.dex_fee_bps,
            }),
        );
        if !b.construction_inventory.is_empty() {
            obj.insert(
                "constructioninventory".to_owned(),
                inventory_json(&b.construction_inventory),
            );
        }
        obj.insert("hp".to_owned(), hp_json(b.hp));
        if let Some(t) = b.proto.target {
            obj.insert("target".to_owned(), target_json(t));
        }
        out.insert(b.id.to_string(), Value::Object(obj));
    }
    Value::Object(out)
}

fn accounts_json(store: &Store) -> Value {
    let mut out = Map::new();
    for a in store.accounts.snapshot() {
        let mut obj = Map::new();
        if let Some(f) = a.faction {
            obj.insert("faction".to_owned(), json!(f.to_wire().to_string()));
        }
        obj.insert("balance".to_owned(), json!(a.balance));
        obj.insert("burnsale".to_owned(), json!(a.burnsale_balance));
        obj.insert("kills".to_owned(), json!(a.kills));
        obj.insert("fame".to_owned(), json!(a.fame));
        let mut skills = Map::new();
        for (skill, xp) in &a.skills {
            skills.insert(skill.clone(), json!(xp));
        }
        obj.insert("skills".to_owned(), Value::Object(skills));
        out.insert(a.name, Value::Object(obj));
    }
    Value::Object(out)
}

fn ongoings_json(store: &Store) -> Value {
    let mut out = Map::new();
    for o in store.ongoings.snapshot() {
        let mut obj = Map::new();
        obj.insert("start".to_owned(), json!(o.start));
        obj.insert("end".to_owned(), json!(o.end));
        if o.character_id != 0 {
            obj.insert("character".to_owned(), json!(o.character_id));
        }
        if o.building_id != 0 {
            obj.insert("building".to_owned(), json!(o.building_id));
        }
        let op = match &o.op {
            Op::Prospection { region } => json!({"type": "prospection", "region": region}),
            Op::ArmourRepair => json!({"type": "armourrepair"}),
            Op::BlueprintCopy {
                account,
                blueprint,
                copies,
            } => json!({
                "type": "bpcopy", "account": account,
                "blueprint": blueprint, "copies": copies,
            }),
            Op::ItemConstruction {
                account,
                output,
                count,
            } => json!({
                "type": "construction", "account": account,
                "output": output, "count": count,
            }),
            Op::BuildingConstruction => json!({"type": "buildingconstruction"}),
            Op::BuildingUpdate { config } => json!({
                "type": "buildingupdate",
                "servicefee": config.service_fee_percent,
                "dexfee": config.dex_fee_bps,
            }),
        };
        obj.insert("operation".to_owned(), op);
        out.insert(o.id.to_string(), Value::Object(obj));
    }
    Value::Object(out)
}

fn orders_json(store: &Store) -> Value {
    let mut out = Map::new();
    for o in store.orders.snapshot() {
        out.insert(
            o.id.to_string(),
            json!({
                "building": o.building,
                "account": o.account,
                "side": match o.side { Side::Bid => "bid", Side::Ask => "ask" },
                "item": o.item,
                "quantity": o.quantity,
                "price": o.price,
            }),
        );
    }
    Value::Object(out)
}

fn ground_loot_json(store: &Store) -> Value {
    let piles: Vec<Value> = store
        .loot
        .snapshot()
        .into_iter()
        .map(|(pos, inv)| {
            json!({
                "position": {"x": pos.x, "y": pos.y},
                "inventory": inventory_json(&inv),
            })
        })
        .collect();
    Value::Array(piles)
}

fn building_inventories_json(store: &Store) -> Value {
    let slots: Vec<Value> = store
        .building_inv
        .snapshot()
        .into_iter()
        .map(|(building, account, inv)| {
            json!({
                "building": building,
                "account": account,
                "inventory": inventory_json(&inv),
            })
        })
        .collect();
    Value::Array(slots)
}

fn region_json(r: &crate::region::Region) -> Value {
    let mut obj = Map::new();
    obj.insert("id".to_owned(), json!(r.id));
    if r.prospecting_character != 0 {
        obj.insert("prospecting".to_owned(), json!(r.prospecting_character));
    }
    if let Some(p) = &r.prospection {
        obj.insert(
            "prospection".to_owned(),
            json!({"name": p.name, "height": p.height, "resource": p.resource}),
        );
        obj.insert("resourceleft".to_owned(), json!(r.resource_left));
    }
    obj.insert("modified".to_owned(), json!(r.modified));
    Value::Object(obj)
}

/// The complete consensus state as JSON.
#[must_use]
pub fn full_state(store: &Store, params: &Params) -> Value {
    let mut prizes = Map::new();
    for (name, left) in store.prizes.borrow().iter() {
        let initial = params
            .prize_table
            .iter()
            .find(|p| p.name == *name)
            .map_or(0, |p| p.stock);
        prizes.insert(name.clone(), json!({"found": initial - left, "left": left}));
    }
    let money = store.money.borrow();
    json!({
        "height": store.height(),
        "accounts": accounts_json(store),
        "characters": characters_json(store),
        "buildings": buildings_json(store),
        "groundloot": ground_loot_json(store),
        "buildinginventories": building_inventories_json(store),
        "ongoings": ongoings_json(store),
        "orders": orders_json(store),
        "prizes": Value::Object(prizes),
        "moneysupply": {
            "total": money.total,
            "burnt": money.burnt,
            "gifted": money.gifted,
            "stages": money.stage_sold.clone(),
        },
    })
}

/// Region rows modified at or after `since`, in id order.
#[must_use]
pub fn regions(store: &Store, since: u64) -> Value {
    let rows: Vec<Value> = store
        .regions
        .snapshot()
        .iter()
        .filter(|r| r.modified >= since)
        .map(region_json)
        .collect();
    Value::Array(rows)
}

/// Everything a fresh client needs once: all region rows.
#[must_use]
pub fn bootstrap_data(store: &Store) -> Value {
    json!({"regions": regions(store, 0)})
}

/// Executed trades for `item` at `building`, oldest first.
#[must_use]
pub fn trade_history(store: &Store, item: &str, building: Id) -> Value {
    let rows: Vec<Value> = store
        .trades
        .borrow()
        .iter()
        .filter(|t| t.building == building && t.item == item)
        .map(|t| {
            json!({
                "height": t.height,
                "price": t.price,
                "quantity": t.quantity,
                "buyer": t.buyer,
                "seller": t.seller,
            })
        })
        .collect();
    Value::Array(rows)
}
