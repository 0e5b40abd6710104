// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
//! Move surface: account creation, purchases, ownership checks and the
//! silent-drop rule for bad sub-intents.

mod common;

use common::{attach, block_json, char_move, char_pos, engine, put_character, read_char, wp_json};
use hexar_core::ident::{Faction, COIN};
use hexar_core::{DiskMap, Engine};
use hexar_geom::Hex;
use serde_json::json;

fn dev(e: &Engine<DiskMap>) -> String {
    e.params().developer_address.clone()
}

fn owned_characters(e: &Engine<DiskMap>, owner: &str) -> Vec<u64> {
    e.store()
        .characters
        .keys()
        .into_iter()
        .filter(|id| {
            e.store()
                .characters
                .read(id, |c| c.owner == owner)
                .unwrap_or(false)
        })
        .collect()
}

#[test]
fn first_move_creates_the_account() {
    let mut e = engine();
    attach(&mut e, 1, json!([{"name": "domob", "move": {"bogus": true}}]));
    assert!(e.store().accounts.contains(&"domob".to_owned()));
    assert_eq!(
        e.store()
            .accounts
            .read(&"domob".to_owned(), |a| a.faction)
            .unwrap(),
        None
    );
}

#[test]
fn character_purchase_requires_payment_and_faction() {
    let mut e = engine();
    let d = dev(&e);

    // No payment: nothing happens.
    attach(&mut e, 1, json!([
        {"name": "domob", "move": {"nc": [{"faction": "r"}]}},
    ]));
    assert!(owned_characters(&e, "domob").is_empty());

    // No faction on a fresh account: dropped even with payment.
    attach(&mut e, 2, json!([
        {"name": "domob", "move": {"nc": [{}]}, "out": {d.clone(): 0.01}},
    ]));
    assert!(owned_characters(&e, "domob").is_empty());

    // Proper purchase pins the account faction and spawns inside the
    // faction's spawn disk.
    attach(&mut e, 3, json!([
        {"name": "domob", "move": {"nc": [{"faction": "r"}]}, "out": {d.clone(): 0.01}},
    ]));
    let chars = owned_characters(&e, "domob");
    assert_eq!(chars.len(), 1);
    assert_eq!(
        e.store()
            .accounts
            .read(&"domob".to_owned(), |a| a.faction)
            .unwrap(),
        Some(Faction::Red)
    );
    let pos = char_pos(&e, chars[0]).expect("spawned on the map");
    let centre = e.params().spawn_centre(Faction::Red);
    assert!(pos.distance(centre) <= e.params().spawn_radius + 2);

    // A later creation with a mismatched faction letter is dropped.
    attach(&mut e, 4, json!([
        {"name": "domob", "move": {"nc": [{"faction": "g"}]}, "out": {d: 0.01}},
    ]));
    assert_eq!(owned_characters(&e, "domob").len(), 1);
}

#[test]
fn one_payment_buys_at_most_that_many_characters() {
    let mut e = engine();
    let d = dev(&e);
    // Payment covers two, the move asks for three.
    attach(&mut e, 1, json!([
        {"name": "domob", "move": {"nc": [{"faction": "r"}, {}, {}]}, "out": {d: 0.02}},
    ]));
    assert_eq!(owned_characters(&e, "domob").len(), 2);
}

#[test]
fn character_limit_caps_purchases() {
    let mut e = engine();
    let d = dev(&e);
    let limit = e.params().character_limit as usize;
    let creations: Vec<serde_json::Value> =
        std::iter::once(json!({"faction": "r"}))
            .chain(std::iter::repeat_with(|| json!({})).take(limit + 4))
            .collect();
    attach(&mut e, 1, json!([
        {"name": "domob", "move": {"nc": creations}, "out": {d: 1.0}},
    ]));
    assert_eq!(owned_characters(&e, "domob").len(), limit);
}

#[test]
fn surplus_developer_payment_flows_through_the_burnsale() {
    let mut e = engine();
    let d = dev(&e);
    // 1.01 paid, 0.01 consumed by the character: 1.0 converts at the
    // first stage price of 0.1 per coin.
    attach(&mut e, 1, json!([
        {"name": "domob", "move": {"nc": [{"faction": "r"}]}, "out": {d: 1.01}},
    ]));
    let (balance, burnsale) = e
        .store()
        .accounts
        .read(&"domob".to_owned(), |a| (a.balance, a.burnsale_balance))
        .unwrap();
    assert_eq!(balance, 10 * COIN);
    assert_eq!(burnsale, 10 * COIN);
    assert_eq!(e.store().money.borrow().total, 10 * COIN);
}

#[test]
fn foreign_characters_cannot_be_driven() {
    let mut e = engine();
    let theirs = put_character(&e, "andy", Faction::Green, Hex::new(0, 0));
    common::put_account(&e, "domob", Faction::Red);

    attach(&mut e, 1, json!([
        {"name": "domob", "move": char_move(theirs, json!({"wp": wp_json(&[(3, 0)])}))},
    ]));
    assert!(read_char(&e, theirs, |c| c.proto.waypoints.is_empty()));
}

#[test]
fn non_canonical_id_keys_are_dropped() {
    let mut e = engine();
    let id = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    assert_eq!(id, 1);

    attach(&mut e, 1, json!([
        {"name": "domob", "move": {"c": {"01": {"wp": wp_json(&[(3, 0)])}}}},
    ]));
    assert!(read_char(&e, id, |c| c.proto.waypoints.is_empty()));
}

#[test]
fn bad_sub_intents_do_not_abort_their_siblings() {
    let mut e = engine();
    let id = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    {
        let mut c = e.store().characters.checkout(&id).unwrap();
        c.payload_mut().proto.cargo.add("ferrite", 5);
    }

    // The waypoint list is malformed; the drop beside it still applies.
    attach(&mut e, 1, json!([
        {"name": "domob", "move": char_move(id, json!({
            "wp": [{"x": "nope", "y": 0}],
            "drop": {"f": {"ferrite": 2}},
        }))},
    ]));
    assert!(read_char(&e, id, |c| c.proto.waypoints.is_empty()));
    assert_eq!(read_char(&e, id, |c| c.proto.cargo.count("ferrite")), 3);
    assert_eq!(e.store().loot.count(Hex::new(0, 0), "ferrite"), 2);
}

#[test]
fn drop_and_pickup_round_trip_through_ground_loot() {
    let mut e = engine();
    let id = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    {
        let mut c = e.store().characters.checkout(&id).unwrap();
        c.payload_mut().proto.cargo.add("ferrite", 10);
    }

    attach(&mut e, 1, json!([
        {"name": "domob", "move": char_move(id, json!({"drop": {"f": {"ferrite": 10}}}))},
    ]));
    assert_eq!(e.store().loot.count(Hex::new(0, 0), "ferrite"), 10);

    attach(&mut e, 2, json!([
        {"name": "domob", "move": char_move(id, json!({"pu": {"f": {"ferrite": 4}}}))},
    ]));
    assert_eq!(read_char(&e, id, |c| c.proto.cargo.count("ferrite")), 4);
    assert_eq!(e.store().loot.count(Hex::new(0, 0), "ferrite"), 6);
}

#[test]
fn pickup_respects_cargo_space() {
    let mut e = engine();
    let id = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    {
        let mut c = e.store().characters.checkout(&id).unwrap();
        c.payload_mut().proto.cargo_space = 3;
    }
    e.store().loot.with(Hex::new(0, 0), |pile| pile.add("ferrite", 10));

    attach(&mut e, 1, json!([
        {"name": "domob", "move": char_move(id, json!({"pu": {"f": {"ferrite": 10}}}))},
    ]));
    assert_eq!(read_char(&e, id, |c| c.proto.cargo.count("ferrite")), 3);
    assert_eq!(e.store().loot.count(Hex::new(0, 0), "ferrite"), 7);
}

#[test]
fn send_requires_an_initialised_same_faction_recipient() {
    let mut e = engine();
    let id = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    common::put_account(&e, "ally", Faction::Red);
    common::put_account(&e, "enemy", Faction::Green);

    attach(&mut e, 1, json!([
        {"name": "domob", "move": char_move(id, json!({"send": "enemy"}))},
    ]));
    assert_eq!(read_char(&e, id, |c| c.owner.clone()), "domob");

    attach(&mut e, 2, json!([
        {"name": "domob", "move": char_move(id, json!({"send": "stranger"}))},
    ]));
    assert_eq!(read_char(&e, id, |c| c.owner.clone()), "domob");

    attach(&mut e, 3, json!([
        {"name": "domob", "move": char_move(id, json!({"send": "ally"}))},
    ]));
    assert_eq!(read_char(&e, id, |c| c.owner.clone()), "ally");
}

#[test]
fn spawn_placement_is_deterministic_across_nodes() {
    let run = || {
        let mut e = engine();
        let d = dev(&e);
        e.process_block_json(&block_json(1, json!([
            {"name": "domob", "move": {"nc": [{"faction": "r"}, {}, {}]}, "out": {d: 0.03}},
        ])))
        .unwrap();
        owned_characters(&e, "domob")
            .into_iter()
            .map(|id| char_pos(&e, id).unwrap())
            .collect::<Vec<_>>()
    };
    let a = run();
    let b = run();
    assert_eq!(a, b);
    // No two spawns share a tile.
    let mut tiles = a.clone();
    tiles.sort_unstable();
    tiles.dedup();
    assert_eq!(tiles.len(), a.len());
}
