// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
//! JSON export shapes and the pending projection surface.

mod common;

use common::{attach, attach_empty, char_move, engine, put_character, wp_json};
use hexar_core::ident::Faction;
use hexar_geom::Hex;
use serde_json::{json, Value};

#[test]
fn milli_hp_serialises_as_integer_or_fixed_fraction() {
    let mut e = engine();
    let id = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    {
        let mut c = e.store().characters.checkout(&id).unwrap();
        let row = c.payload_mut();
        row.proto.combat.shield_regen_mhp = 400;
        row.proto.combat.max_hp.shield = 30;
        row.hp.shield = 5;
        row.hp.shield_mhp = 0;
    }
    attach_empty(&mut e, 1);

    let state = e.full_state();
    let shield = &state["characters"][&id.to_string()]["hp"]["shield"];
    assert_eq!(shield, &json!(5.4));

    // Two more regen ticks make it 6.2; integers stay integers.
    attach_empty(&mut e, 2);
    attach_empty(&mut e, 3);
    let state = e.full_state();
    let armour = &state["characters"][&id.to_string()]["hp"]["armour"];
    assert_eq!(armour, &json!(100));
    assert_eq!(
        &state["characters"][&id.to_string()]["hp"]["shield"],
        &json!(6.2)
    );
}

#[test]
fn state_objects_are_key_sorted() {
    let mut e = engine();
    put_character(&e, "zoe", Faction::Blue, Hex::new(0, 0));
    put_character(&e, "andy", Faction::Green, Hex::new(9, 0));
    attach_empty(&mut e, 1);

    let state = e.full_state();
    let names: Vec<&String> = state["accounts"].as_object().unwrap().keys().collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);

    let text = serde_json::to_string(&state).unwrap();
    let reparsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(reparsed, state);
}

#[test]
fn regions_export_filters_by_modification_height() {
    let mut e = engine();
    let id = put_character(&e, "domob", Faction::Red, Hex::new(2, 2));
    attach(&mut e, 1, json!([
        {"name": "domob", "move": char_move(id, json!({"prospect": {}}))},
    ]));
    attach_empty(&mut e, 2);
    attach_empty(&mut e, 3);

    // Prospection finished at height 3, so the row is fresh from 3 on.
    assert_eq!(e.regions(0).as_array().unwrap().len(), 1);
    assert_eq!(e.regions(3).as_array().unwrap().len(), 1);
    assert_eq!(e.regions(4).as_array().unwrap().len(), 0);
    assert_eq!(
        e.bootstrap_data()["regions"].as_array().unwrap().len(),
        1
    );
}

#[test]
fn pending_projection_previews_mempool_moves() {
    let mut e = engine();
    let id = put_character(&e, "domob", Faction::Red, Hex::new(2, 2));

    e.add_pending_move("domob", &json!({"c": {id.to_string(): {"wp": wp_json(&[(4, 2)])}}}));
    e.add_pending_move("domob", &json!({"nc": [{"faction": "r"}]}));
    // Mining while a waypoint update is pending renders as null.
    e.add_pending_move("domob", &json!({"c": {id.to_string(): {"mine": {}}}}));

    let pending = e.pending_json();
    assert_eq!(pending["characters"][0]["id"], json!(id));
    assert_eq!(
        pending["characters"][0]["waypoints"],
        json!([{"x": 4, "y": 2}])
    );
    assert_eq!(pending["characters"][0]["mining"], Value::Null);
    assert_eq!(pending["newcharacters"][0]["name"], json!("domob"));

    // Foreign moves are not previewed.
    e.add_pending_move("andy", &json!({"c": {id.to_string(): {"wp": []}}}));
    assert_eq!(
        e.pending_json()["characters"][0]["waypoints"],
        json!([{"x": 4, "y": 2}])
    );

    // An attached block resets the projection.
    attach_empty(&mut e, 1);
    assert_eq!(e.pending_json()["characters"], json!([]));
}
