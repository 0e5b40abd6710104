// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
//! Building services: repair, blueprint copies, item construction.

mod common;

use common::{attach, attach_empty, engine, fund, put_account, put_building, put_character, read_char};
use hexar_core::ident::{Faction, COIN};
use hexar_core::{DiskMap, Engine};
use hexar_geom::Hex;
use serde_json::json;

fn workshop(e: &Engine<DiskMap>) -> u64 {
    put_building(e, "host", Faction::Red, "workshop", Hex::new(5, 0))
}

fn stock(e: &Engine<DiskMap>, b: u64, account: &str, item: &str) -> u64 {
    e.store().building_inv.count(b, account, item)
}

#[test]
fn armour_repair_restores_over_time() {
    let mut e = engine();
    let b = workshop(&e);
    fund(&e, "domob", 10 * COIN);
    let id = put_character(&e, "domob", Faction::Red, Hex::new(6, 1));
    {
        let mut c = e.store().characters.checkout(&id).unwrap();
        let row = c.columns_mut();
        row.position = None;
        row.building_id = b;
        row.hp.armour = 0;
    }
    {
        let mut c = e.store().characters.checkout(&id).unwrap();
        c.payload_mut().proto.combat.max_hp.armour = 250;
    }

    // 250 missing armour at 100 per block: a three-block repair.
    attach(&mut e, 1, json!([
        {"name": "domob", "move": {"s": [{"t": "rep", "b": b, "c": id}]}},
    ]));
    assert!(read_char(&e, id, |c| c.busy));
    let cost = 3 * e.params().service_cost_per_block;
    assert_eq!(
        e.store().accounts.read(&"domob".to_owned(), |a| a.balance).unwrap(),
        10 * COIN - cost
    );

    attach_empty(&mut e, 2);
    attach_empty(&mut e, 3);
    assert!(read_char(&e, id, |c| c.busy));
    attach_empty(&mut e, 4);
    assert!(!read_char(&e, id, |c| c.busy));
    assert_eq!(read_char(&e, id, |c| c.hp.armour), 250);
    // The base cost was burnt, keeping supply balanced.
    assert_eq!(e.store().money.borrow().burnt, cost);
}

#[test]
fn blueprint_copies_append_after_per_copy_blocks() {
    let mut e = engine();
    let b = workshop(&e);
    put_account(&e, "domob", Faction::Red);
    fund(&e, "domob", 10 * COIN);
    e.store()
        .building_inv
        .with(b, "domob", |inv| inv.add("lance bp", 1));

    // Two copies at two blocks each on regtest.
    attach(&mut e, 1, json!([
        {"name": "domob", "move": {"s": [{"t": "cp", "b": b, "i": "lance bp", "n": 2}]}},
    ]));
    assert_eq!(stock(&e, b, "domob", "lance bp"), 1);

    for h in 2..=4 {
        attach_empty(&mut e, h);
    }
    attach_empty(&mut e, 5);
    assert_eq!(stock(&e, b, "domob", "lance bp"), 3);
    assert!(e.store().ongoings.is_empty());
}

#[test]
fn item_construction_consumes_resources_up_front() {
    let mut e = engine();
    let b = workshop(&e);
    put_account(&e, "domob", Faction::Red);
    fund(&e, "domob", 10 * COIN);
    e.store().building_inv.with(b, "domob", |inv| {
        inv.add("lance bp", 1);
        inv.add("ferrite", 5);
        inv.add("cryon", 2);
    });

    attach(&mut e, 1, json!([
        {"name": "domob", "move": {"s": [{"t": "bld", "b": b, "i": "lance", "n": 1}]}},
    ]));
    assert_eq!(stock(&e, b, "domob", "ferrite"), 0);
    assert_eq!(stock(&e, b, "domob", "cryon"), 0);
    assert_eq!(stock(&e, b, "domob", "lance"), 0);

    // Complexity 10: finished at block 11.
    for h in 2..=10 {
        attach_empty(&mut e, h);
    }
    attach_empty(&mut e, 11);
    assert_eq!(stock(&e, b, "domob", "lance"), 1);
    // The blueprint is kept.
    assert_eq!(stock(&e, b, "domob", "lance bp"), 1);
}

#[test]
fn construction_without_resources_is_dropped() {
    let mut e = engine();
    let b = workshop(&e);
    put_account(&e, "domob", Faction::Red);
    fund(&e, "domob", 10 * COIN);
    e.store()
        .building_inv
        .with(b, "domob", |inv| inv.add("lance bp", 1));

    attach(&mut e, 1, json!([
        {"name": "domob", "move": {"s": [{"t": "bld", "b": b, "i": "lance", "n": 1}]}},
    ]));
    assert!(e.store().ongoings.is_empty());
    assert_eq!(
        e.store().accounts.read(&"domob".to_owned(), |a| a.balance).unwrap(),
        10 * COIN
    );
}

#[test]
fn one_building_slot_at_a_time() {
    let mut e = engine();
    let b = workshop(&e);
    put_account(&e, "domob", Faction::Red);
    fund(&e, "domob", 10 * COIN);
    e.store()
        .building_inv
        .with(b, "domob", |inv| inv.add("lance bp", 2));

    attach(&mut e, 1, json!([
        {"name": "domob", "move": {"s": [
            {"t": "cp", "b": b, "i": "lance bp", "n": 1},
            {"t": "cp", "b": b, "i": "lance bp", "n": 1},
        ]}},
    ]));
    // The second request finds the slot occupied and is dropped.
    assert_eq!(e.store().ongoings.len(), 1);
}

#[test]
fn unaffordable_service_charges_nothing() {
    let mut e = engine();
    let b = workshop(&e);
    put_account(&e, "domob", Faction::Red);
    e.store()
        .building_inv
        .with(b, "domob", |inv| inv.add("lance bp", 1));

    attach(&mut e, 1, json!([
        {"name": "domob", "move": {"s": [{"t": "cp", "b": b, "i": "lance bp", "n": 100}]}},
    ]));
    assert!(e.store().ongoings.is_empty());
    assert_eq!(
        e.store().accounts.read(&"domob".to_owned(), |a| a.balance).unwrap(),
        0
    );
}
