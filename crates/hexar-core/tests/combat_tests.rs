// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
//! Targeting, damage application, effects and regeneration.

mod common;

use common::{attach, attach_empty, char_move, char_pos, engine, put_character, read_char, wp_json};
use hexar_core::ident::Faction;
use hexar_core::proto::{Attack, AttackEffects, DamageRange, FighterKind, TargetKey};
use hexar_core::{DiskMap, Engine};
use hexar_geom::Hex;
use serde_json::json;

fn arm(e: &Engine<DiskMap>, id: u64, attack: Attack) {
    let mut c = e.store().characters.checkout(&id).unwrap();
    c.payload_mut().proto.combat.attacks = vec![attack];
}

fn disarm(e: &Engine<DiskMap>, id: u64) {
    let mut c = e.store().characters.checkout(&id).unwrap();
    c.payload_mut().proto.combat.attacks.clear();
}

#[test]
fn strictly_closest_candidate_is_targeted() {
    let mut e = engine();
    let attacker = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    let near = put_character(&e, "andy", Faction::Green, Hex::new(2, 0));
    let far = put_character(&e, "andy", Faction::Green, Hex::new(4, 0));
    arm(&e, attacker, Attack::damage_only(5, 0, 0));
    disarm(&e, near);
    disarm(&e, far);

    attach_empty(&mut e, 1);
    assert_eq!(
        read_char(&e, attacker, |c| c.proto.target),
        Some(TargetKey {
            kind: FighterKind::Character,
            id: near,
        })
    );
    let _ = far;
}

#[test]
fn out_of_range_clears_the_target() {
    let mut e = engine();
    let attacker = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    let prey = put_character(&e, "andy", Faction::Green, Hex::new(2, 0));
    arm(&e, attacker, Attack::damage_only(3, 0, 0));
    disarm(&e, prey);

    attach_empty(&mut e, 1);
    assert!(read_char(&e, attacker, |c| c.proto.target).is_some());

    // The prey flees out of range.
    {
        let mut c = e.store().characters.checkout(&prey).unwrap();
        c.columns_mut().position = Some(Hex::new(10, 0));
    }
    attach_empty(&mut e, 2);
    assert_eq!(read_char(&e, attacker, |c| c.proto.target), None);
}

#[test]
fn damage_reduces_shield_before_armour() {
    let mut e = engine();
    let attacker = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    let prey = put_character(&e, "andy", Faction::Green, Hex::new(1, 0));
    arm(&e, attacker, Attack::damage_only(1, 5, 5));
    disarm(&e, prey);
    {
        let mut c = e.store().characters.checkout(&prey).unwrap();
        let row = c.columns_mut();
        row.hp.shield = 3;
        row.hp.shield_mhp = 0;
        row.hp.armour = 100;
    }
    {
        // No regen so the numbers stay put.
        let mut c = e.store().characters.checkout(&prey).unwrap();
        c.payload_mut().proto.combat.shield_regen_mhp = 0;
    }

    attach_empty(&mut e, 1);
    // 5 damage: 3 into the shield, 2 spill into armour.
    assert_eq!(read_char(&e, prey, |c| c.hp.shield), 0);
    assert_eq!(read_char(&e, prey, |c| c.hp.armour), 98);
    // The hit is on the victim's damage list.
    assert_eq!(e.store().damage.attackers(prey), vec![attacker]);
}

#[test]
fn area_attacks_hit_every_eligible_entity() {
    let mut e = engine();
    let attacker = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    let enemy_a = put_character(&e, "andy", Faction::Green, Hex::new(1, 0));
    let enemy_b = put_character(&e, "andy", Faction::Green, Hex::new(-1, 1));
    let friend = put_character(&e, "domob", Faction::Red, Hex::new(0, 1));
    arm(
        &e,
        attacker,
        Attack {
            range: 2,
            area: 2,
            friendlies: false,
            damage: Some(DamageRange { min: 4, max: 4 }),
            effects: AttackEffects::default(),
        },
    );
    for id in [enemy_a, enemy_b, friend] {
        disarm(&e, id);
        let mut c = e.store().characters.checkout(&id).unwrap();
        let row = c.columns_mut();
        row.hp.shield = 0;
        row.hp.armour = 50;
    }
    for id in [enemy_a, enemy_b, friend] {
        let mut c = e.store().characters.checkout(&id).unwrap();
        c.payload_mut().proto.combat.shield_regen_mhp = 0;
    }

    attach_empty(&mut e, 1);
    assert_eq!(read_char(&e, enemy_a, |c| c.hp.armour), 46);
    assert_eq!(read_char(&e, enemy_b, |c| c.hp.armour), 46);
    // Same-faction bystanders are untouched by a hostile area attack.
    assert_eq!(read_char(&e, friend, |c| c.hp.armour), 50);
}

#[test]
fn speed_effect_applies_the_block_after_the_hit() {
    let mut e = engine();
    let attacker = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    let prey = put_character(&e, "andy", Faction::Green, Hex::new(1, 0));
    arm(
        &e,
        attacker,
        Attack {
            range: 5,
            area: 0,
            friendlies: false,
            damage: None,
            effects: AttackEffects {
                speed_pct: -50,
                range_boost: 0,
                mentecon: false,
            },
        },
    );
    disarm(&e, prey);
    {
        let mut c = e.store().characters.checkout(&prey).unwrap();
        c.payload_mut().proto.speed = 1000;
    }

    // Block 1: the hit lands but this block's movement is unaffected.
    attach(&mut e, 1, json!([
        {"name": "andy", "move": char_move(prey, json!({"wp": wp_json(&[(4, 0)])}))},
    ]));
    assert_eq!(char_pos(&e, prey), Some(Hex::new(2, 0)));
    assert_eq!(read_char(&e, prey, |c| c.proto.effects.speed_pct), -50);

    // Block 2: effective speed 500, not enough for a full step.
    attach_empty(&mut e, 2);
    assert_eq!(char_pos(&e, prey), Some(Hex::new(2, 0)));
    assert_eq!(read_char(&e, prey, |c| c.partial_step), 500);

    // Block 3: the attacker keeps re-applying the effect, but the banked
    // 500 plus another 500 buys the step.
    attach_empty(&mut e, 3);
    assert_eq!(char_pos(&e, prey), Some(Hex::new(3, 0)));
}

#[test]
fn damage_list_entries_expire_after_the_window() {
    let mut e = engine();
    let attacker = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    let prey = put_character(&e, "andy", Faction::Green, Hex::new(1, 0));
    arm(&e, attacker, Attack::damage_only(1, 1, 1));
    disarm(&e, prey);
    {
        let mut c = e.store().characters.checkout(&prey).unwrap();
        let row = c.columns_mut();
        row.hp.armour = 10_000;
        row.hp.shield = 0;
    }
    {
        let mut c = e.store().characters.checkout(&prey).unwrap();
        c.payload_mut().proto.combat.shield_regen_mhp = 0;
        c.payload_mut().proto.combat.max_hp.armour = 10_000;
    }

    attach_empty(&mut e, 1);
    assert_eq!(e.store().damage.attackers(prey), vec![attacker]);

    // Move the attacker away so the entry is never refreshed.
    {
        let mut c = e.store().characters.checkout(&attacker).unwrap();
        c.columns_mut().position = Some(Hex::new(20, 0));
    }
    let age = e.params().damage_list_age;
    for h in 2..=age + 1 {
        attach_empty(&mut e, h);
    }
    assert!(e.store().damage.attackers(prey).is_empty());
}

#[test]
fn shield_regeneration_accumulates_milli_hp() {
    let mut e = engine();
    let id = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    {
        let mut c = e.store().characters.checkout(&id).unwrap();
        let row = c.payload_mut();
        row.proto.combat.shield_regen_mhp = 400;
        row.proto.combat.max_hp.shield = 30;
        row.hp.shield = 0;
        row.hp.shield_mhp = 0;
    }

    attach_empty(&mut e, 1);
    assert_eq!(read_char(&e, id, |c| (c.hp.shield, c.hp.shield_mhp)), (0, 400));
    attach_empty(&mut e, 2);
    assert_eq!(read_char(&e, id, |c| (c.hp.shield, c.hp.shield_mhp)), (0, 800));
    attach_empty(&mut e, 3);
    assert_eq!(read_char(&e, id, |c| (c.hp.shield, c.hp.shield_mhp)), (1, 200));
}

#[test]
fn characters_inside_buildings_are_untargetable() {
    let mut e = engine();
    let b = common::put_building(&e, "andy", Faction::Green, "depot", Hex::new(2, 0));
    let attacker = put_character(&e, "domob", Faction::Red, Hex::new(0, 0));
    let sheltered = put_character(&e, "andy", Faction::Green, Hex::new(1, 0));
    arm(&e, attacker, Attack::damage_only(5, 1, 1));
    disarm(&e, sheltered);
    {
        let mut c = e.store().characters.checkout(&sheltered).unwrap();
        let row = c.columns_mut();
        row.position = None;
        row.building_id = b;
    }

    attach_empty(&mut e, 1);
    // The only candidate left is the building itself.
    assert_eq!(
        read_char(&e, attacker, |c| c.proto.target),
        Some(TargetKey {
            kind: FighterKind::Building,
            id: b,
        })
    );
}
