// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Offline state consistency check.
//!
//! One rule per documented invariant, each failing with its own
//! diagnostic. The validator is pure: it reads a snapshot and never
//! mutates anything. It runs after every block in tests and on demand in
//! production tooling; a failure here means an engine bug, never bad
//! player input.

use crate::dex::DexOrder;
use crate::error::StateError;
use crate::ident::{Amount, Faction};
use crate::map::MapData;
use crate::ongoing::Op;
use crate::params::{Chain, Params};
use crate::store::Store;

/// Validates every documented invariant over the current snapshot.
pub fn validate(store: &Store, params: &Params, map: &dyn MapData) -> Result<(), StateError> {
    let height = store.height().unwrap_or(0);

    // Characters: owner, faction, placement, cargo.
    let mut per_owner: std::collections::BTreeMap<String, u32> = std::collections::BTreeMap::new();
    for c in store.characters.snapshot() {
        let owner_faction = store
            .accounts
            .read(&c.owner.clone(), |a| a.faction)
            .ok_or_else(|| StateError::DanglingAccount("character", c.owner.clone()))?;
        if owner_faction != Some(c.faction) {
            return Err(StateError::FactionMismatch("character", c.id));
        }
        match (c.position, c.building_id) {
            (Some(_), 0) => {}
            (None, b) if b != 0 => {
                if !store.buildings.contains(&b) {
                    return Err(StateError::DanglingBuilding("character", c.id));
                }
            }
            _ => return Err(StateError::PositionAndBuilding(c.id)),
        }
        if c.proto.cargo.used_space(params) > c.proto.cargo_space {
            return Err(StateError::CargoOverflow(c.id));
        }
        if c.ongoing != 0 {
            let backref = store
                .ongoings
                .read(&c.ongoing, |o| o.character_id == c.id)
                .unwrap_or(false);
            if !backref {
                return Err(StateError::OngoingBackref(c.ongoing));
            }
        }
        *per_owner.entry(c.owner).or_insert(0) += 1;
    }
    for (owner, count) in per_owner {
        if count > params.character_limit {
            return Err(StateError::CharacterLimit(owner));
        }
    }

    // Buildings: ownership, faction, ages.
    for b in store.buildings.snapshot() {
        if b.owner.is_empty() {
            if b.faction != Faction::Ancient {
                return Err(StateError::FactionMismatch("building", b.id));
            }
        } else {
            let owner_faction = store
                .accounts
                .read(&b.owner.clone(), |a| a.faction)
                .ok_or_else(|| StateError::DanglingAccount("building", b.owner.clone()))?;
            if owner_faction != Some(b.faction) {
                return Err(StateError::FactionMismatch("building", b.id));
            }
        }
        if b.age.founded > height {
            return Err(StateError::FoundedInFuture(b.id));
        }
        match (b.foundation, b.age.finished) {
            (true, None) => {}
            (false, Some(f)) => {
                if f < b.age.founded || f > height {
                    return Err(StateError::FinishedBeforeFounded(b.id));
                }
            }
            _ => return Err(StateError::FinishedBeforeFounded(b.id)),
        }
        if b.ongoing_construction != 0 {
            let backref = store
                .ongoings
                .read(&b.ongoing_construction, |o| o.building_id == b.id)
                .unwrap_or(false);
            if !backref {
                return Err(StateError::OngoingBackref(b.ongoing_construction));
            }
        }
    }

    // Ongoing operations: exactly one carrier, which back-references.
    for o in store.ongoings.snapshot() {
        match (o.character_id, o.building_id) {
            (c, 0) if c != 0 => {
                let backref = store
                    .characters
                    .read(&c, |row| row.ongoing == o.id)
                    .ok_or(StateError::DanglingCharacter("ongoing operation", o.id))?;
                if !backref {
                    return Err(StateError::OngoingBackref(o.id));
                }
            }
            (0, b) if b != 0 => {
                let backref = store
                    .buildings
                    .read(&b, |row| row.ongoing_construction == o.id)
                    .ok_or(StateError::DanglingBuilding("ongoing operation", o.id))?;
                if !backref {
                    return Err(StateError::OngoingBackref(o.id));
                }
            }
            _ => return Err(StateError::OngoingCarrier(o.id)),
        }
    }

    // Regions: prospecting attribution.
    for r in store.regions.snapshot() {
        if r.prospecting_character == 0 {
            continue;
        }
        let attribution = store.characters.read(&r.prospecting_character, |c| {
            let on_op = c.busy
                && store
                    .ongoings
                    .read(&c.ongoing, |o| {
                        matches!(o.op, Op::Prospection { region } if region == r.id)
                    })
                    .unwrap_or(false);
            let in_region = c.position.is_some_and(|p| map.region_id(p) == r.id);
            on_op && in_region
        });
        if attribution != Some(true) {
            return Err(StateError::ProspectionAttribution(r.id));
        }
    }

    // DEX orders reference live accounts and finished buildings.
    for o in store.orders.snapshot() {
        let account_ok = store.accounts.contains(&o.account.clone());
        let building_ok = store
            .buildings
            .read(&o.building, |b| !b.foundation)
            .unwrap_or(false);
        if !account_ok || !building_ok {
            return Err(StateError::OrderReference(o.id));
        }
    }

    // Damage lists respect the aging window.
    for (victim, _, last_hit) in store.damage.snapshot() {
        if last_hit + params.damage_list_age <= height {
            return Err(StateError::StaleDamageEntry(victim));
        }
    }

    // Coin conservation: balances plus bid reservations plus burnt coins
    // equal everything ever entered (burnsale sales plus test-chain
    // gifts).
    let balances: Amount = store
        .accounts
        .snapshot()
        .iter()
        .map(|a| a.balance)
        .sum();
    let reserved: Amount = store.orders.snapshot().iter().map(DexOrder::reserved).sum();
    let money = store.money.borrow();
    let circulating = balances + reserved + money.burnt;
    if circulating != money.total {
        return Err(StateError::MoneySupplyMismatch(circulating, money.total));
    }

    // The non-gifted part of the supply is exactly what the burnsale
    // stages sold, and gifts only exist off-main.
    let sold: Amount = money.stage_sold.iter().sum();
    let expected = money.total.saturating_sub(money.gifted);
    if sold != expected {
        return Err(StateError::BurnsaleMismatch(sold, expected));
    }
    if params.chain == Chain::Main && money.gifted != 0 {
        return Err(StateError::GiftedOnMain);
    }

    Ok(())
}
