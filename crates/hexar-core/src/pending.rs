// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The non-consensus pending-move projection.
//!
//! While moves sit in the mempool, clients want a preview of what they
//! will do. `PendingState` accumulates the interesting intents — new
//! characters, waypoint updates, prospecting and mining targets — without
//! touching consensus state, and renders them as sorted JSON. It is
//! cleared whenever a real block attaches.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use hexar_geom::Hex;

use crate::ident::{Faction, Id};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct PendingCharacter {
    /// Latest waypoint update, if any.
    waypoints: Option<Vec<Hex>>,
    /// Region the character is about to prospect.
    prospecting: Option<Id>,
    /// Region the character is about to mine; `Some(None)` renders as an
    /// explicit null for "wants to mine but cannot".
    mining: Option<Option<Id>>,
}

/// Accumulated preview of mempool moves.
#[derive(Clone, Debug, Default)]
pub struct PendingState {
    characters: BTreeMap<Id, PendingCharacter>,
    new_characters: BTreeMap<String, Vec<Faction>>,
}

impl PendingState {
    /// An empty projection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything (called when a block is attached).
    pub fn clear(&mut self) {
        self.characters.clear();
        self.new_characters.clear();
    }

    /// Records a pending character creation.
    pub fn add_character_creation(&mut self, name: &str, faction: Faction) {
        self.new_characters
            .entry(name.to_owned())
            .or_default()
            .push(faction);
    }

    /// Records a waypoint update. The latest update wins, and movement
    /// makes mining impossible, so any pending mining intent is dropped.
    pub fn add_waypoints(&mut self, id: Id, waypoints: Vec<Hex>) {
        let entry = self.characters.entry(id).or_default();
        entry.waypoints = Some(waypoints);
        entry.mining = None;
    }

    /// Records a prospecting intent for `region`.
    ///
    /// A character cannot leave its region before the block that applies
    /// the intent, so a second prospect for a *different* region is a
    /// programmer error, not adversarial input.
    pub fn add_prospecting(&mut self, id: Id, region: Id) {
        let entry = self.characters.entry(id).or_default();
        if let Some(previous) = entry.prospecting {
            assert_eq!(
                previous, region,
                "pending prospect for character {id} switched regions"
            );
        }
        entry.prospecting = Some(region);
    }

    /// Records a mining intent; pass `None` when the character wants to
    /// mine but cannot (moving, prospecting, unfit).
    pub fn add_mining(&mut self, id: Id, region: Option<Id>) {
        let entry = self.characters.entry(id).or_default();
        let blocked = entry.waypoints.is_some() || entry.prospecting.is_some();
        entry.mining = Some(if blocked { None } else { region });
    }

    /// Renders the projection as sorted JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let characters: Vec<Value> = self
            .characters
            .iter()
            .map(|(id, c)| {
                let mut obj = Map::new();
                obj.insert("id".to_owned(), json!(id));
                if let Some(wp) = &c.waypoints {
                    let list: Vec<Value> =
                        wp.iter().map(|h| json!({"x": h.x, "y": h.y})).collect();
                    obj.insert("waypoints".to_owned(), Value::Array(list));
                }
                if let Some(region) = c.prospecting {
                    obj.insert("prospecting".to_owned(), json!(region));
                }
                if let Some(mining) = &c.mining {
                    obj.insert(
                        "mining".to_owned(),
                        mining.map_or(Value::Null, |r| json!(r)),
                    );
                }
                Value::Object(obj)
            })
            .collect();

        let new_characters: Vec<Value> = self
            .new_characters
            .iter()
            .map(|(name, creations)| {
                let list: Vec<Value> = creations
                    .iter()
                    .map(|f| json!({"faction": f.to_wire().to_string()}))
                    .collect();
                json!({"name": name, "creations": list})
            })
            .collect();

        json!({
            "characters": characters,
            "newcharacters": new_characters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_then_replay_matches_fresh_state() {
        let mut a = PendingState::new();
        a.add_waypoints(9, vec![Hex::new(1, 0)]);
        a.clear();
        a.add_character_creation("domob", Faction::Red);
        a.add_prospecting(5, 42);

        let mut b = PendingState::new();
        b.add_character_creation("domob", Faction::Red);
        b.add_prospecting(5, 42);

        assert_eq!(a.to_json(), b.to_json());
    }

    #[test]
    fn waypoints_clear_pending_mining() {
        let mut p = PendingState::new();
        p.add_mining(3, Some(7));
        p.add_waypoints(3, vec![Hex::new(2, 2)]);
        let json = p.to_json();
        assert!(json["characters"][0].get("mining").is_none());
    }

    #[test]
    fn mining_after_waypoints_is_null() {
        let mut p = PendingState::new();
        p.add_waypoints(3, vec![Hex::new(2, 2)]);
        p.add_mining(3, Some(7));
        assert_eq!(p.to_json()["characters"][0]["mining"], Value::Null);
    }

    #[test]
    fn repeated_prospect_for_same_region_is_fine() {
        let mut p = PendingState::new();
        p.add_prospecting(3, 7);
        p.add_prospecting(3, 7);
        assert_eq!(p.to_json()["characters"][0]["prospecting"], json!(7));
    }

    #[test]
    #[should_panic(expected = "switched regions")]
    fn prospect_region_switch_fails_loudly() {
        let mut p = PendingState::new();
        p.add_prospecting(3, 7);
        p.add_prospecting(3, 8);
    }

    #[test]
    fn output_is_sorted_by_id_and_name() {
        let mut p = PendingState::new();
        p.add_waypoints(20, vec![]);
        p.add_waypoints(3, vec![]);
        p.add_character_creation("zoe", Faction::Blue);
        p.add_character_creation("andy", Faction::Green);
        let json = p.to_json();
        assert_eq!(json["characters"][0]["id"], json!(3));
        assert_eq!(json["characters"][1]["id"], json!(20));
        assert_eq!(json["newcharacters"][0]["name"], json!("andy"));
        assert_eq!(json["newcharacters"][1]["name"], json!("zoe"));
    }
}
