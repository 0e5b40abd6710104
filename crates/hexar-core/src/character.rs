// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Character rows.

use hexar_geom::Hex;

use crate::ident::{Faction, Id};
use crate::inventory::Inventory;
use crate::proto::{
    ActiveEffects, Attack, CombatData, Hp, MaxHp, MiningProto, TargetKey,
};
use crate::store::table::{columns, TableRow};

/// The full character payload behind the indexed columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacterProto {
    /// Base speed in millitiles per block.
    pub speed: u32,
    /// Cargo capacity in space units.
    pub cargo_space: u64,
    /// Carried items.
    pub cargo: Inventory,
    /// Combat fit.
    pub combat: CombatData,
    /// Movement queue; front entry is the current waypoint.
    pub waypoints: Vec<Hex>,
    /// Mining capability, if fitted.
    pub mining: Option<MiningProto>,
    /// Whether the character can prospect regions.
    pub can_prospect: bool,
    /// Effects active for the current block.
    pub effects: ActiveEffects,
    /// Acquired hostile target.
    pub target: Option<TargetKey>,
    /// Acquired same-faction target for friendly attacks.
    pub friendly_target: Option<TargetKey>,
}

impl CharacterProto {
    /// The stock fit a freshly spawned character starts with.
    #[must_use]
    pub fn starter() -> Self {
        Self {
            speed: 750,
            cargo_space: 100,
            cargo: Inventory::new(),
            combat: CombatData {
                attacks: vec![Attack::damage_only(3, 1, 2)],
                max_hp: MaxHp {
                    armour: 100,
                    shield: 30,
                },
                shield_regen_mhp: 512,
            },
            waypoints: Vec::new(),
            mining: Some(MiningProto {
                rate_min: 2,
                rate_max: 5,
                active: false,
            }),
            can_prospect: true,
            effects: ActiveEffects::default(),
            target: None,
            friendly_target: None,
        }
    }
}

/// A character (vehicle) on the map or inside a building.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Character {
    /// Row id.
    pub id: Id,
    /// Owning account name.
    pub owner: String,
    /// Faction, fixed at creation.
    pub faction: Faction,
    /// Map position; `None` exactly when inside a building.
    pub position: Option<Hex>,
    /// Id of the containing building, zero when on the map.
    pub building_id: Id,
    /// Pending enter-building intent, zero when none.
    pub enter_building: Id,
    /// Accumulated movement credit in millitiles.
    pub partial_step: u32,
    /// Consecutive blocked step attempts against the current waypoint.
    pub blocked_turns: u32,
    /// Current hit points.
    pub hp: Hp,
    /// Whether an ongoing operation occupies the character.
    pub busy: bool,
    /// Id of the carried ongoing operation, zero when none.
    pub ongoing: Id,
    /// Full payload.
    pub proto: CharacterProto,
}

impl Character {
    /// Creates a freshly spawned character (not yet placed).
    #[must_use]
    pub fn create(id: Id, owner: &str, faction: Faction) -> Self {
        let proto = CharacterProto::starter();
        Self {
            id,
            owner: owner.to_owned(),
            faction,
            position: None,
            building_id: 0,
            enter_building: 0,
            partial_step: 0,
            blocked_turns: 0,
            hp: Hp {
                armour: proto.combat.max_hp.armour,
                shield: proto.combat.max_hp.shield,
                shield_mhp: 0,
            },
            busy: false,
            ongoing: 0,
            proto,
        }
    }

    /// Whether the character is inside a building.
    #[must_use]
    pub const fn inside_building(&self) -> bool {
        self.building_id != 0
    }

    /// Effective speed after active effects, floored at `min_speed`.
    #[must_use]
    pub fn effective_speed(&self, min_speed: u32) -> u32 {
        let pct = 100 + i64::from(self.proto.effects.speed_pct);
        let eff = i64::from(self.proto.speed) * pct / 100;
        u32::try_from(eff.max(i64::from(min_speed))).unwrap_or(min_speed)
    }

    /// Drops all movement state: queue, credit and blocked counter.
    pub fn clear_movement(&mut self) {
        self.proto.waypoints.clear();
        self.partial_step = 0;
        self.blocked_turns = 0;
    }

    /// Whether the character is actively mining.
    #[must_use]
    pub fn is_mining(&self) -> bool {
        self.proto.mining.as_ref().is_some_and(|m| m.active)
    }
}

impl TableRow for Character {
    type Key = Id;

    fn key(&self) -> Id {
        self.id
    }

    fn columns(&self) -> u8 {
        let mut cols = 0;
        if !self.proto.waypoints.is_empty() {
            cols |= columns::MOVING;
        }
        if self.proto.target.is_some() || self.proto.friendly_target.is_some() {
            cols |= columns::HAS_TARGET;
        }
        if self.proto.combat.shield_regen_mhp > 0
            && (self.hp.shield < self.proto.combat.max_hp.shield)
        {
            cols |= columns::CAN_REGEN;
        }
        if self.busy {
            cols |= columns::BUSY;
        }
        if self.is_mining() {
            cols |= columns::MINING;
        }
        if !self.proto.combat.attacks.is_empty() {
            cols |= columns::ARMED;
        }
        cols
    }

    fn position_key(&self) -> Option<Hex> {
        self.position
    }
}
