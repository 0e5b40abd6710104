// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Building rows.

use hexar_geom::Hex;

use crate::ident::{Faction, Height, Id};
use crate::inventory::Inventory;
use crate::params::Params;
use crate::proto::{CombatData, Hp, TargetKey};
use crate::store::table::{columns, TableRow};

/// Founding and completion heights.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgeData {
    /// Block at which the foundation was placed.
    pub founded: Height,
    /// Block at which construction finished; `None` for foundations.
    pub finished: Option<Height>,
}

/// Owner-adjustable building configuration.
///
/// Changes go through a delayed `BuildingUpdate` operation, so the config
/// in effect while a block's moves are processed is always the one set at
/// least `building_update_delay` blocks earlier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildingConfig {
    /// Surcharge on service base costs, in percent, paid to the owner.
    pub service_fee_percent: u32,
    /// DEX trade fee in basis points, paid to the owner.
    pub dex_fee_bps: u32,
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self {
            service_fee_percent: 0,
            dex_fee_bps: 10,
        }
    }
}

/// The building payload behind the indexed columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildingProto {
    /// Combat fit (turrets are armed, most types are not).
    pub combat: CombatData,
    /// Acquired hostile target.
    pub target: Option<TargetKey>,
    /// Acquired same-faction target for friendly attacks.
    pub friendly_target: Option<TargetKey>,
}

/// A building or foundation on the map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Building {
    /// Row id.
    pub id: Id,
    /// Catalog type name.
    pub btype: String,
    /// Owner account; empty for Ancient structures.
    pub owner: String,
    /// Faction of the owner at founding time.
    pub faction: Faction,
    /// Centre tile.
    pub centre: Hex,
    /// Shape rotation in 60° steps, `0..=5`.
    pub rotation: u8,
    /// Founding and completion heights.
    pub age: AgeData,
    /// Owner-adjustable configuration.
    pub config: BuildingConfig,
    /// Whether the building is still a foundation.
    pub foundation: bool,
    /// Resources staged for construction.
    pub construction_inventory: Inventory,
    /// Id of the carried ongoing operation, zero when none.
    pub ongoing_construction: Id,
    /// Current hit points.
    pub hp: Hp,
    /// Full payload.
    pub proto: BuildingProto,
}

impl Building {
    /// The world tiles occupied by this building.
    ///
    /// Resolved from the catalog shape rotated by the stored rotation.
    /// Unknown types (cannot happen for validated rows) occupy only the
    /// centre.
    #[must_use]
    pub fn tiles(&self, params: &Params) -> Vec<Hex> {
        params.building(&self.btype).map_or_else(
            || vec![self.centre],
            |def| {
                def.shape
                    .iter()
                    .map(|&offset| self.centre + offset.rotate(i32::from(self.rotation)))
                    .collect()
            },
        )
    }

    /// L1 distance from `tile` to the nearest occupied tile.
    #[must_use]
    pub fn range_to(&self, params: &Params, tile: Hex) -> u32 {
        self.tiles(params)
            .iter()
            .map(|t| t.distance(tile))
            .min()
            .unwrap_or(u32::MAX)
    }
}

impl TableRow for Building {
    type Key = Id;

    fn key(&self) -> Id {
        self.id
    }

    fn columns(&self) -> u8 {
        let mut cols = 0;
        if self.proto.target.is_some() || self.proto.friendly_target.is_some() {
            cols |= columns::HAS_TARGET;
        }
        if self.proto.combat.shield_regen_mhp > 0
            && (self.hp.shield < self.proto.combat.max_hp.shield)
        {
            cols |= columns::CAN_REGEN;
        }
        if !self.proto.combat.attacks.is_empty() {
            cols |= columns::ARMED;
        }
        cols
    }

    fn position_key(&self) -> Option<Hex> {
        Some(self.centre)
    }
}
