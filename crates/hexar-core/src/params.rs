// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Immutable per-chain parameter block.
//!
//! Everything balance-related is data here, not code: costs, delays,
//! catalogs, the burnsale schedule and the prize table. The engine treats
//! these values as opaque; changing them changes consensus, so the three
//! chains each get their own constructor and nothing else may mutate a
//! `Params` after construction.

use hexar_geom::Hex;

use crate::ident::{Amount, Faction, COIN};
use crate::proto::{Attack, MaxHp};

/// Which chain this engine instance runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chain {
    /// Production chain.
    Main,
    /// Public test chain.
    Test,
    /// Local regression-test chain.
    Regtest,
}

/// One stage of the burnsale schedule.
#[derive(Clone, Debug)]
pub struct BurnsaleStage {
    /// Coins available in this stage, in minor units.
    pub coins: Amount,
    /// Price per whole coin, in minor units of the chain currency.
    pub price: Amount,
}

/// One prospecting prize with its global stock.
#[derive(Clone, Debug)]
pub struct Prize {
    /// Item name added to the finder's cargo.
    pub name: String,
    /// The prize is won with probability `1 / chance` per prospection.
    pub chance: u64,
    /// Total stock across the whole chain.
    pub stock: u64,
}

/// A minable resource with its discovery weight and yield bounds.
#[derive(Clone, Debug)]
pub struct ResourceDef {
    /// Resource item name.
    pub name: String,
    /// Relative weight in the prospection roll.
    pub weight: u64,
    /// Inclusive bounds of the region yield rolled on discovery.
    pub yield_min: u64,
    /// See `yield_min`.
    pub yield_max: u64,
}

/// A building type in the catalog.
#[derive(Clone, Debug)]
pub struct BuildingDef {
    /// Type name used by `fb` moves.
    pub name: String,
    /// Occupied tiles relative to the centre at rotation 0.
    pub shape: Vec<Hex>,
    /// Resources consumed from the founder's cargo.
    pub cost: Vec<(String, u64)>,
    /// Blocks from foundation to finished.
    pub construction_blocks: u64,
    /// Hit point caps once finished.
    pub max_hp: MaxHp,
    /// Shield regeneration per block in milli-HP.
    pub shield_regen_mhp: u32,
    /// Built-in attacks, if the type is armed.
    pub attacks: Vec<Attack>,
}

/// A constructible item in the catalog.
#[derive(Clone, Debug)]
pub struct ItemDef {
    /// Item name; its blueprint is named `"<name> bp"`.
    pub name: String,
    /// Cargo space per unit.
    pub space: u64,
    /// Construction time in blocks per unit.
    pub complexity: u64,
    /// Resources consumed per unit, taken from the service building's
    /// per-account inventory.
    pub resources: Vec<(String, u64)>,
}

/// The immutable chain parameter block.
#[derive(Clone, Debug)]
pub struct Params {
    /// Chain selector.
    pub chain: Chain,
    /// Developer payment required per created character.
    pub character_cost: Amount,
    /// Maximum live characters per account.
    pub character_limit: u32,
    /// Radius of each faction's spawn disk.
    pub spawn_radius: u32,
    /// Spawn disk centres in map order Red, Green, Blue.
    pub spawn_centres: [Hex; 3],
    /// Blocks after which an unrefreshed damage-list entry expires.
    pub damage_list_age: u64,
    /// Blocks between a config-update move and the config taking effect.
    pub building_update_delay: u64,
    /// Blocked movement attempts tolerated before a waypoint is dropped.
    pub blocked_step_patience: u32,
    /// Age in blocks after which a region's prospection goes stale and the
    /// region may be prospected again.
    pub stale_prospection_age: u64,
    /// Blocks a prospection operation takes.
    pub prospecting_blocks: u64,
    /// Blocks per blueprint copy.
    pub bp_copy_blocks: u64,
    /// Armour points restored per block of an armour-repair service.
    pub armour_repair_hp_per_block: u32,
    /// Base cost per block of any building service, in minor units.
    /// The base is burnt; the building owner's surcharge comes on top.
    pub service_cost_per_block: Amount,
    /// Fame credited to each attacker owner on a kill.
    pub fame_per_kill: u64,
    /// Floor for effective speed in millitiles per block.
    pub min_speed: u32,
    /// Address whose outputs count as developer payment.
    pub developer_address: String,
    /// Burnsale schedule, consumed in order.
    pub burnsale_stages: Vec<BurnsaleStage>,
    /// Prospecting prize table, rolled in order.
    pub prize_table: Vec<Prize>,
    /// Minable resources.
    pub resources: Vec<ResourceDef>,
    /// Building catalog.
    pub buildings: Vec<BuildingDef>,
    /// Constructible item catalog.
    pub items: Vec<ItemDef>,
}

impl Params {
    /// Parameters of the production chain.
    #[must_use]
    pub fn mainnet() -> Self {
        Self::base(Chain::Main)
    }

    /// Parameters of the public test chain.
    #[must_use]
    pub fn testnet() -> Self {
        let mut p = Self::base(Chain::Test);
        p.character_cost = COIN / 100;
        p
    }

    /// Parameters of the local regression-test chain: cheap characters and
    /// short timers so tests do not wait hundreds of blocks.
    #[must_use]
    pub fn regtest() -> Self {
        let mut p = Self::base(Chain::Regtest);
        p.character_cost = COIN / 100;
        p.stale_prospection_age = 10;
        p.prospecting_blocks = 2;
        p.bp_copy_blocks = 2;
        p.spawn_radius = 4;
        // Close-in spawn disks so small regtest maps contain them.
        p.spawn_centres = [Hex::new(-20, 0), Hex::new(20, -10), Hex::new(0, 15)];
        p
    }

    fn base(chain: Chain) -> Self {
        Self {
            chain,
            character_cost: 5 * COIN,
            character_limit: 20,
            spawn_radius: 10,
            spawn_centres: [Hex::new(-60, 0), Hex::new(60, -30), Hex::new(0, 45)],
            damage_list_age: 100,
            building_update_delay: 10,
            blocked_step_patience: 10,
            stale_prospection_age: 5_000,
            prospecting_blocks: 10,
            bp_copy_blocks: 10,
            armour_repair_hp_per_block: 100,
            service_cost_per_block: COIN / 100,
            fame_per_kill: 100,
            min_speed: 1,
            developer_address: "HEXdev7Qv3q2MZz1CFoUXk".to_owned(),
            burnsale_stages: vec![
                BurnsaleStage {
                    coins: 10_000_000 * COIN,
                    price: COIN / 10,
                },
                BurnsaleStage {
                    coins: 10_000_000 * COIN,
                    price: COIN / 5,
                },
                BurnsaleStage {
                    coins: 10_000_000 * COIN,
                    price: COIN / 2,
                },
                BurnsaleStage {
                    coins: 20_000_000 * COIN,
                    price: COIN,
                },
            ],
            prize_table: vec![
                Prize {
                    name: "gold mark".to_owned(),
                    chance: 1_500,
                    stock: 10,
                },
                Prize {
                    name: "silver mark".to_owned(),
                    chance: 200,
                    stock: 50,
                },
                Prize {
                    name: "bronze mark".to_owned(),
                    chance: 20,
                    stock: 2_000,
                },
            ],
            resources: vec![
                ResourceDef {
                    name: "ferrite".to_owned(),
                    weight: 40,
                    yield_min: 200,
                    yield_max: 500,
                },
                ResourceDef {
                    name: "cryon".to_owned(),
                    weight: 30,
                    yield_min: 100,
                    yield_max: 300,
                },
                ResourceDef {
                    name: "obsid".to_owned(),
                    weight: 20,
                    yield_min: 50,
                    yield_max: 150,
                },
                ResourceDef {
                    name: "aurum".to_owned(),
                    weight: 10,
                    yield_min: 10,
                    yield_max: 50,
                },
            ],
            buildings: vec![
                BuildingDef {
                    name: "hq".to_owned(),
                    shape: disk_shape(),
                    cost: vec![("ferrite".to_owned(), 50)],
                    construction_blocks: 20,
                    max_hp: MaxHp {
                        armour: 500,
                        shield: 100,
                    },
                    shield_regen_mhp: 500,
                    attacks: vec![],
                },
                BuildingDef {
                    name: "depot".to_owned(),
                    shape: vec![Hex::ORIGIN],
                    cost: vec![("ferrite".to_owned(), 20)],
                    construction_blocks: 10,
                    max_hp: MaxHp {
                        armour: 300,
                        shield: 50,
                    },
                    shield_regen_mhp: 500,
                    attacks: vec![],
                },
                BuildingDef {
                    name: "turret".to_owned(),
                    shape: vec![Hex::ORIGIN],
                    cost: vec![("ferrite".to_owned(), 30), ("cryon".to_owned(), 10)],
                    construction_blocks: 15,
                    max_hp: MaxHp {
                        armour: 200,
                        shield: 100,
                    },
                    shield_regen_mhp: 1_000,
                    attacks: vec![Attack::damage_only(5, 5, 10)],
                },
                BuildingDef {
                    name: "workshop".to_owned(),
                    shape: vec![Hex::ORIGIN, Hex::new(1, 0), Hex::new(0, 1)],
                    cost: vec![("ferrite".to_owned(), 40)],
                    construction_blocks: 15,
                    max_hp: MaxHp {
                        armour: 400,
                        shield: 50,
                    },
                    shield_regen_mhp: 500,
                    attacks: vec![],
                },
            ],
            items: vec![
                ItemDef {
                    name: "lance".to_owned(),
                    space: 2,
                    complexity: 10,
                    resources: vec![("ferrite".to_owned(), 5), ("cryon".to_owned(), 2)],
                },
                ItemDef {
                    name: "aegis".to_owned(),
                    space: 3,
                    complexity: 15,
                    resources: vec![("ferrite".to_owned(), 8), ("obsid".to_owned(), 3)],
                },
                ItemDef {
                    name: "drillhead".to_owned(),
                    space: 1,
                    complexity: 5,
                    resources: vec![("ferrite".to_owned(), 3)],
                },
            ],
        }
    }

    /// Spawn disk centre of a player faction.
    #[must_use]
    pub fn spawn_centre(&self, faction: Faction) -> Hex {
        match faction {
            Faction::Red | Faction::Ancient => self.spawn_centres[0],
            Faction::Green => self.spawn_centres[1],
            Faction::Blue => self.spawn_centres[2],
        }
    }

    /// Looks up a building type.
    #[must_use]
    pub fn building(&self, name: &str) -> Option<&BuildingDef> {
        self.buildings.iter().find(|b| b.name == name)
    }

    /// Looks up a constructible item by output name.
    #[must_use]
    pub fn item(&self, name: &str) -> Option<&ItemDef> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Looks up a resource definition.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&ResourceDef> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Cargo space taken by one unit of `item`.
    ///
    /// Resources and unknown items (prizes, blueprints) occupy one unit.
    #[must_use]
    pub fn item_space(&self, item: &str) -> u64 {
        self.item(item).map_or(1, |i| i.space)
    }
}

fn disk_shape() -> Vec<Hex> {
    let mut shape = vec![Hex::ORIGIN];
    shape.extend(Hex::ORIGIN.neighbours());
    shape
}
