// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The transactional in-memory row store.
//!
//! This is the §-storage collaborator: per-entity tables with exclusive
//! row handles, a monotonic id allocator shared by every table, and a
//! whole-store clone that gives the block processor its transaction
//! boundary (clone before the block, swap back on failure).
//!
//! All table access goes through `&Store`; interior mutability keeps the
//! borrow scopes short and lets phases hold handles to rows of different
//! tables at the same time.

pub mod table;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use hexar_geom::Hex;

use crate::account::Account;
use crate::building::Building;
use crate::character::Character;
use crate::dex::{DexOrder, Trade};
use crate::ident::{Amount, Height, Id};
use crate::inventory::Inventory;
use crate::ongoing::Ongoing;
use crate::params::Params;
use crate::region::Region;

use self::table::Table;

/// Loot lying on the ground, keyed by tile.
///
/// Entries vanish automatically when their inventory empties.
#[derive(Clone, Debug, Default)]
pub struct GroundLoot {
    piles: RefCell<BTreeMap<Hex, Inventory>>,
}

impl GroundLoot {
    /// Mutates the pile at `pos`, creating it on demand and pruning it
    /// when left empty.
    pub fn with<T>(&self, pos: Hex, f: impl FnOnce(&mut Inventory) -> T) -> T {
        let mut piles = self.piles.borrow_mut();
        let pile = piles.entry(pos).or_default();
        let out = f(pile);
        if pile.is_empty() {
            piles.remove(&pos);
        }
        out
    }

    /// Count of `item` on the ground at `pos`.
    #[must_use]
    pub fn count(&self, pos: Hex, item: &str) -> u64 {
        self.piles
            .borrow()
            .get(&pos)
            .map_or(0, |inv| inv.count(item))
    }

    /// All piles in tile order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Hex, Inventory)> {
        self.piles
            .borrow()
            .iter()
            .map(|(p, inv)| (*p, inv.clone()))
            .collect()
    }
}

/// Per-(building, account) item storage.
#[derive(Clone, Debug, Default)]
pub struct BuildingInventories {
    slots: RefCell<BTreeMap<(Id, String), Inventory>>,
}

impl BuildingInventories {
    /// Mutates the inventory of `account` at `building`, creating it on
    /// demand and pruning it when left empty.
    pub fn with<T>(
        &self,
        building: Id,
        account: &str,
        f: impl FnOnce(&mut Inventory) -> T,
    ) -> T {
        let mut slots = self.slots.borrow_mut();
        let inv = slots.entry((building, account.to_owned())).or_default();
        let out = f(inv);
        if inv.is_empty() {
            slots.remove(&(building, account.to_owned()));
        }
        out
    }

    /// Count of `item` held by `account` at `building`.
    #[must_use]
    pub fn count(&self, building: Id, account: &str, item: &str) -> u64 {
        self.slots
            .borrow()
            .get(&(building, account.to_owned()))
            .map_or(0, |inv| inv.count(item))
    }

    /// Removes and returns every inventory stored at `building`, in
    /// account order. Used when the building is destroyed.
    pub fn drain_building(&self, building: Id) -> Vec<(String, Inventory)> {
        let mut slots = self.slots.borrow_mut();
        let keys: Vec<(Id, String)> = slots
            .range((building, String::new())..)
            .take_while(|((b, _), _)| *b == building)
            .map(|(k, _)| k.clone())
            .collect();
        keys.into_iter()
            .filter_map(|k| slots.remove(&k).map(|inv| (k.1, inv)))
            .collect()
    }

    /// All inventories in `(building, account)` order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Id, String, Inventory)> {
        self.slots
            .borrow()
            .iter()
            .map(|((b, a), inv)| (*b, a.clone(), inv.clone()))
            .collect()
    }
}

/// Per-victim attacker bookkeeping with height-based expiry.
#[derive(Clone, Debug, Default)]
pub struct DamageLists {
    entries: RefCell<BTreeMap<Id, BTreeMap<Id, Height>>>,
}

impl DamageLists {
    /// Records (or refreshes) a hit of `attacker` on `victim`.
    pub fn record(&self, victim: Id, attacker: Id, height: Height) {
        self.entries
            .borrow_mut()
            .entry(victim)
            .or_default()
            .insert(attacker, height);
    }

    /// Attackers with a live entry against `victim`, ascending.
    #[must_use]
    pub fn attackers(&self, victim: Id) -> Vec<Id> {
        self.entries
            .borrow()
            .get(&victim)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Drops all entries for a dead victim.
    pub fn remove_victim(&self, victim: Id) {
        self.entries.borrow_mut().remove(&victim);
    }

    /// Expires entries not refreshed within `max_age` blocks.
    pub fn age(&self, height: Height, max_age: Height) {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|_, attackers| {
            attackers.retain(|_, last| *last + max_age > height);
            !attackers.is_empty()
        });
    }

    /// All entries in `(victim, attacker)` order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Id, Id, Height)> {
        self.entries
            .borrow()
            .iter()
            .flat_map(|(v, m)| m.iter().map(|(a, h)| (*v, *a, *h)))
            .collect()
    }
}

/// Coin accounting backing the supply invariant.
#[derive(Clone, Debug, Default)]
pub struct MoneySupply {
    /// Coins ever entered into circulation (burnsale plus gifts).
    pub total: Amount,
    /// Coins destroyed again by service base costs.
    pub burnt: Amount,
    /// Coins gifted by test-chain tooling; always zero on mainnet.
    pub gifted: Amount,
    /// Coins sold per burnsale stage, parallel to the stage table.
    pub stage_sold: Vec<Amount>,
}

/// The complete game state.
#[derive(Clone, Debug)]
pub struct Store {
    /// Accounts by name.
    pub accounts: Table<Account>,
    /// Characters by id.
    pub characters: Table<Character>,
    /// Buildings by id.
    pub buildings: Table<Building>,
    /// Region rows by map-derived id; absent rows are default regions.
    pub regions: Table<Region>,
    /// Ongoing operations by id.
    pub ongoings: Table<Ongoing>,
    /// DEX orders by id.
    pub orders: Table<DexOrder>,
    /// Ground loot by tile.
    pub loot: GroundLoot,
    /// Per-(building, account) inventories.
    pub building_inv: BuildingInventories,
    /// Damage lists.
    pub damage: DamageLists,
    /// Coin accounting.
    pub money: RefCell<MoneySupply>,
    /// Remaining prize stock by prize name.
    pub prizes: RefCell<BTreeMap<String, u64>>,
    /// Executed DEX trades, append-only.
    pub trades: RefCell<Vec<Trade>>,
    next_id: Cell<Id>,
    height: Cell<Option<Height>>,
}

impl Store {
    /// Creates an empty store with prize stock seeded from `params`.
    #[must_use]
    pub fn new(params: &Params) -> Self {
        let prizes = params
            .prize_table
            .iter()
            .map(|p| (p.name.clone(), p.stock))
            .collect();
        Self {
            accounts: Table::new(),
            characters: Table::new(),
            buildings: Table::new(),
            regions: Table::new(),
            ongoings: Table::new(),
            orders: Table::new(),
            loot: GroundLoot::default(),
            building_inv: BuildingInventories::default(),
            damage: DamageLists::default(),
            money: RefCell::new(MoneySupply {
                stage_sold: vec![0; params.burnsale_stages.len()],
                ..MoneySupply::default()
            }),
            prizes: RefCell::new(prizes),
            trades: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            height: Cell::new(None),
        }
    }

    /// Allocates the next entity id.
    ///
    /// One counter serves every table, so ids are unique across
    /// characters, buildings, operations and orders.
    pub fn next_id(&self) -> Id {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Height of the last processed block, if any.
    #[must_use]
    pub fn height(&self) -> Option<Height> {
        self.height.get()
    }

    /// Records the last processed height.
    pub fn set_height(&self, height: Height) {
        self.height.set(Some(height));
    }

    /// Checks out the region row for `id`, materialising a default row
    /// first if the region was never touched.
    pub fn region_mut(
        &self,
        id: Id,
        height: Height,
    ) -> table::Handle<'_, Region> {
        if !self.regions.contains(&id) {
            self.regions.insert(Region::new(id, height));
        }
        match self.regions.checkout(&id) {
            Some(h) => h,
            None => unreachable!("row inserted above"),
        }
    }

    /// Looks up an account, creating it empty if absent, and hands it out.
    pub fn account_mut(&self, name: &str) -> table::Handle<'_, Account> {
        if !self.accounts.contains(&name.to_owned()) {
            self.accounts.insert(Account::new(name));
        }
        match self.accounts.checkout(&name.to_owned()) {
            Some(h) => h,
            None => unreachable!("row inserted above"),
        }
    }
}
