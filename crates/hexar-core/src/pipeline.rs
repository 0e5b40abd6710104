// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The per-block pipeline orchestrator.
//!
//! `Engine::process_block` is the single entry point the chain layer
//! calls. The phase order is fixed and every step of it is load-bearing:
//!
//! 1.  seed the block's random stream from the block hash;
//! 2.  build the dynamic obstacle map from current positions;
//! 3.  age damage lists;
//! 4.  complete ongoing operations due at this height (before moves, so a
//!     finished prospection can be mined in the same block);
//! 5.  process moves (foundations placed here already block movement);
//! 6.  acquire targets (before damage, so mutually-lethal fighters both
//!     die);
//! 7.  roll damage and collect kills;
//! 8.  process kills (before movement, so an attacker can step onto the
//!     victim's loot tile next block and collect this block's drops);
//! 9.  step movement (new waypoints from this block's moves already
//!     apply);
//! 10. resolve building entries;
//! 11. place spawned characters;
//! 12. regenerate shields (the dead no longer regenerate);
//! 13. mining ticks, then finalisation: staged effects become active for
//!     the next block and the pending projection resets.
//!
//! The store is cloned before the block and swapped back on any fatal
//! error, so a block either applies fully or not at all.

use serde_json::Value;
use tracing::{error, info};

use crate::error::StateError;
use crate::ident::{Height, Id};
use crate::map::MapData;
use crate::moves::{self, BlockData};
use crate::obstacles::DynObstacles;
use crate::output;
use crate::params::Params;
use crate::pending::PendingState;
use crate::rng::BlockRng;
use crate::store::Store;
use crate::{combat, mining, movement, services, spawn, validator};

/// The deterministic game-state processor.
#[derive(Debug)]
pub struct Engine<M: MapData> {
    params: Params,
    map: M,
    store: Store,
    pending: PendingState,
}

impl<M: MapData> Engine<M> {
    /// Creates an engine with a fresh, empty state.
    #[must_use]
    pub fn new(params: Params, map: M) -> Self {
        let store = Store::new(&params);
        Self {
            params,
            map,
            store,
            pending: PendingState::new(),
        }
    }

    /// The chain parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The static map.
    #[must_use]
    pub fn map(&self) -> &M {
        &self.map
    }

    /// The underlying store. Mutation goes through row handles, so tests
    /// and tooling can adjust state between blocks through this reference.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Parses a block JSON envelope and processes it.
    pub fn process_block_json(&mut self, json: &Value) -> Result<Height, StateError> {
        let block = moves::parse_block_data(json, &self.params)?;
        let height = block.meta.height;
        self.process_block(&block)?;
        Ok(height)
    }

    /// Processes one block: applies its moves and advances every system.
    ///
    /// Consensus rule: this either fully succeeds or leaves the state
    /// untouched. Fatal errors mean an engine bug or corrupt chain data,
    /// never bad player input.
    pub fn process_block(&mut self, block: &BlockData) -> Result<(), StateError> {
        let height = block.meta.height;
        if let Some(last) = self.store.height() {
            if height != last + 1 {
                return Err(StateError::OutOfOrderBlock(height, last));
            }
        }

        let checkpoint = self.store.clone();
        match self.run_block(block) {
            Ok(()) => {
                self.pending.clear();
                info!(height, "block attached");
                Ok(())
            }
            Err(e) => {
                error!(height, %e, "block failed; state rolled back");
                self.store = checkpoint;
                Err(e)
            }
        }
    }

    fn run_block(&mut self, block: &BlockData) -> Result<(), StateError> {
        let height = block.meta.height;
        let mut rng = BlockRng::from_block_hash(&block.meta.hash);
        let mut obstacles = DynObstacles::build(&self.store, &self.params);

        self.store.damage.age(height, self.params.damage_list_age);
        services::complete_due_ops(&self.store, &self.params, &mut rng, height);
        moves::handle_admin(&self.store, &self.params, &block.admin);
        let spawns = moves::apply_moves(
            &self.store,
            &self.params,
            &self.map,
            &mut obstacles,
            height,
            &block.moves,
        );

        combat::acquire_targets(&self.store, &mut rng);
        let outcome = combat::deal_damage(&self.store, &mut rng, height);
        combat::process_kills(&self.store, &self.params, &mut obstacles, outcome.kills, height);

        movement::step_characters(&self.store, &self.params, &self.map, &mut obstacles);
        movement::resolve_building_entries(&self.store, &self.params, &mut obstacles);
        spawn::place_spawns(
            &self.store,
            &self.params,
            &self.map,
            &mut obstacles,
            &mut rng,
            &spawns,
        );

        combat::regenerate(&self.store);
        mining::mining_tick(&self.store, &self.params, &self.map, &mut rng, height);
        combat::apply_staged_effects(&self.store, &outcome.staged_effects);

        self.store.set_height(height);

        // Dev-mode self check: every invariant must hold after every
        // block; a violation aborts and rolls the block back.
        #[cfg(debug_assertions)]
        validator::validate(&self.store, &self.params, &self.map)?;

        Ok(())
    }

    /// Runs the full validator over the current snapshot.
    pub fn validate(&self) -> Result<(), StateError> {
        validator::validate(&self.store, &self.params, &self.map)
    }

    /// The complete consensus state as JSON.
    #[must_use]
    pub fn full_state(&self) -> Value {
        output::full_state(&self.store, &self.params)
    }

    /// Bootstrap payload for fresh clients.
    #[must_use]
    pub fn bootstrap_data(&self) -> Value {
        output::bootstrap_data(&self.store)
    }

    /// Region rows modified at or after `since`.
    #[must_use]
    pub fn regions(&self, since: Height) -> Value {
        output::regions(&self.store, since)
    }

    /// Trade history for one item at one building.
    #[must_use]
    pub fn trade_history(&self, item: &str, building: Id) -> Value {
        output::trade_history(&self.store, item, building)
    }

    /// Feeds one mempool move into the pending projection.
    pub fn add_pending_move(&mut self, name: &str, mv: &Value) {
        let Some(obj) = mv.as_object() else { return };

        if let Some(nc) = obj.get("nc").and_then(Value::as_array) {
            let account_faction = self
                .store
                .accounts
                .read(&name.to_owned(), |a| a.faction)
                .flatten();
            for creation in nc {
                let wanted = creation
                    .as_object()
                    .and_then(|o| o.get("faction"))
                    .and_then(Value::as_str)
                    .and_then(|s| s.chars().next())
                    .and_then(crate::ident::Faction::from_wire);
                if let Some(faction) = account_faction.or(wanted) {
                    self.pending.add_character_creation(name, faction);
                }
            }
        }

        if let Some(c) = obj.get("c").and_then(Value::as_object) {
            for (key, intents) in c {
                let Some(id) = crate::ident::parse_id_key(key) else {
                    continue;
                };
                let owned = self
                    .store
                    .characters
                    .read(&id, |row| row.owner == name)
                    .unwrap_or(false);
                if !owned {
                    continue;
                }
                let Some(intents) = intents.as_object() else {
                    continue;
                };
                if let Some(wp) = intents.get("wp").and_then(moves::parse_waypoints) {
                    self.pending.add_waypoints(id, wp);
                }
                if intents.get("prospect").is_some_and(Value::is_object) {
                    if let Some(region) = self.character_region(id) {
                        self.pending.add_prospecting(id, region);
                    }
                }
                if intents.get("mine").is_some_and(Value::is_object) {
                    let region = self.minable_region(id);
                    self.pending.add_mining(id, region);
                }
            }
        }
    }

    /// The pending projection as JSON.
    #[must_use]
    pub fn pending_json(&self) -> Value {
        self.pending.to_json()
    }

    fn character_region(&self, id: Id) -> Option<Id> {
        self.store
            .characters
            .read(&id, |c| c.position.map(|p| self.map.region_id(p)))?
    }

    fn minable_region(&self, id: Id) -> Option<Id> {
        let capable = self
            .store
            .characters
            .read(&id, |c| {
                !c.busy && c.proto.mining.is_some() && c.proto.waypoints.is_empty()
            })
            .unwrap_or(false);
        if !capable {
            return None;
        }
        let region = self.character_region(id)?;
        let height = self.store.height().unwrap_or(0);
        let minable = self
            .store
            .regions
            .read(&region, |r| {
                r.prospection.is_some()
                    && !r.prospection_stale(height, self.params.stale_prospection_age)
                    && r.resource_left > 0
            })
            .unwrap_or(false);
        minable.then_some(region)
    }
}
