// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! hexar-core: deterministic block-driven game state processor.
//!
//! For every attached block the engine receives a batch of per-player
//! move bundles and produces a new game state that is bit-identical
//! across all honest nodes. Everything that could diverge is pinned down:
//! a single seeded random stream per block with a documented draw order,
//! fixed `(kind, id)` iteration everywhere, no floats in game logic, and
//! key-sorted JSON on the way out.
//!
//! The crate is organised as entity tables (characters, buildings,
//! regions, operations, orders, inventories) plus phase functions the
//! block pipeline calls in a fixed order; see [`pipeline::Engine`].
#![forbid(unsafe_code)]

/// Account rows.
pub mod account;
/// Building rows.
pub mod building;
/// Character rows.
pub mod character;
/// Target acquisition, damage, kills and regeneration.
pub mod combat;
/// The per-building item exchange.
pub mod dex;
/// The fatal error channel.
pub mod error;
/// Primitive semantic types.
pub mod ident;
/// Fungible inventories.
pub mod inventory;
/// Static map access.
pub mod map;
/// Prospecting and resource extraction.
pub mod mining;
/// Move parsing, validation and application.
pub mod moves;
/// Waypoint stepping, building entry and exit.
pub mod movement;
/// The per-block dynamic obstacle map.
pub mod obstacles;
/// Ongoing multi-block operations.
pub mod ongoing;
/// JSON state export.
pub mod output;
/// Immutable per-chain parameters.
pub mod params;
/// The non-consensus pending-move projection.
pub mod pending;
/// The per-block pipeline orchestrator.
pub mod pipeline;
/// Shared row-payload types.
pub mod proto;
/// Region rows.
pub mod region;
/// The per-block deterministic random stream.
pub mod rng;
/// Building services and ongoing-operation completion.
pub mod services;
/// Deterministic spawn placement.
pub mod spawn;
/// The transactional in-memory row store.
pub mod store;
/// Offline state consistency check.
pub mod validator;

pub use error::StateError;
pub use ident::{parse_id_key, Amount, Faction, Height, Id, COIN};
pub use map::{DiskMap, MapData};
pub use moves::{parse_block_data, BlockData, BlockMeta, MoveEntry};
pub use params::{Chain, Params};
pub use pending::PendingState;
pub use pipeline::Engine;
pub use rng::BlockRng;
pub use store::Store;
pub use validator::validate;
