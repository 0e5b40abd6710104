// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The fatal error channel.
//!
//! Two disjoint error domains exist in this engine. Malformed or invalid
//! *user input* is silently dropped at sub-intent granularity and never
//! constructs an error value; raising it would fork consensus. The types
//! here cover the other domain: *consistency errors*, which are engine bugs.
//! They abort block processing immediately so that divergent state can never
//! be committed.

use thiserror::Error;

use crate::ident::Id;

/// A consistency violation detected while processing or validating state.
///
/// Every variant names the broken invariant; tests match on the rendered
/// diagnostic strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// A row referenced another character row that does not exist.
    #[error("{0} {1} refers to non-existing character")]
    DanglingCharacter(&'static str, Id),
    /// A row referenced a building row that does not exist.
    #[error("{0} {1} refers to non-existing building")]
    DanglingBuilding(&'static str, Id),
    /// A row referenced an account that does not exist.
    #[error("{0} refers to non-existing account {1}")]
    DanglingAccount(&'static str, String),
    /// An entity's faction disagrees with its owner's faction.
    #[error("Faction mismatch for {0} {1}")]
    FactionMismatch(&'static str, Id),
    /// A building's age data claims a founding after the current height.
    #[error("building {0} founded in the future")]
    FoundedInFuture(Id),
    /// A building's age data orders founded/finished heights incorrectly.
    #[error("building {0} finished before it was founded")]
    FinishedBeforeFounded(Id),
    /// An ongoing operation and its carrier disagree about each other.
    #[error("ongoing operation {0} carrier back-reference broken")]
    OngoingBackref(Id),
    /// An ongoing operation names no carrier or two carriers.
    #[error("ongoing operation {0} must have exactly one carrier")]
    OngoingCarrier(Id),
    /// A character is simultaneously on the map and inside a building.
    #[error("character {0} is both positioned and inside a building")]
    PositionAndBuilding(Id),
    /// A character's cargo exceeds its cargo space.
    #[error("character {0} cargo exceeds cargo space")]
    CargoOverflow(Id),
    /// An account owns more characters than the chain parameter allows.
    #[error("account {0} exceeds the character limit")]
    CharacterLimit(String),
    /// A region's prospecting attribution is inconsistent.
    #[error("region {0} prospecting attribution broken")]
    ProspectionAttribution(Id),
    /// A damage-list entry outlived the aging window.
    #[error("damage list entry for victim {0} outlived the aging window")]
    StaleDamageEntry(Id),
    /// A DEX order references a dead account or an unfinished building.
    #[error("dex order {0} references invalid account or building")]
    OrderReference(Id),
    /// The coin accounting equation does not balance.
    #[error("money supply mismatch: circulating {0}, expected {1}")]
    MoneySupplyMismatch(u64, u64),
    /// Burnsale stage accounting disagrees with the non-gifted supply.
    #[error("burnsale accounting mismatch: sold {0}, expected {1}")]
    BurnsaleMismatch(u64, u64),
    /// Test-chain gifts can never exist on the main chain.
    #[error("gifted coins on mainnet")]
    GiftedOnMain,
    /// The block input JSON was structurally unusable.
    ///
    /// Only block-level structure is fatal (missing height, non-numeric
    /// `out` amounts); per-player move bodies are user input and never
    /// reach this variant.
    #[error("malformed block data: {0}")]
    MalformedBlock(&'static str),
    /// Blocks must arrive in strictly ascending height order.
    #[error("block height {0} does not follow {1}")]
    OutOfOrderBlock(u64, u64),
}
