// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Primitive semantic types shared by every table.

use std::fmt;

/// Entity identifier. Monotonically assigned by the store's allocator;
/// zero is reserved for "none" and never names a row.
pub type Id = u64;

/// Block index on the underlying chain.
pub type Height = u64;

/// Non-negative amount in minor currency units (fixed 8-decimal scaling).
pub type Amount = u64;

/// Number of minor units per whole coin in the wire encoding.
pub const COIN: Amount = 100_000_000;

/// Team identity of accounts, characters and buildings.
///
/// Opposing player factions may attack each other; same-faction fighters may
/// buff each other. `Ancient` marks ownerless map structures and is hostile
/// to every player faction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Faction {
    /// Player faction "r".
    Red,
    /// Player faction "g".
    Green,
    /// Player faction "b".
    Blue,
    /// Ownerless map structures.
    Ancient,
}

impl Faction {
    /// Parses the one-letter wire form used in moves and state JSON.
    ///
    /// Only the three player factions have a wire form; `Ancient` is never
    /// valid input.
    #[must_use]
    pub fn from_wire(c: char) -> Option<Faction> {
        match c {
            'r' => Some(Faction::Red),
            'g' => Some(Faction::Green),
            'b' => Some(Faction::Blue),
            _ => None,
        }
    }

    /// One-letter wire form ("r", "g", "b", or "a" for Ancient).
    #[must_use]
    pub const fn to_wire(self) -> char {
        match self {
            Faction::Red => 'r',
            Faction::Green => 'g',
            Faction::Blue => 'b',
            Faction::Ancient => 'a',
        }
    }

    /// Whether this is one of the three player factions.
    #[must_use]
    pub const fn is_player(self) -> bool {
        !matches!(self, Faction::Ancient)
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

/// Parses a canonical decimal id string as used for `c` move keys.
///
/// Canonical means: non-empty, ASCII digits only, no leading zeros (except
/// the string "0", which is rejected anyway because id zero is reserved).
/// Anything else is adversarial input and yields `None`.
#[must_use]
pub fn parse_id_key(s: &str) -> Option<Id> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    let id: Id = s.parse().ok()?;
    if id == 0 {
        return None;
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_key_accepts_canonical_decimals() {
        assert_eq!(parse_id_key("1"), Some(1));
        assert_eq!(parse_id_key("105"), Some(105));
        assert_eq!(parse_id_key("18446744073709551615"), Some(u64::MAX));
    }

    #[test]
    fn id_key_rejects_non_canonical_forms() {
        for bad in ["", "0", "01", " 1", "1 ", "+1", "-1", "0x10", "1.0", "١"] {
            assert_eq!(parse_id_key(bad), None, "accepted {bad:?}");
        }
        // Overflow past u64 is not a valid id either.
        assert_eq!(parse_id_key("18446744073709551616"), None);
    }

    #[test]
    fn faction_wire_round_trip() {
        for f in [Faction::Red, Faction::Green, Faction::Blue] {
            assert_eq!(Faction::from_wire(f.to_wire()), Some(f));
        }
        assert_eq!(Faction::from_wire('a'), None);
        assert_eq!(Faction::from_wire('x'), None);
    }
}
