// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Region rows.
//!
//! Regions exist implicitly through the static map partition; a row is
//! only materialised once something non-default happens to it (a
//! prospection starts or finishes). Export filters by `modified` so
//! clients can fetch incremental region data.

use crate::ident::{Height, Id};
use crate::store::table::TableRow;

/// A finished prospection result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prospection {
    /// Account name of the prospector.
    pub name: String,
    /// Block at which prospecting finished.
    pub height: Height,
    /// Discovered resource.
    pub resource: String,
}

/// Dynamic state of one map region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    /// Map-derived region id.
    pub id: Id,
    /// Character currently prospecting here, zero when none.
    pub prospecting_character: Id,
    /// Last finished prospection, if any.
    pub prospection: Option<Prospection>,
    /// Minable units left of the discovered resource.
    pub resource_left: u64,
    /// Height of the last modification, for incremental export.
    pub modified: Height,
}

impl Region {
    /// A default (untouched) region row.
    #[must_use]
    pub fn new(id: Id, height: Height) -> Self {
        Self {
            id,
            prospecting_character: 0,
            prospection: None,
            resource_left: 0,
            modified: height,
        }
    }

    /// Whether the recorded prospection (if any) has gone stale at
    /// `height` and the region may be prospected again.
    #[must_use]
    pub fn prospection_stale(&self, height: Height, stale_age: Height) -> bool {
        self.prospection
            .as_ref()
            .is_none_or(|p| p.height + stale_age <= height)
    }
}

impl TableRow for Region {
    type Key = Id;

    fn key(&self) -> Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_threshold_is_inclusive() {
        let mut r = Region::new(7, 0);
        assert!(r.prospection_stale(0, 10));
        r.prospection = Some(Prospection {
            name: "domob".to_owned(),
            height: 100,
            resource: "ferrite".to_owned(),
        });
        assert!(!r.prospection_stale(109, 10));
        assert!(r.prospection_stale(110, 10));
    }
}
