// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use hexar_geom::{DistanceField, Hex, L1Ring};
use proptest::prelude::*;

fn coord() -> impl Strategy<Value = Hex> {
    (-50i32..=50, -50i32..=50).prop_map(|(x, y)| Hex::new(x, y))
}

proptest! {
    #[test]
    fn distance_is_a_metric(a in coord(), b in coord(), c in coord()) {
        prop_assert_eq!(a.distance(b), b.distance(a));
        prop_assert_eq!(a.distance(a), 0);
        prop_assert!(a.distance(c) <= a.distance(b) + b.distance(c));
    }

    #[test]
    fn translation_preserves_distance(a in coord(), b in coord(), t in coord()) {
        prop_assert_eq!((a + t).distance(b + t), a.distance(b));
    }

    #[test]
    fn rotation_preserves_pairwise_distance(a in coord(), b in coord(), steps in 0i32..6) {
        prop_assert_eq!(a.rotate(steps).distance(b.rotate(steps)), a.distance(b));
    }

    #[test]
    fn ring_membership_matches_distance(c in coord(), r in 0u32..8) {
        for tile in L1Ring::new(c, r) {
            prop_assert_eq!(c.distance(tile), r);
        }
    }

    #[test]
    fn open_field_distance_equals_l1(target in coord()) {
        let limit = target.distance(Hex::ORIGIN) + 1;
        let field = DistanceField::compute(&[Hex::ORIGIN], limit, |_, _| true);
        prop_assert_eq!(field.get(target), Some(target.distance(Hex::ORIGIN)));
    }

    #[test]
    fn greedy_walk_length_equals_distance(source in coord()) {
        let limit = source.distance(Hex::ORIGIN) + 1;
        let field = DistanceField::compute(&[Hex::ORIGIN], limit, |_, _| true);
        let walk = field.step_path(source).unwrap();
        let steps: u32 = walk.map(|s| s.cost).sum();
        prop_assert_eq!(steps, source.distance(Hex::ORIGIN));
    }
}
