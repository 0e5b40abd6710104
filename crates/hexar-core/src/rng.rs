// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The per-block deterministic random stream.
//!
//! Every randomized decision in a block draws from a single xoroshiro128+
//! stream seeded from the block hash. The draw order is part of consensus:
//! (a) hostile then friendly target picks, iterating fighters by
//! `(kind, id)` ascending; (b) damage rolls in the same fighter order;
//! (c) prize rolls on kill and prospection completion; (d) spawn placement
//! in spawn-queue order; (e) the prospection resource roll; (f) mining
//! yield rolls in character id order. Inserting or reordering a draw is a
//! consensus change.

use blake3::Hasher;

/// Stateful xoroshiro128+ generator for one block's decisions.
///
/// Not cryptographically secure; adversaries know the block hash and can
/// predict every roll. That is fine: the stream exists for fairness and
/// bit-identical replication, not secrecy.
#[derive(Debug, Clone)]
pub struct BlockRng {
    state: [u64; 2],
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl BlockRng {
    /// Seeds the stream from a block's canonical hash string.
    ///
    /// The hash text is run through BLAKE3 and the first sixteen digest
    /// bytes initialise the xoroshiro state via SplitMix64 expansion, so
    /// any two nodes that agree on the block hash agree on every roll.
    #[must_use]
    pub fn from_block_hash(hash: &str) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(b"block:");
        hasher.update(hash.as_bytes());
        let digest = hasher.finalize();
        let bytes = digest.as_bytes();
        let mut seed = u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]);
        let mut state = [splitmix64(&mut seed), splitmix64(&mut seed)];
        if state == [0, 0] {
            state[0] = 0x9e37_79b9_7f4a_7c15;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(55) ^ s1 ^ (s1 << 14);
        self.state[1] = s1.rotate_left(36);

        result
    }

    /// Returns the next integer in the inclusive range `[min, max]`.
    ///
    /// Rejection sampling keeps the distribution exactly uniform; modulo
    /// bias would be observable and therefore a consensus hazard.
    pub fn next_int(&mut self, min: u64, max: u64) -> u64 {
        debug_assert!(min <= max, "invalid range: {min}..={max}");
        let span = (max - min).wrapping_add(1);
        if span == 1 {
            return min;
        }
        let value = if span == 0 {
            // Full u64 range.
            self.next_u64()
        } else if span.is_power_of_two() {
            self.next_u64() & (span - 1)
        } else {
            let bound = u64::MAX - u64::MAX % span;
            loop {
                let candidate = self.next_u64();
                if candidate < bound {
                    break candidate % span;
                }
            }
        };
        min.wrapping_add(value)
    }

    /// Rolls an event with probability `1 / denominator`.
    ///
    /// A denominator of zero never fires; a denominator of one always does.
    pub fn chance(&mut self, denominator: u64) -> bool {
        if denominator == 0 {
            return false;
        }
        self.next_int(0, denominator - 1) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_hashes_yield_identical_streams() {
        let mut a = BlockRng::from_block_hash("00ab17");
        let mut b = BlockRng::from_block_hash("00ab17");
        for _ in 0..64 {
            assert_eq!(a.next_int(0, 1_000_000), b.next_int(0, 1_000_000));
        }
    }

    #[test]
    fn different_hashes_diverge() {
        let mut a = BlockRng::from_block_hash("00ab17");
        let mut b = BlockRng::from_block_hash("00ab18");
        let draws_a: Vec<u64> = (0..16).map(|_| a.next_int(0, u64::MAX - 1)).collect();
        let draws_b: Vec<u64> = (0..16).map(|_| b.next_int(0, u64::MAX - 1)).collect();
        assert_ne!(draws_a, draws_b);
    }

    #[test]
    fn next_int_respects_bounds() {
        let mut rng = BlockRng::from_block_hash("feed");
        for _ in 0..1000 {
            let v = rng.next_int(10, 13);
            assert!((10..=13).contains(&v));
        }
    }

    #[test]
    fn single_value_range_consumes_no_draw() {
        let mut a = BlockRng::from_block_hash("cafe");
        let mut b = a.clone();
        assert_eq!(a.next_int(7, 7), 7);
        // The stream position must be unchanged relative to b.
        assert_eq!(a.next_int(0, 1 << 20), b.next_int(0, 1 << 20));
    }

    #[test]
    fn chance_edge_cases() {
        let mut rng = BlockRng::from_block_hash("02");
        assert!(!rng.chance(0));
        assert!(rng.chance(1));
    }
}
