//  Copyright 2024 COVERED Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! Reward computation and ordering (§4).
//!
//! The original keeps two separate comparator types rather than one ordering
//! with a direction flag: `RewardLruCompare` (ascending reward, oldest-first
//! tiebreak) picks eviction victims, `RewardMruCompare` (descending reward,
//! newest-first tiebreak) ranks admission candidates. We keep that split as
//! two newtypes over the same `(Reward, Recency)` pair rather than a single
//! generic comparator, grounded on
//! `original_source/src/cache/covered/reward_compare.{h,c}`.

use ordered_float::OrderedFloat;

/// A per-key popularity reward. Higher is "more worth keeping".
pub type Reward = OrderedFloat<f64>;

/// Monotonic recency counter, used only to break reward ties.
pub type Recency = u64;

/// Computes the reward driving both eviction and admission decisions.
///
/// `w1`/`w2` are the two tunable weights from `CoveredWeight` (§4):
/// `w1` scales raw access frequency, `w2` scales the cooperative popularity
/// signal collected from peer edges. The default formula is a weighted sum;
/// implementations may substitute a different blend (decay, recency boost)
/// as long as the result remains comparable via `Reward`'s total order.
pub trait RewardFn: Send + Sync {
    fn compute(&self, frequency: u64, cooperative_popularity: Option<f64>) -> Reward;
}

/// `reward = w1 * frequency + w2 * cooperative_popularity`, with an untracked
/// peer signal (`cooperative_popularity = None`) contributing zero, matching
/// `CollectedPopularity`'s `is_tracked = false` case in the original.
#[derive(Debug, Clone, Copy)]
pub struct WeightedRewardFn {
    pub w1: f64,
    pub w2: f64,
}

impl WeightedRewardFn {
    pub fn new(w1: f64, w2: f64) -> Self {
        Self { w1, w2 }
    }
}

impl Default for WeightedRewardFn {
    fn default() -> Self {
        Self { w1: 1.0, w2: 1.0 }
    }
}

impl RewardFn for WeightedRewardFn {
    fn compute(&self, frequency: u64, cooperative_popularity: Option<f64>) -> Reward {
        let popularity = cooperative_popularity.unwrap_or(0.0);
        OrderedFloat(self.w1 * frequency as f64 + self.w2 * popularity)
    }
}

/// Sort key for eviction victim selection: ascending reward, and among equal
/// rewards the least-recently-used (smallest `Recency`) goes first. Wrap
/// `(Reward, Recency)` in this newtype when ordering a `BTreeSet` of
/// candidates so the natural `Ord` produces "worst victim first".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EvictionOrd(pub Reward, pub Recency);

/// Sort key for admission candidate preference: descending reward, and among
/// equal rewards the most-recently-used (largest `Recency`) goes first. We
/// get "descending" cheaply by storing `Reverse`-negated fields is error
/// prone with floats, so instead this type's `Ord` impl explicitly reverses
/// the natural order of its wrapped pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionOrd(pub Reward, pub Recency);

impl PartialOrd for AdmissionOrd {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AdmissionOrd {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.0.cmp(&self.0).then_with(|| other.1.cmp(&self.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untracked_popularity_contributes_zero() {
        let f = WeightedRewardFn::new(2.0, 5.0);
        assert_eq!(f.compute(3, None), OrderedFloat(6.0));
        assert_eq!(f.compute(3, Some(1.0)), OrderedFloat(11.0));
    }

    #[test]
    fn eviction_order_is_ascending_with_lru_tiebreak() {
        let mut v = vec![
            EvictionOrd(OrderedFloat(5.0), 10),
            EvictionOrd(OrderedFloat(1.0), 3),
            EvictionOrd(OrderedFloat(1.0), 1),
        ];
        v.sort();
        assert_eq!(v[0], EvictionOrd(OrderedFloat(1.0), 1));
        assert_eq!(v[1], EvictionOrd(OrderedFloat(1.0), 3));
        assert_eq!(v[2], EvictionOrd(OrderedFloat(5.0), 10));
    }

    #[test]
    fn admission_order_is_descending_with_mru_tiebreak() {
        let mut v = vec![
            AdmissionOrd(OrderedFloat(1.0), 3),
            AdmissionOrd(OrderedFloat(5.0), 10),
            AdmissionOrd(OrderedFloat(5.0), 20),
        ];
        v.sort();
        assert_eq!(v[0], AdmissionOrd(OrderedFloat(5.0), 20));
        assert_eq!(v[1], AdmissionOrd(OrderedFloat(5.0), 10));
        assert_eq!(v[2], AdmissionOrd(OrderedFloat(1.0), 3));
    }
}
