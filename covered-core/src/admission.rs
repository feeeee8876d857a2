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

//! AdmissionPlacementEngine (§4.5): decide whether a freshly-fetched value
//! clears the fleet-wide reward floor, where to place it, and which local
//! victims must be evicted to make room.
//!
//! Admission itself is synchronous and cheap (a floor comparison); placement
//! is explicitly non-blocking, so the decision is split into [`decide`]
//! (foreground, returns immediately) and [`make_room`] /
//! [`PlacementTicket`] (background, may run after the client already has its
//! value).

use covered_common::edgeset::{EdgeIndex, PreservedEdgeset};
use covered_common::Key;

use crate::reward::Reward;

/// Abstraction over "the local edge has a capacity budget and a victim
/// order" so `make_room` can be unit tested without a real
/// `LocalCacheStore`/`VictimTracker` pair wired up.
pub trait CapacityHost<K: Key> {
    fn free_bytes(&self) -> u64;
    /// Pop the globally-weakest local victim, if any remain.
    fn pop_weakest_victim(&mut self) -> Option<(K, Reward, u64)>;
}

/// Foreground decision: does `r_new` clear the global victim floor?
/// `global_floor = None` means no victim is known anywhere, i.e. always
/// admit (§4.5 step 2-3).
pub fn decide(r_new: Reward, global_floor: Option<Reward>) -> bool {
    match global_floor {
        Some(floor) => r_new > floor,
        None => true,
    }
}

/// Which edges to place the new value on: the beacon's preferred set if it
/// supplied one, otherwise just the local edge.
pub fn placement_edges(local_edge: EdgeIndex, preferred: Option<Vec<EdgeIndex>>) -> Vec<EdgeIndex> {
    match preferred {
        Some(edges) if !edges.is_empty() => edges,
        _ => vec![local_edge],
    }
}

#[derive(Debug, Clone)]
pub struct EvictedForRoom<K> {
    pub key: K,
}

/// Evict the weakest local victims until `needed_bytes` is free, refusing to
/// evict anything whose reward is not below `r_new` (an object never makes
/// room for one less valuable than itself). If capacity still can't be
/// freed (the incoming object is larger than the whole local capacity),
/// admission is declined, not an error (§7).
pub fn make_room<K, H>(host: &mut H, needed_bytes: u64, r_new: Reward) -> Vec<EvictedForRoom<K>>
where
    K: Key,
    H: CapacityHost<K>,
{
    let mut evicted = Vec::new();
    while host.free_bytes() < needed_bytes {
        match host.pop_weakest_victim() {
            Some((key, reward, _size)) if reward < r_new => evicted.push(EvictedForRoom { key }),
            _ => break,
        }
    }
    evicted
}

pub fn admission_fits(host: &impl CapacityHostPeek, needed_bytes: u64) -> bool {
    host.free_bytes() >= needed_bytes
}

/// Read-only peek used by [`admission_fits`] after [`make_room`] ran.
pub trait CapacityHostPeek {
    fn free_bytes(&self) -> u64;
}

impl<K: Key, H: CapacityHost<K>> CapacityHostPeek for H {
    fn free_bytes(&self) -> u64 {
        CapacityHost::free_bytes(self)
    }
}

/// A reservation on a set of placement edges, preventing a second placement
/// decision from double-booking one of them while the first is still in
/// flight (§4.5 "admission must be non-blocking").
pub struct PlacementTicket {
    edges: Vec<EdgeIndex>,
}

impl PlacementTicket {
    /// Reserve `edges` in `preserved`. Caller must hold whatever lock
    /// guards `preserved` for the duration of this call.
    pub fn begin(preserved: &mut PreservedEdgeset, edges: Vec<EdgeIndex>) -> Self {
        preserved.preserve_for_placement(edges.iter().copied());
        Self { edges }
    }

    /// Release every edge this ticket reserved. Must be called exactly once
    /// placement completes or is abandoned (e.g. the collaborator's admit
    /// call failed).
    pub fn finish(self, preserved: &mut PreservedEdgeset) {
        for edge in self.edges {
            preserved.clear(edge);
        }
    }

    pub fn edges(&self) -> &[EdgeIndex] {
        &self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordered_float::OrderedFloat;

    struct FakeHost {
        free: u64,
        victims: Vec<(String, Reward, u64)>,
    }

    impl CapacityHost<String> for FakeHost {
        fn free_bytes(&self) -> u64 {
            self.free
        }

        fn pop_weakest_victim(&mut self) -> Option<(String, Reward, u64)> {
            if self.victims.is_empty() {
                None
            } else {
                let (k, r, s) = self.victims.remove(0);
                self.free += s;
                Some((k, r, s))
            }
        }
    }

    #[test]
    fn decide_admits_when_no_floor_known() {
        assert!(decide(OrderedFloat(0.1), None));
    }

    #[test]
    fn decide_rejects_at_or_below_floor() {
        assert!(!decide(OrderedFloat(1.0), Some(OrderedFloat(1.0))));
        assert!(decide(OrderedFloat(1.1), Some(OrderedFloat(1.0))));
    }

    #[test]
    fn placement_defaults_to_local_edge() {
        assert_eq!(placement_edges(3, None), vec![3]);
        assert_eq!(placement_edges(3, Some(vec![5, 6])), vec![5, 6]);
    }

    #[test]
    fn make_room_stops_at_equal_or_greater_reward_victim() {
        let mut host = FakeHost {
            free: 0,
            victims: vec![
                ("a".to_string(), OrderedFloat(1.0), 10),
                ("b".to_string(), OrderedFloat(9.0), 10),
            ],
        };
        let evicted = make_room(&mut host, 15, OrderedFloat(5.0));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].key, "a");
        assert!(!admission_fits(&host, 15));
    }

    #[test]
    fn placement_ticket_prevents_double_booking() {
        let mut preserved = PreservedEdgeset::new(4);
        let ticket = PlacementTicket::begin(&mut preserved, vec![1, 2]);
        assert!(preserved.is_preserved(1));
        ticket.finish(&mut preserved);
        assert!(!preserved.is_preserved(1));
    }
}
