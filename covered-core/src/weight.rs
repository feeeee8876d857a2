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

//! The two reward weights, `w1` (frequency) and `w2` (cooperative
//! popularity), as a read-mostly shared cell rather than a value baked into
//! every `WeightedRewardFn` at construction time.
//!
//! Grounded on `original_source/src/common/covered_weight.{h,c}`, which keeps
//! `(w1, w2)` behind a single process-wide rwlock-guarded singleton so an
//! operator can retune the blend without restarting every edge. We keep the
//! rwlock-guarded-cell shape but make it an explicit value owned by
//! `EdgeManager` instead of a global, since a global singleton has no clean
//! analogue in a library crate.

use parking_lot::RwLock;

use crate::reward::{Reward, RewardFn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightInfo {
    pub w1: f64,
    pub w2: f64,
}

impl Default for WeightInfo {
    fn default() -> Self {
        Self { w1: 1.0, w2: 1.0 }
    }
}

/// Shared, hot-swappable weight cell. Cheap to read (a single `RwLock` read
/// guard over two `f64`s); writes are rare, operator-driven events.
#[derive(Debug, Default)]
pub struct CoveredWeight {
    inner: RwLock<WeightInfo>,
}

impl CoveredWeight {
    pub fn new(w1: f64, w2: f64) -> Self {
        Self {
            inner: RwLock::new(WeightInfo { w1, w2 }),
        }
    }

    pub fn get(&self) -> WeightInfo {
        *self.inner.read()
    }

    pub fn set(&self, w1: f64, w2: f64) {
        *self.inner.write() = WeightInfo { w1, w2 };
    }
}

impl RewardFn for CoveredWeight {
    fn compute(&self, frequency: u64, cooperative_popularity: Option<f64>) -> Reward {
        let WeightInfo { w1, w2 } = self.get();
        let popularity = cooperative_popularity.unwrap_or(0.0);
        ordered_float::OrderedFloat(w1 * frequency as f64 + w2 * popularity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_visible_to_subsequent_get() {
        let weight = CoveredWeight::new(1.0, 1.0);
        weight.set(2.0, 3.0);
        let info = weight.get();
        assert_eq!(info.w1, 2.0);
        assert_eq!(info.w2, 3.0);
    }
}
