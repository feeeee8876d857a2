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

//! Per-edge hot-path counters, plain atomics on the hot path the way
//! `foyer_memory::metrics::Metrics` avoids the `metrics` crate's dynamic
//! registry for counters touched on every get/insert.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    pub local_hit: AtomicU64,
    pub local_miss: AtomicU64,
    pub cooperative_hit: AtomicU64,
    pub cooperative_invalid: AtomicU64,
    pub global_miss: AtomicU64,

    pub admit: AtomicU64,
    pub evict: AtomicU64,
    pub admission_declined: AtomicU64,

    pub directory_busy_degraded: AtomicU64,
    pub write_lock_busy: AtomicU64,
    pub transient_failures: AtomicU64,
    pub unknown_message_type: AtomicU64,
    pub protocol_invariant_violation: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
