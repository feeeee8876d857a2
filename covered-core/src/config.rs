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

//! The single configuration object (§6). Every field named in the spec is
//! required; nothing here is inferred at runtime. `CoveredConfig::validate`
//! is what turns a bad value into the fatal, startup-only
//! [`covered_common::CoreError::Config`] (§7).

use std::time::Duration;

use covered_common::{CoreError, Result};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoveredConfig {
    pub edge_count: u32,
    pub local_edge_index: u32,
    pub local_capacity_bytes: u64,
    pub per_edge_synced_victim_count: u32,
    pub per_key_rwlock_shard_count: u32,
    pub operation_timeout_us: u32,
    pub epoch_duration_ms: u32,
    pub uncached_tracker_capacity: u32,
    pub w1_local_hit: f64,
    pub w2_cooperative_hit: f64,
    pub propagation_latency_clientedge_us: u32,
    pub propagation_latency_crossedge_us: u32,
    pub propagation_latency_edgecloud_us: u32,
}

impl CoveredConfig {
    pub fn validate(&self) -> Result<()> {
        if self.edge_count == 0 {
            return Err(CoreError::Config("edge_count must be > 0".into()));
        }
        if self.local_edge_index >= self.edge_count {
            return Err(CoreError::Config(format!(
                "local_edge_index {} out of range [0, {})",
                self.local_edge_index, self.edge_count
            )));
        }
        if self.local_capacity_bytes == 0 {
            return Err(CoreError::Config("local_capacity_bytes must be > 0".into()));
        }
        if self.per_edge_synced_victim_count == 0 {
            return Err(CoreError::Config("per_edge_synced_victim_count must be > 0".into()));
        }
        if self.per_key_rwlock_shard_count == 0 {
            return Err(CoreError::Config("per_key_rwlock_shard_count must be > 0".into()));
        }
        if self.operation_timeout_us == 0 {
            return Err(CoreError::Config("operation_timeout_us must be > 0".into()));
        }
        if self.epoch_duration_ms == 0 {
            return Err(CoreError::Config("epoch_duration_ms must be > 0".into()));
        }
        if self.uncached_tracker_capacity == 0 {
            return Err(CoreError::Config("uncached_tracker_capacity must be > 0".into()));
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_micros(self.operation_timeout_us as u64)
    }

    pub fn epoch_duration(&self) -> Duration {
        Duration::from_millis(self.epoch_duration_ms as u64)
    }

    /// Hard write-lock lease duration. Fixed at a small multiple of the
    /// operation timeout so the beacon never outlives a caller that has
    /// already given up and degraded to cloud (§5 "Cancellation and
    /// timeout").
    pub fn write_lease_duration(&self) -> Duration {
        self.operation_timeout() * 4
    }
}

impl Default for CoveredConfig {
    fn default() -> Self {
        Self {
            edge_count: 1,
            local_edge_index: 0,
            local_capacity_bytes: 64 * 1024 * 1024,
            per_edge_synced_victim_count: 16,
            per_key_rwlock_shard_count: 256,
            operation_timeout_us: 5_000,
            epoch_duration_ms: 60_000,
            uncached_tracker_capacity: 10_000,
            w1_local_hit: 1.0,
            w2_cooperative_hit: 1.0,
            propagation_latency_clientedge_us: 0,
            propagation_latency_crossedge_us: 0,
            propagation_latency_edgecloud_us: 0,
        }
    }
}

/// Builder for [`CoveredConfig`], the teacher's convention for every
/// multi-field config object (`FsDeviceConfigBuilder`,
/// `RuntimeConfigBuilder`). Fields default the same way
/// `CoveredConfig::default` does; `build()` runs `validate()` so a bad
/// config never reaches `EdgeManager::new`.
#[derive(Debug, Clone)]
pub struct CoveredConfigBuilder {
    config: CoveredConfig,
}

impl CoveredConfigBuilder {
    pub fn new(edge_count: u32, local_edge_index: u32) -> Self {
        Self {
            config: CoveredConfig {
                edge_count,
                local_edge_index,
                ..CoveredConfig::default()
            },
        }
    }

    pub fn local_capacity_bytes(mut self, bytes: u64) -> Self {
        self.config.local_capacity_bytes = bytes;
        self
    }

    pub fn per_edge_synced_victim_count(mut self, count: u32) -> Self {
        self.config.per_edge_synced_victim_count = count;
        self
    }

    pub fn per_key_rwlock_shard_count(mut self, count: u32) -> Self {
        self.config.per_key_rwlock_shard_count = count;
        self
    }

    pub fn operation_timeout_us(mut self, us: u32) -> Self {
        self.config.operation_timeout_us = us;
        self
    }

    pub fn epoch_duration_ms(mut self, ms: u32) -> Self {
        self.config.epoch_duration_ms = ms;
        self
    }

    pub fn uncached_tracker_capacity(mut self, capacity: u32) -> Self {
        self.config.uncached_tracker_capacity = capacity;
        self
    }

    pub fn reward_weights(mut self, w1: f64, w2: f64) -> Self {
        self.config.w1_local_hit = w1;
        self.config.w2_cooperative_hit = w2;
        self
    }

    pub fn propagation_latencies(mut self, clientedge_us: u32, crossedge_us: u32, edgecloud_us: u32) -> Self {
        self.config.propagation_latency_clientedge_us = clientedge_us;
        self.config.propagation_latency_crossedge_us = crossedge_us;
        self.config.propagation_latency_edgecloud_us = edgecloud_us;
        self
    }

    pub fn build(self) -> covered_common::Result<CoveredConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(CoveredConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_local_index() {
        let mut cfg = CoveredConfig::default();
        cfg.local_edge_index = 5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut cfg = CoveredConfig::default();
        cfg.local_capacity_bytes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn builder_rejects_bad_local_index() {
        let result = CoveredConfigBuilder::new(2, 9).build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_applies_every_field() {
        let cfg = CoveredConfigBuilder::new(4, 1)
            .local_capacity_bytes(1024)
            .per_edge_synced_victim_count(8)
            .per_key_rwlock_shard_count(64)
            .operation_timeout_us(2_000)
            .epoch_duration_ms(30_000)
            .uncached_tracker_capacity(500)
            .reward_weights(2.0, 0.5)
            .propagation_latencies(10, 20, 30)
            .build()
            .unwrap();
        assert_eq!(cfg.local_capacity_bytes, 1024);
        assert_eq!(cfg.w1_local_hit, 2.0);
        assert_eq!(cfg.propagation_latency_edgecloud_us, 30);
    }
}
