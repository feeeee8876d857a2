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

//! `EdgeManager` (§4.7): the client-facing GET/PUT/DEL surface, and the
//! background maintenance loop.
//!
//! Keys and values are concrete `Vec<u8>` end to end here (the GLOSSARY's
//! "opaque byte string" for both), unlike [`crate::popularity`]/
//! [`crate::victim`]/[`crate::directory`], which stay generic over `K: Key`
//! so they can be unit tested and reused independently of the wire format.
//! `EdgeManager` is where those generic pieces get instantiated against the
//! concrete byte-string key/value the external collaborators and the wire
//! protocol actually carry.

use covered_common::edgeset::PreservedEdgeset;
use covered_common::CoreError;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::admission::{self, CapacityHost, PlacementTicket};
use crate::cloud::CloudStore;
use crate::config::CoveredConfig;
use crate::directory::{DirectoryTable, LockResult};
use crate::directory_cacher::DirectoryCacher;
use crate::hitflag::HitFlag;
use crate::local_store::LocalCacheStore;
use crate::popularity::{CollectedPopularity, PopularityTracker};
use crate::protocol::{
    AcquireWritelockRequest, AcquireWritelockResponse, Ack, DirectoryAdmitResponse, DirectoryEvictResponse,
    DirectoryLookupRequest, DirectoryLookupResponse, Header, LocalGetRequest, LocalGetResponse, Message,
    MessageType, NetworkAddr, ReleaseWritelockRequest, ReleaseWritelockResponse, WireVictimEntry, WireVictimSyncset,
};
use crate::reward::WeightedRewardFn;
use crate::rwlock::PerKeyRwLockTable;
use crate::topology::EdgeTopology;
use crate::transport::EdgeTransport;
use crate::victim::{VictimCacheinfo, VictimSyncset, VictimTracker};
use crate::weight::CoveredWeight;

type Key = Vec<u8>;
type Value = Vec<u8>;

struct CapacityHostAdapter<'a, L: LocalCacheStore<Key, Value>> {
    local_store: &'a L,
    victims: &'a mut VictimTracker<Key>,
}

impl<'a, L: LocalCacheStore<Key, Value>> CapacityHost<Key> for CapacityHostAdapter<'a, L> {
    fn free_bytes(&self) -> u64 {
        self.local_store.stats().free_bytes()
    }

    fn pop_weakest_victim(&mut self) -> Option<(Key, crate::reward::Reward, u64)> {
        let syncset = self.victims.local_victims(1);
        let weakest = syncset.entries.into_iter().next()?;
        self.victims.on_evict(&weakest.key);
        Some((weakest.key, weakest.reward, weakest.size_bytes as u64))
    }
}

pub struct EdgeManager<L, C, T>
where
    L: LocalCacheStore<Key, Value>,
    C: CloudStore<Key, Value>,
    T: EdgeTransport,
{
    topology: EdgeTopology,
    config: CoveredConfig,
    metrics: covered_common::metrics::Metrics,
    weight: CoveredWeight,
    rwlock: PerKeyRwLockTable,
    metadata_set: crate::rwlock::MetadataSetLock,
    popularity: Mutex<PopularityTracker<Key>>,
    victims: Mutex<VictimTracker<Key>>,
    directory: DirectoryTable<Key>,
    directory_cacher: DirectoryCacher<Key>,
    preserved: Mutex<PreservedEdgeset>,
    local_store: L,
    cloud: C,
    transport: T,
}

impl<L, C, T> EdgeManager<L, C, T>
where
    L: LocalCacheStore<Key, Value>,
    C: CloudStore<Key, Value>,
    T: EdgeTransport,
{
    pub fn new(config: CoveredConfig, local_store: L, cloud: C, transport: T) -> covered_common::Result<Self> {
        config.validate()?;
        let topology = EdgeTopology::new(config.edge_count, config.local_edge_index)?;
        let weight = CoveredWeight::new(config.w1_local_hit, config.w2_cooperative_hit);
        let reward_fn = Box::new(WeightedRewardFn::new(config.w1_local_hit, config.w2_cooperative_hit));
        Ok(Self {
            directory: DirectoryTable::new(config.per_key_rwlock_shard_count, config.write_lease_duration()),
            rwlock: PerKeyRwLockTable::new(config.per_key_rwlock_shard_count),
            metadata_set: crate::rwlock::MetadataSetLock::new(),
            popularity: Mutex::new(PopularityTracker::new(reward_fn, config.uncached_tracker_capacity as usize)),
            victims: Mutex::new(VictimTracker::new()),
            directory_cacher: DirectoryCacher::new(),
            preserved: Mutex::new(PreservedEdgeset::new(config.edge_count as usize)),
            metrics: covered_common::metrics::Metrics::new(),
            weight,
            topology,
            local_store,
            cloud,
            transport,
            config,
        })
    }

    fn header(&self, message_type: u8) -> Header {
        Header {
            message_type,
            source_index: self.topology.self_index(),
            source_addr: NetworkAddr { ip: [0, 0, 0, 0], port: 0 },
            bandwidth_usage: 0,
            event_list: Vec::new(),
            skip_propagation_latency: false,
        }
    }

    /// This edge's current local victim snapshot, in wire form, for
    /// piggybacking on an outgoing cooperation message (§4.3).
    fn local_victim_syncset(&self) -> WireVictimSyncset {
        let k = self.config.per_edge_synced_victim_count as usize;
        let syncset = self.victims.lock().local_victims(k);
        WireVictimSyncset {
            entries: syncset
                .entries
                .into_iter()
                .map(|e| WireVictimEntry {
                    key: e.key,
                    reward: e.reward.into_inner(),
                    last_vtime: e.last_vtime,
                    size_bytes: e.size_bytes,
                })
                .collect(),
        }
    }

    /// Fold a peer's victim snapshot, received alongside a cooperation
    /// message, into this edge's view of the fleet-wide victim floor (§4.3).
    fn ingest_victim_syncset(&self, from_edge: u32, wire: WireVictimSyncset) {
        let syncset = VictimSyncset {
            entries: wire
                .entries
                .into_iter()
                .map(|e| VictimCacheinfo {
                    key: e.key,
                    reward: ordered_float::OrderedFloat(e.reward),
                    last_vtime: e.last_vtime,
                    size_bytes: e.size_bytes,
                })
                .collect(),
        };
        self.victims.lock().ingest(from_edge, syncset);
    }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &Key) -> (Option<Value>, HitFlag) {
        {
            let meta = self.metadata_set.read();
            let token = meta.token();
            let _guard = self.rwlock.acquire_read(key, &token);
            match self.local_store.get(key).await {
                Ok(Some(value)) => {
                    if let Some(evicted) = self.popularity.lock().observe_access(key, true) {
                        self.directory_cacher.remove(&evicted);
                    }
                    covered_common::metrics::Metrics::incr(&self.metrics.local_hit);
                    return (Some(value), HitFlag::LocalHit);
                }
                Ok(None) => {}
                Err(err) => warn!(?err, "local store error on get, falling through"),
            }
        }

        if let Some(info) = self.directory_cacher.get(key) {
            match self.cooperative_get(info.owner_edge, key).await {
                Ok(Some(value)) => {
                    covered_common::metrics::Metrics::incr(&self.metrics.cooperative_hit);
                    self.maybe_admit(key, &value).await;
                    return (Some(value), HitFlag::CooperativeHit);
                }
                Ok(None) => {
                    self.directory_cacher.remove(key);
                    covered_common::metrics::Metrics::incr(&self.metrics.cooperative_invalid);
                }
                Err(_) => {
                    self.directory_cacher.remove(key);
                    covered_common::metrics::Metrics::incr(&self.metrics.cooperative_invalid);
                }
            }
        }

        match self.beacon_lookup(key).await {
            Ok(lookup) if lookup.valid => {
                if let Some(owner) = lookup.owner_edge {
                    self.directory_cacher.insert(key.clone(), crate::directory::DirectoryInfo { owner_edge: owner });
                    if let Ok(Some(value)) = self.cooperative_get(owner, key).await {
                        covered_common::metrics::Metrics::incr(&self.metrics.cooperative_hit);
                        self.maybe_admit(key, &value).await;
                        return (Some(value), HitFlag::CooperativeHit);
                    }
                }
            }
            Ok(lookup) if lookup.is_being_written => {
                covered_common::metrics::Metrics::incr(&self.metrics.directory_busy_degraded);
            }
            _ => {}
        }

        covered_common::metrics::Metrics::incr(&self.metrics.global_miss);
        if let Some(evicted) = self.popularity.lock().observe_access(key, false) {
            self.directory_cacher.remove(&evicted);
        }
        match self.cloud.cloud_get(key).await {
            Ok(Some(value)) => {
                self.maybe_admit(key, &value).await;
                (Some(value), HitFlag::GlobalMiss)
            }
            _ => (None, HitFlag::GlobalMiss),
        }
    }

    #[instrument(skip(self, value))]
    pub async fn put(&self, key: Key, value: Value) -> HitFlag {
        self.write_path(key, Some(value)).await
    }

    #[instrument(skip(self))]
    pub async fn del(&self, key: Key) -> HitFlag {
        self.write_path(key, None).await
    }

    async fn write_path(&self, key: Key, value: Option<Value>) -> HitFlag {
        let acquired = match self.acquire_write_lock(&key).await {
            Ok(a) => a,
            Err(_) => return HitFlag::GlobalMiss,
        };
        if acquired.result != LockResult::Granted {
            covered_common::metrics::Metrics::incr(&self.metrics.write_lock_busy);
            return HitFlag::GlobalMiss;
        }

        for edge in &acquired.copies_to_invalidate {
            if *edge != self.topology.self_index() {
                let _ = self.send_invalidation(*edge, &key).await;
            } else {
                let meta = self.metadata_set.read();
                let token = meta.token();
                let _guard = self.rwlock.acquire_write(&key, &token);
                let _ = self.local_store.remove(&key).await;
            }
        }

        let write_result = match &value {
            Some(v) => self.cloud.cloud_put(key.clone(), v.clone()).await,
            None => self.cloud.cloud_del(&key).await,
        };
        if write_result.is_err() {
            let _ = self
                .release_write_lock(&key, acquired.generation, false)
                .await;
            return HitFlag::GlobalMiss;
        }

        let produced_value = value.is_some();
        if let Some(v) = value.clone() {
            let meta = self.metadata_set.read();
            let token = meta.token();
            let _guard = self.rwlock.acquire_write(&key, &token);
            if self.local_store.insert(key.clone(), v).await.is_ok() {
                self.popularity.lock().on_admit(&key);
                self.directory_cacher.remove(&key);
            }
        }

        let _ = self.release_write_lock(&key, acquired.generation, produced_value).await;
        if produced_value {
            HitFlag::LocalHit
        } else {
            HitFlag::GlobalMiss
        }
    }

    async fn acquire_write_lock(&self, key: &Key) -> covered_common::Result<crate::directory::AcquireWriteResult> {
        if self.topology.is_self_beacon(key) {
            return Ok(self.directory.acquire_write(key, self.topology.self_index()));
        }
        let beacon = self.topology.beacon_for(key);
        let request = Message::AcquireWritelockRequest(
            self.header(crate::protocol::MessageType::AcquireWritelockRequest.raw()),
            AcquireWritelockRequest { key: key.clone() },
        );
        let response = self
            .transport
            .send_request(beacon, request, self.config.operation_timeout())
            .await?;
        match response {
            Message::AcquireWritelockResponse(_, body) => Ok(crate::directory::AcquireWriteResult {
                result: if body.granted {
                    LockResult::Granted
                } else {
                    LockResult::Busy { holder: body.holder.unwrap_or(beacon) }
                },
                copies_to_invalidate: body.copies_to_invalidate,
                generation: body.generation,
            }),
            _ => Err(CoreError::Collaborator("unexpected reply to acquire-write".into())),
        }
    }

    async fn release_write_lock(&self, key: &Key, generation: u64, produced_value: bool) -> covered_common::Result<()> {
        if self.topology.is_self_beacon(key) {
            let _ = self
                .directory
                .release_write(key, self.topology.self_index(), generation, produced_value);
            return Ok(());
        }
        let beacon = self.topology.beacon_for(key);
        let request = Message::ReleaseWritelockRequest(
            self.header(crate::protocol::MessageType::ReleaseWritelockRequest.raw()),
            ReleaseWritelockRequest {
                key: key.clone(),
                generation,
                produced_value,
            },
        );
        let response = self.transport.send_request(beacon, request, self.config.operation_timeout()).await?;
        if let Message::ReleaseWritelockResponse(_, body) = response {
            self.ingest_victim_syncset(beacon, body.victim_syncset);
        }
        Ok(())
    }

    async fn send_invalidation(&self, edge: u32, key: &Key) -> covered_common::Result<()> {
        let request = Message::InvalidationRequest(
            self.header(crate::protocol::MessageType::InvalidationRequest.raw()),
            crate::protocol::InvalidationRequest { key: key.clone() },
        );
        self.transport.send_notify(edge, request).await
    }

    async fn cooperative_get(&self, owner: u32, key: &Key) -> covered_common::Result<Option<Value>> {
        if owner == self.topology.self_index() {
            return self.local_store.get(key).await;
        }
        let request = Message::LocalGetRequest(
            self.header(crate::protocol::MessageType::LocalGetRequest.raw()),
            LocalGetRequest { key: key.clone() },
        );
        let response = self
            .transport
            .send_request(owner, request, self.config.operation_timeout())
            .await?;
        match response {
            Message::LocalGetResponse(_, body) => Ok(body.value),
            _ => Err(CoreError::Collaborator("unexpected reply to cooperative get".into())),
        }
    }

    async fn beacon_lookup(&self, key: &Key) -> covered_common::Result<crate::directory::LookupResult> {
        if self.topology.is_self_beacon(key) {
            return Ok(self.directory.lookup(key, self.topology.self_index()));
        }
        let beacon = self.topology.beacon_for(key);
        let collected = self.popularity.lock().collected_popularity(key);
        let request = Message::DirectoryLookupRequest(
            self.header(crate::protocol::MessageType::DirectoryLookupRequest.raw()),
            DirectoryLookupRequest {
                key: key.clone(),
                collected_pop_tracked: collected.is_tracked,
                collected_pop_value: collected.local_uncached_popularity,
                victim_syncset: self.local_victim_syncset(),
            },
        );
        let response = self
            .transport
            .send_request(beacon, request, self.config.operation_timeout())
            .await?;
        match response {
            Message::DirectoryLookupResponse(_, body) => {
                self.ingest_victim_syncset(beacon, body.victim_syncset);
                Ok(crate::directory::LookupResult {
                    is_being_written: body.is_being_written,
                    valid: body.valid,
                    info: body.owner_edge.map(|owner_edge| crate::directory::DirectoryInfo { owner_edge }),
                })
            }
            _ => Err(CoreError::Collaborator("unexpected reply to directory lookup".into())),
        }
    }

    async fn maybe_admit(&self, key: &Key, value: &Value) {
        let frequency = self.popularity.lock().frequency_hint(key);
        let r_new = self.popularity.lock().reward_for_admission(key, frequency.max(1));
        let global_floor = self.victims.lock().global_floor(self.config.per_edge_synced_victim_count as usize);
        if !admission::decide(r_new, global_floor) {
            covered_common::metrics::Metrics::incr(&self.metrics.admission_declined);
            return;
        }

        let edges = admission::placement_edges(self.topology.self_index(), None);
        let mut preserved = self.preserved.lock();
        let ticket = PlacementTicket::begin(&mut preserved, edges.clone());
        drop(preserved);

        let mut victims = self.victims.lock();
        let mut host = CapacityHostAdapter {
            local_store: &self.local_store,
            victims: &mut victims,
        };
        let evicted = admission::make_room(&mut host, value.len() as u64, r_new);
        let fits = admission::admission_fits(&host, value.len() as u64);
        drop(victims);

        for victim in &evicted {
            if let Some(fell_out) = self.popularity.lock().on_evict(&victim.key) {
                self.directory_cacher.remove(&fell_out);
            }
            let _ = self.local_store.remove(&victim.key).await;
            covered_common::metrics::Metrics::incr(&self.metrics.evict);
            self.notify_beacon_evict(&victim.key).await;
        }

        if fits {
            if self.local_store.insert(key.clone(), value.clone()).await.is_ok() {
                self.popularity.lock().on_admit(key);
                self.victims.lock().on_admit(key.clone(), r_new, 0, value.len() as u32);
                self.directory_cacher.remove(key);
                covered_common::metrics::Metrics::incr(&self.metrics.admit);
                self.notify_beacon_admit(key).await;
            }
        } else {
            covered_common::metrics::Metrics::incr(&self.metrics.admission_declined);
        }

        let mut preserved = self.preserved.lock();
        ticket.finish(&mut preserved);
    }

    /// Tell this key's beacon (directly if we are it, over the wire
    /// otherwise) that the local edge now caches `key`.
    async fn notify_beacon_admit(&self, key: &Key) {
        if self.topology.is_self_beacon(key) {
            let (result, _notify) = self.directory.admit(key, self.topology.self_index());
            debug!(?result, "admitted locally, self is beacon");
            return;
        }
        let beacon = self.topology.beacon_for(key);
        let request = Message::DirectoryAdmitRequest(
            self.header(crate::protocol::MessageType::DirectoryAdmitRequest.raw()),
            crate::protocol::DirectoryAdmitRequest {
                key: key.clone(),
                value_size_class: 0,
                victim_syncset: self.local_victim_syncset(),
            },
        );
        let _ = self.transport.send_notify(beacon, request).await;
    }

    /// Tell this key's beacon the local edge no longer caches `key`.
    async fn notify_beacon_evict(&self, key: &Key) {
        if self.topology.is_self_beacon(key) {
            let result = self.directory.evict(key, self.topology.self_index());
            debug!(?result, "evicted locally, self is beacon");
            return;
        }
        let beacon = self.topology.beacon_for(key);
        let request = Message::DirectoryEvictRequest(
            self.header(crate::protocol::MessageType::DirectoryEvictRequest.raw()),
            crate::protocol::DirectoryEvictRequest {
                key: key.clone(),
                victim_syncset: self.local_victim_syncset(),
            },
        );
        let _ = self.transport.send_notify(beacon, request).await;
    }

    /// Halve every frequency counter. Driven by a periodic background task
    /// at `config.epoch_duration()` cadence (§4.7 "Background duties").
    pub fn epoch_tick(&self) {
        let _write = self.metadata_set.write();
        self.popularity.lock().decay_epoch();
    }

    /// Autonomously release write leases the beacon role has held past
    /// their deadline, issuing finish-block to whatever copies were
    /// invalidated for that write (§5 "Cancellation and timeout").
    pub async fn sweep_expired_leases(&self) {
        let expired = self.directory.sweep_expired_leases(std::time::Instant::now());
        for lease in expired {
            for edge in lease.finish_block_targets {
                let request = Message::FinishBlockRequest(
                    self.header(crate::protocol::MessageType::FinishBlockRequest.raw()),
                    crate::protocol::FinishBlockRequest { key: lease.key.clone() },
                );
                let _ = self.transport.send_notify(edge, request).await;
            }
        }
    }

    pub fn metrics(&self) -> &covered_common::metrics::Metrics {
        &self.metrics
    }

    pub fn weight(&self) -> &CoveredWeight {
        &self.weight
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Server-side half of `CooperationProtocol` (§4.6): answer a request a
    /// peer edge sent this edge over `EdgeTransport`. Called by whatever
    /// glues the transport's listening side to this `EdgeManager` — a real
    /// transport dispatches an inbound frame here after decoding it.
    #[instrument(skip(self, request))]
    pub async fn handle_request(&self, request: Message) -> Message {
        let source = request.header().source_index;
        match request {
            Message::DirectoryLookupRequest(_, body) => {
                if body.collected_pop_tracked {
                    self.popularity.lock().merge_collected(
                        body.key.clone(),
                        source,
                        CollectedPopularity {
                            is_tracked: true,
                            local_uncached_popularity: body.collected_pop_value,
                        },
                    );
                }
                self.ingest_victim_syncset(source, body.victim_syncset);
                let result = self.directory.lookup(&body.key, source);
                Message::DirectoryLookupResponse(
                    self.header(MessageType::DirectoryLookupResponse.raw()),
                    DirectoryLookupResponse {
                        is_being_written: result.is_being_written,
                        valid: result.valid,
                        owner_edge: result.info.map(|i| i.owner_edge),
                        victim_syncset: self.local_victim_syncset(),
                    },
                )
            }
            Message::DirectoryAdmitRequest(_, body) => {
                self.ingest_victim_syncset(source, body.victim_syncset);
                let (result, notify) = self.directory.admit(&body.key, source);
                for edge in notify {
                    self.send_metadata_update(edge, &body.key, result.is_neighbor_cached).await;
                }
                Message::DirectoryAdmitResponse(
                    self.header(MessageType::DirectoryAdmitResponse.raw()),
                    DirectoryAdmitResponse {
                        is_being_written: result.is_being_written,
                        is_neighbor_cached: result.is_neighbor_cached,
                        victim_syncset: self.local_victim_syncset(),
                    },
                )
            }
            Message::DirectoryEvictRequest(_, body) => {
                self.ingest_victim_syncset(source, body.victim_syncset);
                let result = self.directory.evict(&body.key, source);
                for &edge in &result.edgeset_to_notify {
                    self.send_metadata_update(edge, &body.key, false).await;
                }
                Message::DirectoryEvictResponse(
                    self.header(MessageType::DirectoryEvictResponse.raw()),
                    DirectoryEvictResponse {
                        is_being_written: result.is_being_written,
                        edgeset_to_notify: result.edgeset_to_notify,
                        victim_syncset: self.local_victim_syncset(),
                    },
                )
            }
            Message::AcquireWritelockRequest(_, body) => {
                let result = self.directory.acquire_write(&body.key, source);
                let (granted, holder) = match result.result {
                    LockResult::Granted => (true, None),
                    LockResult::Busy { holder } => (false, Some(holder)),
                };
                Message::AcquireWritelockResponse(
                    self.header(MessageType::AcquireWritelockResponse.raw()),
                    AcquireWritelockResponse {
                        granted,
                        holder,
                        generation: result.generation,
                        copies_to_invalidate: result.copies_to_invalidate,
                    },
                )
            }
            Message::ReleaseWritelockRequest(_, body) => {
                match self
                    .directory
                    .release_write(&body.key, source, body.generation, body.produced_value)
                {
                    Ok(result) => {
                        for &edge in &result.edgeset_to_notify {
                            self.send_metadata_update(edge, &body.key, false).await;
                        }
                        Message::ReleaseWritelockResponse(
                            self.header(MessageType::ReleaseWritelockResponse.raw()),
                            ReleaseWritelockResponse {
                                victim_syncset: self.local_victim_syncset(),
                                edgeset_to_notify: result.edgeset_to_notify,
                            },
                        )
                    }
                    Err(outcome) => {
                        covered_common::metrics::Metrics::incr(&self.metrics.protocol_invariant_violation);
                        warn!(?outcome, key = ?body.key, "rejected release-write-lock from non-holder or stale generation");
                        Message::ReleaseWritelockResponse(
                            self.header(MessageType::ReleaseWritelockResponse.raw()),
                            ReleaseWritelockResponse {
                                victim_syncset: self.local_victim_syncset(),
                                edgeset_to_notify: Vec::new(),
                            },
                        )
                    }
                }
            }
            Message::InvalidationRequest(_, body) => {
                let _ = self.local_store.remove(&body.key).await;
                self.directory_cacher.remove(&body.key);
                Message::InvalidationResponse(self.header(MessageType::InvalidationResponse.raw()), Ack)
            }
            Message::MetadataUpdateRequest(_, body) => {
                self.popularity.lock().set_neighbor_cached(&body.key, body.is_neighbor_cached);
                Message::MetadataUpdateResponse(self.header(MessageType::MetadataUpdateResponse.raw()), Ack)
            }
            Message::FinishBlockRequest(_, body) => {
                let _ = self.local_store.remove(&body.key).await;
                self.directory_cacher.remove(&body.key);
                Message::FinishBlockResponse(self.header(MessageType::FinishBlockResponse.raw()), Ack)
            }
            Message::PlacementNotifyRequest(_, body) => {
                self.ingest_victim_syncset(source, body.victim_syncset);
                if self.local_store.insert(body.key.clone(), body.value.clone()).await.is_ok() {
                    let mut popularity = self.popularity.lock();
                    popularity.on_admit(&body.key);
                    let reward = popularity.cached_reward(&body.key).unwrap_or_default();
                    drop(popularity);
                    self.victims
                        .lock()
                        .on_admit(body.key.clone(), reward, 0, body.value.len() as u32);
                    self.directory_cacher.remove(&body.key);
                    self.notify_beacon_admit(&body.key).await;
                }
                Message::PlacementNotifyResponse(self.header(MessageType::PlacementNotifyResponse.raw()), Ack)
            }
            Message::LocalGetRequest(_, body) => {
                let value = self.local_store.get(&body.key).await.ok().flatten();
                Message::LocalGetResponse(self.header(MessageType::LocalGetResponse.raw()), LocalGetResponse { value })
            }
            other => {
                warn!(?other, "handle_request received a response-shaped message");
                Message::InvalidationResponse(self.header(MessageType::InvalidationResponse.raw()), Ack)
            }
        }
    }

    async fn send_metadata_update(&self, edge: u32, key: &Key, is_neighbor_cached: bool) {
        let request = Message::MetadataUpdateRequest(
            self.header(crate::protocol::MessageType::MetadataUpdateRequest.raw()),
            crate::protocol::MetadataUpdateRequest {
                key: key.clone(),
                is_neighbor_cached,
            },
        );
        let _ = self.transport.send_notify(edge, request).await;
    }
}
