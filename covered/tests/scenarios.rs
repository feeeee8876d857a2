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

//! End-to-end cooperation-protocol scenarios, driven through an in-process
//! `LoopbackTransport` cluster instead of a real network or storage engine.

use covered::prelude::*;
use covered::{build_loopback_cluster, build_loopback_cluster_with_cloud};
use covered_core::protocol::{
    DirectoryLookupRequest, Header, Message, MessageType, NetworkAddr, WireVictimEntry, WireVictimSyncset,
};

fn header(message_type: u8) -> Header {
    Header {
        message_type,
        source_index: 0,
        source_addr: NetworkAddr { ip: [127, 0, 0, 1], port: 0 },
        bandwidth_usage: 0,
        event_list: Vec::new(),
        skip_propagation_latency: true,
    }
}

/// S1 — cooperative hit path. Edge 0 PUTs `"a"`, edge 1 GETs it and gets a
/// cooperative hit instead of falling through to cloud.
#[tokio::test]
async fn s1_cooperative_hit_path() {
    let edges = build_loopback_cluster(3, 2);

    let put_flag = edges[0].put(b"a".to_vec(), b"1".to_vec()).await;
    assert_eq!(put_flag, HitFlag::LocalHit);

    let (value, flag) = edges[1].get(&b"a".to_vec()).await;
    assert_eq!(value, Some(b"1".to_vec()));
    assert_eq!(flag, HitFlag::CooperativeHit);
    assert_eq!(edges[1].metrics().cooperative_hit.load(std::sync::atomic::Ordering::Relaxed), 1);
}

/// S2 — write invalidation. After edge 1 has cooperatively cached `"a"`,
/// edge 2 overwrites it; both edge 0 and edge 1's local copies of the old
/// value must be gone, and a later read observes the new value.
#[tokio::test]
async fn s2_write_invalidation() {
    let edges = build_loopback_cluster(3, 2);

    edges[0].put(b"a".to_vec(), b"1".to_vec()).await;
    let (value, flag) = edges[1].get(&b"a".to_vec()).await;
    assert_eq!(value, Some(b"1".to_vec()));
    assert_eq!(flag, HitFlag::CooperativeHit);

    let put_flag = edges[2].put(b"a".to_vec(), b"2".to_vec()).await;
    assert_eq!(put_flag, HitFlag::LocalHit);

    // Neither edge 0's nor edge 1's local store still answers with the old
    // value: a fresh GET at edge 0 must see "2", never "1".
    let (value, flag) = edges[0].get(&b"a".to_vec()).await;
    assert_eq!(value, Some(b"2".to_vec()));
    assert!(matches!(flag, HitFlag::CooperativeHit | HitFlag::GlobalMiss));

    let (value, _) = edges[1].get(&b"a".to_vec()).await;
    assert_eq!(value, Some(b"2".to_vec()));
}

/// S3 — contended write. Every `EdgeManager` operation used here resolves
/// on its first poll (the in-memory collaborators never actually suspend),
/// so driving this through `tokio::join!` on two `put()` calls would just
/// run them back to back, not concurrently. The contention itself lives in
/// `DirectoryTable::acquire_write`'s mutex-guarded state machine, so this
/// exercises that directly: edge 1 wins the race, edge 2 is told to back
/// off, and only edge 2's retry (after edge 1 releases) succeeds.
#[test]
fn s3_contended_write() {
    let table = DirectoryTable::<Vec<u8>>::new(4, std::time::Duration::from_millis(500));
    let key = b"b".to_vec();

    let first = table.acquire_write(&key, 1);
    assert_eq!(first.result, LockResult::Granted);

    let second = table.acquire_write(&key, 2);
    assert_eq!(second.result, LockResult::Busy { holder: 1 });

    table.release_write(&key, 1, first.generation, true).unwrap();

    // Retry: edge 2 now finds the key `Cached` (not `Absent`), so it is
    // granted a lock that also carries edge 1's copy to invalidate.
    let retry = table.acquire_write(&key, 2);
    assert_eq!(retry.result, LockResult::Granted);
    assert_eq!(retry.copies_to_invalidate, vec![1]);

    table.release_write(&key, 2, retry.generation, true).unwrap();

    let lookup = table.lookup(&key, 0);
    assert!(lookup.valid);
    assert_eq!(lookup.info.unwrap().owner_edge, 2, "the later writer owns the final value");
}

/// S4 — beacon busy during read. While a key's write lock is held
/// (`AbsentWriting`/`CachedWriting`), every lookup must report
/// `is_being_written = true` and never claim a valid owner, so a concurrent
/// client-facing GET degrades straight to cloud instead of racing the
/// writer for a half-written value.
#[test]
fn s4_beacon_busy_during_read() {
    let table = DirectoryTable::<Vec<u8>>::new(4, std::time::Duration::from_millis(500));
    let key = b"d".to_vec();

    let acquired = table.acquire_write(&key, 1);
    assert_eq!(acquired.result, LockResult::Granted);

    let lookup = table.lookup(&key, 0);
    assert!(lookup.is_being_written);
    assert!(!lookup.valid);
    assert!(lookup.info.is_none());

    table.release_write(&key, 1, acquired.generation, true).unwrap();
    let lookup_after = table.lookup(&key, 0);
    assert!(!lookup_after.is_being_written);
    assert!(lookup_after.valid);
}

/// Same invariant as `s4_beacon_busy_during_read`, exercised through the
/// async client path across two distinct edges: whatever value a GET
/// observes after a concurrent PUT on another edge, it is either the
/// pre-write state or the fully committed one, never a torn read.
#[tokio::test]
async fn s4_client_facing_get_never_observes_a_torn_write() {
    let edges = build_loopback_cluster(3, 2);

    let (_, (value, flag)) = tokio::join!(
        edges[1].put(b"c".to_vec(), b"committed".to_vec()),
        edges[0].get(&b"c".to_vec()),
    );

    assert!(value.is_none() || value == Some(b"committed".to_vec()));
    assert!(matches!(flag, HitFlag::GlobalMiss | HitFlag::CooperativeHit));
}

/// S5 — eviction cascade. With room for two objects, a third admission
/// evicts the weakest existing victim and the beacon's directory entry for
/// the evicted key reverts to absent.
#[tokio::test]
async fn s5_eviction_cascade() {
    let (edges, cloud) = build_loopback_cluster_with_cloud(1, 2);
    let edge = &edges[0];

    cloud.cloud_put(b"x".to_vec(), b"1".to_vec()).await.unwrap();
    cloud.cloud_put(b"y".to_vec(), b"2".to_vec()).await.unwrap();
    cloud.cloud_put(b"z".to_vec(), b"3".to_vec()).await.unwrap();

    // "x" is the very first key this edge has ever seen: no victim floor
    // exists yet, so it is admitted on the first access.
    let (value, _) = edge.get(&b"x".to_vec()).await;
    assert_eq!(value, Some(b"1".to_vec()));
    assert!(edge.metrics().admit.load(std::sync::atomic::Ordering::Relaxed) >= 1);

    // "y" ties "x" on its first access and is declined (R_new must exceed
    // the floor, not just meet it); a second access raises its frequency
    // past the floor and it is admitted.
    let (_, flag) = edge.get(&b"y".to_vec()).await;
    assert_eq!(flag, HitFlag::GlobalMiss);
    let declined_after_first_y = edge.metrics().admission_declined.load(std::sync::atomic::Ordering::Relaxed);
    assert!(declined_after_first_y >= 1);
    let (value, _) = edge.get(&b"y".to_vec()).await;
    assert_eq!(value, Some(b"2".to_vec()));

    // Capacity is now full (x + y = 2 bytes). "z" needs the same two-touch
    // admission as "y" did; once admitted it must evict the weakest
    // surviving victim, which is "x" (lower frequency than "y").
    let _ = edge.get(&b"z".to_vec()).await;
    let (value, _) = edge.get(&b"z".to_vec()).await;
    assert_eq!(value, Some(b"3".to_vec()));

    assert!(edge.metrics().evict.load(std::sync::atomic::Ordering::Relaxed) >= 1);

    // "x" no longer has a local copy: the next GET for it must not be a
    // local hit.
    let (_, flag) = edge.get(&b"x".to_vec()).await;
    assert_ne!(flag, HitFlag::LocalHit);
}

/// S6 — serialization round-trip. A directory lookup request carrying a
/// 7-entry victim syncset and a tracked collected-popularity value survives
/// an encode/decode cycle byte for byte, and the decoder consumes exactly
/// the bytes the encoder wrote.
#[tokio::test]
async fn s6_serialization_round_trip() {
    let victim_syncset = WireVictimSyncset {
        entries: (0..7u32)
            .map(|i| WireVictimEntry {
                key: format!("victim-{i}").into_bytes(),
                reward: i as f64 * 1.5,
                last_vtime: i as u64 * 10,
                size_bytes: i * 100,
            })
            .collect(),
    };

    let msg = Message::DirectoryLookupRequest(
        header(MessageType::DirectoryLookupRequest.raw()),
        DirectoryLookupRequest {
            key: b"hot-key".to_vec(),
            collected_pop_tracked: true,
            collected_pop_value: 42.5,
            victim_syncset,
        },
    );

    let mut buf = Vec::new();
    msg.encode(&mut buf);
    let mut slice = &buf[..];
    let decoded = Message::decode(&mut slice).expect("round trip must decode");

    assert_eq!(msg, decoded);
    assert!(slice.is_empty(), "decoder must consume exactly the bytes the encoder wrote");
}
