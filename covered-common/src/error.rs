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

//! Error taxonomy for the cooperative cache manager (§7).
//!
//! Every variant here is either retried and degraded by the caller (miss
//! served from cloud) or fatal at startup. None of them is meant to surface
//! as a panic: `EdgeManager`'s client-facing GET/PUT/DEL never propagates a
//! `CoreError` to the client, it maps it to a `HitFlag` instead.

use std::fmt;

/// Stable numeric id assigned to an unrecognized wire message.
pub type RawMessageType = u8;

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// Cross-edge request timed out or the transport dropped the connection.
    /// Always retried once by the caller before degrading.
    #[error("transient transport failure talking to edge {edge}: {reason}")]
    Transient { edge: u32, reason: String },

    /// Beacon reports `is_being_written = true` for a lookup/admit/evict.
    #[error("directory busy for key under write lock")]
    DirectoryBusy,

    /// `acquire_write` lost the race to another edge.
    #[error("write lock held by another edge (generation {generation})")]
    WriteLockBusy { generation: u64 },

    /// A release carried a stale `(key, generation)` pair.
    #[error("stale write-lock release for generation {generation}, current is {current}")]
    StaleRelease { generation: u64, current: u64 },

    /// Decoding encountered an id with no known variant.
    #[error("unknown wire message type {0}")]
    UnknownMessageType(RawMessageType),

    /// Wire payload was truncated or malformed.
    #[error("malformed wire payload: {0}")]
    Codec(String),

    /// `edge_count == 0`, an edge index out of `[0, N)` at init, or similar.
    /// Fatal at startup, never surfaced to a running cache.
    #[error("configuration error: {0}")]
    Config(String),

    /// The external `LocalCacheStore`/`CloudStore`/`EdgeTransport`
    /// collaborator returned an error of its own.
    #[error("collaborator error: {0}")]
    Collaborator(String),
}

impl CoreError {
    /// True for errors the caller should treat as a miss and fall through to
    /// cloud rather than fail the client-visible call.
    pub fn is_degradable(&self) -> bool {
        !matches!(self, CoreError::Config(_))
    }
}

/// A result alias used throughout `covered-core`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// The distinct reason a client-visible write failed. Per §7, write-lock
/// contention surfaces as a *distinct kind* rather than the generic error
/// above, since the client may retry a busy write but not a config error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailureKind {
    /// Bounded retries against `LockResult::Busy` were exhausted.
    LockContention,
    /// The cloud collaborator itself failed the write.
    CloudWrite,
}

impl fmt::Display for WriteFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteFailureKind::LockContention => write!(f, "write lock contention exhausted retries"),
            WriteFailureKind::CloudWrite => write!(f, "cloud write failed"),
        }
    }
}
