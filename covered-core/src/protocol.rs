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

//! Wire protocol (§4.6, §6): a fixed header followed by a per-type payload,
//! length-delimited, little-endian, manually framed with `bytes::{Buf,
//! BufMut}` the way `RegionHeader::read`/`write` frames a region header —
//! we don't hand this off to `bincode`/`serde` because the spec pins down
//! the exact on-wire shape (u16-counted `VictimSyncset`, fixed integer
//! widths) rather than leaving it to a derive.
//!
//! Keys and values are concrete `Vec<u8>` here, not the generic `K: Key`
//! used by [`crate::directory`]/[`crate::popularity`]/[`crate::victim`]:
//! those stay generic so the in-process data structures can be reused with
//! any opaque key type, but the wire format only ever carries bytes.

use bytes::{Buf, BufMut};
use covered_common::edgeset::EdgeIndex;
use covered_common::error::RawMessageType;
use covered_common::{CoreError, Result};

use crate::directory::{DirectoryInfo, LockResult};

pub type WireKey = Vec<u8>;
pub type WireValue = Vec<u8>;

fn put_bytes(buf: &mut impl BufMut, bytes: &[u8]) {
    buf.put_u32_le(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn get_bytes(buf: &mut impl Buf) -> Result<Vec<u8>> {
    if buf.remaining() < 4 {
        return Err(CoreError::Codec("truncated length prefix".into()));
    }
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        return Err(CoreError::Codec("truncated byte payload".into()));
    }
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

fn put_edgeset(buf: &mut impl BufMut, edges: &[EdgeIndex]) {
    buf.put_u16_le(edges.len() as u16);
    for e in edges {
        buf.put_u32_le(*e);
    }
}

fn get_edgeset(buf: &mut impl Buf) -> Result<Vec<EdgeIndex>> {
    if buf.remaining() < 2 {
        return Err(CoreError::Codec("truncated edgeset count".into()));
    }
    let count = buf.get_u16_le() as usize;
    if buf.remaining() < count * 4 {
        return Err(CoreError::Codec("truncated edgeset body".into()));
    }
    Ok((0..count).map(|_| buf.get_u32_le()).collect())
}

/// One entry of a `VictimSyncset` on the wire: `{key, reward:f64,
/// last_vtime:u64, size_bytes:u32}` per §6.
#[derive(Debug, Clone, PartialEq)]
pub struct WireVictimEntry {
    pub key: WireKey,
    pub reward: f64,
    pub last_vtime: u64,
    pub size_bytes: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireVictimSyncset {
    pub entries: Vec<WireVictimEntry>,
}

impl WireVictimSyncset {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(self.entries.len() as u16);
        for entry in &self.entries {
            put_bytes(buf, &entry.key);
            buf.put_f64_le(entry.reward);
            buf.put_u64_le(entry.last_vtime);
            buf.put_u32_le(entry.size_bytes);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < 2 {
            return Err(CoreError::Codec("truncated victim syncset count".into()));
        }
        let count = buf.get_u16_le() as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let key = get_bytes(buf)?;
            if buf.remaining() < 20 {
                return Err(CoreError::Codec("truncated victim entry".into()));
            }
            let reward = buf.get_f64_le();
            let last_vtime = buf.get_u64_le();
            let size_bytes = buf.get_u32_le();
            entries.push(WireVictimEntry {
                key,
                reward,
                last_vtime,
                size_bytes,
            });
        }
        Ok(Self { entries })
    }
}

/// `source_addr`: kept to IPv4 + port since the simulation collaborator
/// (`skip_propagation_latency`) never needs more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkAddr {
    pub ip: [u8; 4],
    pub port: u16,
}

impl NetworkAddr {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.ip);
        buf.put_u16_le(self.port);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < 6 {
            return Err(CoreError::Codec("truncated network address".into()));
        }
        let mut ip = [0u8; 4];
        buf.copy_to_slice(&mut ip);
        let port = buf.get_u16_le();
        Ok(Self { ip, port })
    }
}

/// Header common to every message: `{message_type, source_index,
/// source_addr, bandwidth_usage, event_list, skip_propagation_latency}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub message_type: RawMessageType,
    pub source_index: EdgeIndex,
    pub source_addr: NetworkAddr,
    pub bandwidth_usage: u32,
    pub event_list: Vec<u64>,
    pub skip_propagation_latency: bool,
}

impl Header {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.message_type);
        buf.put_u32_le(self.source_index);
        self.source_addr.encode(buf);
        buf.put_u32_le(self.bandwidth_usage);
        buf.put_u16_le(self.event_list.len() as u16);
        for event in &self.event_list {
            buf.put_u64_le(*event);
        }
        buf.put_u8(self.skip_propagation_latency as u8);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < 1 {
            return Err(CoreError::Codec("truncated header".into()));
        }
        let message_type = buf.get_u8();
        if buf.remaining() < 10 {
            return Err(CoreError::Codec("truncated header".into()));
        }
        let source_index = buf.get_u32_le();
        let source_addr = NetworkAddr::decode(buf)?;
        if buf.remaining() < 6 {
            return Err(CoreError::Codec("truncated header tail".into()));
        }
        let bandwidth_usage = buf.get_u32_le();
        let event_count = buf.get_u16_le() as usize;
        if buf.remaining() < event_count * 8 + 1 {
            return Err(CoreError::Codec("truncated event list".into()));
        }
        let event_list = (0..event_count).map(|_| buf.get_u64_le()).collect();
        let skip_propagation_latency = buf.get_u8() != 0;
        Ok(Self {
            message_type,
            source_index,
            source_addr,
            bandwidth_usage,
            event_list,
            skip_propagation_latency,
        })
    }
}

/// Stable numeric message type ids (§6). Values are an implementation
/// detail of the wire format, not load-bearing anywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    DirectoryLookupRequest = 1,
    DirectoryLookupResponse = 2,
    DirectoryAdmitRequest = 3,
    DirectoryAdmitResponse = 4,
    DirectoryEvictRequest = 5,
    DirectoryEvictResponse = 6,
    AcquireWritelockRequest = 7,
    AcquireWritelockResponse = 8,
    ReleaseWritelockRequest = 9,
    ReleaseWritelockResponse = 10,
    InvalidationRequest = 11,
    InvalidationResponse = 12,
    MetadataUpdateRequest = 13,
    MetadataUpdateResponse = 14,
    FinishBlockRequest = 15,
    FinishBlockResponse = 16,
    PlacementNotifyRequest = 17,
    PlacementNotifyResponse = 18,
    /// Cooperative GET: ask a peer edge (the reported owner) to serve `key`
    /// from its own `LocalCacheStore`, per the `LocalGetRequest/Response`
    /// entry in §6's message type set.
    LocalGetRequest = 19,
    LocalGetResponse = 20,
}

impl MessageType {
    pub fn from_raw(raw: RawMessageType) -> Result<Self> {
        Ok(match raw {
            1 => Self::DirectoryLookupRequest,
            2 => Self::DirectoryLookupResponse,
            3 => Self::DirectoryAdmitRequest,
            4 => Self::DirectoryAdmitResponse,
            5 => Self::DirectoryEvictRequest,
            6 => Self::DirectoryEvictResponse,
            7 => Self::AcquireWritelockRequest,
            8 => Self::AcquireWritelockResponse,
            9 => Self::ReleaseWritelockRequest,
            10 => Self::ReleaseWritelockResponse,
            11 => Self::InvalidationRequest,
            12 => Self::InvalidationResponse,
            13 => Self::MetadataUpdateRequest,
            14 => Self::MetadataUpdateResponse,
            15 => Self::FinishBlockRequest,
            16 => Self::FinishBlockResponse,
            17 => Self::PlacementNotifyRequest,
            18 => Self::PlacementNotifyResponse,
            19 => Self::LocalGetRequest,
            20 => Self::LocalGetResponse,
            other => return Err(CoreError::UnknownMessageType(other)),
        })
    }

    pub fn raw(self) -> RawMessageType {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryLookupRequest {
    pub key: WireKey,
    pub collected_pop_tracked: bool,
    pub collected_pop_value: f64,
    pub victim_syncset: WireVictimSyncset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryLookupResponse {
    pub is_being_written: bool,
    pub valid: bool,
    pub owner_edge: Option<EdgeIndex>,
    pub victim_syncset: WireVictimSyncset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryAdmitRequest {
    pub key: WireKey,
    pub value_size_class: u32,
    pub victim_syncset: WireVictimSyncset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryAdmitResponse {
    pub is_being_written: bool,
    pub is_neighbor_cached: bool,
    pub victim_syncset: WireVictimSyncset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEvictRequest {
    pub key: WireKey,
    pub victim_syncset: WireVictimSyncset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEvictResponse {
    pub is_being_written: bool,
    pub edgeset_to_notify: Vec<EdgeIndex>,
    pub victim_syncset: WireVictimSyncset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcquireWritelockRequest {
    pub key: WireKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcquireWritelockResponse {
    pub granted: bool,
    pub holder: Option<EdgeIndex>,
    pub generation: u64,
    pub copies_to_invalidate: Vec<EdgeIndex>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseWritelockRequest {
    pub key: WireKey,
    pub generation: u64,
    pub produced_value: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseWritelockResponse {
    pub victim_syncset: WireVictimSyncset,
    pub edgeset_to_notify: Vec<EdgeIndex>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidationRequest {
    pub key: WireKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataUpdateRequest {
    pub key: WireKey,
    pub is_neighbor_cached: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinishBlockRequest {
    pub key: WireKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementNotifyRequest {
    pub key: WireKey,
    pub value: WireValue,
    pub owner_edge: EdgeIndex,
    pub victim_syncset: WireVictimSyncset,
    pub edgeset: Vec<EdgeIndex>,
}

/// An empty acknowledgement body, used by every bare `*Response` that
/// carries nothing but the header (invalidation ack, metadata-update ack,
/// finish-block ack, placement-notify ack).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ack;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalGetRequest {
    pub key: WireKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalGetResponse {
    pub value: Option<WireValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    DirectoryLookupRequest(Header, DirectoryLookupRequest),
    DirectoryLookupResponse(Header, DirectoryLookupResponse),
    DirectoryAdmitRequest(Header, DirectoryAdmitRequest),
    DirectoryAdmitResponse(Header, DirectoryAdmitResponse),
    DirectoryEvictRequest(Header, DirectoryEvictRequest),
    DirectoryEvictResponse(Header, DirectoryEvictResponse),
    AcquireWritelockRequest(Header, AcquireWritelockRequest),
    AcquireWritelockResponse(Header, AcquireWritelockResponse),
    ReleaseWritelockRequest(Header, ReleaseWritelockRequest),
    ReleaseWritelockResponse(Header, ReleaseWritelockResponse),
    InvalidationRequest(Header, InvalidationRequest),
    InvalidationResponse(Header, Ack),
    MetadataUpdateRequest(Header, MetadataUpdateRequest),
    MetadataUpdateResponse(Header, Ack),
    FinishBlockRequest(Header, FinishBlockRequest),
    FinishBlockResponse(Header, Ack),
    PlacementNotifyRequest(Header, PlacementNotifyRequest),
    PlacementNotifyResponse(Header, Ack),
    LocalGetRequest(Header, LocalGetRequest),
    LocalGetResponse(Header, LocalGetResponse),
}

impl Message {
    pub fn header(&self) -> &Header {
        match self {
            Message::DirectoryLookupRequest(h, _)
            | Message::DirectoryLookupResponse(h, _)
            | Message::DirectoryAdmitRequest(h, _)
            | Message::DirectoryAdmitResponse(h, _)
            | Message::DirectoryEvictRequest(h, _)
            | Message::DirectoryEvictResponse(h, _)
            | Message::AcquireWritelockRequest(h, _)
            | Message::AcquireWritelockResponse(h, _)
            | Message::ReleaseWritelockRequest(h, _)
            | Message::ReleaseWritelockResponse(h, _)
            | Message::InvalidationRequest(h, _)
            | Message::InvalidationResponse(h, _)
            | Message::MetadataUpdateRequest(h, _)
            | Message::MetadataUpdateResponse(h, _)
            | Message::FinishBlockRequest(h, _)
            | Message::FinishBlockResponse(h, _)
            | Message::PlacementNotifyRequest(h, _)
            | Message::PlacementNotifyResponse(h, _)
            | Message::LocalGetRequest(h, _)
            | Message::LocalGetResponse(h, _) => h,
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Message::DirectoryLookupRequest(header, body) => {
                header.encode(buf);
                put_bytes(buf, &body.key);
                buf.put_u8(body.collected_pop_tracked as u8);
                if body.collected_pop_tracked {
                    buf.put_f64_le(body.collected_pop_value);
                }
                body.victim_syncset.encode(buf);
            }
            Message::DirectoryLookupResponse(header, body) => {
                header.encode(buf);
                buf.put_u8(body.is_being_written as u8);
                buf.put_u8(body.valid as u8);
                buf.put_u8(body.owner_edge.is_some() as u8);
                buf.put_u32_le(body.owner_edge.unwrap_or(0));
                body.victim_syncset.encode(buf);
            }
            Message::DirectoryAdmitRequest(header, body) => {
                header.encode(buf);
                put_bytes(buf, &body.key);
                buf.put_u32_le(body.value_size_class);
                body.victim_syncset.encode(buf);
            }
            Message::DirectoryAdmitResponse(header, body) => {
                header.encode(buf);
                buf.put_u8(body.is_being_written as u8);
                buf.put_u8(body.is_neighbor_cached as u8);
                body.victim_syncset.encode(buf);
            }
            Message::DirectoryEvictRequest(header, body) => {
                header.encode(buf);
                put_bytes(buf, &body.key);
                body.victim_syncset.encode(buf);
            }
            Message::DirectoryEvictResponse(header, body) => {
                header.encode(buf);
                buf.put_u8(body.is_being_written as u8);
                put_edgeset(buf, &body.edgeset_to_notify);
                body.victim_syncset.encode(buf);
            }
            Message::AcquireWritelockRequest(header, body) => {
                header.encode(buf);
                put_bytes(buf, &body.key);
            }
            Message::AcquireWritelockResponse(header, body) => {
                header.encode(buf);
                buf.put_u8(body.granted as u8);
                buf.put_u8(body.holder.is_some() as u8);
                buf.put_u32_le(body.holder.unwrap_or(0));
                buf.put_u64_le(body.generation);
                put_edgeset(buf, &body.copies_to_invalidate);
            }
            Message::ReleaseWritelockRequest(header, body) => {
                header.encode(buf);
                put_bytes(buf, &body.key);
                buf.put_u64_le(body.generation);
                buf.put_u8(body.produced_value as u8);
            }
            Message::ReleaseWritelockResponse(header, body) => {
                header.encode(buf);
                body.victim_syncset.encode(buf);
                put_edgeset(buf, &body.edgeset_to_notify);
            }
            Message::InvalidationRequest(header, body) => {
                header.encode(buf);
                put_bytes(buf, &body.key);
            }
            Message::InvalidationResponse(header, _) => header.encode(buf),
            Message::MetadataUpdateRequest(header, body) => {
                header.encode(buf);
                put_bytes(buf, &body.key);
                buf.put_u8(body.is_neighbor_cached as u8);
            }
            Message::MetadataUpdateResponse(header, _) => header.encode(buf),
            Message::FinishBlockRequest(header, body) => {
                header.encode(buf);
                put_bytes(buf, &body.key);
            }
            Message::FinishBlockResponse(header, _) => header.encode(buf),
            Message::PlacementNotifyRequest(header, body) => {
                header.encode(buf);
                put_bytes(buf, &body.key);
                put_bytes(buf, &body.value);
                buf.put_u32_le(body.owner_edge);
                body.victim_syncset.encode(buf);
                put_edgeset(buf, &body.edgeset);
            }
            Message::PlacementNotifyResponse(header, _) => header.encode(buf),
            Message::LocalGetRequest(header, body) => {
                header.encode(buf);
                put_bytes(buf, &body.key);
            }
            Message::LocalGetResponse(header, body) => {
                header.encode(buf);
                buf.put_u8(body.value.is_some() as u8);
                if let Some(value) = &body.value {
                    put_bytes(buf, value);
                }
            }
        }
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        let header = Header::decode(buf)?;
        let message_type = MessageType::from_raw(header.message_type)?;
        Ok(match message_type {
            MessageType::DirectoryLookupRequest => {
                let key = get_bytes(buf)?;
                if buf.remaining() < 1 {
                    return Err(CoreError::Codec("truncated directory lookup request".into()));
                }
                let collected_pop_tracked = buf.get_u8() != 0;
                let collected_pop_value = if collected_pop_tracked {
                    if buf.remaining() < 8 {
                        return Err(CoreError::Codec("truncated directory lookup request".into()));
                    }
                    buf.get_f64_le()
                } else {
                    0.0
                };
                let victim_syncset = WireVictimSyncset::decode(buf)?;
                Message::DirectoryLookupRequest(
                    header,
                    DirectoryLookupRequest {
                        key,
                        collected_pop_tracked,
                        collected_pop_value,
                        victim_syncset,
                    },
                )
            }
            MessageType::DirectoryLookupResponse => {
                if buf.remaining() < 6 {
                    return Err(CoreError::Codec("truncated directory lookup response".into()));
                }
                let is_being_written = buf.get_u8() != 0;
                let valid = buf.get_u8() != 0;
                let has_owner = buf.get_u8() != 0;
                let owner_raw = buf.get_u32_le();
                let victim_syncset = WireVictimSyncset::decode(buf)?;
                Message::DirectoryLookupResponse(
                    header,
                    DirectoryLookupResponse {
                        is_being_written,
                        valid,
                        owner_edge: has_owner.then_some(owner_raw),
                        victim_syncset,
                    },
                )
            }
            MessageType::DirectoryAdmitRequest => {
                let key = get_bytes(buf)?;
                if buf.remaining() < 4 {
                    return Err(CoreError::Codec("truncated directory admit request".into()));
                }
                let value_size_class = buf.get_u32_le();
                let victim_syncset = WireVictimSyncset::decode(buf)?;
                Message::DirectoryAdmitRequest(
                    header,
                    DirectoryAdmitRequest {
                        key,
                        value_size_class,
                        victim_syncset,
                    },
                )
            }
            MessageType::DirectoryAdmitResponse => {
                if buf.remaining() < 2 {
                    return Err(CoreError::Codec("truncated directory admit response".into()));
                }
                let is_being_written = buf.get_u8() != 0;
                let is_neighbor_cached = buf.get_u8() != 0;
                let victim_syncset = WireVictimSyncset::decode(buf)?;
                Message::DirectoryAdmitResponse(
                    header,
                    DirectoryAdmitResponse {
                        is_being_written,
                        is_neighbor_cached,
                        victim_syncset,
                    },
                )
            }
            MessageType::DirectoryEvictRequest => {
                let key = get_bytes(buf)?;
                let victim_syncset = WireVictimSyncset::decode(buf)?;
                Message::DirectoryEvictRequest(header, DirectoryEvictRequest { key, victim_syncset })
            }
            MessageType::DirectoryEvictResponse => {
                if buf.remaining() < 1 {
                    return Err(CoreError::Codec("truncated directory evict response".into()));
                }
                let is_being_written = buf.get_u8() != 0;
                let edgeset_to_notify = get_edgeset(buf)?;
                let victim_syncset = WireVictimSyncset::decode(buf)?;
                Message::DirectoryEvictResponse(
                    header,
                    DirectoryEvictResponse {
                        is_being_written,
                        edgeset_to_notify,
                        victim_syncset,
                    },
                )
            }
            MessageType::AcquireWritelockRequest => {
                let key = get_bytes(buf)?;
                Message::AcquireWritelockRequest(header, AcquireWritelockRequest { key })
            }
            MessageType::AcquireWritelockResponse => {
                if buf.remaining() < 14 {
                    return Err(CoreError::Codec("truncated acquire writelock response".into()));
                }
                let granted = buf.get_u8() != 0;
                let has_holder = buf.get_u8() != 0;
                let holder_raw = buf.get_u32_le();
                let generation = buf.get_u64_le();
                let copies_to_invalidate = get_edgeset(buf)?;
                Message::AcquireWritelockResponse(
                    header,
                    AcquireWritelockResponse {
                        granted,
                        holder: has_holder.then_some(holder_raw),
                        generation,
                        copies_to_invalidate,
                    },
                )
            }
            MessageType::ReleaseWritelockRequest => {
                let key = get_bytes(buf)?;
                if buf.remaining() < 9 {
                    return Err(CoreError::Codec("truncated release writelock request".into()));
                }
                let generation = buf.get_u64_le();
                let produced_value = buf.get_u8() != 0;
                Message::ReleaseWritelockRequest(
                    header,
                    ReleaseWritelockRequest {
                        key,
                        generation,
                        produced_value,
                    },
                )
            }
            MessageType::ReleaseWritelockResponse => {
                let victim_syncset = WireVictimSyncset::decode(buf)?;
                let edgeset_to_notify = get_edgeset(buf)?;
                Message::ReleaseWritelockResponse(
                    header,
                    ReleaseWritelockResponse {
                        victim_syncset,
                        edgeset_to_notify,
                    },
                )
            }
            MessageType::InvalidationRequest => {
                let key = get_bytes(buf)?;
                Message::InvalidationRequest(header, InvalidationRequest { key })
            }
            MessageType::InvalidationResponse => Message::InvalidationResponse(header, Ack),
            MessageType::MetadataUpdateRequest => {
                let key = get_bytes(buf)?;
                if buf.remaining() < 1 {
                    return Err(CoreError::Codec("truncated metadata update request".into()));
                }
                let is_neighbor_cached = buf.get_u8() != 0;
                Message::MetadataUpdateRequest(header, MetadataUpdateRequest { key, is_neighbor_cached })
            }
            MessageType::MetadataUpdateResponse => Message::MetadataUpdateResponse(header, Ack),
            MessageType::FinishBlockRequest => {
                let key = get_bytes(buf)?;
                Message::FinishBlockRequest(header, FinishBlockRequest { key })
            }
            MessageType::FinishBlockResponse => Message::FinishBlockResponse(header, Ack),
            MessageType::PlacementNotifyRequest => {
                let key = get_bytes(buf)?;
                let value = get_bytes(buf)?;
                if buf.remaining() < 4 {
                    return Err(CoreError::Codec("truncated placement notify request".into()));
                }
                let owner_edge = buf.get_u32_le();
                let victim_syncset = WireVictimSyncset::decode(buf)?;
                let edgeset = get_edgeset(buf)?;
                Message::PlacementNotifyRequest(
                    header,
                    PlacementNotifyRequest {
                        key,
                        value,
                        owner_edge,
                        victim_syncset,
                        edgeset,
                    },
                )
            }
            MessageType::PlacementNotifyResponse => Message::PlacementNotifyResponse(header, Ack),
            MessageType::LocalGetRequest => {
                let key = get_bytes(buf)?;
                Message::LocalGetRequest(header, LocalGetRequest { key })
            }
            MessageType::LocalGetResponse => {
                if buf.remaining() < 1 {
                    return Err(CoreError::Codec("truncated local get response".into()));
                }
                let has_value = buf.get_u8() != 0;
                let value = if has_value { Some(get_bytes(buf)?) } else { None };
                Message::LocalGetResponse(header, LocalGetResponse { value })
            }
        })
    }
}

pub fn lock_result_to_wire(result: LockResult) -> (bool, Option<EdgeIndex>) {
    match result {
        LockResult::Granted => (true, None),
        LockResult::Busy { holder } => (false, Some(holder)),
    }
}

pub fn directory_info_to_wire(info: Option<DirectoryInfo>) -> Option<EdgeIndex> {
    info.map(|i| i.owner_edge)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(message_type: RawMessageType) -> Header {
        Header {
            message_type,
            source_index: 7,
            source_addr: NetworkAddr {
                ip: [10, 0, 0, 1],
                port: 9000,
            },
            bandwidth_usage: 1000,
            event_list: vec![1, 2, 3],
            skip_propagation_latency: false,
        }
    }

    #[test]
    fn header_round_trips() {
        let mut buf = Vec::new();
        let h = header(MessageType::DirectoryLookupRequest.raw());
        h.encode(&mut buf);
        let mut slice = &buf[..];
        let decoded = Header::decode(&mut slice).unwrap();
        assert_eq!(h, decoded);
    }

    #[test]
    fn directory_lookup_request_round_trips() {
        let msg = Message::DirectoryLookupRequest(
            header(MessageType::DirectoryLookupRequest.raw()),
            DirectoryLookupRequest {
                key: b"abc".to_vec(),
                collected_pop_tracked: true,
                collected_pop_value: 4.5,
                victim_syncset: WireVictimSyncset {
                    entries: vec![WireVictimEntry {
                        key: b"victim".to_vec(),
                        reward: 1.5,
                        last_vtime: 9,
                        size_bytes: 16,
                    }],
                },
            },
        );
        let mut buf = Vec::new();
        msg.encode(&mut buf);
        let mut slice = &buf[..];
        let decoded = Message::decode(&mut slice).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn directory_lookup_request_untracked_omits_popularity_value() {
        let msg = Message::DirectoryLookupRequest(
            header(MessageType::DirectoryLookupRequest.raw()),
            DirectoryLookupRequest {
                key: b"abc".to_vec(),
                collected_pop_tracked: false,
                collected_pop_value: 0.0,
                victim_syncset: WireVictimSyncset::default(),
            },
        );
        let mut buf = Vec::new();
        msg.encode(&mut buf);
        let mut tracked_flag_and_tail = Vec::new();
        header(MessageType::DirectoryLookupRequest.raw()).encode(&mut tracked_flag_and_tail);
        put_bytes(&mut tracked_flag_and_tail, b"abc");
        // encoded buffer must be 8 bytes shorter than a tracked request with the same key: no f64 written.
        assert_eq!(buf.len(), tracked_flag_and_tail.len() + 1 + 2);
        let mut slice = &buf[..];
        let decoded = Message::decode(&mut slice).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn acquire_writelock_response_round_trips() {
        let msg = Message::AcquireWritelockResponse(
            header(MessageType::AcquireWritelockResponse.raw()),
            AcquireWritelockResponse {
                granted: false,
                holder: Some(2),
                generation: 7,
                copies_to_invalidate: vec![0, 1],
            },
        );
        let mut buf = Vec::new();
        msg.encode(&mut buf);
        let mut slice = &buf[..];
        let decoded = Message::decode(&mut slice).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let mut buf = Vec::new();
        header(250).encode(&mut buf);
        let mut slice = &buf[..];
        let err = Message::decode(&mut slice).unwrap_err();
        assert!(matches!(err, CoreError::UnknownMessageType(250)));
    }

    #[test]
    fn truncated_payload_is_a_codec_error() {
        let mut buf = Vec::new();
        header(MessageType::DirectoryLookupRequest.raw()).encode(&mut buf);
        buf.extend_from_slice(&[0, 0]); // too short to even hold a key length
        let mut slice = &buf[..];
        assert!(Message::decode(&mut slice).is_err());
    }
}
