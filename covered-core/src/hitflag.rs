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

//! The client-visible result classification (§6). Every `get`/`put`/`del`
//! call returns one of these instead of ever surfacing a [`crate::CoreError`]
//! — errors are mapped down to a degraded hitflag at the `EdgeManager`
//! boundary.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitFlag {
    /// Served from this edge's own `LocalCacheStore`.
    LocalHit,
    /// Served after a cooperative fetch from the owner edge reported by the
    /// directory (or directory cacher).
    CooperativeHit,
    /// A cooperative fetch was attempted but the owner no longer had the
    /// value (stale `DirectoryCacher` entry, or beacon reported invalid
    /// mid-flight); the caller fell through to cloud.
    CooperativeInvalid,
    /// Neither local nor any cooperative copy was found; served from cloud.
    GlobalMiss,
}
