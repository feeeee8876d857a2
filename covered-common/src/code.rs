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

use std::fmt::Debug;
use std::hash::Hash;

/// Bound satisfied by an opaque object identity used throughout the cache
/// manager. Keys are never interpreted, only hashed, compared and hashed to
/// a beacon edge.
pub trait Key: Send + Sync + Clone + Eq + Hash + Debug + 'static {}
impl<T: Send + Sync + Clone + Eq + Hash + Debug + 'static> Key for T {}

/// Bound satisfied by a cached value. Values are opaque byte-like payloads;
/// the manager only needs their logical size for accounting.
pub trait Value: Send + Sync + Clone + Debug + 'static {}
impl<T: Send + Sync + Clone + Debug + 'static> Value for T {}

/// Something whose logical size (used for cache accounting, not wire size)
/// can be computed. Implemented for the common byte-ish containers; callers
/// with a custom value type can implement it directly.
pub trait Weighted {
    fn weight(&self) -> usize;
}

impl Weighted for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for bytes::Bytes {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for String {
    fn weight(&self) -> usize {
        self.len()
    }
}
