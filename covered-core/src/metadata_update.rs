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

//! `MetadataUpdateRequirement`: whether a directory `admit`/`evict` just
//! flipped a key between single-copy and multi-copy, and if so, the one
//! edge that needs an `is_neighbor_cached` update.
//!
//! Grounded on
//! `original_source/src/cooperation/directory/metadata_update_requirement.{h,c}`.
//! `DirectoryTable::admit`/`evict` already compute the edge(s) to notify
//! inline (`AdmitResult`/`EvictResult`); this type exists so
//! `CooperationProtocol` can reason about the transition kind explicitly
//! when deciding which message family to send, rather than inferring it
//! from an edge list's length.

use covered_common::edgeset::EdgeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataUpdateRequirement {
    pub is_from_single_to_multiple: bool,
    pub is_from_multiple_to_single: bool,
    pub notify_edge_idx: Option<EdgeIndex>,
}

impl MetadataUpdateRequirement {
    pub const NONE: Self = Self {
        is_from_single_to_multiple: false,
        is_from_multiple_to_single: false,
        notify_edge_idx: None,
    };

    pub fn none() -> Self {
        Self::NONE
    }

    /// Derive the requirement from a copy count transition plus the single
    /// edge `DirectoryTable` would notify in that case (its `admit`/`evict`
    /// return exactly zero or one such edge by construction).
    pub fn from_copy_counts(before: usize, after: usize, notify_edge_idx: Option<EdgeIndex>) -> Self {
        Self {
            is_from_single_to_multiple: before <= 1 && after > 1,
            is_from_multiple_to_single: before > 1 && after <= 1,
            notify_edge_idx,
        }
    }

    pub fn requires_notification(&self) -> bool {
        self.is_from_single_to_multiple || self.is_from_multiple_to_single
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_to_multiple_transition() {
        let req = MetadataUpdateRequirement::from_copy_counts(1, 2, Some(0));
        assert!(req.is_from_single_to_multiple);
        assert!(!req.is_from_multiple_to_single);
        assert_eq!(req.notify_edge_idx, Some(0));
    }

    #[test]
    fn multiple_to_single_transition() {
        let req = MetadataUpdateRequirement::from_copy_counts(2, 1, Some(1));
        assert!(req.is_from_multiple_to_single);
        assert!(!req.is_from_single_to_multiple);
    }

    #[test]
    fn no_transition_is_none() {
        let req = MetadataUpdateRequirement::from_copy_counts(2, 2, None);
        assert!(!req.requires_notification());
    }
}
