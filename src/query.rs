// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Long-lived query registrations
//!
//! A query names a required set of component kinds and, once registered,
//! caches the list of chunks whose archetype carries every required kind.
//! The cache is kept consistent by chunk-added/chunk-removed notifications
//! from the archetypes the query is attached to; client code never mutates
//! the list directly.

use crate::component::{Component, ComponentId};
use crate::entity::{ChunkKey, QueryKey};

/// Client-held query handle: the required kind set plus, once registered,
/// the key of its registration in the World.
///
/// Build the requirement with [`require`](Query::require), then hand the
/// handle to [`World::register_query`](crate::world::World::register_query).
/// A query must be deregistered before being discarded, and may be
/// registered in at most one World at a time.
pub struct Query {
    required: Box<[ComponentId]>,
    key: Option<QueryKey>,
}

impl Query {
    pub fn new() -> Self {
        Self {
            required: Box::from([]),
            key: None,
        }
    }

    /// Add component kind `T` to the requirement, keeping the set sorted
    /// and duplicate-free.
    pub fn require<T: Component>(self) -> Self {
        self.require_id(ComponentId::of::<T>())
    }

    /// Add a kind by id to the requirement.
    pub fn require_id(mut self, id: ComponentId) -> Self {
        let mut ids = std::mem::take(&mut self.required).into_vec();
        if let Err(position) = ids.binary_search(&id) {
            ids.insert(position, id);
        }
        self.required = ids.into_boxed_slice();
        self
    }

    /// The sorted required kind ids.
    pub fn required(&self) -> &[ComponentId] {
        &self.required
    }

    pub fn is_registered(&self) -> bool {
        self.key.is_some()
    }

    pub(crate) fn key(&self) -> Option<QueryKey> {
        self.key
    }

    pub(crate) fn attach(&mut self, key: QueryKey) {
        self.key = Some(key);
    }

    pub(crate) fn detach(&mut self) -> Option<QueryKey> {
        self.key.take()
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

/// World-owned state of one registered query: the requirement plus the live
/// chunk list.
pub(crate) struct QueryState {
    required: Box<[ComponentId]>,
    chunks: Vec<ChunkKey>,
}

impl QueryState {
    pub(crate) fn new(required: Box<[ComponentId]>) -> Self {
        Self {
            required,
            chunks: Vec::new(),
        }
    }

    pub(crate) fn required(&self) -> &[ComponentId] {
        &self.required
    }

    pub(crate) fn chunks(&self) -> &[ChunkKey] {
        &self.chunks
    }

    pub(crate) fn on_chunk_added(&mut self, key: ChunkKey) {
        self.chunks.push(key);
    }

    pub(crate) fn on_chunk_removed(&mut self, key: ChunkKey) {
        self.chunks.retain(|&chunk| chunk != key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct One;
    #[derive(Default)]
    struct Two;

    #[test]
    fn test_require_sorts_and_dedups() {
        let query = Query::new()
            .require::<Two>()
            .require::<One>()
            .require::<Two>();
        let required = query.required();
        assert_eq!(required.len(), 2);
        assert!(required.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_new_query_is_unregistered() {
        assert!(!Query::new().require::<One>().is_registered());
    }
}
