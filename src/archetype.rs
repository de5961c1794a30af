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

//! Archetypes: one structural layout, its chunks, and its observers
//!
//! An archetype is identified by its sorted, duplicate-free sequence of
//! component-kind ids. It owns the chunks storing entities of exactly this
//! shape and the list of queries to notify when chunks come and go. The
//! World interns archetypes by signature content, so at most one live
//! instance exists per id sequence.

use std::fmt;

use slotmap::SlotMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::chunk::Chunk;
use crate::component::{registry, ComponentId};
use crate::entity::{ChunkKey, QueryKey};
use crate::error::Result;
use crate::query::QueryState;

/// Inline capacity for signature scratch buffers.
pub(crate) const INLINE_KINDS: usize = 8;

/// Owned, sorted component-kind signature used while computing archetype
/// transitions; lives on the stack up to [`INLINE_KINDS`] kinds.
pub(crate) type Signature = SmallVec<[ComponentId; INLINE_KINDS]>;

/// One structural layout: a sorted id sequence plus the chunks and attached
/// queries for that shape. The id sequence never changes after construction.
pub struct Archetype {
    index: usize,
    ids: Box<[ComponentId]>,
    chunks: Vec<ChunkKey>,
    queries: Vec<QueryKey>,
}

impl Archetype {
    pub(crate) fn new(index: usize, ids: &[ComponentId]) -> Self {
        debug_assert!(
            ids.windows(2).all(|pair| pair[0] < pair[1]),
            "signature must be sorted and duplicate-free"
        );
        Self {
            index,
            ids: ids.into(),
            chunks: Vec::new(),
            queries: Vec::new(),
        }
    }

    /// The sorted, duplicate-free kind ids identifying this shape.
    pub fn ids(&self) -> &[ComponentId] {
        &self.ids
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// True when this shape carries every kind in `required` (both sorted).
    pub fn is_superset_of(&self, required: &[ComponentId]) -> bool {
        let mut ids = self.ids.iter();
        required.iter().all(|needed| ids.any(|id| id == needed))
    }

    /// Keys of the chunks currently owned by this archetype.
    pub fn chunk_keys(&self) -> &[ChunkKey] {
        &self.chunks
    }

    /// Find a chunk with spare capacity, or create one, and claim a slot.
    pub(crate) fn alloc_slot(
        &mut self,
        chunks: &mut SlotMap<ChunkKey, Chunk>,
        queries: &mut SlotMap<QueryKey, QueryState>,
    ) -> Result<(ChunkKey, usize)> {
        for &key in &self.chunks {
            if !chunks[key].is_full() {
                let slot = chunks[key].allocate()?;
                return Ok((key, slot));
            }
        }
        let key = self.add_chunk(chunks, queries)?;
        let slot = chunks[key].allocate()?;
        Ok((key, slot))
    }

    fn add_chunk(
        &mut self,
        chunks: &mut SlotMap<ChunkKey, Chunk>,
        queries: &mut SlotMap<QueryKey, QueryState>,
    ) -> Result<ChunkKey> {
        let chunk = Chunk::new(self.index, &self.ids)?;
        let key = chunks.insert(chunk);
        self.chunks.push(key);
        for &query in &self.queries {
            queries[query].on_chunk_added(key);
        }
        debug!(
            archetype = self.index,
            chunks = self.chunks.len(),
            "allocated chunk"
        );
        Ok(key)
    }

    /// Drop chunks with zero occupancy, notifying attached queries.
    pub(crate) fn remove_empty_chunks(
        &mut self,
        chunks: &mut SlotMap<ChunkKey, Chunk>,
        queries: &mut SlotMap<QueryKey, QueryState>,
    ) {
        let attached = &self.queries;
        let before = self.chunks.len();
        self.chunks.retain(|&key| {
            if chunks[key].is_empty() {
                for &query in attached {
                    queries[query].on_chunk_removed(key);
                }
                chunks.remove(key);
                false
            } else {
                true
            }
        });
        let pruned = before - self.chunks.len();
        if pruned > 0 {
            debug!(archetype = self.index, pruned, "pruned empty chunks");
        }
    }

    /// Attach a query so it hears about chunk events; it immediately learns
    /// of every existing chunk.
    pub(crate) fn attach_query(
        &mut self,
        key: QueryKey,
        queries: &mut SlotMap<QueryKey, QueryState>,
    ) {
        if self.queries.contains(&key) {
            return;
        }
        self.queries.push(key);
        for &chunk in &self.chunks {
            queries[key].on_chunk_added(chunk);
        }
    }

    pub(crate) fn detach_query(&mut self, key: QueryKey) {
        self.queries.retain(|&query| query != key);
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for &id in self.ids.iter() {
            match registry().resolve(id) {
                Ok(info) => list.entry(&info.name()),
                Err(_) => list.entry(&id),
            };
        }
        list.finish()
    }
}

/// Signature with `id` inserted in sort order; `None` if already present
/// (adding a kind an entity already has is a no-op).
pub(crate) fn signature_with(ids: &[ComponentId], id: ComponentId) -> Option<Signature> {
    match ids.binary_search(&id) {
        Ok(_) => None,
        Err(position) => {
            let mut out = Signature::with_capacity(ids.len() + 1);
            out.extend_from_slice(ids);
            out.insert(position, id);
            Some(out)
        }
    }
}

/// Signature with `id` removed; `None` if absent (removing a kind an entity
/// does not have is a no-op).
pub(crate) fn signature_without(ids: &[ComponentId], id: ComponentId) -> Option<Signature> {
    match ids.binary_search(&id) {
        Ok(position) => {
            let mut out = Signature::from_slice(ids);
            out.remove(position);
            Some(out)
        }
        Err(_) => None,
    }
}
