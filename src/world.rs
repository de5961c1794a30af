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

//! World: central entity, archetype, and chunk storage
//!
//! The World interns archetypes by signature content, drives entity
//! relocation across chunks on structural changes, owns the entity-record
//! table, and keeps registered queries' chunk lists consistent.
//!
//! Structural mutation is single-writer: no two structural operations on the
//! same World may run concurrently, and none may overlap a parallel
//! iteration phase reading query chunk lists. The World itself takes no
//! lock; an external phase boundary (typically the simulation tick) provides
//! the exclusion.

use ahash::AHashMap;
use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::archetype::{signature_with, signature_without, Archetype};
use crate::chunk::Chunk;
use crate::component::{Component, ComponentId};
use crate::entity::{ChunkKey, EntityId, EntityLocation, QueryKey};
use crate::error::{EcsError, Result};
use crate::query::{Query, QueryState};

/// The identity archetype (entities with no components) always sits at
/// index 0, so freshly spawned entities have a home without a lookup.
const IDENTITY: usize = 0;

/// Central storage engine
pub struct World {
    /// Entity records keyed by generational ids
    entities: SlotMap<EntityId, EntityLocation>,

    /// Chunk storage; keys stay stable for a chunk's whole lifetime
    chunks: SlotMap<ChunkKey, Chunk>,

    /// Registered query state
    queries: SlotMap<QueryKey, QueryState>,

    /// All interned archetypes, identity first
    archetypes: Vec<Archetype>,

    /// Maps signature content to archetype indices
    archetype_index: AHashMap<Box<[ComponentId]>, usize>,
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        let mut world = Self {
            entities: SlotMap::with_key(),
            chunks: SlotMap::with_key(),
            queries: SlotMap::with_key(),

            // Start with reasonable defaults to avoid resize spikes
            archetypes: Vec::with_capacity(64),
            archetype_index: AHashMap::with_capacity(64),
        };
        world.get_or_create_archetype(&[]);
        world
    }

    /// Create a new entity with no components.
    ///
    /// It lives in the identity archetype's chunk storage until a component
    /// is added.
    pub fn spawn(&mut self) -> Result<EntityId> {
        let (chunk, slot) = self.alloc_in_archetype(IDENTITY)?;
        let entity = self.entities.insert(EntityLocation { chunk, slot });
        self.chunks[chunk].bind(slot, entity);
        trace!(?entity, "spawned");
        Ok(entity)
    }

    /// Destroy an entity, removing its slot from whichever chunk holds it.
    ///
    /// The handle becomes permanently invalid for all other operations.
    pub fn despawn(&mut self, entity: EntityId) -> Result<()> {
        let location = self
            .entities
            .remove(entity)
            .ok_or(EcsError::EntityNotFound)?;
        let chunk = &mut self.chunks[location.chunk];
        if let Some(displaced) = chunk.swap_remove(location.slot) {
            if let Some(record) = self.entities.get_mut(displaced) {
                record.slot = location.slot;
            }
        }
        trace!(?entity, "despawned");
        Ok(())
    }

    /// Check if an entity is alive.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    /// Iterate the ids of all live entities.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys()
    }

    /// Attach component kind `T` to an entity, returning a reference to its
    /// column slot for the caller to populate.
    ///
    /// If the entity already carries `T`, this is a no-op returning the
    /// existing slot with its value unchanged. Otherwise the entity is
    /// relocated to the destination archetype, retained component values
    /// move with it, and the returned slot holds `T::default()`.
    pub fn add_component<T: Component>(&mut self, entity: EntityId) -> Result<&mut T> {
        let location = self
            .entities
            .get(entity)
            .copied()
            .ok_or(EcsError::EntityNotFound)?;
        let id = ComponentId::of::<T>();
        let archetype = self.chunks[location.chunk].archetype_index();

        let Some(signature) = signature_with(self.archetypes[archetype].ids(), id) else {
            // idempotent add: hand back the slot the entity already has
            return self.chunks[location.chunk].slot_mut::<T>(location.slot);
        };

        let target = self.get_or_create_archetype(&signature);
        let (chunk, slot) = self.relocate(entity, location, target)?;
        self.chunks[chunk].slot_mut::<T>(slot)
    }

    /// Attach component kind `T` with the given value.
    pub fn insert<T: Component>(&mut self, entity: EntityId, value: T) -> Result<()> {
        *self.add_component::<T>(entity)? = value;
        Ok(())
    }

    /// Detach component kind `T` from an entity; a no-op if the entity does
    /// not carry it.
    ///
    /// An entity whose last component is removed migrates back to the
    /// identity archetype and stays alive there.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<()> {
        let location = self
            .entities
            .get(entity)
            .copied()
            .ok_or(EcsError::EntityNotFound)?;
        let id = ComponentId::of::<T>();
        let archetype = self.chunks[location.chunk].archetype_index();

        let Some(signature) = signature_without(self.archetypes[archetype].ids(), id) else {
            return Ok(());
        };

        let target = self.get_or_create_archetype(&signature);
        self.relocate(entity, location, target)?;
        Ok(())
    }

    /// Get an immutable reference to a component on an entity.
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let location = self.entities.get(entity)?;
        let chunk = self.chunks.get(location.chunk)?;
        chunk.slot_ref::<T>(location.slot).ok()
    }

    /// Get a mutable reference to a component on an entity.
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let location = *self.entities.get(entity)?;
        let chunk = self.chunks.get_mut(location.chunk)?;
        chunk.slot_mut::<T>(location.slot).ok()
    }

    /// Check if an entity carries component kind `T`.
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        let Some(location) = self.entities.get(entity) else {
            return false;
        };
        self.chunks[location.chunk].has(ComponentId::of::<T>())
    }

    /// Index of the archetype an entity currently belongs to.
    pub fn archetype_of(&self, entity: EntityId) -> Option<usize> {
        let location = self.entities.get(entity)?;
        Some(self.chunks.get(location.chunk)?.archetype_index())
    }

    /// Get an interned archetype by index.
    pub fn archetype(&self, index: usize) -> Option<&Archetype> {
        self.archetypes.get(index)
    }

    /// Maintenance sweep: prune chunks with zero occupancy across every
    /// archetype. Never touches live entity records.
    pub fn remove_empty_chunks(&mut self) {
        for archetype in &mut self.archetypes {
            archetype.remove_empty_chunks(&mut self.chunks, &mut self.queries);
        }
    }

    /// Register a query: attach it to every interned archetype carrying its
    /// required kinds, now and in the future.
    ///
    /// Each query may be registered at most once.
    pub fn register_query(&mut self, query: &mut Query) -> Result<()> {
        if query.is_registered() {
            return Err(EcsError::QueryAlreadyRegistered);
        }
        let key = self.queries.insert(QueryState::new(query.required().into()));
        for archetype in &mut self.archetypes {
            if archetype.is_superset_of(query.required()) {
                archetype.attach_query(key, &mut self.queries);
            }
        }
        query.attach(key);
        debug!(kinds = query.required().len(), "registered query");
        Ok(())
    }

    /// Deregister a query, detaching it from all archetypes and dropping
    /// its chunk list. The handle can be registered again afterwards.
    pub fn deregister_query(&mut self, query: &mut Query) -> Result<()> {
        let key = query.detach().ok_or(EcsError::QueryNotRegistered)?;
        for archetype in &mut self.archetypes {
            archetype.detach_query(key);
        }
        self.queries.remove(key);
        Ok(())
    }

    /// The live chunk list of a registered query.
    pub fn query_chunks(&self, query: &Query) -> Result<&[ChunkKey]> {
        let key = query.key().ok_or(EcsError::QueryNotRegistered)?;
        Ok(self.queries[key].chunks())
    }

    /// Resolve a chunk key from a query's chunk list.
    pub fn chunk(&self, key: ChunkKey) -> Option<&Chunk> {
        self.chunks.get(key)
    }

    /// Iterate the chunks currently matching a registered query.
    pub fn iter_chunks<'w>(
        &'w self,
        query: &Query,
    ) -> Result<impl Iterator<Item = &'w Chunk> + 'w> {
        let keys = self.query_chunks(query)?;
        Ok(keys.iter().filter_map(move |&key| self.chunks.get(key)))
    }

    /// Run `each` over every chunk matching a registered query, one rayon
    /// task per chunk. A chunk is the unit of parallel ownership: workers
    /// may freely take mutable column borrows on their own chunk.
    ///
    /// Requires the "parallel" feature.
    #[cfg(feature = "parallel")]
    pub fn par_for_each_chunk<F>(&self, query: &Query, each: F) -> Result<()>
    where
        F: Fn(&Chunk) + Send + Sync,
    {
        use rayon::prelude::*;

        let keys = self.query_chunks(query)?;
        keys.par_iter().for_each(|&key| {
            if let Some(chunk) = self.chunks.get(key) {
                each(chunk);
            }
        });
        Ok(())
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Intern an archetype by signature content, creating it on first
    /// demand and offering the new shape to every registered query.
    fn get_or_create_archetype(&mut self, ids: &[ComponentId]) -> usize {
        if let Some(&index) = self.archetype_index.get(ids) {
            return index;
        }

        let index = self.archetypes.len();
        self.archetype_index.insert(ids.into(), index);
        self.archetypes.push(Archetype::new(index, ids));

        let registered: Vec<QueryKey> = self.queries.keys().collect();
        for key in registered {
            if self.archetypes[index].is_superset_of(self.queries[key].required()) {
                self.archetypes[index].attach_query(key, &mut self.queries);
            }
        }
        debug!(archetype = index, kinds = ids.len(), "interned archetype");
        index
    }

    fn alloc_in_archetype(&mut self, index: usize) -> Result<(ChunkKey, usize)> {
        self.archetypes[index].alloc_slot(&mut self.chunks, &mut self.queries)
    }

    /// Move an entity's retained data into `target`'s chunk storage.
    ///
    /// The destination slot is fully prepared before the source slot is
    /// touched, so a failure leaves the entity exactly where it was.
    fn relocate(
        &mut self,
        entity: EntityId,
        location: EntityLocation,
        target: usize,
    ) -> Result<(ChunkKey, usize)> {
        let (dst_key, dst_slot) = self.alloc_in_archetype(target)?;

        let [src, dst] = self
            .chunks
            .get_disjoint_mut([location.chunk, dst_key])
            .expect("source and destination chunks must differ");
        src.copy_into(location.slot, dst, dst_slot);
        dst.bind(dst_slot, entity);
        if let Some(displaced) = src.swap_remove(location.slot) {
            if let Some(record) = self.entities.get_mut(displaced) {
                record.slot = location.slot;
            }
        }

        self.entities[entity] = EntityLocation {
            chunk: dst_key,
            slot: dst_slot,
        };
        trace!(?entity, from = ?location.chunk, to = ?dst_key, "relocated entity");
        Ok((dst_key, dst_slot))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, Clone, Copy, PartialEq)]
    struct Health(u32);

    #[test]
    fn test_spawn_and_despawn() {
        let mut world = World::new();
        let entity = world.spawn().unwrap();
        assert!(world.is_alive(entity));
        assert_eq!(world.entity_count(), 1);
        assert_eq!(world.archetype_of(entity), Some(IDENTITY));

        world.despawn(entity).unwrap();
        assert!(!world.is_alive(entity));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_destroyed_handle_is_permanently_invalid() {
        let mut world = World::new();
        let entity = world.spawn().unwrap();
        world.despawn(entity).unwrap();

        assert!(matches!(world.despawn(entity), Err(EcsError::EntityNotFound)));
        assert!(matches!(
            world.add_component::<Health>(entity).map(|_| ()),
            Err(EcsError::EntityNotFound)
        ));
        assert!(matches!(
            world.remove_component::<Health>(entity),
            Err(EcsError::EntityNotFound)
        ));
        assert!(world.get::<Health>(entity).is_none());
    }

    #[test]
    fn test_insert_writes_through_slot() {
        let mut world = World::new();
        let entity = world.spawn().unwrap();
        world.insert(entity, Health(42)).unwrap();
        assert_eq!(world.get::<Health>(entity), Some(&Health(42)));
        assert!(world.has_component::<Health>(entity));
    }
}
