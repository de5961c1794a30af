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

//! Fixed-capacity column blocks
//!
//! A chunk holds up to [`CHUNK_CAPACITY`] entities of exactly one archetype:
//! one type-erased column per component kind, plus a parallel array of
//! back-references to the owning entities. Removal is swap-with-last, so the
//! occupied slots are always the dense prefix `[0, len)`.
//!
//! Column memory invariant: every slot in `[0, CHUNK_CAPACITY)` of every
//! column always holds a valid, initialized value; slots at or beyond `len`
//! hold the kind's default value. Allocation therefore hands out slots that
//! are already default-initialized, and removal restores the vacated slot to
//! the default.

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::any::TypeId;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use crate::borrow::AtomicBorrow;
use crate::component::{registry, Component, ComponentId, TypeInfo};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};

/// Number of entity slots in every chunk.
pub const CHUNK_CAPACITY: usize = 4096;

/// One type-erased component column: `CHUNK_CAPACITY` values of a single
/// kind in a raw, properly aligned allocation.
pub(crate) struct Column {
    info: TypeInfo,
    data: NonNull<u8>,
    borrow: AtomicBorrow,
}

impl Column {
    fn new(info: TypeInfo) -> Self {
        let data = if info.size() == 0 {
            // Zero-sized kinds need no storage, only a well-aligned pointer.
            NonNull::new(info.align() as *mut u8).unwrap()
        } else {
            let layout = array_layout(&info);
            let ptr = unsafe { alloc(layout) };
            NonNull::new(ptr).unwrap_or_else(|| handle_alloc_error(layout))
        };
        let column = Self {
            info,
            data,
            borrow: AtomicBorrow::new(),
        };
        for slot in 0..CHUNK_CAPACITY {
            unsafe { column.info.write_default(column.ptr_at(slot)) };
        }
        column
    }

    #[inline]
    unsafe fn ptr_at(&self, slot: usize) -> *mut u8 {
        self.data.as_ptr().add(slot * self.info.size())
    }

    /// Replace the live value at `slot` with the kind's default value.
    fn reset(&mut self, slot: usize) {
        unsafe {
            let ptr = self.ptr_at(slot);
            self.info.drop_in_place(ptr);
            self.info.write_default(ptr);
        }
    }

    /// Move the value at `from` over the live value at `to`, restoring
    /// `from` to the default value.
    fn move_within(&mut self, from: usize, to: usize) {
        debug_assert_ne!(from, to);
        unsafe {
            let src = self.ptr_at(from);
            let dst = self.ptr_at(to);
            self.info.drop_in_place(dst);
            std::ptr::copy_nonoverlapping(src, dst, self.info.size());
            self.info.write_default(src);
        }
    }

    /// Move the value at `src_slot` over the live value in `dst` at
    /// `dst_slot`, restoring the source slot to the default value. Both
    /// columns must store the same kind.
    fn move_into(&mut self, src_slot: usize, dst: &mut Column, dst_slot: usize) {
        debug_assert_eq!(self.info.type_id(), dst.info.type_id());
        unsafe {
            let src = self.ptr_at(src_slot);
            let dst_ptr = dst.ptr_at(dst_slot);
            dst.info.drop_in_place(dst_ptr);
            std::ptr::copy_nonoverlapping(src, dst_ptr, self.info.size());
            self.info.write_default(src);
        }
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        for slot in 0..CHUNK_CAPACITY {
            unsafe { self.info.drop_in_place(self.ptr_at(slot)) };
        }
        if self.info.size() != 0 {
            unsafe { dealloc(self.data.as_ptr(), array_layout(&self.info)) };
        }
    }
}

fn array_layout(info: &TypeInfo) -> Layout {
    // Element size is always a multiple of alignment, so size * capacity is
    // a valid array layout.
    Layout::from_size_align(info.size() * CHUNK_CAPACITY, info.align())
        .expect("column layout overflow")
}

/// Fixed-capacity structure-of-arrays block owned by exactly one archetype.
pub struct Chunk {
    archetype: usize,
    ids: Box<[ComponentId]>,
    columns: Box<[Column]>,
    entities: Vec<EntityId>,
}

// Columns hold raw pointers, but their contents are Send + Sync component
// values and access is gated by &mut or the per-column borrow flags.
unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

impl Chunk {
    /// Build an empty chunk for the archetype at `archetype` with the given
    /// sorted kind ids.
    pub(crate) fn new(archetype: usize, ids: &[ComponentId]) -> Result<Self> {
        let mut columns = Vec::with_capacity(ids.len());
        for &id in ids {
            columns.push(Column::new(registry().resolve(id)?));
        }
        Ok(Self {
            archetype,
            ids: ids.into(),
            columns: columns.into_boxed_slice(),
            entities: Vec::with_capacity(CHUNK_CAPACITY),
        })
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entities.len() == CHUNK_CAPACITY
    }

    /// Back-references: the entity occupying each slot in `[0, len)`.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// The sorted kind ids of the owning archetype.
    pub fn kind_ids(&self) -> &[ComponentId] {
        &self.ids
    }

    pub(crate) fn archetype_index(&self) -> usize {
        self.archetype
    }

    pub fn has(&self, id: ComponentId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Claim the next free slot. The slot's column values are already
    /// default-initialized; the caller binds the owning entity afterwards.
    pub(crate) fn allocate(&mut self) -> Result<usize> {
        if self.is_full() {
            return Err(EcsError::ChunkFull);
        }
        let slot = self.entities.len();
        self.entities.push(EntityId::default());
        Ok(slot)
    }

    /// Record which entity owns `slot`.
    pub(crate) fn bind(&mut self, slot: usize, entity: EntityId) {
        self.entities[slot] = entity;
    }

    /// Remove `slot`, filling the gap with the last occupied slot.
    ///
    /// Returns the entity that moved into `slot`, if any, so the caller can
    /// update its record.
    pub(crate) fn swap_remove(&mut self, slot: usize) -> Option<EntityId> {
        assert!(slot < self.entities.len(), "slot out of bounds");
        let last = self.entities.len() - 1;
        if slot < last {
            for column in self.columns.iter_mut() {
                column.move_within(last, slot);
            }
            self.entities.swap_remove(slot);
            Some(self.entities[slot])
        } else {
            for column in self.columns.iter_mut() {
                column.reset(slot);
            }
            self.entities.pop();
            None
        }
    }

    /// Move the retained column values of `src_slot` into `dst_slot` of
    /// `dst`.
    ///
    /// A single merge walk over both sorted id sequences: shared kinds move
    /// across, kinds only in `dst` keep their default value for the caller
    /// to fill, and kinds only in `self` stay behind for `swap_remove` to
    /// clear.
    pub(crate) fn copy_into(&mut self, src_slot: usize, dst: &mut Chunk, dst_slot: usize) {
        let mut s = 0;
        let mut d = 0;
        while s < self.ids.len() && d < dst.ids.len() {
            match self.ids[s].cmp(&dst.ids[d]) {
                Ordering::Equal => {
                    self.columns[s].move_into(src_slot, &mut dst.columns[d], dst_slot);
                    s += 1;
                    d += 1;
                }
                Ordering::Less => s += 1,
                Ordering::Greater => d += 1,
            }
        }
    }

    fn column_of(&self, id: ComponentId) -> Result<&Column> {
        let index = self
            .ids
            .binary_search(&id)
            .map_err(|_| EcsError::ComponentNotFound)?;
        Ok(&self.columns[index])
    }

    /// Borrow the column for kind `T` for reading.
    ///
    /// # Panics
    /// Panics if the column is currently borrowed uniquely.
    pub fn column<T: Component>(&self) -> Result<ColumnRef<'_, T>> {
        let column = self.column_of(ComponentId::of::<T>())?;
        assert_eq!(column.info.type_id(), TypeId::of::<T>());
        if !column.borrow.borrow() {
            panic!("{} already borrowed uniquely", column.info.name());
        }
        let values = unsafe { slice::from_raw_parts(column.data.as_ptr().cast::<T>(), self.len()) };
        Ok(ColumnRef { column, values })
    }

    /// Borrow the column for kind `T` for writing.
    ///
    /// # Panics
    /// Panics if the column is currently borrowed.
    pub fn column_mut<T: Component>(&self) -> Result<ColumnMut<'_, T>> {
        let column = self.column_of(ComponentId::of::<T>())?;
        assert_eq!(column.info.type_id(), TypeId::of::<T>());
        if !column.borrow.borrow_mut() {
            panic!("{} already borrowed", column.info.name());
        }
        let values =
            unsafe { slice::from_raw_parts_mut(column.data.as_ptr().cast::<T>(), self.len()) };
        Ok(ColumnMut { column, values })
    }

    /// Direct read access to one slot, bypassing the borrow flags.
    pub(crate) fn slot_ref<T: Component>(&self, slot: usize) -> Result<&T> {
        let column = self.column_of(ComponentId::of::<T>())?;
        debug_assert!(slot < self.entities.len());
        Ok(unsafe { &*column.ptr_at(slot).cast::<T>() })
    }

    /// Direct write access to one slot; exclusivity comes from `&mut self`.
    pub(crate) fn slot_mut<T: Component>(&mut self, slot: usize) -> Result<&mut T> {
        let index = self
            .ids
            .binary_search(&ComponentId::of::<T>())
            .map_err(|_| EcsError::ComponentNotFound)?;
        debug_assert!(slot < self.entities.len());
        Ok(unsafe { &mut *self.columns[index].ptr_at(slot).cast::<T>() })
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("archetype", &self.archetype)
            .field("len", &self.len())
            .field("kinds", &self.ids)
            .finish()
    }
}

/// Shared borrow of one chunk column, released on drop.
pub struct ColumnRef<'a, T: Component> {
    column: &'a Column,
    values: &'a [T],
}

impl<T: Component> Deref for ColumnRef<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.values
    }
}

impl<T: Component> Drop for ColumnRef<'_, T> {
    fn drop(&mut self) {
        self.column.borrow.release();
    }
}

impl<T: Component + fmt::Debug> fmt::Debug for ColumnRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.values.fmt(f)
    }
}

/// Unique borrow of one chunk column, released on drop.
pub struct ColumnMut<'a, T: Component> {
    column: &'a Column,
    values: &'a mut [T],
}

impl<T: Component> Deref for ColumnMut<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.values
    }
}

impl<T: Component> DerefMut for ColumnMut<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.values
    }
}

impl<T: Component> Drop for ColumnMut<'_, T> {
    fn drop(&mut self) {
        self.column.borrow.release_mut();
    }
}

impl<T: Component + fmt::Debug> fmt::Debug for ColumnMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.values.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[derive(Default, Debug, Clone, Copy, PartialEq)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Default, Debug, Clone, PartialEq)]
    struct Tag(String);

    fn entity_keys(n: usize) -> Vec<EntityId> {
        let mut map: SlotMap<EntityId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    fn sorted_ids(mut ids: Vec<ComponentId>) -> Vec<ComponentId> {
        ids.sort();
        ids
    }

    #[test]
    fn test_allocate_and_bind() {
        let ids = sorted_ids(vec![ComponentId::of::<Pos>()]);
        let mut chunk = Chunk::new(0, &ids).unwrap();
        let owners = entity_keys(2);

        let a = chunk.allocate().unwrap();
        let b = chunk.allocate().unwrap();
        chunk.bind(a, owners[0]);
        chunk.bind(b, owners[1]);

        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.entities(), &[owners[0], owners[1]]);
        // freshly allocated slots hold the default value
        assert_eq!(*chunk.slot_ref::<Pos>(a).unwrap(), Pos::default());
    }

    #[test]
    fn test_swap_remove_relocates_last() {
        let ids = sorted_ids(vec![ComponentId::of::<Pos>()]);
        let mut chunk = Chunk::new(0, &ids).unwrap();
        let owners = entity_keys(3);
        for (i, &owner) in owners.iter().enumerate() {
            let slot = chunk.allocate().unwrap();
            chunk.bind(slot, owner);
            *chunk.slot_mut::<Pos>(slot).unwrap() = Pos {
                x: i as f32,
                y: 0.0,
            };
        }

        let displaced = chunk.swap_remove(0);
        assert_eq!(displaced, Some(owners[2]));
        assert_eq!(chunk.len(), 2);
        // the last entity's value now lives in slot 0
        assert_eq!(chunk.slot_ref::<Pos>(0).unwrap().x, 2.0);
        assert_eq!(chunk.entities()[0], owners[2]);
    }

    #[test]
    fn test_swap_remove_last_slot_clears_it() {
        let ids = sorted_ids(vec![ComponentId::of::<Tag>()]);
        let mut chunk = Chunk::new(0, &ids).unwrap();
        let owners = entity_keys(2);
        for &owner in &owners {
            let slot = chunk.allocate().unwrap();
            chunk.bind(slot, owner);
            *chunk.slot_mut::<Tag>(slot).unwrap() = Tag("occupied".into());
        }

        assert_eq!(chunk.swap_remove(1), None);
        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk.slot_ref::<Tag>(0).unwrap().0, "occupied");
        // the vacated slot is default again, ready for the next allocation
        let slot = chunk.allocate().unwrap();
        assert_eq!(chunk.slot_ref::<Tag>(slot).unwrap().0, "");
    }

    #[test]
    fn test_copy_into_merges_shared_kinds() {
        let pos = ComponentId::of::<Pos>();
        let tag = ComponentId::of::<Tag>();
        let both = sorted_ids(vec![pos, tag]);
        let only_pos = sorted_ids(vec![pos]);

        let mut src = Chunk::new(0, &both).unwrap();
        let mut dst = Chunk::new(1, &only_pos).unwrap();
        let owners = entity_keys(1);

        let src_slot = src.allocate().unwrap();
        src.bind(src_slot, owners[0]);
        *src.slot_mut::<Pos>(src_slot).unwrap() = Pos { x: 7.0, y: 8.0 };
        *src.slot_mut::<Tag>(src_slot).unwrap() = Tag("dropped kind".into());

        let dst_slot = dst.allocate().unwrap();
        src.copy_into(src_slot, &mut dst, dst_slot);

        assert_eq!(*dst.slot_ref::<Pos>(dst_slot).unwrap(), Pos { x: 7.0, y: 8.0 });
        assert!(dst.slot_ref::<Tag>(dst_slot).is_err());
        // the shared kind moved out of the source slot
        assert_eq!(*src.slot_ref::<Pos>(src_slot).unwrap(), Pos::default());
        // the source-only kind stays behind for swap_remove to clear
        assert_eq!(src.slot_ref::<Tag>(src_slot).unwrap().0, "dropped kind");
    }

    #[test]
    fn test_column_lookup_unknown_kind_fails() {
        let ids = sorted_ids(vec![ComponentId::of::<Pos>()]);
        let chunk = Chunk::new(0, &ids).unwrap();
        assert!(matches!(
            chunk.column::<Tag>().map(|_| ()),
            Err(EcsError::ComponentNotFound)
        ));
    }

    #[test]
    fn test_column_guards_enforce_aliasing() {
        let ids = sorted_ids(vec![ComponentId::of::<Pos>()]);
        let mut chunk = Chunk::new(0, &ids).unwrap();
        let owners = entity_keys(1);
        let slot = chunk.allocate().unwrap();
        chunk.bind(slot, owners[0]);

        let read_a = chunk.column::<Pos>().unwrap();
        let read_b = chunk.column::<Pos>().unwrap();
        assert_eq!(read_a.len(), 1);
        assert_eq!(read_b.len(), 1);
        drop(read_a);
        drop(read_b);

        let mut write = chunk.column_mut::<Pos>().unwrap();
        write[0] = Pos { x: 1.0, y: 2.0 };
        drop(write);
        assert_eq!(chunk.slot_ref::<Pos>(slot).unwrap().x, 1.0);
    }

    #[test]
    #[should_panic(expected = "already borrowed")]
    fn test_write_borrow_conflicts_with_read() {
        let ids = sorted_ids(vec![ComponentId::of::<Pos>()]);
        let chunk = Chunk::new(0, &ids).unwrap();
        let _read = chunk.column::<Pos>().unwrap();
        let _write = chunk.column_mut::<Pos>().unwrap();
    }
}
