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

//! Component kinds and the process-wide type registry
//!
//! Every distinct component type is assigned a small, stable [`ComponentId`]
//! on first use. The id is the sort key everywhere archetype signatures are
//! compared or merged. Alongside the id the registry captures a [`TypeInfo`]
//! descriptor (layout plus erased default/drop functions) so chunk storage
//! can manage column memory without knowing the concrete type.

use std::alloc::Layout;
use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::OnceLock;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{EcsError, Result};

/// Marker trait for components
///
/// Components must be `'static` (no borrowed data), sendable across threads,
/// and `Default`-constructible: cleared column slots are restored to the
/// default value.
pub trait Component: Default + Send + Sync + 'static {}

/// Automatically implement Component for all valid types
impl<T: Default + Send + Sync + 'static> Component for T {}

/// Stable numeric id of one component kind
///
/// Ids are issued in registration order and never recycled; the ordering is
/// what keeps archetype signatures sorted.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ComponentId(u32);

impl ComponentId {
    /// The id of component type `T`, registering it on first use.
    pub fn of<T: Component>() -> Self {
        registry().register::<T>()
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Erased descriptor of one component kind
///
/// Carries everything chunk storage needs to create, clear, and destroy a
/// column of this kind without generics: the element layout plus function
/// pointers captured at registration time.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    type_id: TypeId,
    name: &'static str,
    layout: Layout,
    default_fn: unsafe fn(*mut u8),
    drop_fn: Option<unsafe fn(*mut u8)>,
}

impl TypeInfo {
    pub fn of<T: Component>() -> Self {
        unsafe fn write_default<T: Default>(ptr: *mut u8) {
            ptr.cast::<T>().write(T::default());
        }
        unsafe fn drop_in_place<T>(ptr: *mut u8) {
            ptr.cast::<T>().drop_in_place();
        }

        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            layout: Layout::new::<T>(),
            default_fn: write_default::<T>,
            drop_fn: std::mem::needs_drop::<T>()
                .then_some(drop_in_place::<T> as unsafe fn(*mut u8)),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }

    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// Write the default value into an uninitialized (or moved-out) slot.
    ///
    /// # Safety
    /// `ptr` must be valid for writes of this kind's layout and must not hold
    /// a live value (it will not be dropped).
    pub(crate) unsafe fn write_default(&self, ptr: *mut u8) {
        (self.default_fn)(ptr)
    }

    /// Drop the live value at `ptr`, if this kind needs dropping.
    ///
    /// # Safety
    /// `ptr` must point at a live value of this kind.
    pub(crate) unsafe fn drop_in_place(&self, ptr: *mut u8) {
        if let Some(drop_fn) = self.drop_fn {
            drop_fn(ptr)
        }
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("size", &self.layout.size())
            .finish()
    }
}

/// Process-wide, append-only component kind registry
///
/// Ids are a permanent, growing namespace for the process; there is no
/// removal operation. Registration from multiple threads is safe and
/// idempotent per kind.
#[derive(Default)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    kinds: Vec<TypeInfo>,
    by_type: FxHashMap<TypeId, ComponentId>,
}

impl TypeRegistry {
    /// Register component type `T`, returning its stable id.
    ///
    /// Repeated calls for the same type return the same id; concurrent
    /// callers racing on first registration settle on the first writer's id.
    pub fn register<T: Component>(&self) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.inner.read().by_type.get(&type_id) {
            return id;
        }

        let mut inner = self.inner.write();
        if let Some(&id) = inner.by_type.get(&type_id) {
            return id;
        }
        let id = ComponentId(inner.kinds.len() as u32);
        inner.kinds.push(TypeInfo::of::<T>());
        inner.by_type.insert(type_id, id);
        id
    }

    /// Resolve an issued id back to its kind descriptor.
    pub fn resolve(&self, id: ComponentId) -> Result<TypeInfo> {
        self.inner
            .read()
            .kinds
            .get(id.index())
            .copied()
            .ok_or(EcsError::UnknownTypeId(id))
    }

    /// Number of kinds registered so far.
    pub fn len(&self) -> usize {
        self.inner.read().kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The global registry shared by every [`World`](crate::world::World) in the
/// process.
pub fn registry() -> &'static TypeRegistry {
    static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(TypeRegistry::default)
}
