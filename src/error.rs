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

//! Error types

use std::fmt;

use crate::component::ComponentId;

/// Storage engine error type
///
/// Every variant is a programming error: the engine has no I/O and no
/// transient failure mode, so none of these are retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcsError {
    /// Operation given a destroyed or unknown entity handle
    EntityNotFound,

    /// Column lookup for a kind the chunk's archetype does not carry
    ComponentNotFound,

    /// Slot requested from a chunk already at capacity
    ChunkFull,

    /// Query handle registered while already registered
    QueryAlreadyRegistered,

    /// Operation on a query that was never registered or has been deregistered
    QueryNotRegistered,

    /// Resolving a component-kind id the registry never issued
    UnknownTypeId(ComponentId),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityNotFound => write!(f, "Entity not found"),
            EcsError::ComponentNotFound => write!(f, "Component not found in chunk"),
            EcsError::ChunkFull => write!(f, "Chunk is at capacity"),
            EcsError::QueryAlreadyRegistered => write!(f, "Query is already registered"),
            EcsError::QueryNotRegistered => write!(f, "Query is not registered"),
            EcsError::UnknownTypeId(id) => write!(f, "Unknown component kind id {id:?}"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
