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

//! Entity identifiers and location metadata.

use slotmap::new_key_type;

new_key_type! {
    /// Unique entity handle backed by slotmap's generational keys.
    ///
    /// A despawned handle never resolves again, even if the underlying
    /// record slot is reused.
    pub struct EntityId;

    /// Stable identity of one storage chunk for the lifetime of the chunk.
    pub struct ChunkKey;

    /// Identity of one registered query.
    pub struct QueryKey;
}

/// Entity location: the chunk an entity currently lives in and its slot
/// within that chunk. This is the only per-entity mutable bookkeeping state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub chunk: ChunkKey,
    pub slot: usize,
}
