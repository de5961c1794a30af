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

//! Colonnade - chunked archetype storage for entity-component data
//!
//! Entities are grouped by archetype (the exact set of component kinds they
//! carry) into fixed-capacity, column-oriented chunks. Structural changes
//! relocate a single entity between chunk layouts with one merge-walk copy;
//! registered queries keep live chunk lists for high-throughput, optionally
//! parallel iteration.
//!
//! ```
//! use colonnade::prelude::*;
//!
//! #[derive(Default, Debug, Clone, Copy)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Default, Debug, Clone, Copy)]
//! struct Velocity { x: f32, y: f32 }
//!
//! let mut world = World::new();
//! let entity = world.spawn()?;
//! *world.add_component::<Position>(entity)? = Position { x: 1.0, y: 2.0 };
//! *world.add_component::<Velocity>(entity)? = Velocity { x: 0.5, y: 0.0 };
//!
//! let mut moving = Query::new().require::<Position>().require::<Velocity>();
//! world.register_query(&mut moving)?;
//! for chunk in world.iter_chunks(&moving)? {
//!     let mut positions = chunk.column_mut::<Position>()?;
//!     let velocities = chunk.column::<Velocity>()?;
//!     for (position, velocity) in positions.iter_mut().zip(velocities.iter()) {
//!         position.x += velocity.x;
//!         position.y += velocity.y;
//!     }
//! }
//! world.deregister_query(&mut moving)?;
//! # Ok::<(), colonnade::EcsError>(())
//! ```

pub mod archetype;
mod borrow;
pub mod chunk;
pub mod component;
pub mod entity;
pub mod error;
pub mod prelude;
#[cfg(feature = "profiling")]
pub mod profiling;
pub mod query;
pub mod world;

pub use archetype::*;
pub use chunk::*;
pub use component::*;
pub use entity::*;
pub use error::*;
pub use query::*;
pub use world::*;
