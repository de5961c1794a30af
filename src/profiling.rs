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

//! # Profiling support
//!
//! The engine emits `tracing` events at its structural hot-spots: archetype
//! interning, chunk allocation, chunk pruning, and entity relocation. With
//! the `profiling` feature enabled, the helpers here install a subscriber
//! that collects them.
//!
//! ```ignore
//! colonnade::profiling::init();
//!
//! // Structural events now reach stderr, filtered by RUST_LOG, e.g.
//! // RUST_LOG=colonnade=trace to watch individual entity relocations.
//! ```
//!
//! Profile in release mode for accurate numbers.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Install a global stderr subscriber honoring `RUST_LOG`.
///
/// # Panics
/// Panics if a global subscriber is already set.
pub fn init() {
    Registry::default()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();
}

/// Install a global subscriber writing to a non-blocking file appender,
/// returning the guard that flushes it. Keep the guard alive for the
/// duration of the profile run.
///
/// # Panics
/// Panics if a global subscriber is already set.
pub fn init_with_file(directory: &str, prefix: &str) -> WorkerGuard {
    let appender = tracing_appender::rolling::never(directory, prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Registry::default()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(EnvFilter::from_default_env())
        .init();
    guard
}
