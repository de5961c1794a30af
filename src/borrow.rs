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

//! Runtime column borrow flags
//!
//! During the data-parallel iteration phase, chunks are shared immutably
//! across workers and column access goes through these flags: any number of
//! readers, or exactly one writer, per column. The high bit marks a unique
//! borrow, the remaining bits count shared borrows.

use std::sync::atomic::{AtomicUsize, Ordering};

const UNIQUE_BIT: usize = !(usize::MAX >> 1);

pub(crate) struct AtomicBorrow(AtomicUsize);

impl AtomicBorrow {
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    /// Take a shared borrow. Returns false if a unique borrow is live.
    pub fn borrow(&self) -> bool {
        let prev = self.0.fetch_add(1, Ordering::Acquire);
        if prev & UNIQUE_BIT != 0 {
            self.0.fetch_sub(1, Ordering::Release);
            return false;
        }
        true
    }

    /// Take the unique borrow. Returns false if any borrow is live.
    pub fn borrow_mut(&self) -> bool {
        self.0
            .compare_exchange(0, UNIQUE_BIT, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn release(&self) {
        let prev = self.0.fetch_sub(1, Ordering::Release);
        debug_assert!(prev & UNIQUE_BIT == 0, "shared release of unique borrow");
        debug_assert!(prev > 0, "unbalanced release");
    }

    pub fn release_mut(&self) {
        let prev = self.0.fetch_and(!UNIQUE_BIT, Ordering::Release);
        debug_assert!(prev & UNIQUE_BIT != 0, "unique release of shared borrow");
    }
}
