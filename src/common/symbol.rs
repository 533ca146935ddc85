// Copyright 2025 RisingWave Labs
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

use std::fmt;

use crate::common::types::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u64);

/// A typed, identity-compared reference to a column produced somewhere in
/// the plan. Two symbols are equal iff they were handed out by the same
/// call to [`SymbolAllocator::new_symbol`] — two symbols with the same
/// `prefix` and `ty` are still distinct.
#[derive(Debug, Clone, Eq)]
pub struct Symbol {
    pub id: SymbolId,
    pub prefix: String,
    pub ty: DataType,
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.prefix, self.id.0)
    }
}

/// Single-owner, monotonically increasing allocator for [`Symbol`]s. The
/// `prefix` passed to [`new_symbol`](Self::new_symbol) is cosmetic only — it
/// shows up in `Debug`/`Display` output but never participates in equality.
#[derive(Debug, Default)]
pub struct SymbolAllocator {
    next: u64,
}

impl SymbolAllocator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn new_symbol(&mut self, prefix: &str, ty: DataType) -> Symbol {
        let id = SymbolId(self.next);
        self.next += 1;
        Symbol {
            id,
            prefix: prefix.to_owned(),
            ty,
        }
    }
}
