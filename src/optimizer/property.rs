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

//! The small algebra of distribution properties that fragment boundaries
//! must preserve.

use crate::common::Symbol;

/// How many instances of a fragment run, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Distribution {
    /// Reads a partitioned base table; cardinality follows the source
    /// splits.
    Source,
    /// A configurable number of workers, each a hash-partitioned slice.
    Fixed,
    /// Exactly one instance, pinned to the coordinator.
    CoordinatorOnly,
    /// Exactly one instance, any worker. Also known as "single node".
    None,
}

impl Distribution {
    /// `SOURCE` and `FIXED` fragments run on more than one worker;
    /// `COORDINATOR_ONLY` and `NONE` are single-instance.
    pub fn is_distributed(self) -> bool {
        matches!(self, Distribution::Source | Distribution::Fixed)
    }
}

/// How a fragment's sink partitions its rows to the consuming exchange.
/// Only sealed fragments carry one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPartitioning {
    None,
    Hash {
        by: Vec<Symbol>,
        hash: Option<Symbol>,
    },
}

impl OutputPartitioning {
    pub fn is_hash(&self) -> bool {
        matches!(self, OutputPartitioning::Hash { .. })
    }

    pub fn hash_keys(&self) -> Option<&[Symbol]> {
        match self {
            OutputPartitioning::Hash { by, .. } => Some(by),
            OutputPartitioning::None => None,
        }
    }
}
