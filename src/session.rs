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

//! The session/config bag. The fragmenter only ever reads it, for a single
//! feature flag (`big_query_enabled`); everything else a real session would
//! carry (user, search path, timezone, ...) is irrelevant at this layer.

/// Read-only key/value feature flag source.
pub trait SessionCtx {
    fn big_query_enabled(&self) -> bool;
}

/// The three planner options threaded through every rewrite rule that needs
/// to decide between a single-node and a distributed plan.
#[derive(Debug, Clone, Copy)]
pub struct PlannerOptions {
    /// Forces every fragment to `NONE` distribution; see invariant 7.
    pub create_single_node_plan: bool,
    pub distributed_index_joins: bool,
    pub distributed_joins: bool,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            create_single_node_plan: false,
            distributed_index_joins: false,
            distributed_joins: false,
        }
    }
}

/// A trivial [`SessionCtx`] backed by a single bool, good enough for
/// embedding this crate and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigMap {
    big_query_enabled: bool,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_big_query_enabled(mut self, enabled: bool) -> Self {
        self.big_query_enabled = enabled;
        self
    }
}

impl SessionCtx for ConfigMap {
    fn big_query_enabled(&self) -> bool {
        self.big_query_enabled
    }
}
