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

use thiserror::Error;

use crate::common::ids::{FragmentId, PlanNodeId};

pub type Result<T> = std::result::Result<T, FragmenterError>;

/// The four error kinds the fragmenter can surface. The pass is a pure
/// rewrite: nothing here is retried, and no partial [`crate::fragment::SubPlan`]
/// is ever returned on error.
#[derive(Error, Debug)]
pub enum FragmenterError {
    #[error("unsupported plan operator: {0}")]
    UnsupportedOperator(String),

    #[error("unsupported join type: {0}")]
    UnsupportedJoinType(String),

    #[error("sanity check failed: {0}")]
    InvariantViolation(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("missing required input: {0}")]
    MissingInput(String),

    #[error(transparent)]
    Catalog(#[from] anyhow::Error),
}

impl FragmenterError {
    pub fn dangling_exchange(fragment: FragmentId) -> Self {
        Self::InvariantViolation(format!(
            "exchange references fragment {fragment} that is not attached as a child"
        ))
    }

    pub fn symbol_not_produced(node: PlanNodeId) -> Self {
        Self::InvariantViolation(format!(
            "plan node {node} references a symbol its input does not produce"
        ))
    }

    pub fn partitioning_mismatch(fragment: FragmentId) -> Self {
        Self::InvariantViolation(format!(
            "fragment {fragment} feeds a FIXED exchange but its output partitioning is not HASH"
        ))
    }

    pub fn cycle_detected(fragment: FragmentId) -> Self {
        Self::InvariantViolation(format!("fragment graph contains a cycle through {fragment}"))
    }
}
