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

//! Rewrites a logical query plan tree into a DAG of plan fragments connected
//! by shuffle exchanges.
//!
//! The entry point is [`fragment`]: hand it a plan's root, a [`SessionCtx`],
//! [`PlannerOptions`], the allocators the rewrite should draw fresh
//! [`common::Symbol`]s and [`common::PlanNodeId`]s from, and a
//! [`FunctionCatalog`] to resolve aggregate decomposability. It returns a
//! [`SubPlan`] — the fragment DAG — or a [`FragmenterError`] if the input
//! plan uses an operator or join type the fragmenter does not support, or if
//! the result would violate one of the DAG's own invariants.

pub mod catalog;
pub mod common;
pub mod optimizer;
pub mod scheduler;
pub mod session;

pub use catalog::{FunctionCatalog, FunctionInfo, FunctionSignature, MemoryFunctionCatalog};
pub use common::{
    DataType, FragmentId, FragmenterError, NodeIdAllocator, PlanNodeId, Result, Symbol,
    SymbolAllocator, SymbolId,
};
pub use optimizer::{Distribution, OutputPartitioning, PlanNode, PlanRef};
pub use scheduler::plan_fragmenter::fragment;
pub use scheduler::{Fragment, FragmentGraphBuilder, SubPlan};
pub use session::{ConfigMap, PlannerOptions, SessionCtx};
