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

//! The plan operator tree.
//!
//! The upstream planner models operators as an open class hierarchy visited
//! through a trait object. That shape doesn't fit a rewriter that must be
//! exhaustive over a closed, known-at-compile-time set of variants, so here
//! `PlanNode` is a single tagged union instead: every rewrite rule in
//! `scheduler::plan_fragmenter` matches on it and the compiler checks that no
//! variant is forgotten.

use std::rc::Rc;

use crate::catalog::FunctionSignature;
use crate::common::{FragmentId, PlanNodeId, Symbol};

/// Shared, immutable pointer to a plan operator. Input trees may share
/// structure (the same `PlanRef` reachable from two parents); the rewriter
/// never mutates a `PlanNode` in place, it only builds new ones on top.
pub type PlanRef = Rc<PlanNode>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    /// Not supported by the fragmenter; kept only so that attempting to
    /// fragment a full outer join exercises the fatal "unsupported join
    /// type" path instead of silently mis-compiling one.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStep {
    Single,
    Partial,
    Final,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateCall {
    pub output: Symbol,
    pub function: FunctionSignature,
    pub args: Vec<Symbol>,
    pub mask: Option<Symbol>,
    pub sample_weight: Option<Symbol>,
}

impl AggregateCall {
    /// The call as it appears in a FINAL aggregation over PARTIAL output:
    /// same function name, single argument referencing the partial stage's
    /// intermediate symbol, no mask or sample weight (those were already
    /// folded into the partial accumulation).
    pub fn over_intermediate(&self, intermediate: Symbol) -> Self {
        Self {
            output: self.output.clone(),
            function: self.function.clone(),
            args: vec![intermediate],
            mask: None,
            sample_weight: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableScan {
    pub id: PlanNodeId,
    pub table_name: String,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Values {
    pub id: PlanNodeId,
    pub row_count: usize,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub predicate: String,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub exprs: Vec<String>,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub id: PlanNodeId,
    pub input: PlanRef,
    /// Sampling rate in parts-per-million of `(0, 1]`, avoiding a
    /// non-`Eq` float field on an otherwise structurally-compared operator.
    pub sample_ppm: u32,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unnest {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub unnest_symbol: Symbol,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub order: Vec<Symbol>,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopN {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub count: u64,
    pub offset: u64,
    pub order: Vec<Symbol>,
    pub partial: bool,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub count: u64,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinctLimit {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub count: u64,
    pub distinct_on: Vec<Symbol>,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowNumber {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub partition_key: Vec<Symbol>,
    pub order: Vec<Symbol>,
    pub row_number_symbol: Symbol,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopNRowNumber {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub count: u64,
    pub partition_key: Vec<Symbol>,
    pub order: Vec<Symbol>,
    pub row_number_symbol: Symbol,
    pub partial: bool,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub partition_key: Vec<Symbol>,
    pub order: Vec<Symbol>,
    pub functions: Vec<FunctionSignature>,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub group_key: Vec<Symbol>,
    pub aggregates: Vec<AggregateCall>,
    pub step: AggregationStep,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkDistinct {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub distinct_symbols: Vec<Symbol>,
    pub marker_symbol: Symbol,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub id: PlanNodeId,
    pub join_type: JoinType,
    pub left: PlanRef,
    pub right: PlanRef,
    pub left_keys: Vec<Symbol>,
    pub right_keys: Vec<Symbol>,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemiJoin {
    pub id: PlanNodeId,
    /// `false` for a regular semi join, `true` for an anti join. Both share
    /// the same fragmentation rule.
    pub anti: bool,
    pub source: PlanRef,
    pub filtering_source: PlanRef,
    pub source_keys: Vec<Symbol>,
    pub filtering_keys: Vec<Symbol>,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexJoin {
    pub id: PlanNodeId,
    pub probe: PlanRef,
    pub index_table: String,
    pub probe_keys: Vec<Symbol>,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Union {
    pub id: PlanNodeId,
    pub sources: Vec<PlanRef>,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableWriter {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub table_name: String,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCommit {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub table_name: String,
    pub output: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub column_names: Vec<String>,
    pub output: Vec<Symbol>,
}

/// Terminal marker of a sealed fragment: hands its input's rows to the
/// cross-fragment transport. Never appears in an input plan tree; the
/// fragmenter is the only thing that introduces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sink {
    pub id: PlanNodeId,
    pub input: PlanRef,
    pub output: Vec<Symbol>,
}

/// Source marker of a fragment: consumes rows from one or more sealed child
/// fragments. Never appears in an input plan tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub id: PlanNodeId,
    pub sources: Vec<FragmentId>,
    pub output: Vec<Symbol>,
}

/// The closed set of plan operators the fragmenter understands, plus the two
/// boundary markers (`Sink`, `Exchange`) it alone introduces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanNode {
    TableScan(TableScan),
    Values(Values),
    Filter(Filter),
    Project(Project),
    Sample(Sample),
    Unnest(Unnest),
    Sort(Sort),
    TopN(TopN),
    Limit(Limit),
    DistinctLimit(DistinctLimit),
    RowNumber(RowNumber),
    TopNRowNumber(TopNRowNumber),
    Window(Window),
    Aggregation(Aggregation),
    MarkDistinct(MarkDistinct),
    Join(Join),
    SemiJoin(SemiJoin),
    IndexJoin(IndexJoin),
    Union(Union),
    TableWriter(TableWriter),
    TableCommit(TableCommit),
    Output(Output),
    Sink(Sink),
    Exchange(Exchange),
}

impl PlanNode {
    pub fn id(&self) -> PlanNodeId {
        match self {
            PlanNode::TableScan(n) => n.id,
            PlanNode::Values(n) => n.id,
            PlanNode::Filter(n) => n.id,
            PlanNode::Project(n) => n.id,
            PlanNode::Sample(n) => n.id,
            PlanNode::Unnest(n) => n.id,
            PlanNode::Sort(n) => n.id,
            PlanNode::TopN(n) => n.id,
            PlanNode::Limit(n) => n.id,
            PlanNode::DistinctLimit(n) => n.id,
            PlanNode::RowNumber(n) => n.id,
            PlanNode::TopNRowNumber(n) => n.id,
            PlanNode::Window(n) => n.id,
            PlanNode::Aggregation(n) => n.id,
            PlanNode::MarkDistinct(n) => n.id,
            PlanNode::Join(n) => n.id,
            PlanNode::SemiJoin(n) => n.id,
            PlanNode::IndexJoin(n) => n.id,
            PlanNode::Union(n) => n.id,
            PlanNode::TableWriter(n) => n.id,
            PlanNode::TableCommit(n) => n.id,
            PlanNode::Output(n) => n.id,
            PlanNode::Sink(n) => n.id,
            PlanNode::Exchange(n) => n.id,
        }
    }

    pub fn output(&self) -> &[Symbol] {
        match self {
            PlanNode::TableScan(n) => &n.output,
            PlanNode::Values(n) => &n.output,
            PlanNode::Filter(n) => &n.output,
            PlanNode::Project(n) => &n.output,
            PlanNode::Sample(n) => &n.output,
            PlanNode::Unnest(n) => &n.output,
            PlanNode::Sort(n) => &n.output,
            PlanNode::TopN(n) => &n.output,
            PlanNode::Limit(n) => &n.output,
            PlanNode::DistinctLimit(n) => &n.output,
            PlanNode::RowNumber(n) => &n.output,
            PlanNode::TopNRowNumber(n) => &n.output,
            PlanNode::Window(n) => &n.output,
            PlanNode::Aggregation(n) => &n.output,
            PlanNode::MarkDistinct(n) => &n.output,
            PlanNode::Join(n) => &n.output,
            PlanNode::SemiJoin(n) => &n.output,
            PlanNode::IndexJoin(n) => &n.output,
            PlanNode::Union(n) => &n.output,
            PlanNode::TableWriter(n) => &n.output,
            PlanNode::TableCommit(n) => &n.output,
            PlanNode::Output(n) => &n.output,
            PlanNode::Sink(n) => &n.output,
            PlanNode::Exchange(n) => &n.output,
        }
    }

    /// The plan-ref children of this operator, stopping at fragment
    /// boundaries: `Exchange` has none (its "children" are other fragments,
    /// referenced by id, not `PlanRef`s within this tree).
    pub fn inputs(&self) -> Vec<PlanRef> {
        match self {
            PlanNode::TableScan(_) | PlanNode::Values(_) | PlanNode::Exchange(_) => vec![],
            PlanNode::Filter(n) => vec![n.input.clone()],
            PlanNode::Project(n) => vec![n.input.clone()],
            PlanNode::Sample(n) => vec![n.input.clone()],
            PlanNode::Unnest(n) => vec![n.input.clone()],
            PlanNode::Sort(n) => vec![n.input.clone()],
            PlanNode::TopN(n) => vec![n.input.clone()],
            PlanNode::Limit(n) => vec![n.input.clone()],
            PlanNode::DistinctLimit(n) => vec![n.input.clone()],
            PlanNode::RowNumber(n) => vec![n.input.clone()],
            PlanNode::TopNRowNumber(n) => vec![n.input.clone()],
            PlanNode::Window(n) => vec![n.input.clone()],
            PlanNode::Aggregation(n) => vec![n.input.clone()],
            PlanNode::MarkDistinct(n) => vec![n.input.clone()],
            PlanNode::Join(n) => vec![n.left.clone(), n.right.clone()],
            PlanNode::SemiJoin(n) => vec![n.source.clone(), n.filtering_source.clone()],
            PlanNode::IndexJoin(n) => vec![n.probe.clone()],
            PlanNode::Union(n) => n.sources.clone(),
            PlanNode::TableWriter(n) => vec![n.input.clone()],
            PlanNode::TableCommit(n) => vec![n.input.clone()],
            PlanNode::Output(n) => vec![n.input.clone()],
            PlanNode::Sink(n) => vec![n.input.clone()],
        }
    }

    /// Fragment ids this node reaches into, if it is an `Exchange`.
    pub fn exchange_sources(&self) -> Option<&[FragmentId]> {
        match self {
            PlanNode::Exchange(n) => Some(&n.sources),
            _ => None,
        }
    }

    pub fn is_sink(&self) -> bool {
        matches!(self, PlanNode::Sink(_))
    }
}
