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

//! Rewrites a logical plan tree into a [`SubPlan`] DAG of fragments.
//!
//! One private `rewrite_*` method per operator, dispatched by [`rewrite`]
//! via an exhaustive `match` on the operator's variant. Each method returns
//! an open [`FragmentBuilder`] — sealing
//! only happens where a rule actually needs to insert a boundary (`Sink` +
//! `Exchange`), via the three composition helpers [`cap_with_sink`],
//! [`merge_upward`] and [`rehash`].

use std::collections::HashSet;
use std::rc::Rc;

use crate::catalog::FunctionCatalog;
use crate::common::error::{FragmenterError, Result};
use crate::common::{FragmentId, NodeIdAllocator, PlanNodeId, Symbol, SymbolAllocator};
use crate::optimizer::plan_node::{
    AggregateCall, Aggregation, AggregationStep, DistinctLimit, Exchange, Filter, IndexJoin, Join,
    JoinType, Limit, MarkDistinct, Output, PlanNode, PlanRef, Project, RowNumber, Sample,
    SemiJoin, Sink, Sort, TableCommit, TableScan, TableWriter, TopN, TopNRowNumber, Union,
    Unnest, Values, Window,
};
use crate::optimizer::property::Distribution;
use crate::scheduler::fragment::{Fragment, FragmentBuilder, FragmentGraphBuilder, SubPlan};
use crate::session::{PlannerOptions, SessionCtx};

/// Rewrites one logical plan into a [`SubPlan`], consuming the allocators it
/// is handed and running the sanity check before returning.
pub fn fragment(
    root: &PlanRef,
    session: &dyn SessionCtx,
    options: PlannerOptions,
    symbols: &mut SymbolAllocator,
    node_ids: &mut NodeIdAllocator,
    catalog: &dyn FunctionCatalog,
) -> Result<SubPlan> {
    let mut fragmenter = PlanFragmenter {
        session,
        options,
        symbols,
        node_ids,
        catalog,
        next_fragment_id: 0,
        graph: FragmentGraphBuilder::new(),
    };
    let root_builder = fragmenter.rewrite(root)?;
    let root_fragment = root_builder.seal(&mut fragmenter.graph);
    let subplan = fragmenter.graph.build(root_fragment.id);
    crate::scheduler::sanity::check(&subplan)?;
    Ok(subplan)
}

struct PlanFragmenter<'a> {
    session: &'a dyn SessionCtx,
    options: PlannerOptions,
    symbols: &'a mut SymbolAllocator,
    node_ids: &'a mut NodeIdAllocator,
    catalog: &'a dyn FunctionCatalog,
    next_fragment_id: u32,
    graph: FragmentGraphBuilder,
}

impl PlanFragmenter<'_> {
    fn next_fragment_id(&mut self) -> FragmentId {
        let id = FragmentId(self.next_fragment_id);
        self.next_fragment_id += 1;
        id
    }

    fn next_node_id(&mut self) -> PlanNodeId {
        self.node_ids.next_id()
    }

    // ---- boundary-insertion primitives (spec §4.2) ----------------------

    /// Cap-with-Sink: wraps the builder's current root in a `Sink` whose
    /// output is exactly the wrapped root's output.
    fn cap_with_sink(&mut self, builder: &mut FragmentBuilder) {
        let input = builder.root().clone();
        let id = self.next_node_id();
        let output = input.output().to_vec();
        builder.set_root(Rc::new(PlanNode::Sink(Sink { id, input, output })));
    }

    /// Start-new-over-Exchange: opens a fresh builder of the given
    /// distribution rooted at an `Exchange` consuming `sealed`, and attaches
    /// `sealed` as its child.
    fn over_exchange(&mut self, sealed: &Fragment, distribution: Distribution) -> FragmentBuilder {
        let id = self.next_node_id();
        let root = Rc::new(PlanNode::Exchange(Exchange {
            id,
            sources: vec![sealed.id],
            output: sealed.output().to_vec(),
        }));
        let fragment_id = self.next_fragment_id();
        let mut builder = match distribution {
            Distribution::None => FragmentBuilder::single_node(fragment_id, root),
            Distribution::Fixed => FragmentBuilder::fixed(fragment_id, root),
            Distribution::CoordinatorOnly => FragmentBuilder::coordinator_only(fragment_id, root),
            Distribution::Source => {
                unreachable!("a fragment opened over an exchange is never SOURCE")
            }
        };
        builder.add_child(sealed);
        builder
    }

    /// Seal-and-attach, composed into "merge upward to a single node": cap,
    /// seal, and open a `NONE` fragment over the result.
    fn merge_upward(&mut self, mut builder: FragmentBuilder) -> FragmentBuilder {
        self.cap_with_sink(&mut builder);
        let sealed = builder.seal(&mut self.graph);
        self.over_exchange(&sealed, Distribution::None)
    }

    /// Seal-and-attach, composed into "re-hash, staying distributed": set the
    /// sink's hash partitioning, cap, seal, and open a `FIXED` fragment over
    /// the result.
    fn rehash(&mut self, mut builder: FragmentBuilder, keys: Vec<Symbol>) -> Result<FragmentBuilder> {
        builder.set_hash_output_partitioning(keys, None)?;
        self.cap_with_sink(&mut builder);
        let sealed = builder.seal(&mut self.graph);
        Ok(self.over_exchange(&sealed, Distribution::Fixed))
    }

    /// Generic "keep the fragment open, replace the root with `make(root)`"
    /// rule shared by every operator whose fragmentation is a no-op on its
    /// input's distribution (`Filter`, `Project`, `Sample`, `Unnest`,
    /// `TableWriter`).
    fn straight_through(
        &mut self,
        mut builder: FragmentBuilder,
        make: impl FnOnce(PlanRef) -> PlanNode,
    ) -> FragmentBuilder {
        let new_root = Rc::new(make(builder.root().clone()));
        builder.set_root(new_root);
        builder
    }

    // ---- dispatch ---------------------------------------------------------

    fn rewrite(&mut self, node: &PlanRef) -> Result<FragmentBuilder> {
        match node.as_ref() {
            PlanNode::TableScan(op) => Ok(self.rewrite_table_scan(op)),
            PlanNode::Values(op) => Ok(self.rewrite_values(op)),
            PlanNode::Filter(op) => self.rewrite_filter(op),
            PlanNode::Project(op) => self.rewrite_project(op),
            PlanNode::Sample(op) => self.rewrite_sample(op),
            PlanNode::Unnest(op) => self.rewrite_unnest(op),
            PlanNode::Sort(op) => self.rewrite_sort(op),
            PlanNode::TopN(op) => self.rewrite_topn(op),
            PlanNode::Limit(op) => self.rewrite_limit(op),
            PlanNode::DistinctLimit(op) => self.rewrite_distinct_limit(op),
            PlanNode::RowNumber(op) => self.rewrite_row_number(op),
            PlanNode::TopNRowNumber(op) => self.rewrite_topn_row_number(op),
            PlanNode::Window(op) => self.rewrite_window(op),
            PlanNode::Aggregation(op) => self.rewrite_aggregation(op),
            PlanNode::MarkDistinct(op) => self.rewrite_mark_distinct(op),
            PlanNode::Join(op) => self.rewrite_join(op),
            PlanNode::SemiJoin(op) => self.rewrite_semi_join(op),
            PlanNode::IndexJoin(op) => self.rewrite_index_join(op),
            PlanNode::Union(op) => self.rewrite_union(op),
            PlanNode::TableWriter(op) => self.rewrite_table_writer(op),
            PlanNode::TableCommit(op) => self.rewrite_table_commit(op),
            PlanNode::Output(op) => self.rewrite_output(op),
            PlanNode::Sink(_) | PlanNode::Exchange(_) => Err(FragmenterError::UnsupportedOperator(
                "Sink/Exchange are fragmenter-inserted markers and cannot appear in an input plan"
                    .to_owned(),
            )),
        }
    }

    // ---- leaves -------------------------------------------------------

    fn rewrite_table_scan(&mut self, op: &TableScan) -> FragmentBuilder {
        let id = self.next_fragment_id();
        let scan_id = op.id;
        let root = Rc::new(PlanNode::TableScan(op.clone()));
        if self.options.create_single_node_plan {
            FragmentBuilder::single_node(id, root)
        } else {
            FragmentBuilder::source(id, root, scan_id)
        }
    }

    fn rewrite_values(&mut self, op: &Values) -> FragmentBuilder {
        let id = self.next_fragment_id();
        FragmentBuilder::single_node(id, Rc::new(PlanNode::Values(op.clone())))
    }

    // ---- straight-through operators ------------------------------------

    fn rewrite_filter(&mut self, op: &Filter) -> Result<FragmentBuilder> {
        let child = self.rewrite(&op.input)?;
        let op = op.clone();
        Ok(self.straight_through(child, move |input| {
            PlanNode::Filter(Filter {
                id: op.id,
                input,
                predicate: op.predicate,
                output: op.output,
            })
        }))
    }

    fn rewrite_project(&mut self, op: &Project) -> Result<FragmentBuilder> {
        let child = self.rewrite(&op.input)?;
        let op = op.clone();
        Ok(self.straight_through(child, move |input| {
            PlanNode::Project(Project {
                id: op.id,
                input,
                exprs: op.exprs,
                output: op.output,
            })
        }))
    }

    fn rewrite_sample(&mut self, op: &Sample) -> Result<FragmentBuilder> {
        let child = self.rewrite(&op.input)?;
        let op = op.clone();
        Ok(self.straight_through(child, move |input| {
            PlanNode::Sample(Sample {
                id: op.id,
                input,
                sample_ppm: op.sample_ppm,
                output: op.output,
            })
        }))
    }

    fn rewrite_unnest(&mut self, op: &Unnest) -> Result<FragmentBuilder> {
        let child = self.rewrite(&op.input)?;
        let op = op.clone();
        Ok(self.straight_through(child, move |input| {
            PlanNode::Unnest(Unnest {
                id: op.id,
                input,
                unnest_symbol: op.unnest_symbol,
                output: op.output,
            })
        }))
    }

    fn rewrite_table_writer(&mut self, op: &TableWriter) -> Result<FragmentBuilder> {
        let child = self.rewrite(&op.input)?;
        let op = op.clone();
        Ok(self.straight_through(child, move |input| {
            PlanNode::TableWriter(TableWriter {
                id: op.id,
                input,
                table_name: op.table_name,
                output: op.output,
            })
        }))
    }

    // ---- merge-upward-without-staging operators (Sort, Output) ---------

    fn rewrite_sort(&mut self, op: &Sort) -> Result<FragmentBuilder> {
        let child = self.rewrite(&op.input)?;
        let mut builder = if child.is_distributed() {
            self.merge_upward(child)
        } else {
            child
        };
        let new_root = PlanNode::Sort(Sort {
            id: op.id,
            input: builder.root().clone(),
            order: op.order.clone(),
            output: op.output.clone(),
        });
        builder.set_root(Rc::new(new_root));
        Ok(builder)
    }

    fn rewrite_output(&mut self, op: &Output) -> Result<FragmentBuilder> {
        let child = self.rewrite(&op.input)?;
        let mut builder = if child.is_distributed() {
            self.merge_upward(child)
        } else {
            child
        };
        let new_root = PlanNode::Output(Output {
            id: op.id,
            input: builder.root().clone(),
            column_names: op.column_names.clone(),
            output: op.output.clone(),
        });
        builder.set_root(Rc::new(new_root));
        Ok(builder)
    }

    // ---- Limit / DistinctLimit ------------------------------------------

    fn rewrite_limit(&mut self, op: &Limit) -> Result<FragmentBuilder> {
        let child = self.rewrite(&op.input)?;
        let distributed = child.is_distributed();
        let op_id = op.id;
        let op_clone = op.clone();
        let mut builder = self.straight_through(child, move |input| {
            PlanNode::Limit(Limit {
                id: op_id,
                input,
                count: op_clone.count,
                output: op_clone.output,
            })
        });
        if distributed {
            self.cap_with_sink(&mut builder);
            let sealed = builder.seal(&mut self.graph);
            let mut merged = self.over_exchange(&sealed, Distribution::None);
            let merge_id = self.next_node_id();
            let merge_root = PlanNode::Limit(Limit {
                id: merge_id,
                input: merged.root().clone(),
                count: op.count,
                output: sealed.output().to_vec(),
            });
            merged.set_root(Rc::new(merge_root));
            builder = merged;
        }
        Ok(builder)
    }

    fn rewrite_distinct_limit(&mut self, op: &DistinctLimit) -> Result<FragmentBuilder> {
        let child = self.rewrite(&op.input)?;
        let distributed = child.is_distributed();
        let op_clone = op.clone();
        let mut builder = self.straight_through(child, move |input| {
            PlanNode::DistinctLimit(DistinctLimit {
                id: op_clone.id,
                input,
                count: op_clone.count,
                distinct_on: op_clone.distinct_on,
                output: op_clone.output,
            })
        });
        if distributed {
            self.cap_with_sink(&mut builder);
            let sealed = builder.seal(&mut self.graph);
            let mut merged = self.over_exchange(&sealed, Distribution::None);
            let merge_id = self.next_node_id();
            let merge_root = PlanNode::DistinctLimit(DistinctLimit {
                id: merge_id,
                input: merged.root().clone(),
                count: op.count,
                distinct_on: op.distinct_on.clone(),
                output: sealed.output().to_vec(),
            });
            merged.set_root(Rc::new(merge_root));
            builder = merged;
        }
        Ok(builder)
    }

    // ---- TopN: partial-stage split ---------------------------------------

    fn rewrite_topn(&mut self, op: &TopN) -> Result<FragmentBuilder> {
        let mut builder = self.rewrite(&op.input)?;
        let distributed = builder.is_distributed();

        let partial_root = PlanNode::TopN(TopN {
            id: op.id,
            input: builder.root().clone(),
            count: op.count,
            offset: op.offset,
            order: op.order.clone(),
            partial: distributed,
            output: op.output.clone(),
        });
        builder.set_root(Rc::new(partial_root));

        if distributed {
            self.cap_with_sink(&mut builder);
            let sealed = builder.seal(&mut self.graph);
            let mut merged = self.over_exchange(&sealed, Distribution::None);
            let merge_id = self.next_node_id();
            let merge_root = PlanNode::TopN(TopN {
                id: merge_id,
                input: merged.root().clone(),
                count: op.count,
                offset: op.offset,
                order: op.order.clone(),
                partial: false,
                output: sealed.output().to_vec(),
            });
            merged.set_root(Rc::new(merge_root));
            builder = merged;
        }
        Ok(builder)
    }

    // ---- RowNumber / Window: merge-or-rehash by partition key -------------

    fn rewrite_row_number(&mut self, op: &RowNumber) -> Result<FragmentBuilder> {
        let child = self.rewrite(&op.input)?;
        let mut builder = if child.is_distributed() {
            if op.partition_key.is_empty() {
                self.merge_upward(child)
            } else {
                self.rehash(child, op.partition_key.clone())?
            }
        } else {
            child
        };
        let new_root = PlanNode::RowNumber(RowNumber {
            id: op.id,
            input: builder.root().clone(),
            partition_key: op.partition_key.clone(),
            order: op.order.clone(),
            row_number_symbol: op.row_number_symbol.clone(),
            output: op.output.clone(),
        });
        builder.set_root(Rc::new(new_root));
        Ok(builder)
    }

    fn rewrite_window(&mut self, op: &Window) -> Result<FragmentBuilder> {
        let child = self.rewrite(&op.input)?;
        let mut builder = if child.is_distributed() {
            if op.partition_key.is_empty() {
                self.merge_upward(child)
            } else {
                self.rehash(child, op.partition_key.clone())?
            }
        } else {
            child
        };
        let new_root = PlanNode::Window(Window {
            id: op.id,
            input: builder.root().clone(),
            partition_key: op.partition_key.clone(),
            order: op.order.clone(),
            functions: op.functions.clone(),
            output: op.output.clone(),
        });
        builder.set_root(Rc::new(new_root));
        Ok(builder)
    }

    // ---- TopNRowNumber: partial stage, then merge-or-rehash ---------------

    fn rewrite_topn_row_number(&mut self, op: &TopNRowNumber) -> Result<FragmentBuilder> {
        let mut child = self.rewrite(&op.input)?;
        if !child.is_distributed() {
            let new_root = PlanNode::TopNRowNumber(TopNRowNumber {
                id: op.id,
                input: child.root().clone(),
                count: op.count,
                partition_key: op.partition_key.clone(),
                order: op.order.clone(),
                row_number_symbol: op.row_number_symbol.clone(),
                partial: false,
                output: op.output.clone(),
            });
            child.set_root(Rc::new(new_root));
            return Ok(child);
        }

        let partial_root = PlanNode::TopNRowNumber(TopNRowNumber {
            id: op.id,
            input: child.root().clone(),
            count: op.count,
            partition_key: op.partition_key.clone(),
            order: op.order.clone(),
            row_number_symbol: op.row_number_symbol.clone(),
            partial: true,
            output: op.output.clone(),
        });
        child.set_root(Rc::new(partial_root));

        if !op.partition_key.is_empty() {
            child.set_hash_output_partitioning(op.partition_key.clone(), None)?;
        }
        self.cap_with_sink(&mut child);
        let sealed = child.seal(&mut self.graph);
        let distribution = if op.partition_key.is_empty() {
            Distribution::None
        } else {
            Distribution::Fixed
        };
        let mut merged = self.over_exchange(&sealed, distribution);
        let merge_id = self.next_node_id();
        let merge_root = PlanNode::TopNRowNumber(TopNRowNumber {
            id: merge_id,
            input: merged.root().clone(),
            count: op.count,
            partition_key: op.partition_key.clone(),
            order: op.order.clone(),
            row_number_symbol: op.row_number_symbol.clone(),
            partial: false,
            output: sealed.output().to_vec(),
        });
        merged.set_root(Rc::new(merge_root));
        Ok(merged)
    }

    // ---- MarkDistinct: skip the boundary if already co-partitioned -------

    fn rewrite_mark_distinct(&mut self, op: &MarkDistinct) -> Result<FragmentBuilder> {
        let mut child = self.rewrite(&op.input)?;
        let distinct_set: HashSet<Symbol> = op.distinct_symbols.iter().cloned().collect();

        let already_partitioned = child.distribution() == Distribution::Fixed
            && child.child_ids().len() == 1
            && {
                let only_child = self.graph.get(child.child_ids()[0]);
                match only_child.output_partitioning.hash_keys() {
                    Some(keys) => keys.iter().cloned().collect::<HashSet<_>>() == distinct_set,
                    None => false,
                }
            };

        let skip_boundary = already_partitioned
            || self.options.create_single_node_plan
            || (!child.is_distributed() && !self.session.big_query_enabled());

        let mut builder = if skip_boundary {
            child
        } else {
            self.rehash(child, op.distinct_symbols.clone())?
        };
        let new_root = PlanNode::MarkDistinct(MarkDistinct {
            id: op.id,
            input: builder.root().clone(),
            distinct_symbols: op.distinct_symbols.clone(),
            marker_symbol: op.marker_symbol.clone(),
            output: op.output.clone(),
        });
        builder.set_root(Rc::new(new_root));
        Ok(builder)
    }

    // ---- Aggregation: decomposable partial/final split --------------------

    fn rewrite_aggregation(&mut self, op: &Aggregation) -> Result<FragmentBuilder> {
        let mut child = self.rewrite(&op.input)?;

        if !child.is_distributed() {
            let new_root = PlanNode::Aggregation(Aggregation {
                id: op.id,
                input: child.root().clone(),
                group_key: op.group_key.clone(),
                aggregates: op.aggregates.clone(),
                step: AggregationStep::Single,
                output: op.output.clone(),
            });
            child.set_root(Rc::new(new_root));
            return Ok(child);
        }

        let mut infos = Vec::with_capacity(op.aggregates.len());
        for call in &op.aggregates {
            infos.push(self.catalog.resolve_function(&call.function)?);
        }
        let all_decomposable = infos.iter().all(|info| info.is_decomposable());

        if !all_decomposable {
            tracing::warn!(
                node_id = %op.id,
                "aggregate has no decomposable combiner, forcing a single-instance final stage",
            );
            self.cap_with_sink(&mut child);
            let sealed = child.seal(&mut self.graph);
            let mut merged = self.over_exchange(&sealed, Distribution::None);
            let final_root = PlanNode::Aggregation(Aggregation {
                id: op.id,
                input: merged.root().clone(),
                group_key: op.group_key.clone(),
                aggregates: op.aggregates.clone(),
                step: AggregationStep::Single,
                output: op.output.clone(),
            });
            merged.set_root(Rc::new(final_root));
            return Ok(merged);
        }

        let mut partial_calls = Vec::with_capacity(op.aggregates.len());
        let mut intermediate_symbols = Vec::with_capacity(op.aggregates.len());
        let mut partial_output = op.group_key.clone();
        for (call, info) in op.aggregates.iter().zip(&infos) {
            let ty = info
                .intermediate_type()
                .cloned()
                .expect("decomposable implies an intermediate type");
            let intermediate = self
                .symbols
                .new_symbol(&format!("{}_partial", call.function.name), ty);
            partial_output.push(intermediate.clone());
            partial_calls.push(AggregateCall {
                output: intermediate.clone(),
                function: call.function.clone(),
                args: call.args.clone(),
                mask: call.mask.clone(),
                sample_weight: call.sample_weight.clone(),
            });
            intermediate_symbols.push(intermediate);
        }

        let partial_id = self.next_node_id();
        let partial_root = PlanNode::Aggregation(Aggregation {
            id: partial_id,
            input: child.root().clone(),
            group_key: op.group_key.clone(),
            aggregates: partial_calls,
            step: AggregationStep::Partial,
            output: partial_output,
        });
        child.set_root(Rc::new(partial_root));

        if !op.group_key.is_empty() {
            child.set_hash_output_partitioning(op.group_key.clone(), None)?;
        }
        self.cap_with_sink(&mut child);
        let sealed = child.seal(&mut self.graph);
        let distribution = if op.group_key.is_empty() {
            Distribution::None
        } else {
            Distribution::Fixed
        };
        let mut merged = self.over_exchange(&sealed, distribution);

        let final_calls = op
            .aggregates
            .iter()
            .zip(&intermediate_symbols)
            .map(|(call, intermediate)| call.over_intermediate(intermediate.clone()))
            .collect();
        let final_root = PlanNode::Aggregation(Aggregation {
            id: op.id,
            input: merged.root().clone(),
            group_key: op.group_key.clone(),
            aggregates: final_calls,
            step: AggregationStep::Final,
            output: op.output.clone(),
        });
        merged.set_root(Rc::new(final_root));
        Ok(merged)
    }

    // ---- Join: INNER/LEFT/RIGHT only --------------------------------------

    fn rewrite_join(&mut self, op: &Join) -> Result<FragmentBuilder> {
        if !matches!(op.join_type, JoinType::Inner | JoinType::Left | JoinType::Right) {
            return Err(FragmenterError::UnsupportedJoinType(format!(
                "{:?}",
                op.join_type
            )));
        }

        let left = self.rewrite(&op.left)?;
        let right = self.rewrite(&op.right)?;

        if !left.is_distributed() && !right.is_distributed() {
            let mut builder = FragmentBuilder::single_node(
                self.next_fragment_id(),
                Rc::new(PlanNode::Join(Join {
                    id: op.id,
                    join_type: op.join_type,
                    left: left.root().clone(),
                    right: right.root().clone(),
                    left_keys: op.left_keys.clone(),
                    right_keys: op.right_keys.clone(),
                    output: op.output.clone(),
                })),
            );
            builder.add_child_ids(left.child_ids().iter().copied());
            builder.add_child_ids(right.child_ids().iter().copied());
            return Ok(builder);
        }

        let distributed_joins = self.options.distributed_joins;

        match op.join_type {
            JoinType::Inner | JoinType::Left => {
                // right is the build side: shipped to every instance of left.
                let mut right = right;
                if distributed_joins {
                    right.set_hash_output_partitioning(op.right_keys.clone(), None)?;
                }
                self.cap_with_sink(&mut right);
                let sealed_right = right.seal(&mut self.graph);

                let mut left_builder = if distributed_joins {
                    self.rehash(left, op.left_keys.clone())?
                } else {
                    left
                };

                let exchange_id = self.next_node_id();
                let exchange = Rc::new(PlanNode::Exchange(Exchange {
                    id: exchange_id,
                    sources: vec![sealed_right.id],
                    output: sealed_right.output().to_vec(),
                }));
                let new_root = PlanNode::Join(Join {
                    id: op.id,
                    join_type: op.join_type,
                    left: left_builder.root().clone(),
                    right: exchange,
                    left_keys: op.left_keys.clone(),
                    right_keys: op.right_keys.clone(),
                    output: op.output.clone(),
                });
                left_builder.set_root(Rc::new(new_root));
                left_builder.add_child(&sealed_right);
                Ok(left_builder)
            }
            JoinType::Right => {
                // left is the build side: shipped to every instance of right.
                let mut left = left;
                if distributed_joins {
                    left.set_hash_output_partitioning(op.left_keys.clone(), None)?;
                }
                self.cap_with_sink(&mut left);
                let sealed_left = left.seal(&mut self.graph);

                let mut right_builder = if distributed_joins {
                    self.rehash(right, op.right_keys.clone())?
                } else {
                    right
                };

                let exchange_id = self.next_node_id();
                let exchange = Rc::new(PlanNode::Exchange(Exchange {
                    id: exchange_id,
                    sources: vec![sealed_left.id],
                    output: sealed_left.output().to_vec(),
                }));
                let new_root = PlanNode::Join(Join {
                    id: op.id,
                    join_type: op.join_type,
                    left: exchange,
                    right: right_builder.root().clone(),
                    left_keys: op.left_keys.clone(),
                    right_keys: op.right_keys.clone(),
                    output: op.output.clone(),
                });
                right_builder.set_root(Rc::new(new_root));
                right_builder.add_child(&sealed_left);
                Ok(right_builder)
            }
            JoinType::Full => unreachable!("checked above"),
        }
    }

    // ---- SemiJoin: ship the filtering side only --------------------------

    fn rewrite_semi_join(&mut self, op: &SemiJoin) -> Result<FragmentBuilder> {
        let source = self.rewrite(&op.source)?;
        let mut filtering = self.rewrite(&op.filtering_source)?;

        if !source.is_distributed() && !filtering.is_distributed() {
            let mut builder = FragmentBuilder::single_node(
                self.next_fragment_id(),
                Rc::new(PlanNode::SemiJoin(SemiJoin {
                    id: op.id,
                    anti: op.anti,
                    source: source.root().clone(),
                    filtering_source: filtering.root().clone(),
                    source_keys: op.source_keys.clone(),
                    filtering_keys: op.filtering_keys.clone(),
                    output: op.output.clone(),
                })),
            );
            builder.add_child_ids(source.child_ids().iter().copied());
            builder.add_child_ids(filtering.child_ids().iter().copied());
            return Ok(builder);
        }

        self.cap_with_sink(&mut filtering);
        let sealed_filtering = filtering.seal(&mut self.graph);
        let exchange_id = self.next_node_id();
        let exchange = Rc::new(PlanNode::Exchange(Exchange {
            id: exchange_id,
            sources: vec![sealed_filtering.id],
            output: sealed_filtering.output().to_vec(),
        }));

        let mut source = source;
        let new_root = PlanNode::SemiJoin(SemiJoin {
            id: op.id,
            anti: op.anti,
            source: source.root().clone(),
            filtering_source: exchange,
            source_keys: op.source_keys.clone(),
            filtering_keys: op.filtering_keys.clone(),
            output: op.output.clone(),
        });
        source.set_root(Rc::new(new_root));
        source.add_child(&sealed_filtering);
        Ok(source)
    }

    // ---- IndexJoin: re-hash the probe side only, if enabled --------------

    fn rewrite_index_join(&mut self, op: &IndexJoin) -> Result<FragmentBuilder> {
        let probe = self.rewrite(&op.probe)?;
        let mut builder = if self.options.distributed_index_joins && probe.is_distributed() {
            self.rehash(probe, op.probe_keys.clone())?
        } else {
            probe
        };
        let new_root = PlanNode::IndexJoin(IndexJoin {
            id: op.id,
            probe: builder.root().clone(),
            index_table: op.index_table.clone(),
            probe_keys: op.probe_keys.clone(),
            output: op.output.clone(),
        });
        builder.set_root(Rc::new(new_root));
        Ok(builder)
    }

    // ---- Union: single-node concatenation, or a fan-in Exchange ----------

    /// Aligns one union branch's native output columns onto the union's own
    /// declared output symbols, positionally. Branches can agree on arity and
    /// type while still producing their own distinct symbols in their own
    /// order; without this, a branch's Sink would carry its native symbols
    /// while the Exchange above it is declared over the union's symbols, and
    /// nothing downstream would ever see the mismatch.
    fn align_union_branch(&mut self, root: PlanRef, target: &[Symbol]) -> PlanRef {
        if root.output() == target {
            return root;
        }
        let exprs = root.output().iter().map(|s| s.to_string()).collect();
        let id = self.next_node_id();
        Rc::new(PlanNode::Project(Project {
            id,
            input: root,
            exprs,
            output: target.to_vec(),
        }))
    }

    fn rewrite_union(&mut self, op: &Union) -> Result<FragmentBuilder> {
        let source_builders = op
            .sources
            .iter()
            .map(|source| self.rewrite(source))
            .collect::<Result<Vec<_>>>()?;

        if self.options.create_single_node_plan {
            let mut aligned_sources = Vec::with_capacity(source_builders.len());
            for builder in &source_builders {
                aligned_sources.push(self.align_union_branch(builder.root().clone(), &op.output));
            }
            let mut builder = FragmentBuilder::single_node(
                self.next_fragment_id(),
                Rc::new(PlanNode::Union(Union {
                    id: op.id,
                    sources: aligned_sources,
                    output: op.output.clone(),
                })),
            );
            for source_builder in &source_builders {
                builder.add_child_ids(source_builder.child_ids().iter().copied());
            }
            return Ok(builder);
        }

        let mut sealed = Vec::with_capacity(source_builders.len());
        for mut source_builder in source_builders {
            let aligned_root = self.align_union_branch(source_builder.root().clone(), &op.output);
            source_builder.set_root(aligned_root);
            self.cap_with_sink(&mut source_builder);
            sealed.push(source_builder.seal(&mut self.graph));
        }

        let exchange_id = self.next_node_id();
        let exchange = Rc::new(PlanNode::Exchange(Exchange {
            id: exchange_id,
            sources: sealed.iter().map(|f| f.id).collect(),
            output: op.output.clone(),
        }));
        let mut builder = FragmentBuilder::single_node(self.next_fragment_id(), exchange);
        for fragment in &sealed {
            builder.add_child(fragment);
        }
        Ok(builder)
    }

    // ---- TableCommit: must land on the coordinator -----------------------

    fn rewrite_table_commit(&mut self, op: &TableCommit) -> Result<FragmentBuilder> {
        let mut child = self.rewrite(&op.input)?;
        let mut builder = if child.distribution() != Distribution::CoordinatorOnly
            && !self.options.create_single_node_plan
        {
            self.cap_with_sink(&mut child);
            let sealed = child.seal(&mut self.graph);
            self.over_exchange(&sealed, Distribution::CoordinatorOnly)
        } else {
            child
        };
        let new_root = PlanNode::TableCommit(TableCommit {
            id: op.id,
            input: builder.root().clone(),
            table_name: op.table_name.clone(),
            output: op.output.clone(),
        });
        builder.set_root(Rc::new(new_root));
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FunctionInfo, FunctionSignature, MemoryFunctionCatalog};
    use crate::common::types::DataType;
    use crate::session::ConfigMap;

    /// Hands out fresh symbols and node ids for building small test plans by
    /// hand instead of going through a real planner.
    struct Env {
        node_ids: NodeIdAllocator,
        symbols: SymbolAllocator,
    }

    impl Env {
        fn new() -> Self {
            Self {
                node_ids: NodeIdAllocator::new(),
                symbols: SymbolAllocator::new(),
            }
        }

        fn scan(&mut self, table: &str, cols: &[&str]) -> (PlanRef, Vec<Symbol>) {
            let output: Vec<Symbol> = cols
                .iter()
                .map(|c| self.symbols.new_symbol(c, DataType::Int64))
                .collect();
            let id = self.node_ids.next_id();
            let node = Rc::new(PlanNode::TableScan(TableScan {
                id,
                table_name: table.to_owned(),
                output: output.clone(),
            }));
            (node, output)
        }
    }

    fn decomposable_catalog() -> MemoryFunctionCatalog {
        let mut catalog = MemoryFunctionCatalog::new();
        catalog.register("count", FunctionInfo::new("count", Some(DataType::Int64)));
        catalog.register("sum", FunctionInfo::new("sum", Some(DataType::Int64)));
        catalog
    }

    fn non_decomposable_catalog() -> MemoryFunctionCatalog {
        let mut catalog = MemoryFunctionCatalog::new();
        catalog.register("approx_percentile", FunctionInfo::new("approx_percentile", None));
        catalog
    }

    fn distributed_options() -> PlannerOptions {
        PlannerOptions::default()
    }

    // ---- S1: global count -------------------------------------------------

    #[test]
    fn s1_global_count_splits_partial_and_final() {
        let mut env = Env::new();
        let (scan, _) = env.scan("t", &["a"]);
        let count_out = env.symbols.new_symbol("count", DataType::Int64);
        let agg = Rc::new(PlanNode::Aggregation(Aggregation {
            id: env.node_ids.next_id(),
            input: scan,
            group_key: vec![],
            aggregates: vec![AggregateCall {
                output: count_out.clone(),
                function: FunctionSignature::new("count", vec![]),
                args: vec![],
                mask: None,
                sample_weight: None,
            }],
            step: AggregationStep::Single,
            output: vec![count_out.clone()],
        }));
        let output = Rc::new(PlanNode::Output(Output {
            id: env.node_ids.next_id(),
            input: agg,
            column_names: vec!["count".to_owned()],
            output: vec![count_out],
        }));

        let session = ConfigMap::new();
        let catalog = decomposable_catalog();
        let subplan = fragment(
            &output,
            &session,
            distributed_options(),
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        )
        .unwrap();

        assert_eq!(subplan.fragments.len(), 2);
        let root = subplan.root();
        assert_eq!(root.distribution, Distribution::None);

        let PlanNode::Output(out) = root.root.as_ref() else {
            panic!("expected Output at the root");
        };
        let PlanNode::Aggregation(final_agg) = out.input.as_ref() else {
            panic!("expected Aggregation under Output");
        };
        assert_eq!(final_agg.step, AggregationStep::Final);
        let PlanNode::Exchange(exch) = final_agg.input.as_ref() else {
            panic!("expected Exchange feeding the final aggregation");
        };
        assert_eq!(exch.sources.len(), 1);

        let child = &subplan.fragments[&exch.sources[0]];
        assert_eq!(child.distribution, Distribution::Source);
        let PlanNode::Sink(sink) = child.root.as_ref() else {
            panic!("expected the source fragment to end in a Sink");
        };
        let PlanNode::Aggregation(partial_agg) = sink.input.as_ref() else {
            panic!("expected a PARTIAL aggregation under the Sink");
        };
        assert_eq!(partial_agg.step, AggregationStep::Partial);
    }

    // ---- S2: grouped sum ----------------------------------------------------

    #[test]
    fn s2_grouped_sum_hash_partitions_by_group_key() {
        let mut env = Env::new();
        let (scan, scan_out) = env.scan("t", &["k", "v"]);
        let k = scan_out[0].clone();
        let v = scan_out[1].clone();
        let sum_out = env.symbols.new_symbol("sum", DataType::Int64);
        let agg = Rc::new(PlanNode::Aggregation(Aggregation {
            id: env.node_ids.next_id(),
            input: scan,
            group_key: vec![k.clone()],
            aggregates: vec![AggregateCall {
                output: sum_out.clone(),
                function: FunctionSignature::new("sum", vec![DataType::Int64]),
                args: vec![v],
                mask: None,
                sample_weight: None,
            }],
            step: AggregationStep::Single,
            output: vec![k.clone(), sum_out],
        }));

        let session = ConfigMap::new();
        let catalog = decomposable_catalog();
        let subplan = fragment(
            &agg,
            &session,
            distributed_options(),
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        )
        .unwrap();

        let root = subplan.root();
        assert_eq!(root.distribution, Distribution::Fixed);
        let PlanNode::Aggregation(final_agg) = root.root.as_ref() else {
            panic!("expected Aggregation at the root");
        };
        assert_eq!(final_agg.step, AggregationStep::Final);

        let child_ids: Vec<_> = subplan.get_children(root.id).iter().copied().collect();
        assert_eq!(child_ids.len(), 1);
        let child = &subplan.fragments[&child_ids[0]];
        assert_eq!(child.distribution, Distribution::Source);
        let keys = child.output_partitioning.hash_keys().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0], k);
    }

    // ---- S3: non-decomposable aggregate -------------------------------------

    #[test]
    fn s3_non_decomposable_aggregate_skips_the_partial_stage() {
        let mut env = Env::new();
        let (scan, scan_out) = env.scan("t", &["v"]);
        let pct_out = env.symbols.new_symbol("pct", DataType::Float64);
        let agg = Rc::new(PlanNode::Aggregation(Aggregation {
            id: env.node_ids.next_id(),
            input: scan,
            group_key: vec![],
            aggregates: vec![AggregateCall {
                output: pct_out.clone(),
                function: FunctionSignature::new("approx_percentile", vec![DataType::Float64]),
                args: vec![scan_out[0].clone()],
                mask: None,
                sample_weight: None,
            }],
            step: AggregationStep::Single,
            output: vec![pct_out],
        }));

        let session = ConfigMap::new();
        let catalog = non_decomposable_catalog();
        let subplan = fragment(
            &agg,
            &session,
            distributed_options(),
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        )
        .unwrap();

        let root = subplan.root();
        assert_eq!(root.distribution, Distribution::None);
        let PlanNode::Aggregation(final_agg) = root.root.as_ref() else {
            panic!("expected Aggregation at the root");
        };
        assert_eq!(final_agg.step, AggregationStep::Single);

        let child_ids: Vec<_> = subplan.get_children(root.id).iter().copied().collect();
        assert_eq!(child_ids.len(), 1);
        let child = &subplan.fragments[&child_ids[0]];
        assert_eq!(child.distribution, Distribution::Source);
        let PlanNode::Sink(sink) = child.root.as_ref() else {
            panic!("expected the source fragment to end in a Sink");
        };
        assert!(matches!(sink.input.as_ref(), PlanNode::TableScan(_)));
    }

    // ---- S4: global TopN ----------------------------------------------------

    #[test]
    fn s4_global_topn_splits_partial_and_merge() {
        let mut env = Env::new();
        let (scan, scan_out) = env.scan("t", &["x"]);
        let x = scan_out[0].clone();
        let topn = Rc::new(PlanNode::TopN(TopN {
            id: env.node_ids.next_id(),
            input: scan,
            count: 10,
            offset: 0,
            order: vec![x.clone()],
            partial: false,
            output: vec![x.clone()],
        }));
        let output = Rc::new(PlanNode::Output(Output {
            id: env.node_ids.next_id(),
            input: topn,
            column_names: vec!["x".to_owned()],
            output: vec![x],
        }));

        let session = ConfigMap::new();
        let catalog = MemoryFunctionCatalog::new();
        let subplan = fragment(
            &output,
            &session,
            distributed_options(),
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        )
        .unwrap();

        assert_eq!(subplan.fragments.len(), 2);
        let root = subplan.root();
        assert_eq!(root.distribution, Distribution::None);

        let PlanNode::Output(out) = root.root.as_ref() else {
            panic!("expected Output at the root");
        };
        let PlanNode::TopN(merge_topn) = out.input.as_ref() else {
            panic!("expected TopN under Output");
        };
        assert!(!merge_topn.partial);
        assert_eq!(merge_topn.count, 10);
        let PlanNode::Exchange(exch) = merge_topn.input.as_ref() else {
            panic!("expected Exchange feeding the merge TopN");
        };

        let child = &subplan.fragments[&exch.sources[0]];
        assert_eq!(child.distribution, Distribution::Source);
        let PlanNode::Sink(sink) = child.root.as_ref() else {
            panic!("expected the source fragment to end in a Sink");
        };
        let PlanNode::TopN(partial_topn) = sink.input.as_ref() else {
            panic!("expected a partial TopN under the Sink");
        };
        assert!(partial_topn.partial);
    }

    // ---- S5: hash-distributed inner join ------------------------------------

    #[test]
    fn s5_distributed_inner_join_hash_partitions_both_sides() {
        let mut env = Env::new();
        let (left_scan, left_out) = env.scan("l", &["lk"]);
        let (right_scan, right_out) = env.scan("r", &["rk"]);
        let join = Rc::new(PlanNode::Join(Join {
            id: env.node_ids.next_id(),
            join_type: JoinType::Inner,
            left: left_scan,
            right: right_scan,
            left_keys: vec![left_out[0].clone()],
            right_keys: vec![right_out[0].clone()],
            output: vec![left_out[0].clone(), right_out[0].clone()],
        }));

        let session = ConfigMap::new();
        let catalog = MemoryFunctionCatalog::new();
        let mut options = distributed_options();
        options.distributed_joins = true;
        let subplan = fragment(
            &join,
            &session,
            options,
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        )
        .unwrap();

        let root = subplan.root();
        assert_eq!(root.distribution, Distribution::Fixed);
        let PlanNode::Join(j) = root.root.as_ref() else {
            panic!("expected Join at the root");
        };
        assert!(matches!(j.left.as_ref(), PlanNode::Exchange(_)));
        assert!(matches!(j.right.as_ref(), PlanNode::Exchange(_)));

        let child_ids: Vec<_> = subplan.get_children(root.id).iter().copied().collect();
        assert_eq!(child_ids.len(), 2);
        for id in child_ids {
            let child = &subplan.fragments[&id];
            assert_eq!(child.distribution, Distribution::Source);
            let keys = child.output_partitioning.hash_keys().unwrap();
            assert_eq!(keys.len(), 1);
        }
    }

    // ---- S6: union of two scans ----------------------------------------------

    #[test]
    fn s6_union_of_scans_fans_into_one_exchange() {
        let mut env = Env::new();
        let (a, a_out) = env.scan("a", &["x"]);
        let (b, _b_out) = env.scan("b", &["x"]);
        let union = Rc::new(PlanNode::Union(Union {
            id: env.node_ids.next_id(),
            sources: vec![a, b],
            output: a_out.clone(),
        }));
        let output = Rc::new(PlanNode::Output(Output {
            id: env.node_ids.next_id(),
            input: union,
            column_names: vec!["x".to_owned()],
            output: a_out,
        }));

        let session = ConfigMap::new();
        let catalog = MemoryFunctionCatalog::new();
        let subplan = fragment(
            &output,
            &session,
            distributed_options(),
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        )
        .unwrap();

        assert_eq!(subplan.fragments.len(), 3);
        let root = subplan.root();
        assert_eq!(root.distribution, Distribution::None);

        let PlanNode::Output(out) = root.root.as_ref() else {
            panic!("expected Output at the root");
        };
        let PlanNode::Exchange(exch) = out.input.as_ref() else {
            panic!("expected Exchange under Output");
        };
        assert_eq!(exch.sources.len(), 2);
        for id in &exch.sources {
            let child = &subplan.fragments[id];
            assert_eq!(child.distribution, Distribution::Source);
            assert!(matches!(child.root.as_ref(), PlanNode::Sink(_)));
        }
    }

    // ---- invariant 7: single-node mode has no FIXED/SOURCE fragments --------

    #[test]
    fn single_node_mode_has_no_fixed_or_source_fragments() {
        let mut env = Env::new();
        let (scan, _) = env.scan("t", &["a"]);
        let count_out = env.symbols.new_symbol("count", DataType::Int64);
        let agg = Rc::new(PlanNode::Aggregation(Aggregation {
            id: env.node_ids.next_id(),
            input: scan,
            group_key: vec![],
            aggregates: vec![AggregateCall {
                output: count_out.clone(),
                function: FunctionSignature::new("count", vec![]),
                args: vec![],
                mask: None,
                sample_weight: None,
            }],
            step: AggregationStep::Single,
            output: vec![count_out],
        }));

        let session = ConfigMap::new();
        let catalog = decomposable_catalog();
        let mut options = distributed_options();
        options.create_single_node_plan = true;
        let subplan = fragment(
            &agg,
            &session,
            options,
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        )
        .unwrap();

        assert_eq!(subplan.fragments.len(), 1);
        for fragment in subplan.fragments.values() {
            assert!(!matches!(
                fragment.distribution,
                Distribution::Fixed | Distribution::Source
            ));
        }
    }

    // ---- error paths ----------------------------------------------------------

    #[test]
    fn unsupported_join_type_is_a_fatal_error() {
        let mut env = Env::new();
        let (left, left_out) = env.scan("l", &["k"]);
        let (right, right_out) = env.scan("r", &["k"]);
        let join = Rc::new(PlanNode::Join(Join {
            id: env.node_ids.next_id(),
            join_type: JoinType::Full,
            left,
            right,
            left_keys: vec![left_out[0].clone()],
            right_keys: vec![right_out[0].clone()],
            output: vec![left_out[0].clone()],
        }));

        let session = ConfigMap::new();
        let catalog = MemoryFunctionCatalog::new();
        let result = fragment(
            &join,
            &session,
            distributed_options(),
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        );
        assert!(matches!(result, Err(FragmenterError::UnsupportedJoinType(_))));
    }

    #[test]
    fn unknown_aggregate_function_is_a_fatal_error() {
        let mut env = Env::new();
        let (scan, scan_out) = env.scan("t", &["v"]);
        let out_sym = env.symbols.new_symbol("mystery", DataType::Int64);
        let agg = Rc::new(PlanNode::Aggregation(Aggregation {
            id: env.node_ids.next_id(),
            input: scan,
            group_key: vec![],
            aggregates: vec![AggregateCall {
                output: out_sym.clone(),
                function: FunctionSignature::new("mystery_fn", vec![]),
                args: vec![scan_out[0].clone()],
                mask: None,
                sample_weight: None,
            }],
            step: AggregationStep::Single,
            output: vec![out_sym],
        }));

        let session = ConfigMap::new();
        let catalog = MemoryFunctionCatalog::new();
        let result = fragment(
            &agg,
            &session,
            distributed_options(),
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        );
        assert!(matches!(result, Err(FragmenterError::UnknownFunction(_))));
    }

    // ---- MarkDistinct: skip the boundary when already co-partitioned --------

    #[test]
    fn mark_distinct_skips_boundary_when_already_hash_partitioned_by_same_keys() {
        let mut env = Env::new();
        let (scan, scan_out) = env.scan("t", &["k", "v"]);
        let k = scan_out[0].clone();
        let v = scan_out[1].clone();
        let sum_out = env.symbols.new_symbol("sum", DataType::Int64);
        let agg = Rc::new(PlanNode::Aggregation(Aggregation {
            id: env.node_ids.next_id(),
            input: scan,
            group_key: vec![k.clone()],
            aggregates: vec![AggregateCall {
                output: sum_out.clone(),
                function: FunctionSignature::new("sum", vec![DataType::Int64]),
                args: vec![v],
                mask: None,
                sample_weight: None,
            }],
            step: AggregationStep::Single,
            output: vec![k.clone(), sum_out.clone()],
        }));
        let marker = env.symbols.new_symbol("marker", DataType::Boolean);
        let mark_distinct = Rc::new(PlanNode::MarkDistinct(MarkDistinct {
            id: env.node_ids.next_id(),
            input: agg,
            distinct_symbols: vec![k],
            marker_symbol: marker.clone(),
            output: vec![sum_out, marker],
        }));

        let session = ConfigMap::new();
        let catalog = decomposable_catalog();
        let subplan = fragment(
            &mark_distinct,
            &session,
            distributed_options(),
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        )
        .unwrap();

        // No extra boundary: still exactly the partial + final fragments the
        // aggregation alone would have produced.
        assert_eq!(subplan.fragments.len(), 2);
        let root = subplan.root();
        assert_eq!(root.distribution, Distribution::Fixed);
        assert!(matches!(root.root.as_ref(), PlanNode::MarkDistinct(_)));
    }

    // ---- TableCommit: forces a coordinator-only fragment ---------------------

    #[test]
    fn table_commit_forces_coordinator_only_fragment() {
        let mut env = Env::new();
        let (scan, scan_out) = env.scan("t", &["a"]);
        let writer = Rc::new(PlanNode::TableWriter(TableWriter {
            id: env.node_ids.next_id(),
            input: scan,
            table_name: "t".to_owned(),
            output: scan_out.clone(),
        }));
        let commit = Rc::new(PlanNode::TableCommit(TableCommit {
            id: env.node_ids.next_id(),
            input: writer,
            table_name: "t".to_owned(),
            output: scan_out,
        }));

        let session = ConfigMap::new();
        let catalog = MemoryFunctionCatalog::new();
        let subplan = fragment(
            &commit,
            &session,
            distributed_options(),
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        )
        .unwrap();

        let root = subplan.root();
        assert_eq!(root.distribution, Distribution::CoordinatorOnly);
        assert!(matches!(root.root.as_ref(), PlanNode::TableCommit(_)));

        let child_ids: Vec<_> = subplan.get_children(root.id).iter().copied().collect();
        assert_eq!(child_ids.len(), 1);
        assert_eq!(
            subplan.fragments[&child_ids[0]].distribution,
            Distribution::Source
        );
    }

    // ---- distributed SemiJoin: only the filtering side is shipped -----------

    #[test]
    fn distributed_semi_join_ships_filtering_side_only() {
        let mut env = Env::new();
        let (source, source_out) = env.scan("s", &["sk"]);
        let (filtering, filtering_out) = env.scan("f", &["fk"]);
        let semi = Rc::new(PlanNode::SemiJoin(SemiJoin {
            id: env.node_ids.next_id(),
            anti: false,
            source,
            filtering_source: filtering,
            source_keys: vec![source_out[0].clone()],
            filtering_keys: vec![filtering_out[0].clone()],
            output: vec![source_out[0].clone()],
        }));

        let session = ConfigMap::new();
        let catalog = MemoryFunctionCatalog::new();
        let subplan = fragment(
            &semi,
            &session,
            distributed_options(),
            &mut env.symbols,
            &mut env.node_ids,
            &catalog,
        )
        .unwrap();

        let root = subplan.root();
        assert_eq!(root.distribution, Distribution::Source);
        let PlanNode::SemiJoin(s) = root.root.as_ref() else {
            panic!("expected SemiJoin at the root");
        };
        assert!(matches!(s.source.as_ref(), PlanNode::TableScan(_)));
        assert!(matches!(s.filtering_source.as_ref(), PlanNode::Exchange(_)));

        let child_ids: Vec<_> = subplan.get_children(root.id).iter().copied().collect();
        assert_eq!(child_ids.len(), 1);
        assert_eq!(
            subplan.fragments[&child_ids[0]].distribution,
            Distribution::Source
        );
    }
}
