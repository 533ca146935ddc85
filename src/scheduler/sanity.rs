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

//! Post-construction invariant checks run once over the finished [`SubPlan`].
//!
//! These are deliberately redundant with the bookkeeping the builders already
//! do while a fragment is open (e.g. `set_hash_output_partitioning` already
//! rejects an unknown symbol). A bug in `plan_fragmenter` could still produce
//! a `SubPlan` that violates a cross-fragment invariant the open builders
//! can't see (an `Exchange` pointing at a sibling that never got sealed as
//! its child, say) — `check` is the single place that catches that class of
//! mistake before a caller ever sees the `SubPlan`.
//!
//! Symbol-flow checking (the last invariant) only covers operator fields that
//! are typed `Symbol`/`Vec<Symbol>` references (group keys, join keys, order
//! keys, ...). `Filter`'s predicate and `Project`'s expressions are opaque
//! strings in this crate — there is no expression IR to walk — so for those
//! two operators we instead check the structural property their rewrite rule
//! actually guarantees: `Filter` passes its input's output through unchanged.

use std::collections::{HashMap, HashSet};

use crate::common::error::{FragmenterError, Result};
use crate::common::{FragmentId, PlanNodeId, Symbol};
use crate::optimizer::plan_node::{PlanNode, PlanRef};
use crate::optimizer::property::Distribution;
use crate::scheduler::fragment::SubPlan;

pub fn check(subplan: &SubPlan) -> Result<()> {
    check_single_root(subplan)?;
    check_acyclic(subplan)?;
    check_exchange_pairing(subplan)?;
    check_partitioning(subplan)?;
    for fragment in subplan.fragments.values() {
        check_symbol_flow(&fragment.root)?;
    }
    Ok(())
}

fn check_single_root(subplan: &SubPlan) -> Result<()> {
    if !subplan.get_parents(subplan.root_id).is_empty() {
        return Err(FragmenterError::InvariantViolation(
            "the root fragment must not be any other fragment's child".to_owned(),
        ));
    }
    let reachable: HashSet<FragmentId> = subplan.ids_by_topo_order().into_iter().collect();
    if reachable.len() != subplan.fragments.len() {
        return Err(FragmenterError::InvariantViolation(
            "the fragment graph has fragments unreachable from its root".to_owned(),
        ));
    }
    Ok(())
}

fn check_acyclic(subplan: &SubPlan) -> Result<()> {
    enum State {
        Visiting,
        Done,
    }
    let mut state: HashMap<FragmentId, State> = HashMap::new();

    fn visit(
        id: FragmentId,
        subplan: &SubPlan,
        state: &mut HashMap<FragmentId, State>,
    ) -> Result<()> {
        match state.get(&id) {
            Some(State::Done) => return Ok(()),
            Some(State::Visiting) => return Err(FragmenterError::cycle_detected(id)),
            None => {}
        }
        state.insert(id, State::Visiting);
        for &child in subplan.get_children(id) {
            visit(child, subplan, state)?;
        }
        state.insert(id, State::Done);
        Ok(())
    }

    visit(subplan.root_id, subplan, &mut state)
}

fn collect_exchange_sources(node: &PlanRef, acc: &mut HashSet<FragmentId>) {
    if let Some(sources) = node.exchange_sources() {
        acc.extend(sources.iter().copied());
    }
    for input in node.inputs() {
        collect_exchange_sources(&input, acc);
    }
}

fn check_exchange_pairing(subplan: &SubPlan) -> Result<()> {
    for (&id, fragment) in &subplan.fragments {
        let mut referenced = HashSet::new();
        collect_exchange_sources(&fragment.root, &mut referenced);
        let children = subplan.get_children(id);

        for &child_id in &referenced {
            if !children.contains(&child_id) {
                return Err(FragmenterError::dangling_exchange(child_id));
            }
            if !subplan.fragments[&child_id].root.is_sink() {
                return Err(FragmenterError::InvariantViolation(format!(
                    "fragment {child_id} is referenced by an exchange but is not terminated by a sink"
                )));
            }
        }
        for &child_id in children {
            if !referenced.contains(&child_id) {
                return Err(FragmenterError::InvariantViolation(format!(
                    "fragment {child_id} is attached as a child of {id} but no exchange in {id} references it"
                )));
            }
        }
    }
    Ok(())
}

fn check_partitioning(subplan: &SubPlan) -> Result<()> {
    for (&id, fragment) in &subplan.fragments {
        let children = subplan.get_children(id);
        let expects_hash = fragment.distribution == Distribution::Fixed;

        for &child_id in children {
            let child = &subplan.fragments[&child_id];
            if child.output_partitioning.is_hash() != expects_hash {
                return Err(FragmenterError::partitioning_mismatch(child_id));
            }
        }

        if expects_hash {
            // A rehashed operator (aggregation final stage, row number, window,
            // mark-distinct) attaches exactly one child here. A distributed join
            // with both sides redistributed attaches two: the join's own FIXED
            // fragment consumes the left AND the right side, each through its
            // own hash-partitioned Exchange. Both shapes are legal, so this only
            // requires at least one child, each hash-partitioned over a
            // non-empty key list — not a fixed cardinality of one.
            if children.is_empty() {
                return Err(FragmenterError::InvariantViolation(format!(
                    "fixed fragment {id} must have at least one child"
                )));
            }
            for &child_id in children {
                let child = &subplan.fragments[&child_id];
                let non_empty = child
                    .output_partitioning
                    .hash_keys()
                    .is_some_and(|keys| !keys.is_empty());
                if !non_empty {
                    return Err(FragmenterError::InvariantViolation(format!(
                        "fixed fragment {id}'s child {child_id} must be hash-partitioned over a non-empty key list"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn require_contains(output: &[Symbol], symbol: &Symbol, node: PlanNodeId) -> Result<()> {
    if output.contains(symbol) {
        Ok(())
    } else {
        Err(FragmenterError::symbol_not_produced(node))
    }
}

fn require_contains_all(output: &[Symbol], symbols: &[Symbol], node: PlanNodeId) -> Result<()> {
    symbols
        .iter()
        .try_for_each(|symbol| require_contains(output, symbol, node))
}

fn require_same_output(node: PlanNodeId, output: &[Symbol], input_output: &[Symbol]) -> Result<()> {
    if output == input_output {
        Ok(())
    } else {
        Err(FragmenterError::symbol_not_produced(node))
    }
}

fn check_symbol_flow(node: &PlanRef) -> Result<()> {
    match node.as_ref() {
        PlanNode::TableScan(_) | PlanNode::Values(_) | PlanNode::Exchange(_) => {}
        PlanNode::Filter(n) => {
            require_same_output(n.id, &n.output, n.input.output())?;
            check_symbol_flow(&n.input)?;
        }
        PlanNode::Project(n) => {
            check_symbol_flow(&n.input)?;
        }
        PlanNode::Sample(n) => {
            require_same_output(n.id, &n.output, n.input.output())?;
            check_symbol_flow(&n.input)?;
        }
        PlanNode::Unnest(n) => {
            require_contains(n.input.output(), &n.unnest_symbol, n.id)?;
            check_symbol_flow(&n.input)?;
        }
        PlanNode::Sort(n) => {
            require_contains_all(n.input.output(), &n.order, n.id)?;
            check_symbol_flow(&n.input)?;
        }
        PlanNode::TopN(n) => {
            require_contains_all(n.input.output(), &n.order, n.id)?;
            check_symbol_flow(&n.input)?;
        }
        PlanNode::Limit(n) => {
            check_symbol_flow(&n.input)?;
        }
        PlanNode::DistinctLimit(n) => {
            require_contains_all(n.input.output(), &n.distinct_on, n.id)?;
            check_symbol_flow(&n.input)?;
        }
        PlanNode::RowNumber(n) => {
            require_contains_all(n.input.output(), &n.partition_key, n.id)?;
            require_contains_all(n.input.output(), &n.order, n.id)?;
            check_symbol_flow(&n.input)?;
        }
        PlanNode::TopNRowNumber(n) => {
            require_contains_all(n.input.output(), &n.partition_key, n.id)?;
            require_contains_all(n.input.output(), &n.order, n.id)?;
            check_symbol_flow(&n.input)?;
        }
        PlanNode::Window(n) => {
            require_contains_all(n.input.output(), &n.partition_key, n.id)?;
            require_contains_all(n.input.output(), &n.order, n.id)?;
            check_symbol_flow(&n.input)?;
        }
        PlanNode::Aggregation(n) => {
            require_contains_all(n.input.output(), &n.group_key, n.id)?;
            for call in &n.aggregates {
                require_contains_all(n.input.output(), &call.args, n.id)?;
                if let Some(mask) = &call.mask {
                    require_contains(n.input.output(), mask, n.id)?;
                }
                if let Some(weight) = &call.sample_weight {
                    require_contains(n.input.output(), weight, n.id)?;
                }
            }
            check_symbol_flow(&n.input)?;
        }
        PlanNode::MarkDistinct(n) => {
            require_contains_all(n.input.output(), &n.distinct_symbols, n.id)?;
            check_symbol_flow(&n.input)?;
        }
        PlanNode::Join(n) => {
            require_contains_all(n.left.output(), &n.left_keys, n.id)?;
            require_contains_all(n.right.output(), &n.right_keys, n.id)?;
            check_symbol_flow(&n.left)?;
            check_symbol_flow(&n.right)?;
        }
        PlanNode::SemiJoin(n) => {
            require_contains_all(n.source.output(), &n.source_keys, n.id)?;
            require_contains_all(n.filtering_source.output(), &n.filtering_keys, n.id)?;
            check_symbol_flow(&n.source)?;
            check_symbol_flow(&n.filtering_source)?;
        }
        PlanNode::IndexJoin(n) => {
            require_contains_all(n.probe.output(), &n.probe_keys, n.id)?;
            check_symbol_flow(&n.probe)?;
        }
        PlanNode::Union(n) => {
            for source in &n.sources {
                check_symbol_flow(source)?;
            }
        }
        PlanNode::TableWriter(n) => {
            check_symbol_flow(&n.input)?;
        }
        PlanNode::TableCommit(n) => {
            check_symbol_flow(&n.input)?;
        }
        PlanNode::Output(n) => {
            check_symbol_flow(&n.input)?;
        }
        PlanNode::Sink(n) => {
            require_same_output(n.id, &n.output, n.input.output())?;
            check_symbol_flow(&n.input)?;
        }
    }
    Ok(())
}
