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

//! The fragment model: a sealed [`Fragment`], the mutable [`FragmentBuilder`]
//! that accumulates one before it is sealed, and the [`FragmentGraphBuilder`]
//! / [`SubPlan`] pair that assembles the whole DAG. One fragment, one query
//! stage: a `FragmentBuilder` plays the role a mutable stage builder plays in
//! a distributed-execution planner, sealed once its boundary (an `Exchange`
//! or the query root) is reached.

use std::collections::{HashMap, HashSet};

use crate::common::error::{FragmenterError, Result};
use crate::common::{FragmentId, PlanNodeId, Symbol};
use crate::optimizer::plan_node::PlanRef;
use crate::optimizer::property::{Distribution, OutputPartitioning};

/// A sealed fragment. Cheap to clone: the only heap data is the `Rc`-shared
/// operator tree and a handful of small vectors.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: FragmentId,
    pub root: PlanRef,
    pub distribution: Distribution,
    pub output_partitioning: OutputPartitioning,
    /// The `PlanNodeId` of the `TableScan` this fragment reads from, if any.
    /// Carried through unchanged even when `distribution` has been forced to
    /// `NONE` by single-node mode, since the scan itself is still the thing a
    /// collaborator would split across workers.
    pub partitioned_source: Option<PlanNodeId>,
}

impl Fragment {
    pub fn output(&self) -> &[Symbol] {
        self.root.output()
    }

    pub fn is_distributed(&self) -> bool {
        self.distribution.is_distributed()
    }
}

/// The mutable accumulator for one fragment that hasn't been sealed yet.
/// Created by one of the four factories below; consumed exactly once by
/// [`FragmentBuilder::seal`].
pub struct FragmentBuilder {
    id: FragmentId,
    distribution: Distribution,
    root: PlanRef,
    partitioned_source: Option<PlanNodeId>,
    child_ids: Vec<FragmentId>,
    output_partitioning: OutputPartitioning,
}

impl FragmentBuilder {
    fn new(id: FragmentId, distribution: Distribution, root: PlanRef) -> Self {
        Self {
            id,
            distribution,
            root,
            partitioned_source: None,
            child_ids: Vec::new(),
            output_partitioning: OutputPartitioning::None,
        }
    }

    pub fn single_node(id: FragmentId, root: PlanRef) -> Self {
        Self::new(id, Distribution::None, root)
    }

    pub fn fixed(id: FragmentId, root: PlanRef) -> Self {
        Self::new(id, Distribution::Fixed, root)
    }

    pub fn source(id: FragmentId, root: PlanRef, partitioned_source: PlanNodeId) -> Self {
        let mut builder = Self::new(id, Distribution::Source, root);
        builder.partitioned_source = Some(partitioned_source);
        builder
    }

    pub fn coordinator_only(id: FragmentId, root: PlanRef) -> Self {
        Self::new(id, Distribution::CoordinatorOnly, root)
    }

    pub fn id(&self) -> FragmentId {
        self.id
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    pub fn is_distributed(&self) -> bool {
        self.distribution.is_distributed()
    }

    pub fn root(&self) -> &PlanRef {
        &self.root
    }

    pub fn output_partitioning(&self) -> &OutputPartitioning {
        &self.output_partitioning
    }

    pub fn partitioned_source(&self) -> Option<PlanNodeId> {
        self.partitioned_source
    }

    /// Replace the current root. `op`'s input subtree is expected to already
    /// reference the previous root (or a descendant of it, or an inserted
    /// `Exchange`) — the builder does not itself verify this, callers in
    /// `scheduler::plan_fragmenter` construct `op` from `self.root()` by
    /// hand.
    pub fn set_root(&mut self, root: PlanRef) {
        self.root = root;
    }

    /// Record that this fragment's sink will hash-partition its rows by
    /// `by`. All listed symbols must already appear in the current root's
    /// output.
    pub fn set_hash_output_partitioning(
        &mut self,
        by: Vec<Symbol>,
        hash: Option<Symbol>,
    ) -> Result<()> {
        let produced = self.root.output();
        for symbol in &by {
            if !produced.contains(symbol) {
                return Err(FragmenterError::InvariantViolation(format!(
                    "cannot hash-partition fragment {} by symbol {symbol} not in its output",
                    self.id
                )));
            }
        }
        self.output_partitioning = OutputPartitioning::Hash { by, hash };
        Ok(())
    }

    pub fn add_child(&mut self, child: &Fragment) {
        self.child_ids.push(child.id);
    }

    pub fn set_children(&mut self, children: &[Fragment]) {
        self.child_ids = children.iter().map(|f| f.id).collect();
    }

    pub fn child_ids(&self) -> &[FragmentId] {
        &self.child_ids
    }

    /// Adopt already-sealed child fragments from a sibling builder that is
    /// being folded into this one without an intervening boundary (e.g. a
    /// `Join` whose two non-distributed inputs both already carry sealed
    /// descendants from nested boundaries).
    pub fn add_child_ids(&mut self, ids: impl IntoIterator<Item = FragmentId>) {
        self.child_ids.extend(ids);
    }

    /// Seal this builder into a [`Fragment`], registering it (and the edges
    /// to its already-sealed children) in `graph`.
    pub fn seal(self, graph: &mut FragmentGraphBuilder) -> Fragment {
        let fragment = Fragment {
            id: self.id,
            root: self.root,
            distribution: self.distribution,
            output_partitioning: self.output_partitioning,
            partitioned_source: self.partitioned_source,
        };
        tracing::debug!(
            fragment_id = %fragment.id,
            distribution = ?fragment.distribution,
            children = self.child_ids.len(),
            "sealed fragment"
        );
        graph.add_node(fragment.clone());
        for child_id in self.child_ids {
            graph.link_to_child(fragment.id, child_id);
        }
        fragment
    }
}

/// Accumulates fragments and the parent/child edges between them as the
/// rewrite proceeds bottom-up. Mirrors `StageGraphBuilder`.
#[derive(Debug, Default)]
pub struct FragmentGraphBuilder {
    fragments: HashMap<FragmentId, Fragment>,
    child_edges: HashMap<FragmentId, HashSet<FragmentId>>,
    parent_edges: HashMap<FragmentId, HashSet<FragmentId>>,
}

impl FragmentGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, fragment: Fragment) {
        self.child_edges.insert(fragment.id, HashSet::new());
        self.parent_edges.insert(fragment.id, HashSet::new());
        self.fragments.insert(fragment.id, fragment);
    }

    /// Look up an already-sealed fragment by id, e.g. to inspect a child's
    /// output partitioning before deciding whether a new boundary is needed.
    pub fn get(&self, id: FragmentId) -> &Fragment {
        &self.fragments[&id]
    }

    pub fn link_to_child(&mut self, parent_id: FragmentId, child_id: FragmentId) {
        self.child_edges
            .get_mut(&parent_id)
            .expect("parent fragment must be registered before linking")
            .insert(child_id);
        self.parent_edges
            .get_mut(&child_id)
            .expect("child fragment must be registered before linking")
            .insert(parent_id);
    }

    pub fn build(self, root_id: FragmentId) -> SubPlan {
        SubPlan {
            root_id,
            fragments: self.fragments,
            child_edges: self.child_edges,
            parent_edges: self.parent_edges,
        }
    }
}

/// The root [`Fragment`] plus its transitive children — the output of the
/// fragmenter. Equivalently, the fragment DAG viewed from its root.
#[derive(Debug)]
pub struct SubPlan {
    pub root_id: FragmentId,
    pub fragments: HashMap<FragmentId, Fragment>,
    child_edges: HashMap<FragmentId, HashSet<FragmentId>>,
    parent_edges: HashMap<FragmentId, HashSet<FragmentId>>,
}

impl SubPlan {
    pub fn root(&self) -> &Fragment {
        &self.fragments[&self.root_id]
    }

    pub fn get_children(&self, id: FragmentId) -> &HashSet<FragmentId> {
        &self.child_edges[&id]
    }

    pub fn get_parents(&self, id: FragmentId) -> &HashSet<FragmentId> {
        &self.parent_edges[&id]
    }

    pub fn leaf_fragments(&self) -> Vec<FragmentId> {
        self.fragments
            .keys()
            .copied()
            .filter(|id| self.child_edges[id].is_empty())
            .collect()
    }

    pub fn fragments_with_table_scan(&self) -> HashSet<FragmentId> {
        self.fragments
            .iter()
            .filter_map(|(id, fragment)| fragment.partitioned_source.map(|_| *id))
            .collect()
    }

    /// Fragment ids in topological order, child before parent.
    pub fn ids_by_topo_order(&self) -> Vec<FragmentId> {
        let mut stack = vec![self.root_id];
        let mut ret = Vec::with_capacity(self.fragments.len());
        let mut seen = HashSet::with_capacity(self.fragments.len());

        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                ret.push(id);
                stack.extend(self.child_edges[&id].iter().copied());
            }
        }

        ret.into_iter().rev().collect()
    }
}
