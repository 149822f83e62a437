//! DependencyGraph: the per-session dataflow graph between notebook cells.
//!
//! Nodes are cells keyed by [`ShortCellId`]; edges are uplinks from a
//! producing cell to a consuming cell, labelled with the variable or tag that
//! is read. The backend is the authority on dependencies, so the graph never
//! derives edges itself: every mutation applies facts carried by a reply.
//!
//! # Update rules
//!
//! - A cell's inbound edge set is only ever replaced as a whole, by
//!   [`DependencyGraph::update_graph`] for the cell that was executed. There
//!   is no API that adds a single edge, so links dropped from a cell's code
//!   cannot linger.
//! - Graph updates never delete nodes. Only [`DependencyGraph::remove_cell`],
//!   called when the user deletes a cell, does.
//! - Downstream/upstream sets supplied by the backend are stored as
//!   annotations keyed by the triggering cell.
//!
//! Every method takes `&mut self` for the whole merge, so a caller holding
//! the graph behind a lock sees each update applied atomically.

use std::collections::{BTreeSet, VecDeque};

use indexmap::{IndexMap, IndexSet};
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use crate::delta::{CellAnnotations, DownstreamUpdate, GraphDelta};
use crate::edge::{LinkLabel, Uplink};
use crate::error::CoreError;
use crate::id::ShortCellId;
use crate::node::{CellNode, CellState};

/// Dependency graph of one session.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: StableGraph<CellNode, LinkLabel, Directed, u32>,
    /// Short id to node index, in first-seen order.
    index: IndexMap<ShortCellId, NodeIndex<u32>>,
    /// Cells the backend reported on the latest reply.
    kernel_cells: Vec<ShortCellId>,
    annotations: IndexMap<ShortCellId, CellAnnotations>,
    /// Notebook display order, as last reported by the host.
    order: Vec<ShortCellId>,
    /// Cells flagged by transitive-update notices and not re-run since.
    flagged: IndexSet<ShortCellId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Merge operations
    // -----------------------------------------------------------------------

    /// Refreshes node code text from a `short id -> code` mapping.
    ///
    /// Unknown ids become new nodes. No node is removed.
    pub fn update_cell_contents<I, S>(&mut self, contents: I)
    where
        I: IntoIterator<Item = (ShortCellId, S)>,
        S: Into<String>,
    {
        for (id, code) in contents {
            let idx = self.ensure_node(id);
            self.graph[idx].code = code.into();
        }
    }

    /// Merges the dependency facts of one reply for `cell`.
    ///
    /// Uplinks aimed at other consumers are ignored: a cell's edges are only
    /// established by its own reply. Applying the same delta twice leaves the
    /// node and edge sets unchanged.
    pub fn update_graph(&mut self, cell: ShortCellId, delta: &GraphDelta) {
        for &id in delta.cells.iter().chain(delta.nodes.iter()) {
            self.ensure_node(id);
        }
        let idx = self.ensure_node(cell);
        self.kernel_cells = delta.cells.clone();

        self.replace_uplinks(cell, delta.uplinks.iter().filter(|link| link.targets(cell)));

        if let Some(vars) = &delta.output_vars {
            self.graph[idx].output_vars = vars.iter().cloned().collect();
        }

        self.annotations.insert(
            cell,
            CellAnnotations {
                downstream: delta.downlinks.clone(),
                upstream: delta.upstream.clone(),
                internal_nodes: delta.internal_nodes.clone(),
            },
        );
        self.flagged.shift_remove(&cell);
        self.mark_fresh(cell);
    }

    /// Applies transitive-update notices.
    ///
    /// Each named cell gets its downstream annotation replaced and is flagged
    /// for dependent views. Code and edges are left alone. Returns the
    /// distinct cells touched, in notice order.
    pub fn update_down_links(&mut self, updates: &[DownstreamUpdate]) -> Vec<ShortCellId> {
        let mut touched = Vec::new();
        for update in updates {
            self.annotations.entry(update.cell).or_default().downstream = update.downstream.clone();
            self.flagged.insert(update.cell);
            if !touched.contains(&update.cell) {
                touched.push(update.cell);
            }
        }
        touched
    }

    /// Replaces the whole inbound edge set of `consumer`.
    fn replace_uplinks<'a, I>(&mut self, consumer: ShortCellId, uplinks: I)
    where
        I: IntoIterator<Item = &'a Uplink>,
    {
        let target = self.ensure_node(consumer);
        let wanted: IndexSet<(ShortCellId, LinkLabel)> = uplinks
            .into_iter()
            .map(|link| (link.from, link.label.clone()))
            .collect();

        let existing: Vec<EdgeIndex<u32>> = self
            .graph
            .edges_directed(target, Direction::Incoming)
            .map(|edge| edge.id())
            .collect();
        for edge in existing {
            self.graph.remove_edge(edge);
        }

        for (from, label) in wanted {
            let source = self.ensure_node(from);
            self.graph.add_edge(source, target, label);
        }
    }

    fn ensure_node(&mut self, id: ShortCellId) -> NodeIndex<u32> {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(CellNode::new(id));
        self.index.insert(id, idx);
        idx
    }

    // -----------------------------------------------------------------------
    // Structural edits driven by the notebook
    // -----------------------------------------------------------------------

    /// Removes a deleted cell with all its edges and annotations.
    pub fn remove_cell(&mut self, id: ShortCellId) -> Option<CellNode> {
        let idx = self.index.shift_remove(&id)?;
        let node = self.graph.remove_node(idx);
        self.annotations.shift_remove(&id);
        for annotations in self.annotations.values_mut() {
            annotations.downstream.retain(|d| *d != id);
        }
        self.kernel_cells.retain(|c| *c != id);
        self.order.retain(|c| *c != id);
        self.flagged.shift_remove(&id);
        node
    }

    /// Records the notebook's display order.
    pub fn update_order(&mut self, order: Vec<ShortCellId>) {
        self.order = order;
    }

    // -----------------------------------------------------------------------
    // Graph staleness
    // -----------------------------------------------------------------------

    fn mark_fresh(&mut self, cell: ShortCellId) {
        let Some(&idx) = self.index.get(&cell) else {
            return;
        };
        let node = &mut self.graph[idx];
        node.state = CellState::Fresh;
        node.executed = true;

        let producers: Vec<NodeIndex<u32>> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect();
        for producer in producers {
            self.graph[producer].state = CellState::Fresh;
        }
    }

    /// Marks `cell` as edited and its downstream closure as upstream-stale.
    ///
    /// Returns the downstream cells that were marked.
    pub fn mark_changed(&mut self, cell: ShortCellId) -> Result<Vec<ShortCellId>, CoreError> {
        let idx = self.node_index(cell)?;
        self.graph[idx].state = CellState::Changed;

        let downstream = self.all_downstream(cell);
        for id in &downstream {
            if let Some(&d) = self.index.get(id) {
                self.graph[d].state = CellState::UpstreamStale;
            }
        }
        Ok(downstream)
    }

    /// Undoes [`mark_changed`](Self::mark_changed) after the edit was
    /// reverted. Cells never executed in this session are left alone.
    pub fn revert_changed(&mut self, cell: ShortCellId) -> Result<(), CoreError> {
        let idx = self.node_index(cell)?;
        if !self.graph[idx].executed {
            return Ok(());
        }
        self.mark_fresh(cell);

        for id in self.all_downstream(cell) {
            let Some(&d) = self.index.get(&id) else {
                continue;
            };
            if self.graph[d].state == CellState::UpstreamStale && self.upstream_fresh(id) {
                self.graph[d].state = CellState::Fresh;
            }
        }
        Ok(())
    }

    fn upstream_fresh(&self, cell: ShortCellId) -> bool {
        let upstream = match self.annotations.get(&cell) {
            Some(a) if !a.upstream.is_empty() => a.upstream.clone(),
            _ => self.all_upstream(cell),
        };
        upstream
            .iter()
            .all(|id| self.node(*id).map_or(true, |n| n.state == CellState::Fresh))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn node_index(&self, id: ShortCellId) -> Result<NodeIndex<u32>, CoreError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(CoreError::CellNotFound { id })
    }

    pub fn node(&self, id: ShortCellId) -> Option<&CellNode> {
        self.index.get(&id).and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn contains(&self, id: ShortCellId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node ids in first-seen order.
    pub fn node_ids(&self) -> impl Iterator<Item = ShortCellId> + '_ {
        self.index.keys().copied()
    }

    pub fn kernel_cells(&self) -> &[ShortCellId] {
        &self.kernel_cells
    }

    pub fn order(&self) -> &[ShortCellId] {
        &self.order
    }

    /// Inbound edges of `id`, sorted by producer then label.
    pub fn uplinks(&self, id: ShortCellId) -> Vec<Uplink> {
        let Some(&idx) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut links: Vec<Uplink> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|edge| Uplink {
                from: self.graph[edge.source()].id,
                to: Some(id),
                label: edge.weight().clone(),
            })
            .collect();
        links.sort_by(|a, b| (a.from, &a.label).cmp(&(b.from, &b.label)));
        links
    }

    /// Distinct cells `id` reads from directly.
    pub fn immediate_upstreams(&self, id: ShortCellId) -> Vec<ShortCellId> {
        let mut ups: Vec<ShortCellId> = self.uplinks(id).into_iter().map(|l| l.from).collect();
        ups.dedup();
        ups
    }

    /// Names `id` reads from its producers.
    pub fn upstream_labels(&self, id: ShortCellId) -> Vec<String> {
        self.uplinks(id).into_iter().map(|l| l.label.name).collect()
    }

    pub fn annotations(&self, id: ShortCellId) -> Option<&CellAnnotations> {
        self.annotations.get(&id)
    }

    /// Backend-reported immediate downstream dependents of `id`.
    pub fn downstream(&self, id: ShortCellId) -> &[ShortCellId] {
        self.annotations
            .get(&id)
            .map_or(&[], |a| a.downstream.as_slice())
    }

    /// Backend-reported full upstream set of `id`.
    pub fn recorded_upstream(&self, id: ShortCellId) -> &[ShortCellId] {
        self.annotations
            .get(&id)
            .map_or(&[], |a| a.upstream.as_slice())
    }

    pub fn internal_nodes(&self, id: ShortCellId) -> &[ShortCellId] {
        self.annotations
            .get(&id)
            .map_or(&[], |a| a.internal_nodes.as_slice())
    }

    /// Cells flagged by transitive-update notices.
    pub fn flagged(&self) -> impl Iterator<Item = ShortCellId> + '_ {
        self.flagged.iter().copied()
    }

    /// Transitive closure over recorded downstream annotations, excluding
    /// `id` itself and cells the graph does not know.
    pub fn all_downstream(&self, id: ShortCellId) -> Vec<ShortCellId> {
        let mut seen = IndexSet::new();
        let mut queue: VecDeque<ShortCellId> = self.downstream(id).iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            if next == id || !self.contains(next) || !seen.insert(next) {
                continue;
            }
            queue.extend(self.downstream(next).iter().copied());
        }
        seen.into_iter().collect()
    }

    /// Transitive closure over inbound edges, excluding `id` itself.
    pub fn all_upstream(&self, id: ShortCellId) -> Vec<ShortCellId> {
        let mut seen = IndexSet::new();
        let mut queue: VecDeque<ShortCellId> = self.immediate_upstreams(id).into();
        while let Some(next) = queue.pop_front() {
            if next == id || !seen.insert(next) {
                continue;
            }
            queue.extend(self.immediate_upstreams(next));
        }
        seen.into_iter().collect()
    }

    /// All edges as `(from, to, label)` triples.
    pub fn edge_set(&self) -> BTreeSet<(ShortCellId, ShortCellId, LinkLabel)> {
        self.graph
            .edge_indices()
            .filter_map(|e| {
                let (s, t) = self.graph.edge_endpoints(e)?;
                let label = self.graph.edge_weight(e)?.clone();
                Some((self.graph[s].id, self.graph[t].id, label))
            })
            .collect()
    }

    /// Serializable view of the whole graph for dependency views.
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut cells: Vec<ShortCellId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.contains(*id))
            .collect();
        for id in self.index.keys() {
            if !cells.contains(id) {
                cells.push(*id);
            }
        }

        let nodes = cells
            .iter()
            .filter_map(|id| self.node(*id))
            .map(|node| NodeView {
                id: node.id,
                code: node.code.clone(),
                state: node.state,
                executed: node.executed,
                output_vars: node.output_vars.to_vec(),
            })
            .collect();

        let edges = self
            .edge_set()
            .into_iter()
            .map(|(from, to, label)| EdgeView { from, to, label })
            .collect();

        GraphSnapshot {
            cells,
            nodes,
            edges,
            annotations: self.annotations.clone(),
            flagged: self.flagged.iter().copied().collect(),
        }
    }
}

/// Point-in-time copy of a [`DependencyGraph`], shaped for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Cells in display order; cells missing from the order come last.
    pub cells: Vec<ShortCellId>,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
    pub annotations: IndexMap<ShortCellId, CellAnnotations>,
    pub flagged: Vec<ShortCellId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: ShortCellId,
    pub code: String,
    pub state: CellState,
    pub executed: bool,
    pub output_vars: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeView {
    pub from: ShortCellId,
    pub to: ShortCellId,
    pub label: LinkLabel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(raw: u32) -> ShortCellId {
        ShortCellId::from_raw(raw)
    }

    fn var(from: u32, name: &str) -> Uplink {
        Uplink::new(id(from), LinkLabel::variable(name))
    }

    /// Reply for `b` reading `x` from `a`.
    fn b_reads_a() -> GraphDelta {
        GraphDelta {
            cells: vec![id(0xa), id(0xb)],
            nodes: vec![id(0xb)],
            uplinks: vec![var(0xa, "x")],
            downlinks: vec![],
            upstream: vec![id(0xa)],
            internal_nodes: vec![id(0xa)],
            output_vars: Some(vec!["y".into()]),
        }
    }

    #[test]
    fn update_graph_creates_nodes_and_edges() {
        let mut graph = DependencyGraph::new();
        graph.update_graph(id(0xb), &b_reads_a());

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.immediate_upstreams(id(0xb)), vec![id(0xa)]);
        assert_eq!(graph.upstream_labels(id(0xb)), vec!["x".to_string()]);
        assert_eq!(graph.recorded_upstream(id(0xb)), &[id(0xa)]);
        assert_eq!(graph.internal_nodes(id(0xb)), &[id(0xa)]);
        assert_eq!(graph.node(id(0xb)).unwrap().output_vars.as_slice(), ["y"]);
        assert_eq!(graph.kernel_cells(), &[id(0xa), id(0xb)]);
    }

    #[test]
    fn update_graph_is_idempotent() {
        let mut once = DependencyGraph::new();
        once.update_graph(id(0xb), &b_reads_a());

        let mut twice = DependencyGraph::new();
        twice.update_graph(id(0xb), &b_reads_a());
        twice.update_graph(id(0xb), &b_reads_a());

        assert_eq!(once.edge_set(), twice.edge_set());
        assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn empty_uplinks_replace_previous_dependencies() {
        let mut graph = DependencyGraph::new();
        graph.update_graph(id(0xb), &b_reads_a());
        assert_eq!(graph.uplinks(id(0xb)).len(), 1);

        let no_deps = GraphDelta {
            cells: vec![id(0xa), id(0xb)],
            nodes: vec![id(0xb)],
            ..GraphDelta::default()
        };
        graph.update_graph(id(0xb), &no_deps);

        assert!(graph.uplinks(id(0xb)).is_empty());
        // Nodes survive losing their edges.
        assert!(graph.contains(id(0xa)));
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn shrinking_dependency_set_drops_removed_links() {
        let mut graph = DependencyGraph::new();
        let both = GraphDelta {
            uplinks: vec![var(0xa, "x"), var(0xc, "z")],
            ..GraphDelta::default()
        };
        graph.update_graph(id(0xb), &both);
        assert_eq!(graph.immediate_upstreams(id(0xb)), vec![id(0xa), id(0xc)]);

        let one = GraphDelta {
            uplinks: vec![var(0xc, "z")],
            ..GraphDelta::default()
        };
        graph.update_graph(id(0xb), &one);
        assert_eq!(graph.immediate_upstreams(id(0xb)), vec![id(0xc)]);
    }

    #[test]
    fn independent_replies_do_not_interfere() {
        let mut graph = DependencyGraph::new();
        let for_b = GraphDelta {
            uplinks: vec![var(0xa, "x")],
            ..GraphDelta::default()
        };
        let for_d = GraphDelta {
            uplinks: vec![var(0xc, "w")],
            ..GraphDelta::default()
        };
        graph.update_graph(id(0xd), &for_d);
        graph.update_graph(id(0xb), &for_b);

        assert_eq!(graph.uplinks(id(0xb)), vec![Uplink {
            from: id(0xa),
            to: Some(id(0xb)),
            label: LinkLabel::variable("x"),
        }]);
        assert_eq!(graph.uplinks(id(0xd)), vec![Uplink {
            from: id(0xc),
            to: Some(id(0xd)),
            label: LinkLabel::variable("w"),
        }]);
    }

    #[test]
    fn links_for_other_consumers_are_ignored() {
        let mut graph = DependencyGraph::new();
        let delta = GraphDelta {
            uplinks: vec![
                var(0xa, "x"),
                Uplink {
                    from: id(0xa),
                    to: Some(id(0xc)),
                    label: LinkLabel::variable("x"),
                },
            ],
            ..GraphDelta::default()
        };
        graph.update_graph(id(0xb), &delta);
        assert!(graph.uplinks(id(0xc)).is_empty());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn tag_edge_established_only_by_consumer() {
        let mut graph = DependencyGraph::new();
        let consumer = GraphDelta {
            uplinks: vec![Uplink::new(id(0xa), LinkLabel::tag("result"))],
            ..GraphDelta::default()
        };
        graph.update_graph(id(0xb), &consumer);

        // Re-running the producer reports no uplinks of its own.
        graph.update_graph(id(0xa), &GraphDelta {
            downlinks: vec![id(0xb)],
            ..GraphDelta::default()
        });

        let edges = graph.edge_set();
        assert_eq!(edges.len(), 1);
        assert!(edges.contains(&(id(0xa), id(0xb), LinkLabel::tag("result"))));
    }

    #[test]
    fn update_cell_contents_inserts_without_removing() {
        let mut graph = DependencyGraph::new();
        graph.update_graph(id(0xb), &b_reads_a());
        graph.update_cell_contents([(id(0xa), "x = 1"), (id(0xe), "print(2)")]);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.node(id(0xa)).unwrap().code, "x = 1");
        assert_eq!(graph.node(id(0xe)).unwrap().state, CellState::Stale);
    }

    #[test]
    fn down_links_annotate_and_flag_without_touching_edges() {
        let mut graph = DependencyGraph::new();
        graph.update_graph(id(0xb), &b_reads_a());
        graph.update_cell_contents([(id(0xb), "y = x + 1")]);
        let edges_before = graph.edge_set();

        let touched = graph.update_down_links(&[
            DownstreamUpdate {
                cell: id(0xb),
                downstream: vec![id(0xc)],
            },
            DownstreamUpdate {
                cell: id(0xc),
                downstream: vec![],
            },
        ]);

        assert_eq!(touched, vec![id(0xb), id(0xc)]);
        assert_eq!(graph.downstream(id(0xb)), &[id(0xc)]);
        assert_eq!(graph.flagged().collect::<Vec<_>>(), vec![id(0xb), id(0xc)]);
        assert_eq!(graph.edge_set(), edges_before);
        assert_eq!(graph.node(id(0xb)).unwrap().code, "y = x + 1");

        // Running a flagged cell clears its flag.
        graph.update_graph(id(0xb), &b_reads_a());
        assert_eq!(graph.flagged().collect::<Vec<_>>(), vec![id(0xc)]);
    }

    #[test]
    fn mark_changed_propagates_over_downstream_annotations() {
        let mut graph = DependencyGraph::new();
        graph.update_graph(id(0xa), &GraphDelta {
            downlinks: vec![id(0xb)],
            ..GraphDelta::default()
        });
        graph.update_graph(id(0xb), &GraphDelta {
            uplinks: vec![var(0xa, "x")],
            downlinks: vec![id(0xc)],
            upstream: vec![id(0xa)],
            ..GraphDelta::default()
        });
        graph.update_graph(id(0xc), &GraphDelta {
            uplinks: vec![var(0xb, "y")],
            upstream: vec![id(0xa), id(0xb)],
            ..GraphDelta::default()
        });

        let marked = graph.mark_changed(id(0xa)).unwrap();
        assert_eq!(marked, vec![id(0xb), id(0xc)]);
        assert_eq!(graph.node(id(0xa)).unwrap().state, CellState::Changed);
        assert_eq!(graph.node(id(0xc)).unwrap().state, CellState::UpstreamStale);

        graph.revert_changed(id(0xa)).unwrap();
        assert_eq!(graph.node(id(0xa)).unwrap().state, CellState::Fresh);
        assert_eq!(graph.node(id(0xb)).unwrap().state, CellState::Fresh);
        assert_eq!(graph.node(id(0xc)).unwrap().state, CellState::Fresh);
    }

    #[test]
    fn revert_leaves_unexecuted_cells_alone() {
        let mut graph = DependencyGraph::new();
        graph.update_cell_contents([(id(0xa), "x = 1")]);
        graph.mark_changed(id(0xa)).unwrap();
        graph.revert_changed(id(0xa)).unwrap();
        assert_eq!(graph.node(id(0xa)).unwrap().state, CellState::Changed);
    }

    #[test]
    fn mark_changed_unknown_cell_errors() {
        let mut graph = DependencyGraph::new();
        assert_eq!(
            graph.mark_changed(id(7)),
            Err(CoreError::CellNotFound { id: id(7) })
        );
    }

    #[test]
    fn remove_cell_drops_edges_and_annotations() {
        let mut graph = DependencyGraph::new();
        graph.update_graph(id(0xa), &GraphDelta {
            downlinks: vec![id(0xb)],
            ..GraphDelta::default()
        });
        graph.update_graph(id(0xb), &b_reads_a());
        graph.update_order(vec![id(0xa), id(0xb)]);

        let removed = graph.remove_cell(id(0xb)).unwrap();
        assert_eq!(removed.id, id(0xb));
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.downstream(id(0xa)).is_empty());
        assert_eq!(graph.order(), &[id(0xa)]);
        assert!(graph.remove_cell(id(0xb)).is_none());
    }

    #[test]
    fn all_upstream_follows_edges() {
        let mut graph = DependencyGraph::new();
        graph.update_graph(id(0xb), &GraphDelta {
            uplinks: vec![var(0xa, "x")],
            ..GraphDelta::default()
        });
        graph.update_graph(id(0xc), &GraphDelta {
            uplinks: vec![var(0xb, "y"), var(0xa, "x")],
            ..GraphDelta::default()
        });
        let mut ups = graph.all_upstream(id(0xc));
        ups.sort();
        assert_eq!(ups, vec![id(0xa), id(0xb)]);
    }

    #[test]
    fn snapshot_follows_display_order() {
        let mut graph = DependencyGraph::new();
        graph.update_graph(id(0xb), &b_reads_a());
        graph.update_cell_contents([(id(0xc), "")]);
        graph.update_order(vec![id(0xc), id(0xa)]);

        let snap = graph.snapshot();
        assert_eq!(snap.cells, vec![id(0xc), id(0xa), id(0xb)]);
        assert_eq!(snap.edges.len(), 1);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["edges"][0]["from"], "0000000a");
        assert_eq!(json["annotations"]["0000000b"]["upstream"][0], "0000000a");
    }

    fn arb_delta() -> impl Strategy<Value = GraphDelta> {
        let ids = proptest::collection::vec(0u32..6, 0..5);
        let links = proptest::collection::vec((0u32..6, "[a-z]{1,3}", any::<bool>()), 0..6);
        (ids.clone(), ids.clone(), links, ids).prop_map(|(cells, nodes, links, downs)| GraphDelta {
            cells: cells.into_iter().map(id).collect(),
            nodes: nodes.into_iter().map(id).collect(),
            uplinks: links
                .into_iter()
                .map(|(from, name, tag)| {
                    let label = if tag { LinkLabel::tag(name) } else { LinkLabel::variable(name) };
                    Uplink::new(id(from), label)
                })
                .collect(),
            downlinks: downs.into_iter().map(id).collect(),
            ..GraphDelta::default()
        })
    }

    proptest! {
        #[test]
        fn reapplying_a_delta_changes_nothing(cell in 0u32..6, delta in arb_delta()) {
            let mut graph = DependencyGraph::new();
            graph.update_graph(id(cell), &delta);
            let nodes: BTreeSet<_> = graph.node_ids().collect();
            let edges = graph.edge_set();

            graph.update_graph(id(cell), &delta);
            prop_assert_eq!(graph.node_ids().collect::<BTreeSet<_>>(), nodes);
            prop_assert_eq!(graph.edge_set(), edges);
        }

        #[test]
        fn inbound_edges_match_latest_reply(cell in 0u32..6, first in arb_delta(), second in arb_delta()) {
            let mut graph = DependencyGraph::new();
            graph.update_graph(id(cell), &first);
            graph.update_graph(id(cell), &second);

            let expected: BTreeSet<(ShortCellId, LinkLabel)> = second
                .uplinks
                .iter()
                .map(|l| (l.from, l.label.clone()))
                .collect();
            let actual: BTreeSet<(ShortCellId, LinkLabel)> = graph
                .uplinks(id(cell))
                .into_iter()
                .map(|l| (l.from, l.label))
                .collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
