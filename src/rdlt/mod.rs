//! The RDLT (Robustness Diagram with Loop and Time controls) model: a
//! typed vertex/edge store over [`crate::graph::Digraph`], reset-bound
//! subsystem discovery, and the split-case-1 classifier.

use crate::error::{Error, Result};
use crate::graph::{Digraph, EdgeIx, VertexIx};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Distinguished constraint value marking an unconstrained ("epsilon") arc.
pub const EPSILON: &str = "ε";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexKind {
    Boundary,
    Entity,
    Controller,
}

impl VertexKind {
    /// `true` for boundary/entity vertices, which the input format calls
    /// "objects"; an edge between two objects is a topology error.
    pub fn is_object(self) -> bool {
        matches!(self, VertexKind::Boundary | VertexKind::Entity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Normal,
    Abstract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub kind: VertexKind,
    pub label: String,
    pub is_reset_center: bool,
    /// Set by the preprocessor once the vertex survives into Level-1.
    pub is_in_bridge: bool,
    pub is_out_bridge: bool,
    pub rbs_group: Option<String>,
    /// `true` only for a reset center's clone inside its Level-2 subgraph
    /// (spec: "Level-2 centers carry center=true").
    pub is_level2_center: bool,
}

impl Vertex {
    pub fn new(kind: VertexKind, label: impl Into<String>, is_reset_center: bool) -> Self {
        Self {
            kind,
            label: label.into(),
            is_reset_center,
            is_in_bridge: false,
            is_out_bridge: false,
            rbs_group: None,
            is_level2_center: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub c: String,
    pub l: u32,
    pub kind: EdgeKind,
    /// Underlying vertex-id sequence for abstract edges synthesised by the
    /// preprocessor; `None` for edges taken directly from the input.
    pub concrete_path: Option<Vec<String>>,
}

impl Edge {
    pub fn new(c: impl Into<String>, l: u32, kind: EdgeKind) -> Self {
        Self { c: c.into(), l, kind, concrete_path: None }
    }

    pub fn is_epsilon(&self) -> bool {
        self.c == EPSILON
    }
}

/// Four independent booleans behind the split-case-1 disjunction. Only
/// `any()` drives mapper behaviour; the rest support the per-vertex
/// diagnostic log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCase1 {
    pub sibling_or_join: bool,
    pub non_sibling: bool,
    pub has_abstract_out: bool,
    pub in_cycle: bool,
}

impl SplitCase1 {
    pub fn any(&self) -> bool {
        self.sibling_or_join || self.non_sibling || self.has_abstract_out || self.in_cycle
    }
}

/// A directed multigraph of typed vertices and constrained edges.
#[derive(Debug, Clone, Default)]
pub struct Rdlt {
    pub graph: Digraph<String, Vertex, Edge>,
}

impl Rdlt {
    pub fn new() -> Self {
        Self { graph: Digraph::new() }
    }

    pub fn add_vertex(&mut self, id: impl Into<String>, vertex: Vertex) -> Result<VertexIx> {
        let id = id.into();
        if vertex.is_reset_center && vertex.kind == VertexKind::Controller {
            return Err(Error::InvalidTopology(format!("vertex `{id}` is a controller and cannot be a reset center")));
        }
        self.graph.add_vertex(id.clone(), vertex).map_err(|_| Error::DuplicateVertex(id))
    }

    pub fn vertex_ix(&self, id: &str) -> Option<VertexIx> {
        self.graph.index_of(&id.to_string())
    }

    pub fn add_edge(&mut self, from: &str, to: &str, edge: Edge) -> Result<EdgeIx> {
        let from_ix = self.vertex_ix(from).ok_or_else(|| Error::UnknownVertex(from.to_string()))?;
        let to_ix = self.vertex_ix(to).ok_or_else(|| Error::UnknownVertex(to.to_string()))?;
        if edge.l == 0 {
            return Err(Error::InvalidConstraint { from: from.to_string(), to: to.to_string(), reason: "L must be a positive integer".into() });
        }
        let from_kind = self.graph.data(from_ix).kind;
        let to_kind = self.graph.data(to_ix).kind;
        if from_kind.is_object() && to_kind.is_object() {
            return Err(Error::InvalidTopology(format!("edge {from} -> {to} connects two object vertices directly")));
        }
        Ok(self.graph.add_edge(from_ix, to_ix, edge))
    }

    pub fn edge_key(&self, e: EdgeIx) -> String {
        let (from, to) = self.graph.edge_endpoints(e);
        let edge = self.graph.edge_data(e);
        format!("{}->{}|C={}|L={}", self.graph.key(from), self.graph.key(to), edge.c, edge.l)
    }

    pub fn sources(&self) -> Vec<VertexIx> {
        self.graph.vertices().filter(|&v| self.graph.in_degree(v) == 0).collect()
    }

    pub fn sinks(&self) -> Vec<VertexIx> {
        self.graph.vertices().filter(|&v| self.graph.out_degree(v) == 0).collect()
    }

    pub fn reset_centers(&self) -> Vec<VertexIx> {
        self.graph.vertices().filter(|&v| self.graph.data(v).is_reset_center).collect()
    }

    /// `true` iff `v` has a self-loop, or an outgoing edge whose target can
    /// reach back to `v`.
    pub fn has_looping_arc(&self, v: VertexIx) -> bool {
        self.graph.outgoing(v).iter().any(|&e| {
            let (_, to) = self.graph.edge_endpoints(e);
            to == v || self.graph.reachable(to, v)
        })
    }

    /// The reset-bound subsystem rooted at `center`: `center` plus every
    /// vertex reachable from it by outgoing epsilon edges.
    pub fn vertices_in_rbs(&self, center: VertexIx) -> AHashSet<VertexIx> {
        self.graph.bfs(center, |e| self.graph.edge_data(e).is_epsilon()).into_iter().collect()
    }

    pub fn is_in_bridge(&self, v: VertexIx, rbs: &AHashSet<VertexIx>) -> bool {
        self.graph.incoming(v).iter().any(|&e| {
            let (from, _) = self.graph.edge_endpoints(e);
            !rbs.contains(&from)
        })
    }

    pub fn is_out_bridge(&self, v: VertexIx, rbs: &AHashSet<VertexIx>) -> bool {
        self.graph.outgoing(v).iter().any(|&e| {
            let (_, to) = self.graph.edge_endpoints(e);
            !rbs.contains(&to)
        })
    }

    /// `true` iff `v` has >= 2 incoming edges that all share one `C`.
    pub fn is_or_join(&self, v: VertexIx) -> bool {
        let incoming = self.graph.incoming(v);
        if incoming.len() < 2 {
            return false;
        }
        let first_c = &self.graph.edge_data(incoming[0]).c;
        incoming.iter().all(|&e| &self.graph.edge_data(e).c == first_c)
    }

    /// Two simple paths (edge sequences) are siblings iff they share the
    /// same endpoints (guaranteed by construction here) and their edge
    /// sets are disjoint.
    fn are_sibling(a: &[EdgeIx], b: &[EdgeIx]) -> bool {
        a.iter().all(|e| !b.contains(e))
    }

    pub fn classify_split_case1(&self, v: VertexIx) -> SplitCase1 {
        let has_abstract_out = self.graph.outgoing(v).iter().any(|&e| self.graph.edge_data(e).kind == EdgeKind::Abstract);
        let in_cycle = self.has_looping_arc(v);

        if self.graph.out_degree(v) < 2 {
            return SplitCase1 { sibling_or_join: false, non_sibling: false, has_abstract_out, in_cycle };
        }

        let mut sibling_or_join = false;
        let mut non_sibling = false;
        let mut any_candidate = false;

        for j in self.graph.vertices() {
            if j == v || !self.is_or_join(j) || !self.graph.reachable(v, j) {
                continue;
            }
            let paths = self.graph.simple_paths(v, j);
            if paths.len() < 2 {
                continue;
            }
            any_candidate = true;
            let has_sibling_pair = paths
                .iter()
                .enumerate()
                .any(|(i, p1)| paths[i + 1..].iter().any(|p2| Self::are_sibling(p1, p2)));
            if has_sibling_pair {
                sibling_or_join = true;
            } else {
                non_sibling = true;
            }
        }

        if !any_candidate {
            non_sibling = true;
        }

        SplitCase1 { sibling_or_join, non_sibling, has_abstract_out, in_cycle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eps(l: u32) -> Edge {
        Edge::new(EPSILON, l, EdgeKind::Normal)
    }

    #[test]
    fn rbs_is_epsilon_closure_from_center() {
        let mut r = Rdlt::new();
        r.add_vertex("c", Vertex::new(VertexKind::Controller, "", true)).unwrap();
        r.add_vertex("i", Vertex::new(VertexKind::Controller, "", false)).unwrap();
        r.add_vertex("m", Vertex::new(VertexKind::Controller, "", false)).unwrap();
        r.add_edge("i", "c", eps(1)).unwrap();
        r.add_edge("c", "m", eps(1)).unwrap();

        let c = r.vertex_ix("c").unwrap();
        let m = r.vertex_ix("m").unwrap();
        let i = r.vertex_ix("i").unwrap();
        let rbs = r.vertices_in_rbs(c);
        assert!(rbs.contains(&c));
        assert!(rbs.contains(&m));
        assert!(!rbs.contains(&i));
    }

    #[test]
    fn self_loop_is_split_case1_via_cycle_limb() {
        let mut r = Rdlt::new();
        r.add_vertex("x", Vertex::new(VertexKind::Controller, "", false)).unwrap();
        r.add_edge("x", "x", eps(1)).unwrap();
        let x = r.vertex_ix("x").unwrap();
        assert!(r.has_looping_arc(x));
    }

    #[test]
    fn reset_center_on_controller_is_rejected() {
        let mut r = Rdlt::new();
        let err = r.add_vertex("c", Vertex::new(VertexKind::Controller, "", true));
        assert!(err.is_err());
    }

    #[test]
    fn object_to_object_edge_rejected() {
        let mut r = Rdlt::new();
        r.add_vertex("a", Vertex::new(VertexKind::Boundary, "", false)).unwrap();
        r.add_vertex("b", Vertex::new(VertexKind::Entity, "", false)).unwrap();
        assert!(r.add_edge("a", "b", eps(1)).is_err());
    }
}
