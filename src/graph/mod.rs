//! Directed multigraph primitives: arena storage, traversal and cycle
//! enumeration, shared by the RDLT model and the Petri Net model.
//!
//! Vertices and edges live in arenas (`Vec`s) and are referenced by index
//! rather than by smart pointer, so that cycle enumeration and adjacency
//! walks never have to fight borrow-checker aliasing the way a
//! reference-counted node graph would.

mod algorithms;

pub use algorithms::*;

use ahash::AHashMap;
use std::fmt::Display;
use std::hash::Hash;

/// Index of a vertex in a [`Digraph`]'s arena. Stable for the graph's
/// lifetime: vertices are never removed, only graphs are rebuilt wholesale
/// (matching the RDLT pipeline's "fresh value per stage" lifecycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexIx(pub usize);

/// Index of an edge in a [`Digraph`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeIx(pub usize);

#[derive(Debug, Clone)]
struct VertexSlot<K, N> {
    key: K,
    data: N,
    outgoing: Vec<EdgeIx>,
    incoming: Vec<EdgeIx>,
}

#[derive(Debug, Clone)]
struct EdgeSlot<E> {
    from: VertexIx,
    to: VertexIx,
    data: E,
}

/// A directed multigraph: parallel edges between the same pair of vertices
/// are allowed and remain distinguishable by index.
#[derive(Debug, Clone)]
pub struct Digraph<K, N, E>
where
    K: Clone + Hash + Eq + Display,
{
    vertices: Vec<VertexSlot<K, N>>,
    edges: Vec<EdgeSlot<E>>,
    index_of: AHashMap<K, VertexIx>,
}

impl<K, N, E> Default for Digraph<K, N, E>
where
    K: Clone + Hash + Eq + Display,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, N, E> Digraph<K, N, E>
where
    K: Clone + Hash + Eq + Display,
{
    pub fn new() -> Self {
        Self { vertices: Vec::new(), edges: Vec::new(), index_of: AHashMap::new() }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index_of.contains_key(key)
    }

    pub fn index_of(&self, key: &K) -> Option<VertexIx> {
        self.index_of.get(key).copied()
    }

    pub fn key(&self, ix: VertexIx) -> &K {
        &self.vertices[ix.0].key
    }

    pub fn data(&self, ix: VertexIx) -> &N {
        &self.vertices[ix.0].data
    }

    pub fn data_mut(&mut self, ix: VertexIx) -> &mut N {
        &mut self.vertices[ix.0].data
    }

    pub fn edge_data(&self, ix: EdgeIx) -> &E {
        &self.edges[ix.0].data
    }

    pub fn edge_data_mut(&mut self, ix: EdgeIx) -> &mut E {
        &mut self.edges[ix.0].data
    }

    pub fn edge_endpoints(&self, ix: EdgeIx) -> (VertexIx, VertexIx) {
        let e = &self.edges[ix.0];
        (e.from, e.to)
    }

    /// Insert a vertex, returning its index. Errors with the key back if it
    /// is already present (the RDLT model enforces uniqueness via this
    /// path).
    pub fn add_vertex(&mut self, key: K, data: N) -> Result<VertexIx, K> {
        if self.index_of.contains_key(&key) {
            return Err(key);
        }
        let ix = VertexIx(self.vertices.len());
        self.vertices.push(VertexSlot { key: key.clone(), data, outgoing: Vec::new(), incoming: Vec::new() });
        self.index_of.insert(key, ix);
        Ok(ix)
    }

    /// Insert a directed edge; parallel edges between the same pair are
    /// permitted and get distinct indices.
    pub fn add_edge(&mut self, from: VertexIx, to: VertexIx, data: E) -> EdgeIx {
        let ix = EdgeIx(self.edges.len());
        self.edges.push(EdgeSlot { from, to, data });
        self.vertices[from.0].outgoing.push(ix);
        self.vertices[to.0].incoming.push(ix);
        ix
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexIx> + '_ {
        (0..self.vertices.len()).map(VertexIx)
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeIx> + '_ {
        (0..self.edges.len()).map(EdgeIx)
    }

    pub fn outgoing(&self, ix: VertexIx) -> &[EdgeIx] {
        &self.vertices[ix.0].outgoing
    }

    pub fn incoming(&self, ix: VertexIx) -> &[EdgeIx] {
        &self.vertices[ix.0].incoming
    }

    pub fn out_degree(&self, ix: VertexIx) -> usize {
        self.vertices[ix.0].outgoing.len()
    }

    pub fn in_degree(&self, ix: VertexIx) -> usize {
        self.vertices[ix.0].incoming.len()
    }
}
