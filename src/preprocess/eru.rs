//! Expanded reusability (eRU): the per-abstract-arc numeric bound computed
//! from in-bridge L-values and pseudocritical-arc selection across cycles.

use crate::graph::{EdgeIx, VertexIx};
use crate::rdlt::Rdlt;
use ahash::AHashSet;

/// The result of computing eRU for one candidate abstract path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eru {
    Bounded(u32),
    /// No pseudocritical arc exists on a cycle crossing the RBS boundary
    /// for some in-bridge: the reuse bound is unbounded.
    Unbounded,
}

impl Eru {
    /// `L = eRU + 1`, clamping an unbounded reuse to `u32::MAX` so the
    /// synthesised abstract edge still carries a representable bound; the
    /// caller is expected to have already raised an `UnboundedReuse`
    /// warning in that case.
    pub fn as_edge_length(self) -> u32 {
        match self {
            Eru::Bounded(v) => v.saturating_add(1),
            Eru::Unbounded => u32::MAX,
        }
    }
}

fn min_l(rdlt: &Rdlt, edges: &[EdgeIx]) -> u32 {
    edges.iter().map(|&e| rdlt.graph.edge_data(e).l).min().unwrap_or(0)
}

/// Edges internal to a subgraph: both endpoints are members.
pub fn internal_edges(rdlt: &Rdlt, members: &AHashSet<VertexIx>) -> AHashSet<EdgeIx> {
    rdlt.graph
        .edges()
        .filter(|&e| {
            let (from, to) = rdlt.graph.edge_endpoints(e);
            members.contains(&from) && members.contains(&to)
        })
        .collect()
}

/// The pseudocritical arc set of a cycle: edges of the cycle that belong to
/// no RBS subgraph at all, of minimum `L` among those. Empty if every edge
/// of the cycle is internal to some RBS.
fn pseudocritical_arcs(rdlt: &Rdlt, cycle: &[EdgeIx], any_rbs_internal: &AHashSet<EdgeIx>) -> Vec<EdgeIx> {
    let candidates: Vec<EdgeIx> = cycle.iter().copied().filter(|e| !any_rbs_internal.contains(e)).collect();
    if candidates.is_empty() {
        return Vec::new();
    }
    let min = min_l(rdlt, &candidates);
    candidates.into_iter().filter(|&e| rdlt.graph.edge_data(e).l == min).collect()
}

/// `RU'(x,y)` for every edge internal to this RBS: the loop-safety-capped
/// reusability of each internal edge.
fn ru_prime_map(rdlt: &Rdlt, internal: &AHashSet<EdgeIx>, cycles_in_b: &[Vec<EdgeIx>]) -> ahash::AHashMap<EdgeIx, u32> {
    let mut ru = ahash::AHashMap::new();
    for &e in internal {
        let mut total = 0u32;
        for cycle in cycles_in_b {
            if cycle.contains(&e) {
                total = total.saturating_add(min_l(rdlt, cycle));
            }
        }
        let capped = total.min(rdlt.graph.edge_data(e).l);
        ru.insert(e, capped);
    }
    ru
}

/// The `L` of an in-bridge's arc into the RBS interior: the minimum `L`
/// among its internal outgoing edges, falling back to the minimum `L`
/// among its incoming bridge edges if it has none (a bare in-bridge with
/// no further interior hop).
fn in_bridge_length(rdlt: &Rdlt, b: VertexIx, members: &AHashSet<VertexIx>) -> u32 {
    let internal_out: Vec<u32> = rdlt
        .graph
        .outgoing(b)
        .iter()
        .filter(|&&e| {
            let (_, to) = rdlt.graph.edge_endpoints(e);
            members.contains(&to)
        })
        .map(|&e| rdlt.graph.edge_data(e).l)
        .collect();
    if let Some(m) = internal_out.iter().min() {
        return *m;
    }
    rdlt.graph
        .incoming(b)
        .iter()
        .filter(|&&e| {
            let (from, _) = rdlt.graph.edge_endpoints(e);
            !members.contains(&from)
        })
        .map(|&e| rdlt.graph.edge_data(e).l)
        .min()
        .unwrap_or(1)
}

/// Computes eRU for one candidate abstract path whose hops (in the
/// original RDLT's edge arena) lie inside RBS `members`.
#[allow(clippy::too_many_arguments)]
pub fn expanded_reusability(
    rdlt: &Rdlt,
    all_cycles: &[Vec<EdgeIx>],
    any_rbs_internal: &AHashSet<EdgeIx>,
    members: &AHashSet<VertexIx>,
    in_bridges: &[VertexIx],
    path_hops: &[EdgeIx],
) -> Eru {
    let internal = internal_edges(rdlt, members);
    let cycles_in_b: Vec<Vec<EdgeIx>> = all_cycles.iter().filter(|k| k.iter().all(|e| internal.contains(e))).cloned().collect();
    let ru_prime = ru_prime_map(rdlt, &internal, &cycles_in_b);

    let path_ru = path_hops
        .iter()
        .filter(|e| internal.contains(e))
        .filter_map(|e| ru_prime.get(e).copied())
        .min()
        .unwrap_or(0);

    let mut sum: u32 = 0;
    for &b in in_bridges {
        let crossing_cycle = all_cycles.iter().find(|cycle| {
            let touches_bridge = cycle.iter().any(|&e| {
                let (from, to) = rdlt.graph.edge_endpoints(e);
                from == b || to == b
            });
            let touches_path = cycle.iter().any(|e| path_hops.contains(e));
            touches_bridge && touches_path
        });

        match crossing_cycle {
            Some(cycle) => {
                let pca = pseudocritical_arcs(rdlt, cycle, any_rbs_internal);
                if pca.is_empty() {
                    return Eru::Unbounded;
                }
                let l_pca = min_l(rdlt, &pca);
                let l_b = in_bridge_length(rdlt, b, members);
                sum = sum.saturating_add(l_b.min(l_pca));
            }
            None => sum = sum.saturating_add(1),
        }
    }

    Eru::Bounded(sum.saturating_mul(path_ru.saturating_add(1)))
}
