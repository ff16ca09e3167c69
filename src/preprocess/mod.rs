//! EVSA: the two-pass Expanded Vertex Simplification Algorithm.
//!
//! Pass R1 builds the Level-1 simplified RDLT; pass R2 builds one Level-2
//! subgraph per reset-bound subsystem and synthesises, on Level-1, one
//! abstract arc per enumerated concrete path with its eRU-derived bound.

pub mod eru;

use crate::error::{Error, Result, Warning};
use crate::graph::{EdgeIx, VertexIx};
use crate::rdlt::{Edge, EdgeKind, Rdlt, Vertex, VertexKind, EPSILON};
use ahash::{AHashMap, AHashSet};
use eru::{expanded_reusability, internal_edges};

/// One reset-bound subsystem, fully resolved against the source RDLT.
struct RbsInfo {
    center_id: String,
    center: VertexIx,
    members: AHashSet<VertexIx>,
    in_bridges: Vec<VertexIx>,
    out_bridges: Vec<VertexIx>,
}

/// The output of [`run`]: the Level-1 graph, one Level-2 subgraph per RBS,
/// and the combined graph the structural mapper consumes.
pub struct Preprocessed {
    pub level1: Rdlt,
    pub level2: Vec<(String, Rdlt)>,
    pub combined: Rdlt,
}

pub fn run(rdlt: &Rdlt, extend: bool) -> Result<(Preprocessed, Vec<Warning>)> {
    let mut warnings = Vec::new();

    let rbs_infos: Vec<RbsInfo> = rdlt
        .reset_centers()
        .into_iter()
        .map(|center| {
            let members = rdlt.vertices_in_rbs(center);
            let in_bridges: Vec<VertexIx> = members.iter().copied().filter(|&v| rdlt.is_in_bridge(v, &members)).collect();
            let out_bridges: Vec<VertexIx> = members.iter().copied().filter(|&v| rdlt.is_out_bridge(v, &members)).collect();
            RbsInfo { center_id: rdlt.graph.key(center).clone(), center, members, in_bridges, out_bridges }
        })
        .collect();

    let mut rbs_of_vertex: AHashMap<VertexIx, usize> = AHashMap::new();
    for (idx, info) in rbs_infos.iter().enumerate() {
        for &v in &info.members {
            rbs_of_vertex.entry(v).or_insert(idx);
        }
    }

    let any_rbs_internal: AHashSet<EdgeIx> = rbs_infos.iter().flat_map(|info| internal_edges(rdlt, &info.members)).collect();
    let all_cycles = rdlt.graph.simple_cycles_johnson();

    // ---- Pass R1: Level-1 -------------------------------------------------
    let mut level1 = Rdlt::new();
    let survives = |v: VertexIx| -> bool {
        match rbs_of_vertex.get(&v) {
            None => true,
            Some(&idx) => rbs_infos[idx].in_bridges.contains(&v) || rbs_infos[idx].out_bridges.contains(&v),
        }
    };

    for v in rdlt.graph.vertices() {
        if !survives(v) {
            continue;
        }
        let id = rdlt.graph.key(v).clone();
        let rbs_idx = rbs_of_vertex.get(&v).copied();
        let mut vertex = Vertex::new(VertexKind::Controller, rdlt.graph.data(v).label.clone(), false);
        if let Some(idx) = rbs_idx {
            vertex.is_in_bridge = rbs_infos[idx].in_bridges.contains(&v);
            vertex.is_out_bridge = rbs_infos[idx].out_bridges.contains(&v);
            vertex.rbs_group = Some(rbs_infos[idx].center_id.clone());
        }
        level1.add_vertex(id, vertex)?;
    }

    for e in rdlt.graph.edges() {
        let (from, to) = rdlt.graph.edge_endpoints(e);
        if any_rbs_internal.contains(&e) {
            continue;
        }
        if !survives(from) || !survives(to) {
            continue;
        }
        let src = rdlt.graph.data(from);
        let dst = rdlt.graph.data(to);
        if src.kind.is_object() && dst.kind.is_object() {
            continue;
        }
        let data = rdlt.graph.edge_data(e);
        level1.add_edge(rdlt.graph.key(from), rdlt.graph.key(to), Edge::new(data.c.clone(), data.l, EdgeKind::Normal))?;
    }

    // ---- Pass R2: Level-2 per RBS + abstract arcs on Level-1 --------------
    let mut level2 = Vec::new();
    for info in &rbs_infos {
        let mut sub = Rdlt::new();
        for &v in &info.members {
            let id = rdlt.graph.key(v).clone();
            let mut vertex = rdlt.graph.data(v).clone();
            vertex.is_level2_center = v == info.center;
            vertex.is_in_bridge = info.in_bridges.contains(&v);
            vertex.is_out_bridge = info.out_bridges.contains(&v);
            vertex.rbs_group = Some(info.center_id.clone());
            sub.add_vertex(id, vertex)?;
        }
        for e in internal_edges(rdlt, &info.members) {
            let (from, to) = rdlt.graph.edge_endpoints(e);
            let data = rdlt.graph.edge_data(e).clone();
            sub.add_edge(rdlt.graph.key(from), rdlt.graph.key(to), data)?;
        }

        for (from_id, to_id, hops) in enumerate_bucket_paths(&sub, rdlt, info) {
            let eru = expanded_reusability(rdlt, &all_cycles, &any_rbs_internal, &info.members, &info.in_bridges, &hops);
            if matches!(eru, eru::Eru::Unbounded) {
                warnings.push(Warning::UnboundedReuse {
                    rbs_center: info.center_id.clone(),
                    path_from: from_id.clone(),
                    path_to: to_id.clone(),
                });
            }
            let l = eru.as_edge_length();
            let path_ids: Vec<String> = hops
                .iter()
                .map(|&e| {
                    let (f, _) = rdlt.graph.edge_endpoints(e);
                    rdlt.graph.key(f).clone()
                })
                .chain(std::iter::once(to_id.clone()))
                .collect();
            let mut abstract_edge = Edge::new(EPSILON, l, EdgeKind::Abstract);
            abstract_edge.concrete_path = Some(path_ids);
            if level1.vertex_ix(&from_id).is_some() && level1.vertex_ix(&to_id).is_some() {
                level1.add_edge(&from_id, &to_id, abstract_edge)?;
            }
        }

        level2.push((info.center_id.clone(), sub));
    }

    // ---- Extension: dummy source/sink --------------------------------
    if extend {
        extend_with_terminals(&mut level1)?;
    }

    // ---- Combined RDLT --------------------------------------------------
    let combined = build_combined(&level1, &level2)?;

    Ok((Preprocessed { level1, level2, combined }, warnings))
}

/// Enumerate the four concrete-path buckets for one RBS inside its Level-2
/// subgraph: in-bridge->out-bridge, out-bridge->in-bridge, in-bridge
/// self-loop, out-bridge self-loop.
fn enumerate_bucket_paths(sub: &Rdlt, rdlt: &Rdlt, info: &RbsInfo) -> Vec<(String, String, Vec<EdgeIx>)> {
    let mut paths = Vec::new();
    let sub_ix = |v: VertexIx| sub.vertex_ix(rdlt.graph.key(v)).expect("bridge present in level2 subgraph");
    let to_original_hops = |hops: &[EdgeIx]| -> Vec<EdgeIx> {
        hops.iter()
            .map(|&e| {
                let (f, t) = sub.graph.edge_endpoints(e);
                let fk = sub.graph.key(f);
                let tk = sub.graph.key(t);
                let data = sub.graph.edge_data(e);
                rdlt.graph
                    .outgoing(rdlt.vertex_ix(fk).unwrap())
                    .iter()
                    .copied()
                    .find(|&oe| {
                        let (_, oto) = rdlt.graph.edge_endpoints(oe);
                        rdlt.graph.key(oto) == tk && rdlt.graph.edge_data(oe).c == data.c && rdlt.graph.edge_data(oe).l == data.l
                    })
                    .expect("level2 edge has a matching original edge")
            })
            .collect()
    };

    for &b1 in &info.in_bridges {
        for &b2 in &info.out_bridges {
            if b1 == b2 {
                continue;
            }
            for hops in sub.graph.simple_paths(sub_ix(b1), sub_ix(b2)) {
                paths.push((rdlt.graph.key(b1).clone(), rdlt.graph.key(b2).clone(), to_original_hops(&hops)));
            }
        }
    }
    for &b1 in &info.out_bridges {
        for &b2 in &info.in_bridges {
            if b1 == b2 {
                continue;
            }
            for hops in sub.graph.simple_paths(sub_ix(b1), sub_ix(b2)) {
                paths.push((rdlt.graph.key(b1).clone(), rdlt.graph.key(b2).clone(), to_original_hops(&hops)));
            }
        }
    }

    let bridges: AHashSet<VertexIx> = info.in_bridges.iter().chain(info.out_bridges.iter()).copied().collect();
    for cycle in sub.graph.simple_cycles_johnson() {
        let cycle_vertices: Vec<VertexIx> = {
            let mut vs = Vec::new();
            for &e in &cycle {
                let (f, _) = sub.graph.edge_endpoints(e);
                vs.push(f);
            }
            vs
        };
        for (pos, &v) in cycle_vertices.iter().enumerate() {
            let original_v = rdlt.vertex_ix(sub.graph.key(v)).unwrap();
            if !bridges.contains(&original_v) {
                continue;
            }
            let interior: Vec<VertexIx> = cycle_vertices
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != pos)
                .map(|(_, &x)| x)
                .collect();
            let has_other_bridge = interior.iter().any(|&x| {
                let ox = rdlt.vertex_ix(sub.graph.key(x)).unwrap();
                bridges.contains(&ox)
            });
            if has_other_bridge {
                continue;
            }
            let rotated: Vec<EdgeIx> = cycle[pos..].iter().chain(cycle[..pos].iter()).copied().collect();
            if info.in_bridges.contains(&original_v) {
                paths.push((rdlt.graph.key(original_v).clone(), rdlt.graph.key(original_v).clone(), to_original_hops(&rotated)));
            }
            if info.out_bridges.contains(&original_v) {
                paths.push((rdlt.graph.key(original_v).clone(), rdlt.graph.key(original_v).clone(), to_original_hops(&rotated)));
            }
        }
    }

    paths
}

fn extend_with_terminals(level1: &mut Rdlt) -> Result<()> {
    let sources = level1.sources();
    let sinks = level1.sinks();
    if sources.is_empty() || sinks.is_empty() {
        return Err(Error::InvalidTopology("extension requested but Level-1 graph has no source or no sink".into()));
    }
    let source_ids: Vec<String> = sources.iter().map(|&v| level1.graph.key(v).clone()).collect();
    let sink_ids: Vec<String> = sinks.iter().map(|&v| level1.graph.key(v).clone()).collect();

    level1.add_vertex("i", Vertex::new(VertexKind::Controller, "dummy source", false))?;
    level1.add_vertex("o", Vertex::new(VertexKind::Controller, "dummy sink", false))?;

    for id in &source_ids {
        level1.add_edge("i", id, Edge::new(EPSILON, 1, EdgeKind::Normal))?;
    }
    for id in &sink_ids {
        level1.add_edge(id, "o", Edge::new(format!("{id}_o"), 1, EdgeKind::Normal))?;
    }
    Ok(())
}

fn build_combined(level1: &Rdlt, level2: &[(String, Rdlt)]) -> Result<Rdlt> {
    let mut combined = Rdlt::new();
    for v in level1.graph.vertices() {
        combined.add_vertex(level1.graph.key(v).clone(), level1.graph.data(v).clone())?;
    }
    for e in level1.graph.edges() {
        let (from, to) = level1.graph.edge_endpoints(e);
        combined.add_edge(level1.graph.key(from), level1.graph.key(to), level1.graph.edge_data(e).clone())?;
    }

    for (_, sub) in level2 {
        for v in sub.graph.vertices() {
            let id = format!("{}'", sub.graph.key(v));
            if combined.vertex_ix(&id).is_some() {
                continue;
            }
            combined.add_vertex(id, sub.graph.data(v).clone())?;
        }
        for e in sub.graph.edges() {
            let (from, to) = sub.graph.edge_endpoints(e);
            let from_id = format!("{}'", sub.graph.key(from));
            let to_id = format!("{}'", sub.graph.key(to));
            combined.add_edge(&from_id, &to_id, sub.graph.edge_data(e).clone())?;
        }
    }
    Ok(combined)
}
