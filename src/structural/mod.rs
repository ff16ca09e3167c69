//! Structural analyser: connectivity, counts, role-classified id lists and
//! an issue log over a completed Petri Net.

use crate::graph::Digraph;
use crate::petri::{ArcKind, NodeRef, PetriNet};
use ahash::AHashSet;

#[derive(Debug, Clone, Default)]
pub struct ConnectivityDetails {
    pub strongly_connected: bool,
    pub source: Option<String>,
    pub sink: Option<String>,
    pub unreached: Vec<String>,
    pub isolated_nodes: Vec<String>,
    pub auxiliary: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StructuralReport {
    pub issues: Vec<String>,
    pub connectivity_details: ConnectivityDetails,
    pub transitions_count: usize,
    pub places_count: usize,
    pub split_places: Vec<String>,
    pub checked_places: Vec<String>,
    pub traversed_places: Vec<String>,
    pub consensus_places: Vec<String>,
    pub unconstrained_places: Vec<String>,
    pub mix_join_places: Vec<String>,
}

fn node_id(place: bool, id: &str) -> String {
    if place {
        format!("P:{id}")
    } else {
        format!("T:{id}")
    }
}

/// The bipartite place/transition graph projected to an undirected
/// reachability structure: one edge per direction for every PN arc.
fn build_projection(net: &PetriNet) -> Digraph<String, (), ()> {
    let mut g: Digraph<String, (), ()> = Digraph::new();
    for p in net.places() {
        g.add_vertex(node_id(true, &p.id), ()).ok();
    }
    for t in net.transitions() {
        g.add_vertex(node_id(false, &t.id), ()).ok();
    }
    for arc in net.arcs() {
        let (from_id, to_id) = match (arc.from, arc.to) {
            (NodeRef::Place(p), NodeRef::Transition(t)) => (node_id(true, &net.place(p).id), node_id(false, &net.transition(t).id)),
            (NodeRef::Transition(t), NodeRef::Place(p)) => (node_id(false, &net.transition(t).id), node_id(true, &net.place(p).id)),
            _ => continue,
        };
        let a = g.index_of(&from_id).unwrap();
        let b = g.index_of(&to_id).unwrap();
        g.add_edge(a, b, ());
        g.add_edge(b, a, ());
    }
    g
}

fn check_invariant_issues(net: &PetriNet) -> Vec<String> {
    let mut issues = Vec::new();

    let source_count = net.places().iter().filter(|p| p.is_global_source).count();
    if source_count > 1 {
        issues.push(format!("expected at most one global source place, found {source_count}"));
    }
    let sink_count = net.places().iter().filter(|p| p.is_global_sink).count();
    if sink_count > 1 {
        issues.push(format!("expected at most one global sink place, found {sink_count}"));
    }
    let abstract_count = net.arcs().iter().filter(|a| a.kind == ArcKind::Abstract).count();
    if abstract_count > 0 {
        issues.push(format!("{abstract_count} abstract-typed arc(s) survived into the completed net"));
    }
    for (ix, t) in net.transitions().iter().enumerate() {
        if net.transition_in_arcs(ix).is_empty() {
            issues.push(format!("transition `{}` has no incoming arc", t.id));
        }
        if net.transition_out_arcs(ix).is_empty() {
            issues.push(format!("transition `{}` has no outgoing arc", t.id));
        }
    }
    for p in net.places() {
        if p.is_auxiliary && p.reset_target.is_none() {
            issues.push(format!("auxiliary place `{}` has no reset target", p.id));
        }
    }

    let consensus_groups: AHashSet<&str> = net.places().iter().filter(|p| p.is_consensus).filter_map(|p| p.rbs_group.as_deref()).collect();
    for group in &consensus_groups {
        let has_reset = net.transitions().iter().any(|t| t.id == format!("Trr_{group}"));
        if !has_reset {
            issues.push(format!("RBS `{group}` has a consensus place but no matching reset transition"));
        }
    }

    issues
}

pub fn analyse(net: &PetriNet) -> StructuralReport {
    let projection = build_projection(net);
    let components = projection.scc_tarjan();

    let has_any_arc = |vid: &str| -> bool {
        let ix = projection.index_of(&vid.to_string()).expect("projected node exists");
        !projection.outgoing(ix).is_empty() || !projection.incoming(ix).is_empty()
    };

    let connected_nodes: Vec<_> = projection.vertices().filter(|&v| !projection.outgoing(v).is_empty() || !projection.incoming(v).is_empty()).collect();
    let strongly_connected = !connected_nodes.is_empty()
        && components.iter().any(|c| {
            let set: AHashSet<_> = c.iter().collect();
            connected_nodes.iter().all(|v| set.contains(v))
        });

    let source = net.places().iter().find(|p| p.is_global_source).map(|p| p.id.clone());
    let sink = net.places().iter().find(|p| p.is_global_sink).map(|p| p.id.clone());

    let unreached: Vec<String> = if let Some(src) = &source {
        let src_ix = projection.index_of(&node_id(true, src)).expect("source node exists");
        let reached = projection.bfs(src_ix, |_| true);
        let reached_set: AHashSet<_> = reached.into_iter().collect();
        projection.vertices().filter(|v| !reached_set.contains(v)).map(|v| projection.key(v).clone()).collect()
    } else {
        Vec::new()
    };

    let isolated_nodes: Vec<String> = net
        .places()
        .iter()
        .map(|p| node_id(true, &p.id))
        .chain(net.transitions().iter().map(|t| node_id(false, &t.id)))
        .filter(|id| !has_any_arc(id))
        .collect();

    let auxiliary: Vec<String> = net.places().iter().filter(|p| p.is_auxiliary).map(|p| p.id.clone()).collect();

    let mut issues = check_invariant_issues(net);
    for node in &unreached {
        issues.push(format!("`{node}` is not reachable from the global source"));
    }

    StructuralReport {
        issues,
        connectivity_details: ConnectivityDetails { strongly_connected, source, sink, unreached, isolated_nodes, auxiliary: auxiliary.clone() },
        transitions_count: net.transition_count(),
        places_count: net.place_count(),
        split_places: net.places().iter().filter(|p| p.is_split).map(|p| p.id.clone()).collect(),
        checked_places: net.places().iter().filter(|p| p.is_checked).map(|p| p.id.clone()).collect(),
        traversed_places: net.places().iter().filter(|p| p.is_traversed).map(|p| p.id.clone()).collect(),
        consensus_places: net.places().iter().filter(|p| p.is_consensus).map(|p| p.id.clone()).collect(),
        unconstrained_places: net.places().iter().filter(|p| p.is_unconstrained).map(|p| p.id.clone()).collect(),
        mix_join_places: net.places().iter().filter(|p| p.is_mix_join).map(|p| p.id.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::petri::TransitionRole;

    #[test]
    fn isolated_place_is_reported() {
        let mut net = PetriNet::new();
        net.ensure_transition("Tx", TransitionRole::Check);
        net.ensure_place("Plonely");
        let report = analyse(&net);
        assert!(report.connectivity_details.isolated_nodes.iter().any(|n| n.contains("Plonely")));
    }
}
