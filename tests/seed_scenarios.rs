use rdlt2pn::behavior::{self, SimConfig};
use rdlt2pn::mapper;
use rdlt2pn::preprocess;
use rdlt2pn::rdlt::{Edge, EdgeKind, Rdlt, Vertex, VertexKind, EPSILON};
use rdlt2pn::structural;

fn eps(l: u32) -> Edge {
    Edge::new(EPSILON, l, EdgeKind::Normal)
}

fn sigma(c: &str, l: u32) -> Edge {
    Edge::new(c, l, EdgeKind::Normal)
}

fn controller(id: &str, rdlt: &mut Rdlt) {
    rdlt.add_vertex(id, Vertex::new(VertexKind::Controller, "", false)).unwrap();
}

/// Scenario 1: two-vertex ε-chain `x -> y`.
#[test]
fn two_vertex_epsilon_chain_is_classically_sound() {
    let mut rdlt = Rdlt::new();
    controller("x", &mut rdlt);
    controller("y", &mut rdlt);
    rdlt.add_edge("x", "y", eps(1)).unwrap();

    let (preprocessed, warnings) = preprocess::run(&rdlt, true).unwrap();
    assert!(warnings.is_empty());

    let mapped = mapper::map(&preprocessed.combined);
    let net = &mapped.net;

    assert!(net.transition_ix("Tx").is_some());
    assert!(net.transition_ix("Ty").is_some());
    assert!(net.transition_ix("Teps_y_x").is_some());

    let pym = net.place(net.place_ix("Pym").expect("Pym exists"));
    assert!(pym.is_traversed);

    let checked = net.place(net.place_ix("Peps_y_x").expect("checked place exists"));
    assert!(checked.is_checked);

    let aux = net.place(net.place_ix("Peps_aux_Teps_y_x").expect("aux place exists"));
    assert!(aux.is_auxiliary);
    assert_eq!(aux.tokens, 1);

    let pim = net.place(net.place_ix("Pim").expect("Pim exists"));
    assert!(pim.is_global_source);
    assert_eq!(pim.tokens, 1);

    let po = net.place(net.place_ix("Po").expect("Po exists"));
    assert!(po.is_global_sink);

    let report = behavior::analyse(net, SimConfig::default());
    assert_eq!(report.overall_soundness, behavior::Soundness::Classical);
}

/// Scenario 2: three-way split without an OR-join.
#[test]
fn three_way_split_without_or_join_creates_split_place_and_join() {
    let mut rdlt = Rdlt::new();
    for id in ["w", "x", "y", "z"] {
        controller(id, &mut rdlt);
    }
    rdlt.add_edge("w", "x", eps(1)).unwrap();
    rdlt.add_edge("w", "y", eps(1)).unwrap();
    rdlt.add_edge("x", "z", sigma("a", 1)).unwrap();
    rdlt.add_edge("y", "z", sigma("b", 1)).unwrap();

    let (preprocessed, _) = preprocess::run(&rdlt, false).unwrap();
    let mapped = mapper::map(&preprocessed.combined);
    let net = &mapped.net;

    assert!(net.place_ix("Pwsplit").is_some());

    let checked_count = net.places().iter().filter(|p| p.is_checked).count();
    assert_eq!(checked_count, 2);

    assert!(net.transition_ix("TJz").is_some());
}

/// Scenario 5: a mix-join receiving one ε-edge and one Σ-edge.
#[test]
fn mix_join_wires_unconstrained_place_and_reset_arc() {
    let mut rdlt = Rdlt::new();
    for id in ["w", "x", "z"] {
        controller(id, &mut rdlt);
    }
    rdlt.add_edge("w", "z", eps(1)).unwrap();
    rdlt.add_edge("x", "z", sigma("a", 1)).unwrap();

    let (preprocessed, _) = preprocess::run(&rdlt, false).unwrap();
    let mapped = mapper::map(&preprocessed.combined);
    let net = &mapped.net;

    let unc = net.place(net.place_ix("Pa_eps").expect("unconstrained place exists"));
    assert!(unc.is_unconstrained);

    let pzm = net.place(net.place_ix("Pzm").expect("Pzm exists"));
    assert!(pzm.is_mix_join);
}

/// Universal invariant: a completed net never retains an abstract-typed arc,
/// and every transition has at least one incoming and one outgoing arc.
#[test]
fn completed_net_has_no_abstract_arcs_and_no_dangling_transitions() {
    let mut rdlt = Rdlt::new();
    controller("x", &mut rdlt);
    controller("y", &mut rdlt);
    rdlt.add_edge("x", "y", eps(1)).unwrap();

    let (preprocessed, _) = preprocess::run(&rdlt, true).unwrap();
    let mapped = mapper::map(&preprocessed.combined);
    let report = structural::analyse(&mapped.net);

    assert!(!mapped.net.arcs().iter().any(|a| a.kind == rdlt2pn::petri::ArcKind::Abstract));
    assert!(report.connectivity_details.source.is_some());
    assert!(report.connectivity_details.sink.is_some());
}

/// Boundary behaviour: an empty RDLT with no extension produces an empty
/// net without panicking.
#[test]
fn empty_rdlt_without_extension_yields_empty_net() {
    let rdlt = Rdlt::new();
    let (preprocessed, warnings) = preprocess::run(&rdlt, false).unwrap();
    assert!(warnings.is_empty());

    let mapped = mapper::map(&preprocessed.combined);
    assert_eq!(mapped.net.place_count(), 0);
    assert_eq!(mapped.net.transition_count(), 0);
}
