//! The RDLT and Petri Net payload types derive `Serialize`/`Deserialize`
//! (mirroring the donor's per-node/per-edge serde convention rather than a
//! whole-graph codec) so that an external HTTP layer can project them into
//! the JSON shapes described by the conversion API. These round-trips cover
//! that contract without reaching into the JSON parsing/validation concerns
//! that sit outside this crate.

use rdlt2pn::petri::{ArcKind, NodeRef, Place, Transition, TransitionRole};
use rdlt2pn::rdlt::{Edge, EdgeKind, Vertex, VertexKind, EPSILON};

#[test]
fn vertex_round_trips_through_json() {
    let mut v = Vertex::new(VertexKind::Controller, "entry point", false);
    v.is_in_bridge = true;
    v.rbs_group = Some("c1".into());

    let json = serde_json::to_string(&v).unwrap();
    let back: Vertex = serde_json::from_str(&json).unwrap();
    assert_eq!(back.kind, VertexKind::Controller);
    assert!(back.is_in_bridge);
    assert_eq!(back.rbs_group.as_deref(), Some("c1"));
}

#[test]
fn edge_round_trips_and_preserves_epsilon_marker() {
    let mut e = Edge::new(EPSILON, 3, EdgeKind::Abstract);
    e.concrete_path = Some(vec!["x".into(), "y".into(), "z".into()]);

    let json = serde_json::to_string(&e).unwrap();
    let back: Edge = serde_json::from_str(&json).unwrap();
    assert!(back.is_epsilon());
    assert_eq!(back.l, 3);
    assert_eq!(back.kind, EdgeKind::Abstract);
    assert_eq!(back.concrete_path, Some(vec!["x".to_string(), "y".to_string(), "z".to_string()]));
}

#[test]
fn petri_net_nodes_round_trip_through_json() {
    let mut place = Place::new("Pim");
    place.is_global_source = true;
    place.tokens = 1;
    let place_json = serde_json::to_string(&place).unwrap();
    let back: Place = serde_json::from_str(&place_json).unwrap();
    assert!(back.is_global_source);
    assert_eq!(back.tokens, 1);

    let transition = Transition { id: "Tx".into(), role: TransitionRole::Check, activities: None };
    let transition_json = serde_json::to_string(&transition).unwrap();
    let back_t: Transition = serde_json::from_str(&transition_json).unwrap();
    assert_eq!(back_t.role, TransitionRole::Check);

    let arc = rdlt2pn::petri::Arc { from: NodeRef::Place(0), to: NodeRef::Transition(1), kind: ArcKind::Reset, weight: 1 };
    let arc_json = serde_json::to_string(&arc).unwrap();
    let back_arc: rdlt2pn::petri::Arc = serde_json::from_str(&arc_json).unwrap();
    assert_eq!(back_arc.kind, ArcKind::Reset);
}
