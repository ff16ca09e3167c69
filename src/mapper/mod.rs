//! Structural mapper: rewrites a combined RDLT (Level-1 plus one Level-2
//! subgraph per reset-bound subsystem) into a Petri Net, in nine ordered
//! passes. Each pass only adds places, transitions and arcs; nothing
//! produced by an earlier pass is ever removed, except the transient
//! `Abstract`-tagged arcs consumed by pass 4.

mod alias;

use crate::graph::{EdgeIx, VertexIx};
use crate::petri::{ArcKind, NodeRef, PetriNet, TransitionRole};
use crate::rdlt::{EdgeKind, Rdlt, EPSILON};
use ahash::{AHashMap, AHashSet};

/// One structured line of the mapper's rewrite trace, surfaced to callers
/// that want to audit why a particular place or transition exists.
#[derive(Debug, Clone)]
pub struct MapLogEntry {
    pub step: u8,
    pub message: String,
}

pub struct MapOutput {
    pub net: PetriNet,
    pub log: Vec<MapLogEntry>,
}

fn check_transition_id(vid: &str) -> String {
    format!("T{vid}")
}

fn traversed_place_id(vid: &str) -> String {
    format!("P{vid}m")
}

fn split_place_id(vid: &str) -> String {
    format!("P{vid}split")
}

fn tj_transition_id(vid: &str) -> String {
    format!("TJ{vid}")
}

fn pj_place_id(vid: &str) -> String {
    format!("PJ{vid}")
}

struct Mapper<'a> {
    rdlt: &'a Rdlt,
    net: PetriNet,
    log: Vec<MapLogEntry>,
    split_place: AHashMap<String, usize>,
    traversed_place: AHashMap<String, usize>,
    tj_transition: AHashMap<String, usize>,
    pj_place: AHashMap<String, usize>,
    checked_place: AHashMap<(String, String), usize>,
    /// Σ checked places, keyed by `(alias, to)` rather than `(to, from)`:
    /// a distinct map from `checked_place` so a parallel ε/Σ edge pair
    /// between the same two vertices never lets pass 5 reuse pass 4's
    /// ε-gate place (or vice versa).
    sigma_checked_place: AHashMap<(String, String), usize>,
    aux_places: Vec<AuxPlace>,
    mix_join_place: AHashMap<String, usize>,
    alias: AHashMap<String, String>,
    eps_counter: AHashMap<(String, String), u32>,
    has_sink: bool,
}

/// Bookkeeping for a token-budget auxiliary place created in passes 3 or 4,
/// resolved into reset wiring during pass 8.
struct AuxPlace {
    place: usize,
    reset_target: usize,
    rbs_group: Option<String>,
    resettable_vertex: Option<VertexIx>,
}

impl<'a> Mapper<'a> {
    fn new(rdlt: &'a Rdlt) -> Self {
        Self {
            rdlt,
            net: PetriNet::new(),
            log: Vec::new(),
            split_place: AHashMap::new(),
            traversed_place: AHashMap::new(),
            tj_transition: AHashMap::new(),
            pj_place: AHashMap::new(),
            checked_place: AHashMap::new(),
            sigma_checked_place: AHashMap::new(),
            aux_places: Vec::new(),
            mix_join_place: AHashMap::new(),
            alias: AHashMap::new(),
            eps_counter: AHashMap::new(),
            has_sink: false,
        }
    }

    fn note(&mut self, step: u8, message: impl Into<String>) {
        self.log.push(MapLogEntry { step, message: message.into() });
    }

    fn id(&self, v: VertexIx) -> String {
        self.rdlt.graph.key(v).clone()
    }

    /// Human-readable stand-in for the wire an edge represents: its
    /// concrete path if it abstracts one, else the plain endpoint pair.
    fn edge_descriptor(&self, e: EdgeIx) -> String {
        let data = self.rdlt.graph.edge_data(e);
        if let Some(path) = &data.concrete_path {
            path.join("->")
        } else {
            let (from_ix, to_ix) = self.rdlt.graph.edge_endpoints(e);
            format!("{}->{}", self.id(from_ix), self.id(to_ix))
        }
    }

    /// The transition standing in for the source endpoint of an outgoing
    /// wire from `vid`: its split place if one exists, else its check
    /// transition directly.
    fn source_ref(&self, vid: &str) -> NodeRef {
        if let Some(&p) = self.split_place.get(vid) {
            NodeRef::Place(p)
        } else {
            NodeRef::Transition(self.net.transition_ix(&check_transition_id(vid)).expect("check transition exists"))
        }
    }

    // ---- Pass 1: check transitions ---------------------------------
    fn pass1_check_transitions(&mut self) {
        for v in self.rdlt.graph.vertices() {
            let id = self.id(v);
            let t_ix = self.net.ensure_transition(&check_transition_id(&id), TransitionRole::Check);
            let outgoing: Vec<_> = self.rdlt.graph.outgoing(v).iter().map(|&e| self.edge_descriptor(e)).collect();
            if !outgoing.is_empty() {
                self.net.transition_mut(t_ix).activities = Some(outgoing.join(","));
            }
        }
        self.note(1, format!("created {} check transitions", self.rdlt.graph.vertex_count()));
    }

    // ---- Pass 2: split places ---------------------------------------
    fn pass2_split_places(&mut self) {
        let mut count = 0;
        for v in self.rdlt.graph.vertices() {
            let classification = self.rdlt.classify_split_case1(v);
            if !classification.any() {
                continue;
            }
            let id = self.id(v);
            let t_ix = self.net.transition_ix(&check_transition_id(&id)).expect("check transition exists");
            let place_id = split_place_id(&id);
            let p_ix = self.net.ensure_place(&place_id);
            self.net.place_mut(p_ix).is_split = true;
            self.net.add_arc(NodeRef::Transition(t_ix), NodeRef::Place(p_ix), ArcKind::Normal, 1);
            self.split_place.insert(id, p_ix);
            count += 1;
        }
        self.note(2, format!("created {count} split places"));
    }

    // ---- Pass 3: traversed places, global sink, Σ-join transitions --
    fn pass3_traversed_places(&mut self) {
        for v in self.rdlt.graph.vertices() {
            if self.rdlt.graph.in_degree(v) == 0 {
                continue;
            }
            let id = self.id(v);
            let t_ix = self.net.transition_ix(&check_transition_id(&id)).expect("check transition exists");
            let p_ix = self.net.ensure_place(&traversed_place_id(&id));
            self.net.place_mut(p_ix).is_traversed = true;
            self.net.add_arc(NodeRef::Place(p_ix), NodeRef::Transition(t_ix), ArcKind::Normal, 1);
            self.traversed_place.insert(id.clone(), p_ix);

            if id == "o" {
                let po = self.net.ensure_place("Po");
                self.net.place_mut(po).is_global_sink = true;
                self.net.add_arc(NodeRef::Transition(t_ix), NodeRef::Place(po), ArcKind::Normal, 1);
                self.has_sink = true;
            }

            let sigma_in: Vec<_> = self
                .rdlt
                .graph
                .incoming(v)
                .iter()
                .filter(|&&e| !self.rdlt.graph.edge_data(e).is_epsilon())
                .copied()
                .collect();
            if sigma_in.is_empty() {
                continue;
            }
            let tj_ix = self.net.ensure_transition(&tj_transition_id(&id), TransitionRole::Traverse);
            self.tj_transition.insert(id.clone(), tj_ix);
            let sigma_descriptors: Vec<_> = sigma_in.iter().map(|&e| self.edge_descriptor(e)).collect();
            self.net.transition_mut(tj_ix).activities = Some(sigma_descriptors.join(","));
            let same_constraint = sigma_in.iter().all(|&e| self.rdlt.graph.edge_data(e).c == self.rdlt.graph.edge_data(sigma_in[0]).c);
            let budget: u32 = if same_constraint {
                sigma_in.iter().map(|&e| self.rdlt.graph.edge_data(e).l).sum()
            } else {
                sigma_in.iter().map(|&e| self.rdlt.graph.edge_data(e).l).min().unwrap_or(1)
            };
            let tj_id = tj_transition_id(&id);
            let rbs_group = self.rdlt.graph.data(v).rbs_group.clone();
            let pj_ix = self.net.ensure_place(&pj_place_id(&id));
            self.net.place_mut(pj_ix).is_auxiliary = true;
            self.net.place_mut(pj_ix).tokens = u64::from(budget);
            self.net.place_mut(pj_ix).reset_target = Some(tj_id);
            self.net.place_mut(pj_ix).rbs_group = rbs_group.clone();
            self.net.add_arc(NodeRef::Place(pj_ix), NodeRef::Transition(tj_ix), ArcKind::Normal, 1);
            self.net.add_arc(NodeRef::Transition(tj_ix), NodeRef::Place(p_ix), ArcKind::Normal, 1);
            self.pj_place.insert(id.clone(), pj_ix);
            self.aux_places.push(AuxPlace { place: pj_ix, reset_target: tj_ix, rbs_group, resettable_vertex: Some(v) });
        }
        self.note(3, "created traversed places, global sink and Σ-join transitions");
    }

    // ---- Pass 4: ε-edge traverse transitions -------------------------
    fn pass4_epsilon_transitions(&mut self) {
        let edges: Vec<_> = self.rdlt.graph.edges().filter(|&e| self.rdlt.graph.edge_data(e).is_epsilon()).collect();
        let mut count = 0;
        for e in edges {
            let (from_ix, to_ix) = self.rdlt.graph.edge_endpoints(e);
            let from = self.id(from_ix);
            let to = self.id(to_ix);
            let data = self.rdlt.graph.edge_data(e);
            let kind = data.kind;
            let l = data.l;

            let tr_id = if kind == EdgeKind::Abstract {
                let counter = self.eps_counter.entry((from.clone(), to.clone())).or_insert(0);
                *counter += 1;
                format!("Teps_{to}_{from}_{counter}")
            } else {
                format!("Teps_{to}_{from}")
            };
            let tr_ix = self.net.ensure_transition(&tr_id, TransitionRole::Traverse);
            let descriptor = self.edge_descriptor(e);
            self.net.transition_mut(tr_ix).activities = Some(descriptor);

            if self.split_place.contains_key(&from) {
                self.net.add_arc(self.source_ref(&from), NodeRef::Transition(tr_ix), ArcKind::Normal, 1);
            } else {
                let t_from = self.net.transition_ix(&check_transition_id(&from)).expect("check transition exists");
                let checked_id = format!("Peps_{to}_{from}");
                let checked_ix = *self.checked_place.entry((to.clone(), from.clone())).or_insert_with(|| {
                    let ix = self.net.ensure_place(&checked_id);
                    self.net.place_mut(ix).is_checked = true;
                    ix
                });
                self.net.add_arc(NodeRef::Transition(t_from), NodeRef::Place(checked_ix), ArcKind::Normal, 1);
                self.net.add_arc(NodeRef::Place(checked_ix), NodeRef::Transition(tr_ix), ArcKind::Normal, 1);
            }

            let aux_id = format!("Peps_aux_{tr_id}");
            let aux_ix = self.net.ensure_place(&aux_id);
            self.net.place_mut(aux_ix).is_auxiliary = true;
            self.net.place_mut(aux_ix).tokens = u64::from(l);
            self.net.place_mut(aux_ix).reset_target = Some(tr_id.clone());
            let rbs_group = self.rdlt.graph.data(to_ix).rbs_group.clone();
            self.net.place_mut(aux_ix).rbs_group = rbs_group.clone();
            self.net.add_arc(NodeRef::Place(aux_ix), NodeRef::Transition(tr_ix), ArcKind::Normal, 1);
            self.aux_places.push(AuxPlace { place: aux_ix, reset_target: tr_ix, rbs_group, resettable_vertex: Some(to_ix) });

            let p_to_m = self.net.ensure_place(&traversed_place_id(&to));
            self.net.add_arc(NodeRef::Transition(tr_ix), NodeRef::Place(p_to_m), ArcKind::Normal, 1);

            count += 1;
        }
        self.note(4, format!("created {count} ε traverse transitions"));
    }

    // ---- Pass 5: Σ checked places, mix-join wiring -------------------
    fn pass5_sigma_checked_places(&mut self) {
        let mut singles = Vec::new();
        let mut multis = Vec::new();
        let mut seen = AHashSet::new();
        for e in self.rdlt.graph.edges() {
            let c = self.rdlt.graph.edge_data(e).c.clone();
            if c == EPSILON || !seen.insert(c.clone()) {
                continue;
            }
            if c.chars().count() == 1 {
                singles.push(c);
            } else {
                multis.push(c);
            }
        }
        self.alias = alias::build_alias_map(singles, multis);

        let sigma_edges: Vec<_> = self.rdlt.graph.edges().filter(|&e| !self.rdlt.graph.edge_data(e).is_epsilon()).collect();
        let mut count = 0;
        for e in &sigma_edges {
            let (from_ix, to_ix) = self.rdlt.graph.edge_endpoints(*e);
            let from = self.id(from_ix);
            let to = self.id(to_ix);
            if self.split_place.contains_key(&from) {
                continue;
            }
            let c = self.rdlt.graph.edge_data(*e).c.clone();
            let alias = self.alias.get(&c).cloned().unwrap_or(c);
            let checked_id = format!("P{alias}_{to}");
            let t_from = self.net.transition_ix(&check_transition_id(&from)).expect("check transition exists");
            let tj_ix = self.tj_transition.get(&to).copied().expect("sigma target has a join transition");
            let checked_ix = *self.sigma_checked_place.entry((alias.clone(), to.clone())).or_insert_with(|| {
                let ix = self.net.ensure_place(&checked_id);
                self.net.place_mut(ix).is_checked = true;
                ix
            });
            self.net.add_arc(NodeRef::Transition(t_from), NodeRef::Place(checked_ix), ArcKind::Normal, 1);
            self.net.add_arc(NodeRef::Place(checked_ix), NodeRef::Transition(tj_ix), ArcKind::Normal, 1);
            count += 1;
        }

        // Mix-join: a vertex with both ε and Σ incoming edges.
        let mix_join_vertices: Vec<VertexIx> = self
            .rdlt
            .graph
            .vertices()
            .filter(|&v| {
                let incoming = self.rdlt.graph.incoming(v);
                let has_eps = incoming.iter().any(|&e| self.rdlt.graph.edge_data(e).is_epsilon());
                let has_sigma = incoming.iter().any(|&e| !self.rdlt.graph.edge_data(e).is_epsilon());
                has_eps && has_sigma
            })
            .collect();

        let to_id_opt = if self.net.transition_ix("To").is_some() { Some("o".to_string()) } else { None };
        for v in mix_join_vertices {
            let vid = self.id(v);
            let sigma_edge = self.rdlt.graph.incoming(v).iter().find(|&&e| !self.rdlt.graph.edge_data(e).is_epsilon()).copied();
            let c = sigma_edge.map(|e| self.rdlt.graph.edge_data(e).c.clone()).unwrap_or_default();
            let alias = self.alias.get(&c).cloned().unwrap_or(c);
            let place_id = format!("P{alias}_eps");
            let unc_ix = self.net.ensure_place(&place_id);
            self.net.place_mut(unc_ix).is_unconstrained = true;
            self.mix_join_place.insert(vid.clone(), unc_ix);

            for &e in self.rdlt.graph.incoming(v) {
                let (src_ix, _) = self.rdlt.graph.edge_endpoints(e);
                let src = self.id(src_ix);
                if self.rdlt.graph.edge_data(e).is_epsilon() {
                    continue;
                }
                let t_src = self.net.transition_ix(&check_transition_id(&src)).expect("check transition exists");
                self.net.add_arc(NodeRef::Transition(t_src), NodeRef::Place(unc_ix), ArcKind::Normal, 1);
            }
            for e in self.rdlt.graph.edges() {
                let (from_ix, to_ix) = self.rdlt.graph.edge_endpoints(e);
                if to_ix != v || !self.rdlt.graph.edge_data(e).is_epsilon() {
                    continue;
                }
                let from = self.id(from_ix);
                let candidate_plain = format!("Teps_{vid}_{from}");
                if let Some(tr_ix) = self.net.transition_ix(&candidate_plain) {
                    self.net.add_arc(NodeRef::Place(unc_ix), NodeRef::Transition(tr_ix), ArcKind::Normal, 1);
                    self.net.add_arc(NodeRef::Transition(tr_ix), NodeRef::Place(unc_ix), ArcKind::Normal, 1);
                }
                let mut idx = 1;
                loop {
                    let candidate = format!("Teps_{vid}_{from}_{idx}");
                    match self.net.transition_ix(&candidate) {
                        Some(tr_ix) => {
                            self.net.add_arc(NodeRef::Place(unc_ix), NodeRef::Transition(tr_ix), ArcKind::Normal, 1);
                            self.net.add_arc(NodeRef::Transition(tr_ix), NodeRef::Place(unc_ix), ArcKind::Normal, 1);
                            idx += 1;
                        }
                        None => break,
                    }
                }
            }

            if let Some(to_id) = &to_id_opt {
                let to_t = self.net.transition_ix(&check_transition_id(to_id)).expect("global sink check transition exists");
                self.net.add_arc(NodeRef::Place(unc_ix), NodeRef::Transition(to_t), ArcKind::Reset, 1);
            }

            if let Some(&pm_ix) = self.traversed_place.get(&vid) {
                self.net.place_mut(pm_ix).is_mix_join = true;
                let t_v = self.net.transition_ix(&check_transition_id(&vid)).expect("check transition exists");
                self.net.add_arc(NodeRef::Place(pm_ix), NodeRef::Transition(t_v), ArcKind::Reset, 1);
                let clone_id = format!("{vid}'");
                if let Some(t_clone) = self.net.transition_ix(&check_transition_id(&clone_id)) {
                    self.net.add_arc(NodeRef::Place(pm_ix), NodeRef::Transition(t_clone), ArcKind::Reset, 1);
                }
            }
        }
        self.note(5, format!("created {count} Σ checked places"));
    }

    // ---- Pass 6: consensus places and reset transitions per RBS -----
    fn pass6_consensus_and_reset(&mut self) {
        let mut groups: AHashMap<String, Vec<VertexIx>> = AHashMap::new();
        for v in self.rdlt.graph.vertices() {
            let data = self.rdlt.graph.data(v);
            if !data.is_out_bridge {
                continue;
            }
            if let Some(group) = &data.rbs_group {
                groups.entry(group.clone()).or_default().push(v);
            }
        }

        for (center, out_bridges) in groups {
            let cons_id = format!("Pcons_{center}");
            let cons_ix = self.net.ensure_place(&cons_id);
            self.net.place_mut(cons_ix).is_consensus = true;
            self.net.place_mut(cons_ix).rbs_group = Some(center.clone());

            let trr_id = format!("Trr_{center}");
            let trr_ix = self.net.ensure_transition(&trr_id, TransitionRole::Reset);
            self.net.add_arc(NodeRef::Place(cons_ix), NodeRef::Transition(trr_ix), ArcKind::Normal, 1);
            self.net.add_arc(NodeRef::Place(cons_ix), NodeRef::Transition(trr_ix), ArcKind::Reset, 1);

            for n in out_bridges {
                let nid = self.id(n);
                let clone_t = check_transition_id(&format!("{nid}'"));
                if let Some(t_ix) = self.net.transition_ix(&clone_t) {
                    self.net.add_arc(NodeRef::Transition(t_ix), NodeRef::Place(cons_ix), ArcKind::Normal, 1);
                }
            }
            self.note(6, format!("wired consensus place for RBS `{center}`"));
        }
    }

    // ---- Pass 7: Level-1/Level-2 bridge linkage ----------------------
    fn pass7_bridge_linkage(&mut self) {
        let bridge_vertices: Vec<VertexIx> = self.rdlt.graph.vertices().filter(|&v| !self.id(v).ends_with('\'')).filter(|&v| self.rdlt.graph.data(v).is_in_bridge || self.rdlt.graph.data(v).is_out_bridge).collect();

        for v in bridge_vertices {
            let vid = self.id(v);
            let data = self.rdlt.graph.data(v);
            let clone_id = format!("{vid}'");
            let clone_t = self.net.transition_ix(&check_transition_id(&clone_id));

            if data.is_in_bridge {
                if let (Some(&pm_ix), Some(clone_t_ix)) = (self.traversed_place.get(&vid), clone_t) {
                    self.net.add_arc(NodeRef::Place(pm_ix), NodeRef::Transition(clone_t_ix), ArcKind::Normal, 1);
                }
            }
            if data.is_out_bridge {
                if let Some(clone_t_ix) = clone_t {
                    let t_ix = self.net.transition_ix(&check_transition_id(&vid)).expect("check transition exists");
                    let outgoing: Vec<_> = self.net.transition_out_arcs(t_ix).to_vec();
                    for arc_ix in outgoing {
                        let arc = self.net.arcs()[arc_ix].clone();
                        self.net.add_arc(NodeRef::Transition(clone_t_ix), arc.to, arc.kind, arc.weight);
                    }
                }
            }
        }
        self.note(7, "linked Level-1 bridges to their Level-2 mirrors");
    }

    // ---- Pass 8: auxiliary place reset topology ----------------------
    fn pass8_auxiliary_resets(&mut self) {
        let to_t = self.net.transition_ix(&check_transition_id("o"));
        let aux = std::mem::take(&mut self.aux_places);
        for a in &aux {
            if let Some(to_t_ix) = to_t {
                self.net.add_arc(NodeRef::Place(a.place), NodeRef::Transition(to_t_ix), ArcKind::Reset, 1);
            }
            if let Some(group) = &a.rbs_group {
                if let Some(trr_ix) = self.net.transition_ix(&format!("Trr_{group}")) {
                    self.net.add_arc(NodeRef::Place(a.place), NodeRef::Transition(trr_ix), ArcKind::Reset, 1);
                    let budget = self.net.place(a.place).tokens;
                    self.net.add_arc(NodeRef::Transition(trr_ix), NodeRef::Place(a.place), ArcKind::Normal, budget.min(u32::MAX as u64) as u32);
                }
            }
            let skip = a
                .resettable_vertex
                .map(|v| self.rdlt.has_looping_arc(v) || self.rdlt.graph.out_degree(v) == 0)
                .unwrap_or(false);
            if !skip {
                self.net.add_arc(NodeRef::Place(a.place), NodeRef::Transition(a.reset_target), ArcKind::Reset, 1);
            }
        }
        self.aux_places = aux;
        self.note(8, format!("wired reset topology for {} auxiliary places", self.aux_places.len()));
    }

    // ---- Pass 9: global source -----------------------------------------
    fn pass9_global_source(&mut self) {
        let target = if self.rdlt.vertex_ix("i").is_some() {
            Some("i".to_string())
        } else {
            let sources = self.rdlt.sources();
            let top_level: Vec<_> = sources.into_iter().filter(|&v| !self.id(v).ends_with('\'')).collect();
            if top_level.len() == 1 {
                Some(self.id(top_level[0]))
            } else {
                None
            }
        };

        if let Some(vid) = target {
            let t_ix = self.net.transition_ix(&check_transition_id(&vid)).expect("check transition exists");
            let pim = self.net.ensure_place("Pim");
            self.net.place_mut(pim).is_global_source = true;
            self.net.place_mut(pim).tokens = 1;
            self.net.add_arc(NodeRef::Place(pim), NodeRef::Transition(t_ix), ArcKind::Normal, 1);
            self.note(9, format!("created global source place wired to `{vid}`"));
        } else {
            self.note(9, "no unambiguous source vertex; global source place omitted");
        }
    }

    fn run(mut self) -> MapOutput {
        self.pass1_check_transitions();
        self.pass2_split_places();
        self.pass3_traversed_places();
        self.pass4_epsilon_transitions();
        self.pass5_sigma_checked_places();
        self.pass6_consensus_and_reset();
        self.pass7_bridge_linkage();
        self.pass8_auxiliary_resets();
        self.pass9_global_source();
        MapOutput { net: self.net, log: self.log }
    }
}

/// Rewrites a combined RDLT (Level-1 graph plus one Level-2 subgraph per
/// reset-bound subsystem, as produced by the preprocessor) into a Petri Net.
pub fn map(rdlt: &Rdlt) -> MapOutput {
    Mapper::new(rdlt).run()
}
