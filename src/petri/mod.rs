//! The Petri Net model: places, transitions, typed arcs, and a
//! snapshot/revert marking facility.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionRole {
    Check,
    Traverse,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub role: TransitionRole,
    /// Comma-separated arc descriptors for trace extraction.
    pub activities: Option<String>,
}

/// A place's role tags. The specification calls these "one of", but the
/// mix-join rule (mapper step 5) layers `mix_join` on top of an existing
/// `traversed` place, so roles are kept as independent flags rather than a
/// single exclusive variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub tokens: u64,
    pub is_global_source: bool,
    pub is_global_sink: bool,
    pub is_split: bool,
    pub is_checked: bool,
    pub is_traversed: bool,
    pub is_auxiliary: bool,
    pub is_consensus: bool,
    pub is_unconstrained: bool,
    pub is_mix_join: bool,
    /// Transition id an auxiliary place resets into.
    pub reset_target: Option<String>,
    pub rbs_group: Option<String>,
}

impl Place {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    pub fn roles(&self) -> Vec<&'static str> {
        let mut roles = Vec::new();
        if self.is_global_source {
            roles.push("globalSource");
        }
        if self.is_global_sink {
            roles.push("globalSink");
        }
        if self.is_split {
            roles.push("split");
        }
        if self.is_checked {
            roles.push("checked");
        }
        if self.is_traversed {
            roles.push("traversed");
        }
        if self.is_auxiliary {
            roles.push("auxiliary");
        }
        if self.is_consensus {
            roles.push("consensus");
        }
        if self.is_unconstrained {
            roles.push("unconstrained");
        }
        if self.is_mix_join {
            roles.push("mixJoin");
        }
        roles
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcKind {
    Normal,
    Reset,
    /// Intermediate marker used only between mapper steps 1 and 4; must
    /// never survive into a completed net.
    Abstract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRef {
    Place(usize),
    Transition(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arc {
    pub from: NodeRef,
    pub to: NodeRef,
    pub kind: ArcKind,
    pub weight: u32,
}

/// A captured marking, restorable via [`PetriNet::revert_state`]. Calling
/// [`PetriNet::update_state`] twice without an intervening revert keeps
/// only the first snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    tokens: Vec<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct PetriNet {
    places: Vec<Place>,
    transitions: Vec<Transition>,
    arcs: Vec<Arc>,
    place_index: AHashMap<String, usize>,
    transition_index: AHashMap<String, usize>,
    place_out: Vec<Vec<usize>>,
    place_in: Vec<Vec<usize>>,
    transition_out: Vec<Vec<usize>>,
    transition_in: Vec<Vec<usize>>,
    snapshot: Option<Snapshot>,
}

impl PetriNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place_count(&self) -> usize {
        self.places.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn place_ix(&self, id: &str) -> Option<usize> {
        self.place_index.get(id).copied()
    }

    pub fn transition_ix(&self, id: &str) -> Option<usize> {
        self.transition_index.get(id).copied()
    }

    pub fn place(&self, ix: usize) -> &Place {
        &self.places[ix]
    }

    pub fn place_mut(&mut self, ix: usize) -> &mut Place {
        &mut self.places[ix]
    }

    pub fn transition(&self, ix: usize) -> &Transition {
        &self.transitions[ix]
    }

    pub fn transition_mut(&mut self, ix: usize) -> &mut Transition {
        &mut self.transitions[ix]
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn place_out_arcs(&self, ix: usize) -> &[usize] {
        &self.place_out[ix]
    }

    pub fn place_in_arcs(&self, ix: usize) -> &[usize] {
        &self.place_in[ix]
    }

    pub fn transition_out_arcs(&self, ix: usize) -> &[usize] {
        &self.transition_out[ix]
    }

    pub fn transition_in_arcs(&self, ix: usize) -> &[usize] {
        &self.transition_in[ix]
    }

    /// Get-or-create a place by id.
    pub fn ensure_place(&mut self, id: &str) -> usize {
        if let Some(&ix) = self.place_index.get(id) {
            return ix;
        }
        let ix = self.places.len();
        self.places.push(Place::new(id));
        self.place_out.push(Vec::new());
        self.place_in.push(Vec::new());
        self.place_index.insert(id.to_string(), ix);
        ix
    }

    /// Get-or-create a transition by id.
    pub fn ensure_transition(&mut self, id: &str, role: TransitionRole) -> usize {
        if let Some(&ix) = self.transition_index.get(id) {
            return ix;
        }
        let ix = self.transitions.len();
        self.transitions.push(Transition { id: id.to_string(), role, activities: None });
        self.transition_out.push(Vec::new());
        self.transition_in.push(Vec::new());
        self.transition_index.insert(id.to_string(), ix);
        ix
    }

    pub fn add_arc(&mut self, from: NodeRef, to: NodeRef, kind: ArcKind, weight: u32) {
        let ix = self.arcs.len();
        self.arcs.push(Arc { from, to, kind, weight });
        match (from, to) {
            (NodeRef::Place(p), NodeRef::Transition(t)) => {
                self.place_out[p].push(ix);
                self.transition_in[t].push(ix);
            }
            (NodeRef::Transition(t), NodeRef::Place(p)) => {
                self.transition_out[t].push(ix);
                self.place_in[p].push(ix);
            }
            _ => unreachable!("Petri Net arcs only connect places to transitions"),
        }
    }

    pub fn marking(&self) -> AHashMap<String, u64> {
        self.places.iter().map(|p| (p.id.clone(), p.tokens)).collect()
    }

    /// Captures the current marking if no snapshot is already held; a
    /// second call before [`revert_state`] is a no-op.
    pub fn update_state(&mut self) {
        if self.snapshot.is_none() {
            self.snapshot = Some(Snapshot { tokens: self.places.iter().map(|p| p.tokens).collect() });
        }
    }

    /// Restores the marking captured by [`update_state`] and discards the
    /// snapshot.
    pub fn revert_state(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            for (p, t) in self.places.iter_mut().zip(snapshot.tokens) {
                p.tokens = t;
            }
        }
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }
}
