//! Behavioural analyser: a single-threaded, deterministic depth-first
//! enumeration of concurrent firing sequences over a frozen Petri Net,
//! followed by per-sequence and aggregate termination/soundness
//! classification.

use crate::petri::{ArcKind, NodeRef, PetriNet};
use ahash::{AHashMap, AHashSet};

/// Bounds the depth of the firing-sequence search; a run that never
/// deadlocks is cut off here rather than explored forever.
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    pub max_steps: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { max_steps: 1000 }
    }
}

#[derive(Debug, Clone)]
pub struct FiringStep {
    pub marking: AHashMap<String, u64>,
    pub fired: Vec<String>,
    /// The set of transitions enabled under this step's marking, written in
    /// once the next step (or the run's end) has been computed.
    pub enabled_transitions: Vec<String>,
    pub log: String,
}

#[derive(Debug, Clone)]
pub struct Sequence {
    pub steps: Vec<FiringStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationType {
    None,
    Proper,
    Weak,
    Option,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateTermination {
    Classical,
    Relaxed,
    Lazy,
    Easy,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Soundness {
    Classical,
    Weak,
    Relaxed,
    Easy,
    Lazy,
    NoConclusion,
}

#[derive(Debug, Clone)]
pub struct PerSequenceResult {
    pub sequence_index: usize,
    pub option: bool,
    pub termination_checks: String,
    pub termination_type: TerminationType,
    pub firing_sequence: Vec<String>,
    pub activity_extraction: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BehaviouralReport {
    pub simulation_results: Vec<Sequence>,
    pub per_sequence_results: Vec<PerSequenceResult>,
    pub overall_liveness: bool,
    pub overall_termination: AggregateTermination,
    pub overall_soundness: Soundness,
}

fn non_auxiliary_normal_inputs(net: &PetriNet, t: usize) -> Vec<usize> {
    net.transition_in_arcs(t)
        .iter()
        .filter_map(|&aix| {
            let arc = &net.arcs()[aix];
            if arc.kind != ArcKind::Normal {
                return None;
            }
            match arc.from {
                NodeRef::Place(p) if !net.place(p).is_auxiliary => Some(p),
                _ => None,
            }
        })
        .collect()
}

fn find(parent: &mut AHashMap<usize, usize>, x: usize) -> usize {
    let p = *parent.entry(x).or_insert(x);
    if p == x {
        x
    } else {
        let root = find(parent, p);
        parent.insert(x, root);
        root
    }
}

fn union(parent: &mut AHashMap<usize, usize>, a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent.insert(ra, rb);
    }
}

/// Partitions enabled transitions into conflict groups and expands the
/// Cartesian product of split-groups into one firing set per branch.
fn compute_branches(net: &PetriNet, enabled: &[usize]) -> Vec<Vec<usize>> {
    let inputs: Vec<(usize, Vec<usize>)> = enabled.iter().map(|&t| (t, non_auxiliary_normal_inputs(net, t))).collect();

    let mut parent: AHashMap<usize, usize> = AHashMap::new();
    for (_, places) in &inputs {
        for w in places.windows(2) {
            union(&mut parent, w[0], w[1]);
        }
        if let Some(&first) = places.first() {
            find(&mut parent, first);
        }
    }

    let mut groups: AHashMap<Option<usize>, Vec<usize>> = AHashMap::new();
    for (t, places) in &inputs {
        let key = places.first().map(|&p| find(&mut parent, p));
        groups.entry(key).or_default().push(*t);
    }

    let mut entries: Vec<(Option<usize>, Vec<usize>)> = groups.into_iter().collect();
    entries.sort_by_key(|(k, _)| match k {
        Some(p) => net.place(*p).id.clone(),
        None => String::new(),
    });

    let mut unique = Vec::new();
    let mut split_groups: Vec<Vec<usize>> = Vec::new();
    for (_, mut members) in entries {
        members.sort_by_key(|&t| net.transition(t).id.clone());
        if members.len() == 1 {
            unique.push(members[0]);
        } else {
            split_groups.push(members);
        }
    }

    let mut branches: Vec<Vec<usize>> = vec![unique];
    for group in split_groups {
        let mut next = Vec::with_capacity(branches.len() * group.len());
        for base in &branches {
            for &member in &group {
                let mut b = base.clone();
                b.push(member);
                next.push(b);
            }
        }
        branches = next;
    }
    branches
}

fn enabled_transitions(net: &PetriNet, marking: &[u64]) -> Vec<usize> {
    (0..net.transition_count())
        .filter(|&t| {
            net.transition_in_arcs(t).iter().all(|&aix| {
                let arc = &net.arcs()[aix];
                match (arc.kind, arc.from) {
                    (ArcKind::Normal, NodeRef::Place(p)) => marking[p] >= u64::from(arc.weight),
                    _ => true,
                }
            })
        })
        .collect()
}

fn fire(net: &PetriNet, firing_set: &[usize], marking: &mut [u64]) {
    for &t in firing_set {
        for &aix in net.transition_in_arcs(t) {
            let arc = &net.arcs()[aix];
            if arc.kind == ArcKind::Normal {
                if let NodeRef::Place(p) = arc.from {
                    marking[p] = marking[p].saturating_sub(u64::from(arc.weight));
                }
            }
        }
    }
    for &t in firing_set {
        for &aix in net.transition_in_arcs(t) {
            let arc = &net.arcs()[aix];
            if arc.kind == ArcKind::Reset {
                if let NodeRef::Place(p) = arc.from {
                    marking[p] = 0;
                }
            }
        }
    }
    for &t in firing_set {
        for &aix in net.transition_out_arcs(t) {
            let arc = &net.arcs()[aix];
            if arc.kind == ArcKind::Normal {
                if let NodeRef::Place(p) = arc.to {
                    marking[p] += u64::from(arc.weight);
                }
            }
        }
    }
}

fn marking_snapshot(net: &PetriNet, marking: &[u64]) -> AHashMap<String, u64> {
    net.places().iter().zip(marking.iter()).map(|(p, &t)| (p.id.clone(), t)).collect()
}

struct Explorer<'a> {
    net: &'a PetriNet,
    max_steps: usize,
    sequences: Vec<Sequence>,
    fired_transitions: AHashSet<usize>,
}

impl<'a> Explorer<'a> {
    fn explore(&mut self, marking: Vec<u64>, steps: &mut Vec<FiringStep>, depth: usize) {
        let enabled = enabled_transitions(self.net, &marking);

        if let Some(last) = steps.last_mut() {
            last.enabled_transitions = enabled.iter().map(|&t| self.net.transition(t).id.clone()).collect();
        }

        if enabled.is_empty() || depth >= self.max_steps {
            self.sequences.push(Sequence { steps: steps.clone() });
            return;
        }

        for firing_set in compute_branches(self.net, &enabled) {
            let mut next_marking = marking.clone();
            fire(self.net, &firing_set, &mut next_marking);
            for &t in &firing_set {
                self.fired_transitions.insert(t);
            }
            let fired_ids: Vec<String> = firing_set.iter().map(|&t| self.net.transition(t).id.clone()).collect();
            let log = format!("fired {{{}}}", fired_ids.join(", "));
            steps.push(FiringStep { marking: marking_snapshot(self.net, &next_marking), fired: fired_ids, enabled_transitions: Vec::new(), log });
            self.explore(next_marking, steps, depth + 1);
            steps.pop();
        }
    }
}

fn global_sink_ix(net: &PetriNet) -> Option<usize> {
    (0..net.place_count()).find(|&p| net.place(p).is_global_sink)
}

fn classify_sequence(net: &PetriNet, final_marking: &AHashMap<String, u64>) -> (TerminationType, String) {
    let sink_ix = global_sink_ix(net);
    let sink_tokens = sink_ix.map(|ix| final_marking.get(&net.place(ix).id).copied().unwrap_or(0)).unwrap_or(0);

    match sink_tokens {
        0 => (TerminationType::None, "M[o]=0".to_string()),
        1 => {
            let sink_id = sink_ix.map(|ix| net.place(ix).id.clone());
            let others_zero = final_marking.iter().all(|(id, &t)| Some(id) == sink_id.as_ref() || t == 0);
            if others_zero {
                (TerminationType::Proper, "M[o]=1, all other places=0".to_string())
            } else {
                (TerminationType::Weak, "M[o]=1, some other place nonzero".to_string())
            }
        }
        n => (TerminationType::Option, format!("M[o]={n}")),
    }
}

fn aggregate_termination(types: &[TerminationType]) -> AggregateTermination {
    if !types.is_empty() && types.iter().all(|t| *t == TerminationType::Proper) {
        AggregateTermination::Classical
    } else if types.iter().any(|t| *t == TerminationType::Proper) {
        AggregateTermination::Relaxed
    } else if !types.is_empty() && types.iter().all(|t| *t == TerminationType::Weak) {
        AggregateTermination::Lazy
    } else if types.iter().any(|t| *t == TerminationType::Option) {
        AggregateTermination::Easy
    } else if !types.is_empty() && types.iter().all(|t| *t == TerminationType::None) {
        AggregateTermination::None
    } else {
        // A sequence set mixing Weak and None with no Proper/Option falls
        // outside the five named buckets; treated as the loosest category.
        AggregateTermination::Easy
    }
}

fn soundness(aggregate: AggregateTermination, liveness: bool) -> Soundness {
    match aggregate {
        AggregateTermination::Classical => {
            if liveness {
                Soundness::Classical
            } else {
                Soundness::Weak
            }
        }
        AggregateTermination::Relaxed => {
            if liveness {
                Soundness::Relaxed
            } else {
                Soundness::Easy
            }
        }
        AggregateTermination::Lazy => Soundness::Lazy,
        AggregateTermination::Easy => Soundness::Easy,
        AggregateTermination::None => Soundness::NoConclusion,
    }
}

/// Runs the full firing-sequence search from the net's current marking and
/// classifies the results.
pub fn analyse(net: &PetriNet, config: SimConfig) -> BehaviouralReport {
    let initial_marking: Vec<u64> = net.places().iter().map(|p| p.tokens).collect();

    let mut explorer = Explorer { net, max_steps: config.max_steps, sequences: Vec::new(), fired_transitions: AHashSet::new() };
    let mut steps = Vec::new();
    explorer.explore(initial_marking, &mut steps, 0);

    let simulation_results = explorer.sequences;
    let mut per_sequence_results = Vec::with_capacity(simulation_results.len());
    let mut termination_types = Vec::with_capacity(simulation_results.len());

    for (idx, seq) in simulation_results.iter().enumerate() {
        let final_marking = seq.steps.last().map(|s| s.marking.clone()).unwrap_or_else(|| marking_snapshot(net, &net.places().iter().map(|p| p.tokens).collect::<Vec<_>>()));
        let (termination_type, termination_checks) = classify_sequence(net, &final_marking);
        termination_types.push(termination_type);

        let firing_sequence: Vec<String> = seq.steps.iter().flat_map(|s| s.fired.iter().cloned()).collect();
        let activity_extraction: Vec<String> = firing_sequence
            .iter()
            .filter_map(|id| net.transition_ix(id))
            .filter_map(|t| net.transition(t).activities.clone())
            .collect();

        per_sequence_results.push(PerSequenceResult {
            sequence_index: idx,
            option: termination_type == TerminationType::Option,
            termination_checks,
            termination_type,
            firing_sequence,
            activity_extraction,
        });
    }

    let overall_termination = aggregate_termination(&termination_types);
    let overall_liveness = explorer.fired_transitions.len() == net.transition_count();
    let overall_soundness = soundness(overall_termination, overall_liveness);

    BehaviouralReport { simulation_results, per_sequence_results, overall_liveness, overall_termination, overall_soundness }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::petri::{ArcKind, NodeRef, PetriNet, TransitionRole};

    /// `Pim(1) -> Tx -> Pym -> Ty -> Po`, the two-vertex ε-chain.
    #[test]
    fn simple_chain_reaches_proper_termination() {
        let mut net = PetriNet::new();
        let tx = net.ensure_transition("Tx", TransitionRole::Check);
        let ty = net.ensure_transition("Ty", TransitionRole::Check);
        let pim = net.ensure_place("Pim");
        net.place_mut(pim).is_global_source = true;
        net.place_mut(pim).tokens = 1;
        let pym = net.ensure_place("Pym");
        net.place_mut(pym).is_traversed = true;
        let po = net.ensure_place("Po");
        net.place_mut(po).is_global_sink = true;

        net.add_arc(NodeRef::Place(pim), NodeRef::Transition(tx), ArcKind::Normal, 1);
        net.add_arc(NodeRef::Transition(tx), NodeRef::Place(pym), ArcKind::Normal, 1);
        net.add_arc(NodeRef::Place(pym), NodeRef::Transition(ty), ArcKind::Normal, 1);
        net.add_arc(NodeRef::Transition(ty), NodeRef::Place(po), ArcKind::Normal, 1);

        let report = analyse(&net, SimConfig::default());
        assert_eq!(report.simulation_results.len(), 1);
        assert_eq!(report.overall_termination, AggregateTermination::Classical);
        assert!(report.overall_liveness);
        assert_eq!(report.overall_soundness, Soundness::Classical);
    }

    #[test]
    fn deadlock_with_empty_sink_is_none_termination() {
        let mut net = PetriNet::new();
        let t = net.ensure_transition("Tx", TransitionRole::Check);
        let p = net.ensure_place("P1");
        net.add_arc(NodeRef::Place(p), NodeRef::Transition(t), ArcKind::Normal, 1);
        let po = net.ensure_place("Po");
        net.place_mut(po).is_global_sink = true;

        let report = analyse(&net, SimConfig::default());
        assert_eq!(report.per_sequence_results[0].termination_type, TerminationType::None);
        assert_eq!(report.overall_termination, AggregateTermination::None);
    }
}
