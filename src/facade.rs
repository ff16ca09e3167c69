//! Top-level entry point: wires the preprocessor, structural mapper, and
//! (when extension is requested) the structural and behavioural analysers
//! into a single conversion call.

use crate::behavior::{self, BehaviouralReport, SimConfig};
use crate::error::{Result, Warning};
use crate::mapper;
use crate::petri::PetriNet;
use crate::preprocess;
use crate::rdlt::Rdlt;
use crate::structural::{self, StructuralReport};

/// Everything produced by one conversion run.
pub struct Payload {
    pub level1: Rdlt,
    pub level2: Vec<(String, Rdlt)>,
    pub combined: Rdlt,
    pub petri_net: PetriNet,
    pub struct_analysis: Option<StructuralReport>,
    pub behavior_analysis: Option<BehaviouralReport>,
}

pub struct ConvertOutput {
    pub data: Payload,
    pub warnings: Vec<Warning>,
}

/// Runs the full RDLT -> Petri Net pipeline. Analysis fields on the
/// returned payload are only populated when `extend` is `true`, matching
/// the preprocessor's source/sink extension.
pub fn convert(rdlt: &Rdlt, extend: bool, sim: SimConfig) -> Result<ConvertOutput> {
    log::debug!("starting conversion: {} vertices, extend={extend}", rdlt.graph.vertex_count());

    let (preprocessed, warnings) = preprocess::run(rdlt, extend)?;
    log::info!(
        "preprocessing complete: level1 has {} vertices, {} RBS subgraphs",
        preprocessed.level1.graph.vertex_count(),
        preprocessed.level2.len()
    );
    for w in &warnings {
        log::warn!("{w}");
    }

    let mapped = mapper::map(&preprocessed.combined);
    for entry in &mapped.log {
        log::debug!("mapper step {}: {}", entry.step, entry.message);
    }
    log::info!("mapping complete: {} places, {} transitions", mapped.net.place_count(), mapped.net.transition_count());

    let (struct_analysis, behavior_analysis) = if extend {
        let struct_report = structural::analyse(&mapped.net);
        if !struct_report.issues.is_empty() {
            log::warn!("structural analysis found {} issue(s)", struct_report.issues.len());
        }
        let behavior_report = behavior::analyse(&mapped.net, sim);
        log::info!("behavioural analysis complete: soundness={:?}", behavior_report.overall_soundness);
        (Some(struct_report), Some(behavior_report))
    } else {
        (None, None)
    };

    Ok(ConvertOutput {
        data: Payload {
            level1: preprocessed.level1,
            level2: preprocessed.level2,
            combined: preprocessed.combined,
            petri_net: mapped.net,
            struct_analysis,
            behavior_analysis,
        },
        warnings,
    })
}
