mod repository;
mod transitions;

use roadmap_engine::{
    curriculum::TaskTemplate,
    roadmap::{RoadmapState, RoadmapTransitions},
    testing::{fixed_now, sample_curriculum},
};

pub fn standard_template(slot_id: &str) -> TaskTemplate {
    sample_curriculum()
        .template(&format!("{slot_id}-standard"))
        .cloned()
        .expect("fixture defines a standard template per slot")
}

/// Starts and directly passes a slot, the way a manual completion would.
pub fn pass_slot(roadmap: &mut RoadmapState, slot_id: &str) {
    RoadmapTransitions::start_slot(roadmap, slot_id, &standard_template(slot_id), fixed_now())
        .expect("slot should start");
    RoadmapTransitions::complete_directly(roadmap, slot_id, true, &[], fixed_now())
        .expect("slot should complete");
}
