//! Shaders described in code rather than JSON.
//!
//! Every populator is listed in [`JOB_POPULATORS`] and runs once per build.

use log::info;

use crate::error::Result;

use super::session::CompilationSession;

mod forward_lighting;
mod imgui;

pub struct JobPopulator {
    pub name: &'static str,
    pub populate: fn(&CompilationSession) -> Result<()>,
}

pub const JOB_POPULATORS: &[JobPopulator] = &[
    JobPopulator {
        name: "ForwardLighting",
        populate: forward_lighting::populate,
    },
    JobPopulator {
        name: "IMGUI",
        populate: imgui::populate,
    },
];

/// Runs each populator once, in order.
///
/// A failing populator is recorded on the session and the rest still run.
pub fn run_job_populators(session: &CompilationSession, populators: &[JobPopulator]) {
    for populator in populators {
        info!("populating {}", populator.name);
        if let Err(e) = (populator.populate)(session) {
            session.record_failure(format!("populator {}: {e}", populator.name));
        }
    }
}
