//! Phase completion detection
//!
//! A query, not a mutator: the turn engine writes the result into session
//! state after the stage handler has run.

use tracing::debug;

use crate::domain::Session;
use crate::methodology::Stage;
use crate::phases::StagePatch;

/// Decide whether the active phase's goal is satisfied.
///
/// True when the just-produced patch carries a finalized output, when the
/// session already holds one for the active phase, or when the sub-stage has
/// reached the terminal readiness stage. Must run after the handler for the
/// turn, since it inspects the handler's output.
pub fn is_phase_complete(session: &Session, patch: &StagePatch) -> bool {
    debug!(
        phase = %session.phase,
        patch_stage = %patch.stage,
        "is_phase_complete: called"
    );

    if patch.output.is_some() {
        return true;
    }
    if session.output_for(session.phase).is_some() {
        return true;
    }
    patch.stage == Stage::TransitionReadiness
}
