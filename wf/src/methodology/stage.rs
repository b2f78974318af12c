//! Phase and sub-stage types plus the stage resolver
//!
//! A coaching journey moves through three phases (WHY, HOW, WHAT), each with
//! its own ordered script of sub-stages. The resolver is a pure function:
//! given the same inputs it always returns the same next stage, which makes
//! replay from a persisted checkpoint safe.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level coaching phase, strictly ordered WHY -> HOW -> WHAT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Phase {
    #[default]
    Why,
    How,
    What,
}

impl Phase {
    /// The phase that follows this one, if any
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Why => Some(Phase::How),
            Phase::How => Some(Phase::What),
            Phase::What => None,
        }
    }

    /// Ordered sub-stage script for this phase.
    ///
    /// WHY carries the full discovery script; HOW and WHAT share the same
    /// shape with a shorter run-up to the completion stages.
    pub fn script(&self) -> &'static [Stage] {
        match self {
            Phase::Why => &[
                Stage::Welcome,
                Stage::Discovery,
                Stage::MiningBeliefs,
                Stage::ValuesDefinition,
                Stage::DistillingWhy,
                Stage::CompletionCheck,
                Stage::Integration,
                Stage::TransitionReadiness,
            ],
            Phase::How | Phase::What => &[
                Stage::Welcome,
                Stage::Discovery,
                Stage::CompletionCheck,
                Stage::Integration,
                Stage::TransitionReadiness,
            ],
        }
    }

    /// First sub-stage of this phase's script
    pub fn entry_stage(&self) -> Stage {
        self.script()[0]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Why => "why",
            Phase::How => "how",
            Phase::What => "what",
        }
    }

    /// Display label used in prompts and CLI output
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Why => "WHY",
            Phase::How => "HOW",
            Phase::What => "WHAT",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Decoding is total: anything unrecognized lands on the first phase, so a
// corrupt checkpoint can never route past WHAT or crash the turn loop.
impl From<String> for Phase {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "why" => Phase::Why,
            "how" => Phase::How,
            "what" => Phase::What,
            other => {
                debug!(%other, "Phase::from: unrecognized phase, defaulting to why");
                Phase::Why
            }
        }
    }
}

impl From<Phase> for String {
    fn from(value: Phase) -> Self {
        value.as_str().to_string()
    }
}

/// Sub-stage within a phase's methodology script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Stage {
    Welcome,
    Discovery,
    MiningBeliefs,
    ValuesDefinition,
    DistillingWhy,
    CompletionCheck,
    Integration,
    TransitionReadiness,
    /// Catch-all for values that cannot be decoded from a checkpoint;
    /// handled by the generic continuation sub-handler
    Unknown,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Welcome => "welcome",
            Stage::Discovery => "discovery",
            Stage::MiningBeliefs => "mining_beliefs",
            Stage::ValuesDefinition => "values_definition",
            Stage::DistillingWhy => "distilling_why",
            Stage::CompletionCheck => "completion_check",
            Stage::Integration => "integration",
            Stage::TransitionReadiness => "transition_readiness",
            Stage::Unknown => "unknown",
        }
    }

    /// Stages that already sit on the convergence path. The forced jump in
    /// the resolver only fires when the natural next stage is NOT one of
    /// these; integration is deliberately excluded so a session waiting on a
    /// structured output keeps returning to the completion check.
    pub fn is_completion_oriented(&self) -> bool {
        matches!(self, Stage::CompletionCheck | Stage::TransitionReadiness)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Stage {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "welcome" => Stage::Welcome,
            "discovery" => Stage::Discovery,
            "mining_beliefs" => Stage::MiningBeliefs,
            "values_definition" => Stage::ValuesDefinition,
            "distilling_why" => Stage::DistillingWhy,
            "completion_check" => Stage::CompletionCheck,
            "integration" => Stage::Integration,
            "transition_readiness" => Stage::TransitionReadiness,
            other => {
                debug!(%other, "Stage::from: unrecognized stage");
                Stage::Unknown
            }
        }
    }
}

impl From<Stage> for String {
    fn from(value: Stage) -> Self {
        value.as_str().to_string()
    }
}

/// Compute the next sub-stage for a phase.
///
/// Rules, in order:
/// 1. Idempotent entry: at (first stage, count 0) the resolver stays put, so
///    replaying a fresh checkpoint cannot drift.
/// 2. Natural progression: advance exactly one position in the phase script,
///    clamped at the final stage. A stage not in the script re-anchors to the
///    script's first stage.
/// 3. Forced convergence: once `interaction_count` reaches the configured
///    threshold with no finalized output, any natural step that is not
///    completion-oriented is overridden to the completion check.
pub fn resolve(
    phase: Phase,
    current: Stage,
    interaction_count: u32,
    has_finalized_output: bool,
    convergence_threshold: u32,
) -> Stage {
    debug!(
        %phase,
        %current,
        interaction_count,
        has_finalized_output,
        "resolve: called"
    );
    let script = phase.script();
    let first = script[0];
    let position = script.iter().position(|s| *s == current);

    if interaction_count == 0 && (position.is_none() || current == first) {
        debug!("resolve: idempotent entry, staying at first stage");
        return first;
    }

    let natural = match position {
        Some(i) if i + 1 < script.len() => script[i + 1],
        Some(_) => current,
        None => first,
    };

    if interaction_count >= convergence_threshold && !has_finalized_output && !natural.is_completion_oriented() {
        debug!(%natural, "resolve: forcing jump to completion check");
        return Stage::CompletionCheck;
    }

    natural
}
