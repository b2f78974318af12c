//! Session domain type
//!
//! The persisted record threading through the whole system: transcript,
//! active phase and sub-stage, interaction counter, per-phase finalized
//! outputs, and the optimistic-concurrency version the checkpoint store
//! enforces.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sessionstore::now_ms;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{PhaseOutput, Role, TranscriptMessage};
use crate::methodology::{Phase, Stage};

/// One user's coaching journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier; created once, immutable
    pub id: String,

    /// Ordered conversation transcript, append-only
    pub messages: Vec<TranscriptMessage>,

    /// Active phase; advances forward only
    pub phase: Phase,

    /// Active sub-stage within the phase
    pub stage: Stage,

    /// User turns taken within the current phase
    pub interaction_count: u32,

    /// Recomputed every turn by the completion detector
    pub phase_complete: bool,

    /// Finalized WHY output, immutable once set
    #[serde(default)]
    pub why_output: Option<PhaseOutput>,

    /// Finalized HOW output, immutable once set
    #[serde(default)]
    pub how_output: Option<PhaseOutput>,

    /// Finalized WHAT output, immutable once set
    #[serde(default)]
    pub what_output: Option<PhaseOutput>,

    /// Set once WHAT completes; the journey is over from here on
    #[serde(default)]
    pub concluded: bool,

    /// Advisory context supplementing the transcript (not authoritative)
    #[serde(default)]
    pub user_context: HashMap<String, String>,

    /// Version the checkpoint store compares on write
    #[serde(default)]
    pub version: u64,

    /// Creation timestamp (Unix ms)
    pub created_at: i64,

    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Session {
    /// Create a fresh session at the start of the WHY phase
    pub fn new() -> Self {
        let id = Uuid::now_v7().to_string();
        debug!(%id, "Session::new: called");
        let now = now_ms();
        Self {
            id,
            messages: Vec::new(),
            phase: Phase::Why,
            stage: Phase::Why.entry_stage(),
            interaction_count: 0,
            phase_complete: false,
            why_output: None,
            how_output: None,
            what_output: None,
            concluded: false,
            user_context: HashMap::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create with a specific id (for testing or recovery)
    pub fn with_id(id: impl Into<String>) -> Self {
        let id = id.into();
        debug!(%id, "Session::with_id: called");
        Self { id, ..Self::new() }
    }

    /// Append a user message to the transcript
    pub fn push_user(&mut self, content: impl Into<String>) {
        debug!(%self.id, "Session::push_user: called");
        self.messages.push(TranscriptMessage::user(content));
        self.updated_at = now_ms();
    }

    /// Append an assistant message to the transcript
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        debug!(%self.id, "Session::push_assistant: called");
        self.messages.push(TranscriptMessage::assistant(content));
        self.updated_at = now_ms();
    }

    /// Append a system note to the transcript
    pub fn push_system(&mut self, content: impl Into<String>) {
        debug!(%self.id, "Session::push_system: called");
        self.messages.push(TranscriptMessage::system(content));
        self.updated_at = now_ms();
    }

    /// Most recent user-authored message, if any
    pub fn latest_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Advance to the next phase, resetting per-phase state.
    ///
    /// Only the immediate successor is a legal target; anything else
    /// (backward, skipping, past WHAT) is refused. Returns whether the
    /// transition was made.
    pub fn advance_to(&mut self, next: Phase) -> bool {
        debug!(%self.id, current = %self.phase, %next, "Session::advance_to: called");
        if self.phase.next() != Some(next) {
            debug!("Session::advance_to: not the immediate successor, refusing");
            return false;
        }
        self.phase = next;
        self.stage = next.entry_stage();
        self.interaction_count = 0;
        self.phase_complete = false;
        self.updated_at = now_ms();
        true
    }

    /// Finalized output for the given phase
    pub fn output_for(&self, phase: Phase) -> Option<&PhaseOutput> {
        match phase {
            Phase::Why => self.why_output.as_ref(),
            Phase::How => self.how_output.as_ref(),
            Phase::What => self.what_output.as_ref(),
        }
    }

    /// Record a finalized output for the given phase.
    ///
    /// Outputs are immutable once set; a second write for the same phase is
    /// ignored. Returns whether the record was stored.
    pub fn record_output(&mut self, phase: Phase, output: PhaseOutput) -> bool {
        debug!(%self.id, %phase, "Session::record_output: called");
        let slot = match phase {
            Phase::Why => &mut self.why_output,
            Phase::How => &mut self.how_output,
            Phase::What => &mut self.what_output,
        };
        if slot.is_some() {
            debug!("Session::record_output: output already finalized, ignoring");
            return false;
        }
        *slot = Some(output);
        self.updated_at = now_ms();
        true
    }

    /// Mark the journey as concluded (absorbing terminal state)
    pub fn conclude(&mut self) {
        debug!(%self.id, "Session::conclude: called");
        self.concluded = true;
        self.updated_at = now_ms();
    }

    /// Check the cross-phase output invariant: a later phase's output must
    /// never exist while an earlier phase's is missing.
    pub fn outputs_consistent(&self) -> bool {
        if self.what_output.is_some() && self.how_output.is_none() {
            return false;
        }
        if self.how_output.is_some() && self.why_output.is_none() {
            return false;
        }
        true
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
