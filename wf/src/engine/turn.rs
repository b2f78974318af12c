//! Turn engine - drives one request/response cycle for a session
//!
//! Per-session sequential by construction: the caller holds the session
//! value for the whole turn, and the routing decision always reads
//! fully-updated state (the previous turn's completion flag plus the message
//! just appended). The returned session is the turn's entire effect; nothing
//! is committed piecemeal.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::MethodologyConfig;
use crate::domain::Session;
use crate::llm::LlmClient;
use crate::methodology::{Phase, PhaseRouter, RouteDecision, is_phase_complete};
use crate::phases::{HowHandler, PhaseHandler, WhatHandler, WhyHandler, entry_greeting};

/// Reply once WHAT completes and the machine terminates
const CLOSING_REPLY: &str = "That completes the journey: your WHY, HOW, and WHAT now tell one story. \
     Take the summaries we built and put them in front of your team - the \
     work from here is living them.";

/// Reply for any message after the journey has concluded
const CONCLUDED_REPLY: &str = "Our structured work together is complete, and your strategy story is in \
     your hands now. Revisit the summaries whenever you need them.";

/// A processed turn: the updated session plus the reply to surface
#[derive(Debug)]
pub struct ProcessedTurn {
    pub session: Session,
    pub reply: String,
}

/// Drives routing, dispatch, patch merging, and completion detection for
/// one turn
pub struct TurnEngine {
    llm: Arc<dyn LlmClient>,
    router: PhaseRouter,
    why: WhyHandler,
    how: HowHandler,
    what: WhatHandler,
}

impl TurnEngine {
    pub fn new(llm: Arc<dyn LlmClient>, config: MethodologyConfig) -> Self {
        Self {
            llm,
            router: PhaseRouter::new(&config.transition_keywords),
            why: WhyHandler::new(config.clone()),
            how: HowHandler::new(config.clone()),
            what: WhatHandler::new(config),
        }
    }

    fn handler_for(&self, phase: Phase) -> &dyn PhaseHandler {
        match phase {
            Phase::Why => &self.why,
            Phase::How => &self.how,
            Phase::What => &self.what,
        }
    }

    /// Process one user turn against a session snapshot.
    ///
    /// The turn's effects are merged into the returned session as a whole;
    /// on any model failure the handler already degraded internally, so the
    /// result is always a committable state.
    pub async fn process_turn(&self, mut session: Session, message: &str) -> ProcessedTurn {
        debug!(id = %session.id, phase = %session.phase, stage = %session.stage, "process_turn: called");
        session.push_user(message);

        if session.concluded {
            debug!(id = %session.id, "process_turn: session already concluded");
            session.push_assistant(CONCLUDED_REPLY);
            return ProcessedTurn {
                session,
                reply: CONCLUDED_REPLY.to_string(),
            };
        }

        match self.router.route(&session) {
            RouteDecision::Terminate => {
                info!(id = %session.id, "process_turn: WHAT complete, journey concluded");
                session.conclude();
                session.push_assistant(CLOSING_REPLY);
                ProcessedTurn {
                    session,
                    reply: CLOSING_REPLY.to_string(),
                }
            }
            RouteDecision::Advance(next) => {
                info!(id = %session.id, %next, "process_turn: advancing phase");
                session.advance_to(next);
                let reply = entry_greeting(next);
                session.push_assistant(reply);
                ProcessedTurn {
                    session,
                    reply: reply.to_string(),
                }
            }
            RouteDecision::Stay => {
                session.interaction_count += 1;

                let handler = self.handler_for(session.phase);
                let outcome = handler.handle(&session, self.llm.as_ref()).await;

                // Merge the patch as a unit, then recompute completion on
                // the merged state
                session.stage = outcome.patch.stage;
                if let Some(output) = outcome.patch.output.clone() {
                    session.record_output(session.phase, output);
                }
                session.phase_complete = is_phase_complete(&session, &outcome.patch);
                session.push_assistant(&outcome.reply);

                debug!(
                    id = %session.id,
                    stage = %session.stage,
                    phase_complete = session.phase_complete,
                    "process_turn: turn merged"
                );
                ProcessedTurn {
                    session,
                    reply: outcome.reply,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::llm::client::mock::{MockLlmClient, MockReply};
    use crate::methodology::Stage;

    fn engine_with(llm: MockLlmClient) -> TurnEngine {
        TurnEngine::new(Arc::new(llm), MethodologyConfig::default())
    }

    fn structured_json() -> serde_json::Value {
        serde_json::json!({
            "purpose_statement": "We exist to make small teams unstoppable",
            "beliefs": ["small teams outbuild big ones"],
            "values": [],
            "integration_narrative": "confidence first",
            "validation_questions": [],
            "primary_beneficiary": "founders",
            "key_outcome": "teams ship without fear"
        })
    }

    /// Drive a session to WHY/completion_check with a finalized output
    async fn session_with_completed_why(engine: &TurnEngine) -> Session {
        let mut session = Session::new();
        session.stage = Stage::CompletionCheck;
        session.interaction_count = 4;
        session = engine.process_turn(session, "that all feels right").await.session;
        assert!(session.phase_complete, "setup: WHY should be complete");
        session
    }

    #[tokio::test]
    async fn test_first_message_advances_welcome_to_discovery() {
        // Scenario: new session, first user message
        let engine = engine_with(MockLlmClient::new(vec![]));
        let session = Session::new();

        let turn = engine.process_turn(session, "Hello, I run a startup").await;

        assert_eq!(turn.session.phase, Phase::Why);
        assert_eq!(turn.session.stage, Stage::Discovery);
        assert_eq!(turn.session.interaction_count, 1);
        assert!(!turn.session.phase_complete);
        // Welcome reply is canned; no model call
        assert!(!turn.reply.is_empty());
    }

    #[tokio::test]
    async fn test_forced_convergence_at_threshold() {
        // Scenario: discovery stage at the threshold with no output
        let engine = engine_with(MockLlmClient::always_text("tell me more"));
        let mut session = Session::new();
        session.stage = Stage::Discovery;
        session.interaction_count = 4;

        let turn = engine.process_turn(session, "and another thing about the market").await;

        // Natural next would be mining_beliefs; convergence forces the check
        assert_eq!(turn.session.stage, Stage::CompletionCheck);
        assert!(!turn.session.phase_complete);
    }

    #[tokio::test]
    async fn test_completion_then_consent_advances_to_how() {
        // Scenario: structured output lands, then the user consents
        let engine = engine_with(MockLlmClient::new(vec![MockReply::Structured(structured_json())]));
        let session = session_with_completed_why(&engine).await;
        assert!(session.why_output.is_some());

        let turn = engine.process_turn(session, "I'm ready to move on").await;

        assert_eq!(turn.session.phase, Phase::How);
        assert_eq!(turn.session.stage, Stage::Welcome);
        assert_eq!(turn.session.interaction_count, 0);
        assert!(!turn.session.phase_complete);
    }

    #[tokio::test]
    async fn test_completion_without_consent_stays_in_why() {
        // Scenario: two-guard law - completion alone never advances
        let engine = engine_with(MockLlmClient::new(vec![
            MockReply::Structured(structured_json()),
            MockReply::Text("what part of that lands for you?".to_string()),
        ]));
        let session = session_with_completed_why(&engine).await;

        let turn = engine.process_turn(session, "tell me more about that").await;

        assert_eq!(turn.session.phase, Phase::Why);
        assert!(turn.session.phase_complete);
    }

    #[tokio::test]
    async fn test_structured_timeout_leaves_output_null() {
        // Scenario: structured call times out at the completion check
        let engine = engine_with(MockLlmClient::new(vec![MockReply::Failure(LlmError::Timeout(
            std::time::Duration::from_secs(30),
        ))]));
        let mut session = Session::new();
        session.stage = Stage::CompletionCheck;
        session.interaction_count = 4;

        let turn = engine.process_turn(session, "I think that covers everything").await;

        assert!(turn.session.why_output.is_none());
        assert!(!turn.session.phase_complete);
        assert_eq!(turn.session.stage, Stage::CompletionCheck);
        assert!(!turn.reply.to_lowercase().contains("error"));
    }

    #[tokio::test]
    async fn test_what_completion_terminates_and_absorbs() {
        // Scenario: WHAT completes, machine ends, terminal state absorbs
        let engine = engine_with(MockLlmClient::new(vec![MockReply::Structured(structured_json())]));
        let mut session = Session::new();
        session.record_output(Phase::Why, serde_json::from_value(structured_json()).unwrap());
        session.advance_to(Phase::How);
        session.record_output(Phase::How, serde_json::from_value(structured_json()).unwrap());
        session.advance_to(Phase::What);
        session.stage = Stage::CompletionCheck;
        session.interaction_count = 3;

        // This turn finalizes WHAT
        let turn = engine.process_turn(session, "yes that is the full picture").await;
        assert!(turn.session.phase_complete);
        assert!(turn.session.what_output.is_some());

        // Next message terminates
        let turn = engine.process_turn(turn.session, "great").await;
        assert!(turn.session.concluded);
        assert_eq!(turn.reply, CLOSING_REPLY);

        // And the terminal state absorbs every later message
        let turn = engine.process_turn(turn.session, "anything else?").await;
        assert!(turn.session.concluded);
        assert_eq!(turn.session.phase, Phase::What);
        assert_eq!(turn.reply, CONCLUDED_REPLY);
    }

    #[tokio::test]
    async fn test_phase_never_moves_backward() {
        // Forward-only invariant across a consent message in HOW
        let engine = engine_with(MockLlmClient::always_text("noted"));
        let mut session = Session::new();
        session.record_output(Phase::Why, serde_json::from_value(structured_json()).unwrap());
        session.advance_to(Phase::How);

        let turn = engine.process_turn(session, "ready to go back to why please").await;

        // phase_complete was false, so consent words alone do nothing; and
        // there is no backward edge to return to WHY
        assert_eq!(turn.session.phase, Phase::How);
    }

    #[tokio::test]
    async fn test_failed_turn_still_commits_transcript() {
        // Complete-with-fallback: the user message and the fallback reply
        // are both part of the turn's atomic result
        let engine = engine_with(MockLlmClient::new(vec![MockReply::Failure(LlmError::Timeout(
            std::time::Duration::from_secs(5),
        ))]));
        let mut session = Session::new();
        session.stage = Stage::Discovery;
        session.interaction_count = 1;
        let messages_before = session.messages.len();

        let turn = engine.process_turn(session, "we build tools for nurses").await;

        assert_eq!(turn.session.messages.len(), messages_before + 2);
        assert_eq!(turn.session.stage, Stage::Discovery);
        assert_eq!(turn.session.interaction_count, 2);
    }
}
