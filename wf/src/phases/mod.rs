//! Specialist stage handlers
//!
//! One handler per phase. Each dispatches on the session's current
//! sub-stage, produces the turn's conversational reply, and proposes a state
//! patch (next stage, optional finalized output) that the turn engine
//! merges. Handlers never mutate the session and never let a model failure
//! escape: conversation continuity beats completeness of any single turn.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::MethodologyConfig;
use crate::domain::{PhaseOutput, Role, Session};
use crate::llm::{CompletionRequest, LlmClient, Message, ToolDefinition};
use crate::methodology::{Phase, Stage, resolve};
use crate::prompts;

mod how;
mod what;
mod why;

pub use how::HowHandler;
pub use what::WhatHandler;
pub use why::WhyHandler;

/// Max tokens requested per coaching reply (clients cap further)
const REPLY_MAX_TOKENS: u32 = 1024;

/// Name of the tool that records a structured phase output
pub const OUTPUT_TOOL_NAME: &str = "record_phase_output";

/// State changes proposed by a handler for one turn
#[derive(Debug, Clone, PartialEq)]
pub struct StagePatch {
    /// Sub-stage the session should be in after this turn
    pub stage: Stage,
    /// Finalized output, present only when the structured call succeeded
    pub output: Option<PhaseOutput>,
}

/// A handler's full result for one turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub reply: String,
    pub patch: StagePatch,
}

/// Per-phase specialist conversation handler
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    fn phase(&self) -> Phase;

    /// Produce the reply and state patch for the current turn.
    ///
    /// Dispatches on `session.stage`; the patch carries the stage the
    /// resolver chose for the next turn. Infallible by contract - model
    /// failures degrade to canned fallbacks.
    async fn handle(&self, session: &Session, llm: &dyn LlmClient) -> TurnOutcome;
}

/// Greeting used when a phase is first entered (session start or the turn a
/// transition is granted)
pub fn entry_greeting(phase: Phase) -> &'static str {
    match phase {
        Phase::Why => why::ENTRY_GREETING,
        Phase::How => how::ENTRY_GREETING,
        Phase::What => what::ENTRY_GREETING,
    }
}

/// Bounded tail of the user's own words, newest-last.
///
/// Whole messages are taken from the end of the transcript until the word
/// budget is spent; a single oversized message is cut to its trailing words.
/// Assistant and system entries never enter the window - the model sees only
/// what the leader actually said.
pub fn recent_user_window(session: &Session, max_words: usize) -> String {
    let mut collected: Vec<&str> = Vec::new();
    let mut words = 0usize;

    for message in session.messages.iter().rev() {
        match message.role {
            Role::User => {}
            Role::Assistant | Role::System => continue,
        }
        let message_words = message.content.split_whitespace().count();
        if words + message_words > max_words && !collected.is_empty() {
            break;
        }
        collected.push(message.content.as_str());
        words += message_words;
        if words >= max_words {
            break;
        }
    }

    collected.reverse();
    let window = collected.join("\n\n");

    // A single message can still blow the budget; keep its tail
    let total: Vec<&str> = window.split_whitespace().collect();
    if total.len() > max_words {
        total[total.len() - max_words..].join(" ")
    } else {
        window
    }
}

/// In-character fallback when a model call fails mid-stage
pub fn fallback_line(stage: Stage) -> &'static str {
    match stage {
        Stage::Welcome => "Take your time - when you're ready, tell me about the business you lead.",
        Stage::Discovery => {
            "I want to make sure I take this in properly. While I do, tell me more: what first \
             pulled you into this work?"
        }
        Stage::MiningBeliefs => {
            "Stay with that thought. What do you believe about your customers that most people \
             in your industry get wrong?"
        }
        Stage::ValuesDefinition => {
            "Let's keep going. When your team is at its best, what are they actually doing that \
             others wouldn't?"
        }
        Stage::DistillingWhy => {
            "Hold that for a moment. If your business disappeared tomorrow, what would the world \
             genuinely lose?"
        }
        Stage::CompletionCheck => {
            "I need a little longer to pull your story together. Meanwhile, tell me: which part \
             of what you've shared feels most true?"
        }
        Stage::Integration => {
            "Let's stay practical. Think of a decision you made last month - how did what we've \
             uncovered show up in it?"
        }
        Stage::TransitionReadiness => {
            "Sit with what we've found for a moment. Does it feel solid enough to build on?"
        }
        Stage::Unknown => CONTINUATION_REPLY,
    }
}

/// Neutral follow-up used by the generic continuation sub-handler
const CONTINUATION_REPLY: &str = "Say more about that - what makes it matter to you?";

fn fallback_outcome(current: Stage) -> TurnOutcome {
    TurnOutcome {
        reply: fallback_line(current).to_string(),
        patch: StagePatch {
            stage: current,
            output: None,
        },
    }
}

/// Welcome sub-handler: canned framing for the phase's first real turn
pub(crate) fn welcome_turn(phase: Phase, reply: &str, session: &Session, config: &MethodologyConfig) -> TurnOutcome {
    let has_output = session.output_for(phase).is_some();
    let next = resolve(
        phase,
        session.stage,
        session.interaction_count,
        has_output,
        config.convergence_threshold,
    );
    TurnOutcome {
        reply: reply.to_string(),
        patch: StagePatch {
            stage: next,
            output: None,
        },
    }
}

/// Continuation sub-handler: recovers an unrecognized sub-stage with a
/// neutral follow-up and re-anchors the script via the resolver
pub(crate) fn continuation_turn(phase: Phase, session: &Session, config: &MethodologyConfig) -> TurnOutcome {
    debug!(%phase, stage = %session.stage, "continuation_turn: unmatched stage, using continuation");
    let has_output = session.output_for(phase).is_some();
    let next = resolve(
        phase,
        session.stage,
        session.interaction_count,
        has_output,
        config.convergence_threshold,
    );
    TurnOutcome {
        reply: CONTINUATION_REPLY.to_string(),
        patch: StagePatch {
            stage: next,
            output: None,
        },
    }
}

/// Free-text sub-handler: delegate the stage's coaching move to the model.
///
/// On failure the stage does not advance and the reply degrades to the
/// stage's canned fallback.
pub(crate) async fn free_text_turn(
    phase: Phase,
    session: &Session,
    llm: &dyn LlmClient,
    config: &MethodologyConfig,
) -> TurnOutcome {
    let current = session.stage;
    debug!(%phase, %current, "free_text_turn: called");

    let system_prompt = match prompts::render_coach(phase, current) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!(error = %e, %current, "free_text_turn: prompt render failed");
            return fallback_outcome(current);
        }
    };

    let window = recent_user_window(session, config.context_window_words);
    let request = CompletionRequest {
        system_prompt,
        messages: vec![Message::user(window)],
        tools: vec![],
        max_tokens: REPLY_MAX_TOKENS,
    };

    match llm.complete(request).await {
        Ok(response) => match response.content {
            Some(text) if !text.trim().is_empty() => {
                let has_output = session.output_for(phase).is_some();
                let next = resolve(
                    phase,
                    current,
                    session.interaction_count,
                    has_output,
                    config.convergence_threshold,
                );
                TurnOutcome {
                    reply: text,
                    patch: StagePatch {
                        stage: next,
                        output: None,
                    },
                }
            }
            _ => {
                warn!(%current, "free_text_turn: empty completion, using fallback");
                fallback_outcome(current)
            }
        },
        Err(e) => {
            warn!(error = %e, %current, "free_text_turn: model call failed, using fallback");
            fallback_outcome(current)
        }
    }
}

/// Completion sub-handler: schema-constrained extraction of the phase's
/// finalized output.
///
/// A malformed or failed structured reply leaves the phase open: no output
/// is recorded, the stage stays at the completion check, and the resolver's
/// convergence override brings the session back here next turn.
pub(crate) async fn structured_turn(
    phase: Phase,
    session: &Session,
    llm: &dyn LlmClient,
    config: &MethodologyConfig,
) -> TurnOutcome {
    let current = session.stage;
    debug!(%phase, %current, "structured_turn: called");

    let system_prompt = match prompts::render_structured(phase) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!(error = %e, "structured_turn: prompt render failed");
            return fallback_outcome(current);
        }
    };

    let window = recent_user_window(session, config.context_window_words);
    let tool = ToolDefinition::new(
        OUTPUT_TOOL_NAME,
        "Record the finalized output of the current coaching phase",
        PhaseOutput::json_schema(),
    );
    let request = CompletionRequest {
        system_prompt,
        messages: vec![Message::user(window)],
        tools: vec![tool],
        max_tokens: REPLY_MAX_TOKENS,
    };

    let output = match llm.complete(request).await {
        Ok(response) => {
            let call = response.tool_calls.into_iter().find(|c| c.name == OUTPUT_TOOL_NAME);
            match call {
                Some(call) => match serde_json::from_value::<PhaseOutput>(call.input) {
                    Ok(output) => match output.validate() {
                        Ok(()) => Some(output),
                        Err(reason) => {
                            warn!(%reason, "structured_turn: output failed validation");
                            None
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "structured_turn: output did not match schema");
                        None
                    }
                },
                None => {
                    warn!("structured_turn: model returned no tool call");
                    None
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "structured_turn: model call failed");
            None
        }
    };

    match output {
        Some(output) => {
            let next = resolve(
                phase,
                current,
                session.interaction_count,
                true,
                config.convergence_threshold,
            );
            let reply = format!(
                "Here is what I heard, in your own words:\n\n{}\n\nDoes this capture it? We can \
                 refine anything that feels off, or move on whenever you're ready.",
                output.summary()
            );
            TurnOutcome {
                reply,
                patch: StagePatch {
                    stage: next,
                    output: Some(output),
                },
            }
        }
        None => fallback_outcome(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_takes_trailing_user_messages() {
        let mut session = Session::new();
        session.push_user("first message here");
        session.push_assistant("coach reply that must never appear");
        session.push_user("second message here");
        session.push_system("system note that must never appear");
        session.push_user("third message here");

        let window = recent_user_window(&session, 150);
        assert!(window.contains("first message"));
        assert!(window.contains("third message"));
        assert!(!window.contains("coach reply"));
        assert!(!window.contains("system note"));

        // Chronological order preserved
        let first_pos = window.find("first").unwrap();
        let third_pos = window.find("third").unwrap();
        assert!(first_pos < third_pos);
    }

    #[test]
    fn test_window_drops_oldest_when_over_budget() {
        let mut session = Session::new();
        session.push_user("aaa ".repeat(10).trim().to_string());
        session.push_user("bbb ".repeat(10).trim().to_string());
        session.push_user("ccc ".repeat(10).trim().to_string());

        // Budget fits only the two newest messages
        let window = recent_user_window(&session, 20);
        assert!(!window.contains("aaa"));
        assert!(window.contains("bbb"));
        assert!(window.contains("ccc"));
    }

    #[test]
    fn test_window_truncates_single_oversized_message() {
        let mut session = Session::new();
        let long: String = (0..50).map(|i| format!("w{} ", i)).collect();
        session.push_user(long.trim().to_string());

        let window = recent_user_window(&session, 10);
        assert_eq!(window.split_whitespace().count(), 10);
        // The tail survives, not the head
        assert!(window.contains("w49"));
        assert!(!window.contains("w0 "));
    }

    #[test]
    fn test_window_empty_without_user_messages() {
        let mut session = Session::new();
        session.push_assistant("hello");
        assert!(recent_user_window(&session, 100).is_empty());
    }

    #[test]
    fn test_fallback_lines_are_in_character() {
        for stage in [
            Stage::Welcome,
            Stage::Discovery,
            Stage::MiningBeliefs,
            Stage::ValuesDefinition,
            Stage::DistillingWhy,
            Stage::CompletionCheck,
            Stage::Integration,
            Stage::TransitionReadiness,
            Stage::Unknown,
        ] {
            let line = fallback_line(stage);
            assert!(!line.is_empty());
            assert!(!line.to_lowercase().contains("error"));
        }
    }
}
