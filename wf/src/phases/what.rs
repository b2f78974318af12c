//! WHAT phase handler
//!
//! Same shape as the other phases: connects purpose and practice to the
//! concrete offerings the outside world sees. Completing this phase ends the
//! journey.

use async_trait::async_trait;
use tracing::debug;

use crate::config::MethodologyConfig;
use crate::domain::Session;
use crate::llm::LlmClient;
use crate::methodology::{Phase, Stage};

use super::{PhaseHandler, TurnOutcome, continuation_turn, free_text_turn, structured_turn, welcome_turn};

/// Greeting shown the moment the session advances into WHAT
pub(crate) const ENTRY_GREETING: &str = "Purpose and practice are in place. The last stretch is WHAT: lining up \
     the things you actually sell and ship with everything we've uncovered, \
     so the outside world sees proof instead of promises.";

/// Framing reply for the first real turn of the phase
const WELCOME_REPLY: &str = "Walk me through what customers actually buy from you today. We'll test each \
     one against the purpose and strengths you've named.";

/// Specialist handler for the WHAT phase
pub struct WhatHandler {
    config: MethodologyConfig,
}

impl WhatHandler {
    pub fn new(config: MethodologyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PhaseHandler for WhatHandler {
    fn phase(&self) -> Phase {
        Phase::What
    }

    async fn handle(&self, session: &Session, llm: &dyn LlmClient) -> TurnOutcome {
        debug!(stage = %session.stage, "WhatHandler::handle: called");
        match session.stage {
            Stage::Welcome => welcome_turn(Phase::What, WELCOME_REPLY, session, &self.config),
            Stage::Discovery | Stage::Integration | Stage::TransitionReadiness => {
                free_text_turn(Phase::What, session, llm, &self.config).await
            }
            Stage::CompletionCheck => structured_turn(Phase::What, session, llm, &self.config).await,
            // Stages outside this phase's script fall back to continuation
            _ => continuation_turn(Phase::What, session, &self.config),
        }
    }
}
