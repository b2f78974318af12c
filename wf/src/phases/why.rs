//! WHY phase handler
//!
//! The full discovery script: origin story, belief mining, values work,
//! distillation, structured completion, integration, readiness. The other
//! phases follow the same shape with shorter scripts.

use async_trait::async_trait;
use tracing::debug;

use crate::config::MethodologyConfig;
use crate::domain::Session;
use crate::llm::LlmClient;
use crate::methodology::{Phase, Stage};

use super::{PhaseHandler, TurnOutcome, continuation_turn, free_text_turn, structured_turn, welcome_turn};

/// Greeting shown when a WHY session begins
pub(crate) const ENTRY_GREETING: &str = "Welcome. I'm here to help you uncover why your business truly exists - \
     the purpose underneath the products and the revenue. There are no wrong \
     answers here, only your story. When you're ready, tell me a little about \
     the business you lead.";

/// Framing reply for the first real turn of the phase
const WELCOME_REPLY: &str = "Thank you for that. Let's start at the beginning: what was happening in \
     your life when you decided to start this work, and what about it did you \
     simply not want to leave alone?";

/// Specialist handler for the WHY phase
pub struct WhyHandler {
    config: MethodologyConfig,
}

impl WhyHandler {
    pub fn new(config: MethodologyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PhaseHandler for WhyHandler {
    fn phase(&self) -> Phase {
        Phase::Why
    }

    async fn handle(&self, session: &Session, llm: &dyn LlmClient) -> TurnOutcome {
        debug!(stage = %session.stage, "WhyHandler::handle: called");
        match session.stage {
            Stage::Welcome => welcome_turn(Phase::Why, WELCOME_REPLY, session, &self.config),
            Stage::Discovery
            | Stage::MiningBeliefs
            | Stage::ValuesDefinition
            | Stage::DistillingWhy
            | Stage::Integration
            | Stage::TransitionReadiness => free_text_turn(Phase::Why, session, llm, &self.config).await,
            Stage::CompletionCheck => structured_turn(Phase::Why, session, llm, &self.config).await,
            Stage::Unknown => continuation_turn(Phase::Why, session, &self.config),
        }
    }
}
