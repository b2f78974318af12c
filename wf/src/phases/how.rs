//! HOW phase handler
//!
//! Same shape as the WHY handler with a shorter script: the phase turns the
//! anchored purpose into the distinctive ways the business operates.

use async_trait::async_trait;
use tracing::debug;

use crate::config::MethodologyConfig;
use crate::domain::Session;
use crate::llm::LlmClient;
use crate::methodology::{Phase, Stage};

use super::{PhaseHandler, TurnOutcome, continuation_turn, free_text_turn, structured_turn, welcome_turn};

/// Greeting shown the moment the session advances into HOW
pub(crate) const ENTRY_GREETING: &str = "Your purpose is anchored - well done. Now we move from why you exist to \
     how you bring it to life: the strengths and disciplines that make your \
     purpose real in daily work. Whenever you're ready, we'll dig in.";

/// Framing reply for the first real turn of the phase
const WELCOME_REPLY: &str = "Let's look at how your purpose already lives in the business. What do you \
     do differently from everyone else who sells something similar?";

/// Specialist handler for the HOW phase
pub struct HowHandler {
    config: MethodologyConfig,
}

impl HowHandler {
    pub fn new(config: MethodologyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PhaseHandler for HowHandler {
    fn phase(&self) -> Phase {
        Phase::How
    }

    async fn handle(&self, session: &Session, llm: &dyn LlmClient) -> TurnOutcome {
        debug!(stage = %session.stage, "HowHandler::handle: called");
        match session.stage {
            Stage::Welcome => welcome_turn(Phase::How, WELCOME_REPLY, session, &self.config),
            Stage::Discovery | Stage::Integration | Stage::TransitionReadiness => {
                free_text_turn(Phase::How, session, llm, &self.config).await
            }
            Stage::CompletionCheck => structured_turn(Phase::How, session, llm, &self.config).await,
            // Stages outside this phase's script fall back to continuation
            _ => continuation_turn(Phase::How, session, &self.config),
        }
    }
}
