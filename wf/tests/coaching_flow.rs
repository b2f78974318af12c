//! End-to-end coaching journey tests
//!
//! Drives the public service API through a whole WHY -> HOW -> WHAT journey
//! with a scripted model client and an in-memory checkpoint store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sessionstore::MemoryStore;
use wayfinder::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage, ToolCall};
use wayfinder::service::CoachService;
use wayfinder::state::{SessionError, SessionManager};
use wayfinder::{MethodologyConfig, Phase, Stage};

/// Scripted client: free-text calls get a coaching line, structured calls
/// get a schema-valid record
struct ScriptedLlm;

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if request.tools.is_empty() {
            return Ok(CompletionResponse {
                content: Some("Tell me more about the moment that started all of this.".to_string()),
                tool_calls: vec![],
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            });
        }

        let input = serde_json::json!({
            "purpose_statement": "We exist to keep neighborhood bakers in business",
            "beliefs": ["good bread builds neighborhoods"],
            "values": [{
                "name": "Generosity",
                "action_phrase": "we share our ovens",
                "explanation": "capacity is community"
            }],
            "integration_narrative": "every decision protects the bakers' independence",
            "validation_questions": ["would a baker say this back to us?"],
            "primary_beneficiary": "neighborhood bakers",
            "key_outcome": "bakeries that outlive their founders"
        });
        Ok(CompletionResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "t1".to_string(),
                name: request.tools[0].name.clone(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        })
    }
}

fn service() -> CoachService {
    CoachService::new(
        SessionManager::spawn(MemoryStore::new()),
        Arc::new(ScriptedLlm),
        MethodologyConfig::default(),
    )
}

/// Keep sending neutral content until the phase reports complete
async fn talk_until_complete(service: &CoachService, id: &str) -> wayfinder::TurnReply {
    for _ in 0..12 {
        let reply = service
            .process_turn(id, "here is some more context about our work")
            .await
            .unwrap();
        if reply.phase_complete {
            return reply;
        }
    }
    panic!("phase never completed within the turn budget");
}

#[tokio::test]
async fn test_full_journey_why_to_conclusion() {
    let service = service();
    let session = service.start_session(HashMap::new()).await.unwrap();
    let id = session.id.clone();

    // WHY: first message lands on discovery
    let reply = service.process_turn(&id, "Hello, I run a bakery co-op").await.unwrap();
    assert_eq!(reply.phase, Phase::Why);
    assert_eq!(reply.stage, Stage::Discovery);

    // Discovery converges to a finalized WHY
    let reply = talk_until_complete(&service, &id).await;
    assert_eq!(reply.phase, Phase::Why);
    let snapshot = service.get_session(&id).await.unwrap();
    assert!(snapshot.why_output.is_some());

    // Completion without consent stays put
    let reply = service.process_turn(&id, "interesting, say more").await.unwrap();
    assert_eq!(reply.phase, Phase::Why);

    // Consent advances to HOW with reset counters
    let reply = service.process_turn(&id, "I'm ready to move on").await.unwrap();
    assert_eq!(reply.phase, Phase::How);
    assert_eq!(reply.stage, Stage::Welcome);
    let snapshot = service.get_session(&id).await.unwrap();
    assert_eq!(snapshot.interaction_count, 0);
    assert!(!snapshot.phase_complete);

    // HOW converges and advances on consent
    talk_until_complete(&service, &id).await;
    let reply = service.process_turn(&id, "proceed").await.unwrap();
    assert_eq!(reply.phase, Phase::What);

    // WHAT converges; the next message terminates the machine
    talk_until_complete(&service, &id).await;
    let reply = service.process_turn(&id, "thank you").await.unwrap();
    assert!(reply.concluded);

    // Terminal state absorbs further turns; nothing re-enters a phase
    let reply = service.process_turn(&id, "can we do it again?").await.unwrap();
    assert!(reply.concluded);
    assert_eq!(reply.phase, Phase::What);

    // The persisted record holds all three outputs, consistently ordered
    let final_state = service.get_session(&id).await.unwrap();
    assert!(final_state.why_output.is_some());
    assert!(final_state.how_output.is_some());
    assert!(final_state.what_output.is_some());
    assert!(final_state.outputs_consistent());
    assert!(final_state.concluded);
}

#[tokio::test]
async fn test_phase_sequence_is_forward_only() {
    let service = service();
    let session = service.start_session(HashMap::new()).await.unwrap();
    let id = session.id.clone();

    let mut seen = vec![Phase::Why];
    for message in [
        "we make software for farmers",
        "I'm ready to move on",
        "more context",
        "ready",
        "ready to proceed",
        "more detail",
        "ready again",
    ] {
        let reply = service.process_turn(&id, message).await.unwrap();
        seen.push(reply.phase);
    }

    // Phases may only ever step forward
    for pair in seen.windows(2) {
        let order = |p: Phase| match p {
            Phase::Why => 0,
            Phase::How => 1,
            Phase::What => 2,
        };
        assert!(order(pair[1]) >= order(pair[0]), "phase went backward: {:?}", seen);
    }
}

#[tokio::test]
async fn test_missing_session_is_reported_not_swallowed() {
    let service = service();
    let err = service.process_turn("ghost-session", "hello").await.unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}
