//! Finalized phase output record
//!
//! Produced once per phase by a schema-constrained model call; the record is
//! what the router's completion guard keys on.

use serde::{Deserialize, Serialize};

/// A named value paired with the behavior that expresses it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCommitment {
    pub name: String,
    /// Actionable phrasing ("we simplify relentlessly"), not an abstract noun
    pub action_phrase: String,
    pub explanation: String,
}

/// Structured summary of a completed phase's discovery work.
///
/// The same schema serves all three phases; the purpose statement carries the
/// phase's headline finding and the remaining fields its supporting detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutput {
    pub purpose_statement: String,
    #[serde(default)]
    pub beliefs: Vec<String>,
    #[serde(default)]
    pub values: Vec<ValueCommitment>,
    pub integration_narrative: String,
    #[serde(default)]
    pub validation_questions: Vec<String>,
    pub primary_beneficiary: String,
    pub key_outcome: String,
}

impl PhaseOutput {
    /// JSON schema used to constrain the structured model call
    pub fn json_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "purpose_statement": {
                    "type": "string",
                    "description": "A single sentence capturing the phase's headline finding"
                },
                "beliefs": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Core belief statements surfaced during discovery"
                },
                "values": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "action_phrase": { "type": "string" },
                            "explanation": { "type": "string" }
                        },
                        "required": ["name", "action_phrase", "explanation"]
                    },
                    "description": "Values expressed as actionable behaviors"
                },
                "integration_narrative": {
                    "type": "string",
                    "description": "How the findings fit together as one story"
                },
                "validation_questions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Questions the leader can use to pressure-test the result"
                },
                "primary_beneficiary": {
                    "type": "string",
                    "description": "Who benefits most when this purpose is lived"
                },
                "key_outcome": {
                    "type": "string",
                    "description": "The observable outcome that proves the purpose is working"
                }
            },
            "required": [
                "purpose_statement",
                "integration_narrative",
                "primary_beneficiary",
                "key_outcome"
            ]
        })
    }

    /// Gate applied before a model-produced record is accepted as final.
    /// A degenerate reply with empty headline fields must not complete a
    /// phase.
    pub fn validate(&self) -> Result<(), String> {
        if self.purpose_statement.trim().is_empty() {
            return Err("purpose_statement is empty".to_string());
        }
        if self.primary_beneficiary.trim().is_empty() {
            return Err("primary_beneficiary is empty".to_string());
        }
        if self.key_outcome.trim().is_empty() {
            return Err("key_outcome is empty".to_string());
        }
        Ok(())
    }

    /// Short rendering used in the coach's confirmation reply
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Purpose: {}", self.purpose_statement)];
        if !self.beliefs.is_empty() {
            lines.push(format!("Beliefs: {}", self.beliefs.join("; ")));
        }
        if !self.values.is_empty() {
            let values: Vec<&str> = self.values.iter().map(|v| v.name.as_str()).collect();
            lines.push(format!("Values: {}", values.join(", ")));
        }
        lines.push(format!("For: {} — {}", self.primary_beneficiary, self.key_outcome));
        lines.join("\n")
    }
}
