//! Wayfinder - conversational strategy-discovery coach
//!
//! Guides business leaders through a WHY -> HOW -> WHAT discovery journey,
//! one conversational turn at a time. The heart of the crate is the
//! phase/stage state machine: a pure stage resolver, a double-guarded phase
//! router, and a completion detector, driven per turn by the engine and
//! checkpointed per session through the store.
//!
//! # Core Concepts
//!
//! - **Forward-only phases**: WHY -> HOW -> WHAT, never backward
//! - **Two-guard transitions**: system readiness AND explicit user consent
//! - **Forced convergence**: discovery cannot wander past the configured
//!   threshold without being pulled to a completion check
//! - **Turns are atomic**: a turn's whole state patch commits or none of it
//!
//! # Modules
//!
//! - [`methodology`] - phase router, stage resolver, completion detector
//! - [`phases`] - per-phase specialist stage handlers
//! - [`engine`] - the per-turn processing loop
//! - [`service`] - session locking and checkpoint round-trips
//! - [`state`] - actor owning the checkpoint store
//! - [`llm`] - LLM client trait and provider implementations
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod llm;
pub mod methodology;
pub mod phases;
pub mod prompts;
pub mod service;
pub mod state;

// Re-export commonly used types
pub use config::{Config, LlmConfig, MethodologyConfig, StorageConfig};
pub use domain::{PhaseOutput, Role, Session, TranscriptMessage, ValueCommitment};
pub use engine::{ProcessedTurn, TurnEngine};
pub use llm::{
    AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client,
};
pub use methodology::{Phase, PhaseRouter, RouteDecision, Stage, TransitionMatcher, is_phase_complete, resolve};
pub use phases::{HowHandler, PhaseHandler, StagePatch, TurnOutcome, WhatHandler, WhyHandler};
pub use service::{CoachService, TurnReply};
pub use state::{SessionCommand, SessionError, SessionManager, SessionResponse};
