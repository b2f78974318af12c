//! Prompt rendering
//!
//! System instructions for the stage handlers, rendered from embedded
//! Handlebars templates with per-phase and per-stage substitutions.

use handlebars::Handlebars;
use serde::Serialize;

use crate::methodology::{Phase, Stage};

mod embedded;

/// Template context for prompt rendering
#[derive(Debug, Serialize)]
pub struct PromptContext {
    pub phase_label: &'static str,
    pub phase_goal: &'static str,
    pub stage_focus: &'static str,
}

/// The discovery goal pursued across a whole phase
pub fn phase_goal(phase: Phase) -> &'static str {
    match phase {
        Phase::Why => {
            "surface the leader's core purpose - the belief their business exists to serve, \
             beyond any product or revenue"
        }
        Phase::How => {
            "translate the purpose into the distinctive ways this business operates - the \
             strengths and disciplines that make the purpose real"
        }
        Phase::What => {
            "connect purpose and practice to concrete offerings - the products, services, and \
             proof points the outside world actually sees"
        }
    }
}

/// What the coach is concentrating on at a given sub-stage
pub fn stage_focus(phase: Phase, stage: Stage) -> &'static str {
    match (phase, stage) {
        (Phase::Why, Stage::Discovery) => {
            "explore the origin story: why this business was started, what moment made the \
             leader care, and what kept them going when it was hard"
        }
        (Phase::Why, Stage::MiningBeliefs) => {
            "mine for core beliefs: listen for conviction statements about how the world, \
             customers, or the industry ought to work, and name them back"
        }
        (Phase::Why, Stage::ValuesDefinition) => {
            "define values as behaviors: turn each belief into something the team visibly does, \
             not an abstract noun on a poster"
        }
        (Phase::Why, Stage::DistillingWhy) => {
            "distill the purpose into one sentence the leader would say out loud to a customer, \
             testing candidate phrasings against their own stories"
        }
        (Phase::Why, Stage::Integration) => {
            "connect the purpose to daily reality: where recent decisions already expressed it, \
             and where it would have changed a call they made"
        }
        (Phase::How, Stage::Discovery) => {
            "explore how the purpose already shows up in the way the business operates: what \
             they do differently from everyone else who sells something similar"
        }
        (Phase::How, Stage::Integration) => {
            "pressure-test the named strengths: which would survive a bad quarter, and which \
             are accidental habits rather than chosen disciplines"
        }
        (Phase::What, Stage::Discovery) => {
            "map the concrete offerings: what customers actually buy, and how each one does or \
             does not prove the purpose"
        }
        (Phase::What, Stage::Integration) => {
            "align the portfolio: what to amplify, what to retire, and what new proof point the \
             purpose is asking for"
        }
        (_, Stage::TransitionReadiness) => {
            "reflect the finished work back to the leader and check, without pushing, whether \
             it feels true enough to build on"
        }
        _ => "continue the conversation where the leader left it, deepening what they just said",
    }
}

fn renderer() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    // Prompts are plain text; HTML escaping would mangle quotes
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
}

/// Render the free-text coaching instruction for a phase/stage
pub fn render_coach(phase: Phase, stage: Stage) -> Result<String, handlebars::RenderError> {
    let handlebars = renderer();
    let context = PromptContext {
        phase_label: phase.label(),
        phase_goal: phase_goal(phase),
        stage_focus: stage_focus(phase, stage),
    };
    handlebars.render_template(embedded::COACH, &context)
}

/// Render the structured-extraction instruction for a phase
pub fn render_structured(phase: Phase) -> Result<String, handlebars::RenderError> {
    let handlebars = renderer();
    let context = PromptContext {
        phase_label: phase.label(),
        phase_goal: phase_goal(phase),
        stage_focus: "",
    };
    handlebars.render_template(embedded::STRUCTURED, &context)
}
