//! Phase router
//!
//! Decides, per turn, whether the session stays in its phase, advances to
//! the next one, or terminates. Advancing requires BOTH system readiness
//! (`phase_complete`) and explicit user consent (a transition keyword in the
//! latest message). The two conditions are deliberate and must not be
//! collapsed: completion alone never races the conversation ahead of the
//! user's own sense of closure.

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::Session;
use crate::methodology::Phase;

/// Routing outcome for one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Re-invoke the current phase's handler
    Stay,
    /// Move to the next phase (forward only)
    Advance(Phase),
    /// WHAT is complete; the journey ends
    Terminate,
}

/// Closed-keyword transition intent detection.
///
/// Known fragility, kept behind this single seam so it can be swapped for a
/// real classifier without touching the router's control flow.
pub struct TransitionMatcher {
    pattern: Option<Regex>,
}

impl TransitionMatcher {
    /// Build a matcher from the configured keyword set.
    ///
    /// Keywords are matched case-insensitively on word boundaries. A matcher
    /// that cannot be built (empty set, bad pattern) detects nothing; the
    /// worst case is the session staying in place, never a crashed turn.
    pub fn new(keywords: &[String]) -> Self {
        let escaped: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        if escaped.is_empty() {
            warn!("TransitionMatcher::new: no usable keywords, transitions disabled");
            return Self { pattern: None };
        }

        let source = format!(r"(?i)\b(?:{})\b", escaped.join("|"));
        let pattern = match Regex::new(&source) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(error = %e, "TransitionMatcher::new: pattern build failed, transitions disabled");
                None
            }
        };

        Self { pattern }
    }

    /// Whether the text carries an explicit forward-transition signal
    pub fn detects_transition_intent(&self, text: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(text),
            None => false,
        }
    }
}

/// The phase state machine: WHY -> HOW -> WHAT -> (terminal)
pub struct PhaseRouter {
    matcher: TransitionMatcher,
}

impl PhaseRouter {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            matcher: TransitionMatcher::new(keywords),
        }
    }

    /// Route the current turn.
    ///
    /// Reads fully-updated state: the completion flag is the previous turn's
    /// detector result, the message is the one just appended.
    pub fn route(&self, session: &Session) -> RouteDecision {
        debug!(
            phase = %session.phase,
            phase_complete = session.phase_complete,
            "route: called"
        );

        match session.phase {
            Phase::Why | Phase::How => {
                if !session.phase_complete {
                    return RouteDecision::Stay;
                }
                let consented = session
                    .latest_user_message()
                    .map(|text| self.matcher.detects_transition_intent(text))
                    .unwrap_or(false);
                match (consented, session.phase.next()) {
                    (true, Some(next)) => {
                        debug!(%next, "route: completion and consent, advancing");
                        RouteDecision::Advance(next)
                    }
                    _ => RouteDecision::Stay,
                }
            }
            Phase::What => {
                if session.phase_complete {
                    debug!("route: WHAT complete, terminating");
                    RouteDecision::Terminate
                } else {
                    RouteDecision::Stay
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MethodologyConfig;

    fn router() -> PhaseRouter {
        PhaseRouter::new(&MethodologyConfig::default().transition_keywords)
    }

    fn session_with(phase: Phase, complete: bool, last_message: &str) -> Session {
        let mut session = Session::new();
        // Phase is monotonic; walk forward to the target
        while session.phase != phase {
            let next = session.phase.next().unwrap();
            session.advance_to(next);
        }
        session.phase_complete = complete;
        session.push_user(last_message);
        session
    }

    #[test]
    fn test_stays_without_completion() {
        let session = session_with(Phase::Why, false, "I'm ready to move on");
        assert_eq!(router().route(&session), RouteDecision::Stay);
    }

    #[test]
    fn test_stays_without_consent() {
        // Two-guard law: completion alone never advances
        let session = session_with(Phase::Why, true, "tell me more about that");
        assert_eq!(router().route(&session), RouteDecision::Stay);
    }

    #[test]
    fn test_advances_with_both_guards() {
        let session = session_with(Phase::Why, true, "I'm ready to move on");
        assert_eq!(router().route(&session), RouteDecision::Advance(Phase::How));

        let session = session_with(Phase::How, true, "let's proceed");
        assert_eq!(router().route(&session), RouteDecision::Advance(Phase::What));
    }

    #[test]
    fn test_what_terminates_on_completion_without_consent() {
        // No phase follows WHAT; completion alone ends the machine
        let session = session_with(Phase::What, true, "anything at all");
        assert_eq!(router().route(&session), RouteDecision::Terminate);

        let session = session_with(Phase::What, false, "still working");
        assert_eq!(router().route(&session), RouteDecision::Stay);
    }

    #[test]
    fn test_empty_transcript_is_no_signal() {
        let mut session = Session::new();
        session.phase_complete = true;
        assert_eq!(router().route(&session), RouteDecision::Stay);
    }

    #[test]
    fn test_keyword_matching_respects_word_boundaries() {
        let matcher = TransitionMatcher::new(&["ready".to_string(), "move on".to_string()]);
        assert!(matcher.detects_transition_intent("I am READY."));
        assert!(matcher.detects_transition_intent("ok, let's move on now"));
        assert!(!matcher.detects_transition_intent("I've already told you"));
        assert!(!matcher.detects_transition_intent("that movie was great"));
    }

    #[test]
    fn test_empty_keyword_set_detects_nothing() {
        let matcher = TransitionMatcher::new(&[]);
        assert!(!matcher.detects_transition_intent("ready to move on"));

        let matcher = TransitionMatcher::new(&["   ".to_string()]);
        assert!(!matcher.detects_transition_intent("ready"));
    }
}
