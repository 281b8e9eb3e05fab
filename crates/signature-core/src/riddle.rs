//! Landing riddle gate
//!
//! Verification happens entirely on the remote service; the gate only tracks
//! what is loaded, what the user typed and which notice is on screen. Time is
//! passed in by the caller so delays can be driven from the UI tick.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::whatif::WhatIfContext;

/// Delay between a correct verdict and leaving the gate
pub const PASS_DELAY: Duration = Duration::from_secs(2);
/// How long the "try again" notice stays up
pub const RETRY_NOTICE_TTL: Duration = Duration::from_secs(2);

pub const LOAD_FAILED: &str = "Erreur lors du chargement de la question. Veuillez réessayer.";
pub const NOT_LOADED: &str = "La question n'a pas encore été chargée. Veuillez réessayer.";
pub const VERIFY_FAILED: &str = "Failed to verify the answer. Please try again.";
pub const PASSED: &str =
    "Bravo ! IA SIGNATURE vous félicite. Vous avez bien compris le sens du récit";
pub const RETRY: &str =
    "IA SIGNATURE vous recommande de relire la nouvelle afin de mieux comprends le sens du récit";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Riddle {
    pub question: String,
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyRequest {
    pub response: String,
    pub answers: Vec<String>,
    pub question: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Verdict {
    pub score: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Retry,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: &'static str,
    expires_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    /// Intro text shown, riddle not requested yet
    Hidden,
    Loading,
    Ready,
    Verifying,
    /// Correct answer given; navigation fires once the deadline passes
    Passed { leave_at: Instant },
    Done,
}

#[derive(Debug, Clone)]
pub struct RiddleGate {
    phase: GatePhase,
    riddle: Option<Riddle>,
    pub answer: String,
    notice: Option<Notice>,
    pending_context: Option<WhatIfContext>,
}

impl Default for RiddleGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RiddleGate {
    pub fn new() -> Self {
        Self {
            phase: GatePhase::Hidden,
            riddle: None,
            answer: String::new(),
            notice: None,
            pending_context: None,
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    pub fn riddle(&self) -> Option<&Riddle> {
        self.riddle.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            GatePhase::Loading | GatePhase::Verifying | GatePhase::Passed { .. } | GatePhase::Done
        )
    }

    /// Ask for a (new) riddle. Returns true if the caller should fetch one.
    pub fn request_riddle(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        self.phase = GatePhase::Loading;
        true
    }

    pub fn riddle_loaded(&mut self, result: anyhow::Result<Riddle>) {
        if self.phase != GatePhase::Loading {
            return;
        }

        match result {
            Ok(riddle) => {
                tracing::info!(question = %riddle.question, "riddle loaded");
                self.riddle = Some(riddle);
                self.answer.clear();
                self.notice = None;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to load riddle");
                self.set_notice(NoticeKind::Error, LOAD_FAILED, None);
            }
        }
        self.phase = GatePhase::Ready;
    }

    /// Build the verification request for the current answer.
    ///
    /// Returns `None` when there is nothing to send; a missing riddle also
    /// raises the "not loaded" notice.
    pub fn submit(&mut self) -> Option<VerifyRequest> {
        if self.phase != GatePhase::Ready || self.answer.trim().is_empty() {
            return None;
        }

        let (question, answers) = match self.riddle.as_ref() {
            Some(riddle) if !riddle.answers.is_empty() => {
                (riddle.question.clone(), riddle.answers.clone())
            }
            _ => {
                self.set_notice(NoticeKind::Error, NOT_LOADED, None);
                return None;
            }
        };

        let request = VerifyRequest {
            response: self.answer.clone(),
            answers,
            question,
        };
        self.phase = GatePhase::Verifying;
        Some(request)
    }

    pub fn verdict_received(&mut self, result: anyhow::Result<Verdict>, now: Instant) {
        if self.phase != GatePhase::Verifying {
            return;
        }

        match result {
            Ok(Verdict { score: true }) => {
                let question = self
                    .riddle
                    .as_ref()
                    .map(|r| r.question.clone())
                    .unwrap_or_default();
                self.pending_context = Some(WhatIfContext::new(question, self.answer.clone()));
                self.set_notice(NoticeKind::Success, PASSED, None);
                self.phase = GatePhase::Passed {
                    leave_at: now + PASS_DELAY,
                };
            }
            Ok(Verdict { score: false }) => {
                tracing::info!("riddle answer rejected");
                self.set_notice(NoticeKind::Retry, RETRY, Some(now + RETRY_NOTICE_TTL));
                self.phase = GatePhase::Ready;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to verify riddle answer");
                self.set_notice(NoticeKind::Error, VERIFY_FAILED, None);
                self.phase = GatePhase::Ready;
            }
        }
    }

    /// Advance timers. Returns the navigation context exactly once, when the
    /// pass delay has elapsed.
    pub fn tick(&mut self, now: Instant) -> Option<WhatIfContext> {
        if let Some(expires_at) = self.notice.as_ref().and_then(|n| n.expires_at) {
            if now >= expires_at {
                self.notice = None;
            }
        }

        match self.phase {
            GatePhase::Passed { leave_at } if now >= leave_at => {
                self.phase = GatePhase::Done;
                self.pending_context.take()
            }
            _ => None,
        }
    }

    fn set_notice(&mut self, kind: NoticeKind, text: &'static str, expires_at: Option<Instant>) {
        self.notice = Some(Notice {
            kind,
            text,
            expires_at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_gate() -> RiddleGate {
        let mut gate = RiddleGate::new();
        assert!(gate.request_riddle());
        gate.riddle_loaded(Ok(Riddle {
            question: "What symbol regenerates from fire?".to_string(),
            answers: vec!["the phoenix".to_string(), "le phénix".to_string()],
        }));
        gate
    }

    #[test]
    fn test_correct_verdict_navigates_after_delay() {
        let mut gate = loaded_gate();
        gate.answer = "The Phoenix".to_string();

        let request = gate.submit().unwrap();
        assert_eq!(request.question, "What symbol regenerates from fire?");
        assert_eq!(request.response, "The Phoenix");
        assert_eq!(request.answers.len(), 2);

        let start = Instant::now();
        gate.verdict_received(Ok(Verdict { score: true }), start);
        assert_eq!(gate.notice().map(|n| n.kind), Some(NoticeKind::Success));

        assert!(gate.tick(start + Duration::from_millis(500)).is_none());

        let context = gate.tick(start + PASS_DELAY).unwrap();
        assert_eq!(context.question, "What symbol regenerates from fire?");
        assert_eq!(context.answer, "The Phoenix");

        // Fires once.
        assert!(gate.tick(start + PASS_DELAY * 2).is_none());
        assert_eq!(gate.phase(), GatePhase::Done);
    }

    #[test]
    fn test_wrong_verdict_shows_retry_then_clears() {
        let mut gate = loaded_gate();
        gate.answer = "a dragon".to_string();
        gate.submit().unwrap();

        let start = Instant::now();
        gate.verdict_received(Ok(Verdict { score: false }), start);
        assert_eq!(gate.notice().map(|n| n.text), Some(RETRY));
        assert_eq!(gate.phase(), GatePhase::Ready);

        assert!(gate.tick(start + Duration::from_secs(1)).is_none());
        assert!(gate.notice().is_some());

        assert!(gate.tick(start + RETRY_NOTICE_TTL).is_none());
        assert!(gate.notice().is_none());
        assert_eq!(gate.phase(), GatePhase::Ready);
    }

    #[test]
    fn test_wrong_verdict_allows_new_riddle() {
        let mut gate = loaded_gate();
        gate.answer = "a dragon".to_string();
        gate.submit().unwrap();
        gate.verdict_received(Ok(Verdict { score: false }), Instant::now());

        assert!(gate.request_riddle());
        assert_eq!(gate.phase(), GatePhase::Loading);
    }

    #[test]
    fn test_submit_without_riddle_raises_notice() {
        let mut gate = RiddleGate::new();
        gate.request_riddle();
        gate.riddle_loaded(Err(anyhow::anyhow!("offline")));
        assert_eq!(gate.notice().map(|n| n.text), Some(LOAD_FAILED));

        gate.answer = "phoenix".to_string();
        assert!(gate.submit().is_none());
        assert_eq!(gate.notice().map(|n| n.text), Some(NOT_LOADED));
    }

    #[test]
    fn test_blank_answer_not_sent() {
        let mut gate = loaded_gate();
        gate.answer = "   ".to_string();
        assert!(gate.submit().is_none());
        assert_eq!(gate.phase(), GatePhase::Ready);
    }

    #[test]
    fn test_verify_error_is_inline() {
        let mut gate = loaded_gate();
        gate.answer = "phoenix".to_string();
        gate.submit().unwrap();
        gate.verdict_received(Err(anyhow::anyhow!("timeout")), Instant::now());

        assert_eq!(gate.notice().map(|n| n.kind), Some(NoticeKind::Error));
        assert_eq!(gate.phase(), GatePhase::Ready);
    }

    #[test]
    fn test_no_refetch_while_verifying() {
        let mut gate = loaded_gate();
        gate.answer = "phoenix".to_string();
        gate.submit().unwrap();
        assert!(!gate.request_riddle());
    }

    #[test]
    fn test_riddle_payload_deserializes() {
        let riddle: Riddle = serde_json::from_str(
            r#"{"question": "Quel symbole renaît du feu ?", "answers": ["le phénix"]}"#,
        )
        .unwrap();
        assert_eq!(riddle.answers, vec!["le phénix"]);

        let verdict: Verdict = serde_json::from_str(r#"{"score": true}"#).unwrap();
        assert!(verdict.score);
    }
}
