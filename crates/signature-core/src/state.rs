//! UI-agnostic conversation state
//!
//! A [`MessageStore`] holds the committed turns of one chat session plus the
//! single assistant turn currently being streamed. The TUI (or any other
//! front end) owns one store per chat screen and redraws after each mutation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stream::StreamUpdate;

/// Stable identifier for a turn, used as a render key and to match stream
/// updates with the turn they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The role of a turn's author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One committed message exchanged between the user and the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// The assistant answer currently being received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightTurn {
    pub id: TurnId,
    pub content: String,
}

/// A request produced by a successful submit: what to send upstream and which
/// in-flight turn the response belongs to.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub id: TurnId,
    pub query: String,
    pub history: Vec<Turn>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    turns: Vec<Turn>,
    in_flight: Option<InFlightTurn>,
    revision: u64,
}

impl MessageStore {
    /// Create a store seeded with one introductory assistant turn.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut store = Self::default();
        store.push_turn(Turn::assistant(greeting));
        store
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn in_flight(&self) -> Option<&InFlightTurn> {
        self.in_flight.as_ref()
    }

    pub fn is_streaming(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Incremented on every mutation; renderers use it to detect changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.bump();
    }

    pub fn open_in_flight(&mut self, id: TurnId) {
        self.in_flight = Some(InFlightTurn {
            id,
            content: String::new(),
        });
        self.bump();
    }

    /// Drop the in-flight turn without committing it.
    pub fn clear_in_flight(&mut self) -> Option<InFlightTurn> {
        let cleared = self.in_flight.take();
        if cleared.is_some() {
            self.bump();
        }
        cleared
    }

    /// Append a decoded fragment to the in-flight turn. Returns false if `id`
    /// is not the turn currently in flight.
    pub fn append_fragment(&mut self, id: TurnId, fragment: &str) -> bool {
        match self.in_flight.as_mut() {
            Some(turn) if turn.id == id => {
                turn.content.push_str(fragment);
                self.bump();
                true
            }
            _ => false,
        }
    }

    /// Move the in-flight turn into the conversation under its provisional id.
    pub fn commit_in_flight(&mut self, id: TurnId) -> bool {
        match self.in_flight.take() {
            Some(turn) if turn.id == id => {
                self.turns.push(Turn {
                    id: turn.id,
                    role: TurnRole::Assistant,
                    content: turn.content,
                });
                self.bump();
                true
            }
            other => {
                self.in_flight = other;
                false
            }
        }
    }

    /// Discard the in-flight turn's partial content and append `canned`
    /// instead.
    pub fn fail_in_flight(&mut self, id: TurnId, canned: &str) -> bool {
        match self.in_flight.as_ref() {
            Some(turn) if turn.id == id => {
                self.in_flight = None;
                self.turns.push(Turn::assistant(canned));
                self.bump();
                true
            }
            _ => false,
        }
    }

    /// Start an exchange for `input`.
    ///
    /// Returns `None` without touching the store when the input is blank or a
    /// turn is already in flight.
    pub fn submit(&mut self, input: &str) -> Option<Exchange> {
        if input.trim().is_empty() || self.is_streaming() {
            return None;
        }

        self.push_turn(Turn::user(input));
        let id = TurnId::new();
        self.open_in_flight(id);

        Some(Exchange {
            id,
            query: input.to_string(),
            history: self.turns.clone(),
        })
    }

    /// Apply one stream update for exchange `id`. Updates for any other turn
    /// are ignored and reported as `false`.
    pub fn apply(&mut self, id: TurnId, update: StreamUpdate, failure_text: &str) -> bool {
        match update {
            StreamUpdate::Fragment(text) => self.append_fragment(id, &text),
            StreamUpdate::Finished => self.commit_in_flight(id),
            StreamUpdate::Failed(err) => {
                let applied = self.fail_in_flight(id, failure_text);
                if applied {
                    tracing::warn!(turn = %id, error = %err, "stream failed");
                }
                applied
            }
        }
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
