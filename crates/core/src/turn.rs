//! Turn and History domain types.
//!
//! These are the value objects that flow through a chat session:
//! the caller owns a [`History`], hands it to the turn runner, and gets a new
//! one back with exactly one more [`Turn`] in it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The literal appended to every assistant reply to mark the end of a turn.
pub const STOP_MARKER: &str = "[StopSignal]";

/// Unique identifier for a chat session (used for log correlation only).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One (utterance, reply) exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// What the user said
    pub utterance: String,

    /// The normalized assistant reply, terminated with [`STOP_MARKER`]
    pub reply: String,
}

impl Turn {
    pub fn new(utterance: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            reply: reply.into(),
        }
    }
}

/// Ordered sequence of turns; insertion order is chronological order.
///
/// History has value semantics. [`History::with_turn`] returns a new
/// sequence and leaves the receiver untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this history with `turn` appended.
    pub fn with_turn(&self, turn: Turn) -> Self {
        let mut turns = Vec::with_capacity(self.turns.len() + 1);
        turns.extend_from_slice(&self.turns);
        turns.push(turn);
        Self { turns }
    }

    /// Borrow the turns in chronological order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent `n` turns (all of them if there are fewer).
    pub fn last_n(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

impl From<Vec<Turn>> for History {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
