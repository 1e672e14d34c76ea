//! Conversation window.
//!
//! Keeps `[persona] + log` under a token budget by evicting the oldest turns
//! from the front of the log in fixed batches. Nothing is summarized and the
//! remaining turns keep their order.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::estimator::MessageCostEstimator;
use crate::core::errors::ApiError;
use crate::llm::types::ChatMessage;

/// Turns removed per eviction step.
pub const EVICTION_BATCH: usize = 3;

/// What to do when the prompt estimate is over budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Drop the oldest turns until the prompt fits.
    #[default]
    EvictOldest,
    /// Reject the request with `TokenBudgetExceeded`.
    Refuse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered turns of one user. Appends go to the back, evictions come off the
/// front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationLog {
    turns: VecDeque<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: impl IntoIterator<Item = Turn>) -> Self {
        Self {
            turns: turns.into_iter().collect(),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
    }

    pub fn pop_back(&mut self) -> Option<Turn> {
        self.turns.pop_back()
    }

    /// Removes up to `count` turns from the front; returns how many went.
    pub fn evict_front(&mut self, count: usize) -> usize {
        let count = count.min(self.turns.len());
        self.turns.drain(..count);
        count
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }
}

/// Outcome of fitting a log into a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimReport {
    pub evicted: usize,
    pub estimated_tokens: usize,
    pub within_budget: bool,
}

/// Persona-aware window manager.
#[derive(Clone)]
pub struct ConversationWindow {
    persona: String,
    persona_tokens: usize,
    estimator: Arc<dyn MessageCostEstimator>,
}

impl ConversationWindow {
    pub fn new(persona: impl Into<String>, estimator: Arc<dyn MessageCostEstimator>) -> Self {
        let persona = persona.into();
        let persona_tokens = estimator.cost(&persona);
        Self {
            persona,
            persona_tokens,
            estimator,
        }
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn cost(&self, text: &str) -> usize {
        self.estimator.cost(text)
    }

    /// Estimated tokens of `[persona] + log`.
    pub fn estimate(&self, log: &ConversationLog) -> usize {
        self.persona_tokens
            + log
                .iter()
                .map(|turn| self.estimator.cost(&turn.content))
                .sum::<usize>()
    }

    /// Evicts `EVICTION_BATCH` turns at a time from the front until the
    /// estimate is within `budget` or the log is empty.
    pub fn fit(&self, log: &mut ConversationLog, budget: usize) -> TrimReport {
        let mut estimated_tokens = self.estimate(log);
        let mut evicted = 0;

        while estimated_tokens > budget && !log.is_empty() {
            evicted += log.evict_front(EVICTION_BATCH);
            estimated_tokens = self.estimate(log);
        }

        TrimReport {
            evicted,
            estimated_tokens,
            within_budget: estimated_tokens <= budget,
        }
    }

    /// Applies `policy` to a log that already holds the new user turn.
    /// `Refuse` leaves the log untouched.
    pub fn enforce(
        &self,
        log: &mut ConversationLog,
        budget: usize,
        policy: WindowPolicy,
    ) -> Result<TrimReport, ApiError> {
        match policy {
            WindowPolicy::EvictOldest => Ok(self.fit(log, budget)),
            WindowPolicy::Refuse => {
                let estimated_tokens = self.estimate(log);
                if estimated_tokens > budget {
                    return Err(ApiError::TokenBudgetExceeded);
                }
                Ok(TrimReport {
                    evicted: 0,
                    estimated_tokens,
                    within_budget: true,
                })
            }
        }
    }

    /// The request body: persona as the system message, then the log.
    pub fn messages(&self, log: &ConversationLog) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::system(self.persona.clone()))
            .chain(
                log.iter()
                    .map(|turn| ChatMessage::new(turn.role.as_str(), turn.content.clone())),
            )
            .collect()
    }
}
