//! Per-test log of observed state transitions.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::action::Delivery;
use crate::inference::{Inference, StateLabel};
use crate::wait::WaitOutcome;

/// One action and what was observed after it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRecord {
    /// Action description
    pub action: String,
    /// How the action was delivered
    pub delivery: Delivery,
    /// Wait that followed the action, if any
    pub wait: Option<WaitOutcome>,
    /// State observed after the wait
    pub observed: StateLabel,
    /// Probe that produced the observed state
    pub evidence: Option<String>,
    /// Milliseconds since the session started
    pub offset_ms: u64,
}

impl TransitionRecord {
    /// Build a record from an inference
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        delivery: Delivery,
        wait: Option<WaitOutcome>,
        inference: Inference,
        offset: Duration,
    ) -> Self {
        Self {
            action: action.into(),
            delivery,
            wait,
            observed: inference.label,
            evidence: inference.source,
            offset_ms: u64::try_from(offset.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Whether the following wait (if any) timed out
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.wait.is_some_and(|w| !w.is_fulfilled())
    }
}

impl fmt::Display for TransitionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}ms {} via {} -> {}", self.offset_ms, self.action, self.delivery, self.observed)?;
        if let Some(wait) = &self.wait {
            write!(f, " ({wait})")?;
        }
        Ok(())
    }
}

/// Ordered transition records for one test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TransitionLog {
    records: Vec<TransitionRecord>,
}

impl TransitionLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record
    pub fn push(&mut self, record: TransitionRecord) {
        self.records.push(record);
    }

    /// Records in order
    #[must_use]
    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Observed states, in order
    #[must_use]
    pub fn path(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.observed.as_str()).collect()
    }

    /// Most recent record
    #[must_use]
    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.last()
    }
}
