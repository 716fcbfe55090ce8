//! crates/classroom_core/src/drafts.rs
//!
//! Locally persisted snapshots of in-progress quiz answers, so a student who
//! loses the connection can pick up where they left off.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::quiz::Answer;

/// How long a draft can be restored after it was last written.
pub const DRAFT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerDraft {
    pub attempt_id: Uuid,
    pub answers: BTreeMap<Uuid, Answer>,
    pub saved_at: DateTime<Utc>,
}

impl AnswerDraft {
    pub fn new(attempt_id: Uuid, answers: BTreeMap<Uuid, Answer>, saved_at: DateTime<Utc>) -> Self {
        Self {
            attempt_id,
            answers,
            saved_at,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.saved_at < Duration::hours(DRAFT_TTL_HOURS)
    }
}

/// Returns the draft's answers if it can still be restored.
pub fn restorable(draft: Option<AnswerDraft>, now: DateTime<Utc>) -> Option<BTreeMap<Uuid, Answer>> {
    draft.filter(|d| d.is_fresh(now)).map(|d| d.answers)
}
