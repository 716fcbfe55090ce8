//! services/api/src/adapters/drafts.rs
//!
//! In-process `DraftStore`. Drafts survive a dropped socket for as long as the
//! server runs; stale ones are pruned whenever a new draft is written.

use async_trait::async_trait;
use chrono::Utc;
use classroom_core::drafts::AnswerDraft;
use classroom_core::ports::{DraftStore, PortResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryDraftStore {
    drafts: RwLock<HashMap<Uuid, AnswerDraft>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn save_draft(&self, draft: AnswerDraft) -> PortResult<()> {
        let now = Utc::now();
        let mut drafts = self.drafts.write().await;
        drafts.retain(|_, d| d.is_fresh(now));
        drafts.insert(draft.attempt_id, draft);
        Ok(())
    }

    async fn load_draft(&self, attempt_id: Uuid) -> PortResult<Option<AnswerDraft>> {
        Ok(self.drafts.read().await.get(&attempt_id).cloned())
    }

    async fn clear_draft(&self, attempt_id: Uuid) -> PortResult<()> {
        self.drafts.write().await.remove(&attempt_id);
        Ok(())
    }
}
