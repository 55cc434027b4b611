use anyhow::{anyhow, Context};
use domain::backend::AgentBackend;
use domain::models::{ClearResult, SessionInfo};
use domain::store::{Action, Store};
use shared::types::Result;
use std::sync::Arc;

/// Copies the reconcilable fields of a session refresh into the store.
///
/// The active agent is always overwritten. The active document and the RAG
/// statistics only when the backend sent them, so a sparse refresh never
/// erases what the client last knew.
pub fn apply_session_info(store: &Store, info: &SessionInfo) {
    store.dispatch(Action::SetActiveAgent(info.active_agent.clone()));
    if let Some(doc_id) = &info.active_doc_id {
        store.dispatch(Action::SetActiveDocId(Some(doc_id.clone())));
    }
    if let Some(stats) = &info.rag_stats {
        store.dispatch(Action::SetRagStats(Some(stats.clone())));
    }
}

/// Re-fetches the current session and applies it. A store without a session
/// id has nothing to reconcile.
pub async fn reconcile<B: AgentBackend>(backend: &B, store: &Store) -> Result<Option<SessionInfo>> {
    let Some(session_id) = store.select(|s| s.session_id.clone()) else {
        return Ok(None);
    };
    let info = backend
        .create_or_fetch_session(Some(&session_id))
        .await
        .with_context(|| format!("refreshing session {session_id}"))?;
    apply_session_info(store, &info);
    Ok(Some(info))
}

pub struct SessionService<B> {
    backend: Arc<B>,
    store: Store,
}

impl<B: AgentBackend> SessionService<B> {
    pub fn new(backend: Arc<B>, store: Store) -> Self {
        Self { backend, store }
    }

    /// Resumes `resume_id` when given, starts a new session otherwise.
    pub async fn bootstrap(&self, resume_id: Option<&str>) -> Result<SessionInfo> {
        let info = self
            .backend
            .create_or_fetch_session(resume_id)
            .await
            .context("could not open a session with the agent API")?;
        self.store.dispatch(Action::SetSessionId(info.session_id.clone()));
        apply_session_info(&self.store, &info);
        tracing::info!(
            target: "oraculo::session",
            session_id = %info.session_id,
            agent = %info.active_agent,
            resumed = resume_id.is_some(),
            "session ready"
        );
        Ok(info)
    }

    pub async fn refresh(&self) -> Result<SessionInfo> {
        reconcile(self.backend.as_ref(), &self.store)
            .await?
            .ok_or_else(|| anyhow!("no active session"))
    }

    /// Clears the backend conversation, then the local transcript. The session
    /// id and the document list stay.
    pub async fn clear(&self) -> Result<ClearResult> {
        let session_id = self
            .store
            .select(|s| s.session_id.clone())
            .ok_or_else(|| anyhow!("no active session"))?;
        let result = self.backend.clear_session(&session_id).await?;
        if result.success {
            self.store.dispatch(Action::SetMessages(Vec::new()));
        } else {
            tracing::warn!(
                target: "oraculo::session",
                session_id = %session_id,
                detail = ?result.detail,
                "backend refused to clear session"
            );
        }
        Ok(result)
    }

    /// Forgets everything, including the session id.
    pub fn reset(&self) {
        self.store.dispatch(Action::Reset);
    }
}
