//! Client state container.
//!
//! [`AppState`] is a plain value and [`Action`] the complete set of ways it can
//! change. [`Store`] shares one `AppState` between the controllers and the
//! renderer and notifies subscribers after every applied action.

use crate::models::{Document, RagStats};
use crate::session::{Message, MessageFormat, DEFAULT_AGENT};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub session_id: Option<String>,
    pub documents: Vec<Document>,
    pub messages: Vec<Message>,
    pub active_agent: String,
    pub active_doc_id: Option<String>,
    pub rag_stats: Option<RagStats>,
    pub is_loading: bool,
    pub upload_count: usize,
    pub is_uploading: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            session_id: None,
            documents: Vec::new(),
            messages: Vec::new(),
            active_agent: DEFAULT_AGENT.to_string(),
            active_doc_id: None,
            rag_stats: None,
            is_loading: false,
            upload_count: 0,
            is_uploading: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetSessionId(String),
    SetDocuments(Vec<Document>),
    AddDocument(Document),
    RemoveDocument(String),
    SetMessages(Vec<Message>),
    AddMessage(Message),
    /// Overwrites the content of the in-flight agent message. No-op when the
    /// last message is not the agent's.
    ReplaceLastAgentMessage(String),
    /// Settles the format tag of the in-flight agent message.
    FinalizeLastAgentMessage,
    SetActiveAgent(String),
    SetActiveDocId(Option<String>),
    SetRagStats(Option<RagStats>),
    SetLoading(bool),
    IncrementUpload,
    DecrementUpload,
    Reset,
}

impl AppState {
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::SetSessionId(id) => self.session_id = Some(id),
            Action::SetDocuments(docs) => self.documents = docs,
            Action::AddDocument(doc) => {
                // Same id replaces in place so the list never holds duplicates.
                match self.documents.iter_mut().find(|d| d.id == doc.id) {
                    Some(existing) => *existing = doc,
                    None => self.documents.push(doc),
                }
            }
            Action::RemoveDocument(id) => self.documents.retain(|d| d.id != id),
            Action::SetMessages(messages) => self.messages = messages,
            Action::AddMessage(message) => self.messages.push(message),
            Action::ReplaceLastAgentMessage(content) => {
                if let Some(last) = self.messages.last_mut().filter(|m| m.is_agent()) {
                    last.content = content;
                }
            }
            Action::FinalizeLastAgentMessage => {
                if let Some(last) = self.messages.last_mut().filter(|m| m.is_agent()) {
                    last.format = MessageFormat::classify(&last.content);
                }
            }
            Action::SetActiveAgent(agent) => self.active_agent = agent,
            Action::SetActiveDocId(id) => self.active_doc_id = id,
            Action::SetRagStats(stats) => self.rag_stats = stats,
            Action::SetLoading(loading) => self.is_loading = loading,
            Action::IncrementUpload => {
                self.upload_count += 1;
                self.is_uploading = true;
            }
            Action::DecrementUpload => {
                self.upload_count = self.upload_count.saturating_sub(1);
                self.is_uploading = self.upload_count > 0;
            }
            Action::Reset => *self = Self::default(),
        }
    }

    /// Pure form of [`AppState::apply`].
    pub fn reduce(mut self, action: Action) -> Self {
        self.apply(action);
        self
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Shared handle to the client state. Clones point at the same state.
#[derive(Clone)]
pub struct Store {
    tx: Arc<watch::Sender<AppState>>,
}

impl Store {
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    pub fn with_state(state: AppState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    /// Applies one action atomically and wakes subscribers.
    pub fn dispatch(&self, action: Action) {
        self.tx.send_modify(|state| state.apply(action));
    }

    pub fn snapshot(&self) -> AppState {
        self.tx.borrow().clone()
    }

    /// Reads a projection without cloning the whole state.
    pub fn select<T>(&self, f: impl FnOnce(&AppState) -> T) -> T {
        f(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }

    /// Dispatches `acquire` now and `release` when the returned guard drops,
    /// including when the owning future is cancelled.
    pub fn hold(&self, acquire: Action, release: Action) -> ReleaseGuard {
        self.dispatch(acquire);
        ReleaseGuard {
            store: self.clone(),
            release: Some(release),
        }
    }
}

/// Pending release action of [`Store::hold`].
#[must_use = "the release action is dispatched as soon as the guard drops"]
pub struct ReleaseGuard {
    store: Store,
    release: Option<Action>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(action) = self.release.take() {
            self.store.dispatch(action);
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
