//! One chat turn: send, stream the reply into the transcript, reconcile.

use crate::session_service::reconcile;
use crate::text_stream::text_chunks;
use domain::backend::AgentBackend;
use domain::session::Message;
use domain::store::{Action, Store};
use futures::StreamExt;
use shared::telemetry::Telemetry;
use shared::types::Result;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a turn was not started. The store is untouched in every case.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TurnRejection {
    #[error("message is empty")]
    EmptyInput,
    #[error("no active session")]
    NoSession,
    #[error("the agent is still answering")]
    Busy,
    #[error("documents are still uploading")]
    UploadInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Rejected(TurnRejection),
    /// The reply streamed to completion.
    Completed { reply_chars: usize },
    /// The turn aborted; whatever had arrived stays in the transcript.
    Failed { error: String },
}

/// Running text of the reply being assembled.
#[derive(Debug, Default)]
pub struct ReplyAccumulator {
    text: String,
}

impl ReplyAccumulator {
    /// Appends one decoded chunk and returns the store update for it.
    pub fn push(&mut self, chunk: &str) -> Action {
        self.text.push_str(chunk);
        Action::ReplaceLastAgentMessage(self.text.clone())
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

pub struct ChatService<B> {
    backend: Arc<B>,
    store: Store,
    idle_timeout: Duration,
}

impl<B: AgentBackend> ChatService<B> {
    pub fn new(backend: Arc<B>, store: Store, idle_timeout: Duration) -> Self {
        Self {
            backend,
            store,
            idle_timeout,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Checks whether a turn with `input` may start right now.
    pub fn admit(&self, input: &str) -> std::result::Result<String, TurnRejection> {
        if input.trim().is_empty() {
            return Err(TurnRejection::EmptyInput);
        }
        self.store.select(|s| {
            if s.is_loading {
                Err(TurnRejection::Busy)
            } else if s.is_uploading {
                Err(TurnRejection::UploadInFlight)
            } else {
                s.session_id.clone().ok_or(TurnRejection::NoSession)
            }
        })
    }

    /// Runs one turn. Loading is always released and the session always
    /// reconciled once the turn has started, whatever happens to the reply.
    pub async fn send_message(&self, input: &str) -> TurnOutcome {
        let session_id = match self.admit(input) {
            Ok(id) => id,
            Err(rejection) => {
                tracing::debug!(target: "oraculo::chat", %rejection, "turn rejected");
                return TurnOutcome::Rejected(rejection);
            }
        };

        let telemetry = Telemetry::new();
        self.store.dispatch(Action::AddMessage(Message::human(input)));
        let loading = self
            .store
            .hold(Action::SetLoading(true), Action::SetLoading(false));

        let streamed = self.stream_reply(&session_id, input).await;

        drop(loading);
        if let Err(err) = reconcile(self.backend.as_ref(), &self.store).await {
            tracing::warn!(target: "oraculo::chat", error = %format!("{err:#}"), "session reconciliation failed");
        }

        match streamed {
            Ok(reply_chars) => {
                tracing::info!(
                    target: "oraculo::chat",
                    reply_chars,
                    elapsed_ms = telemetry.elapsed_ms() as u64,
                    "turn completed"
                );
                TurnOutcome::Completed { reply_chars }
            }
            Err(err) => {
                let error = format!("{err:#}");
                tracing::error!(target: "oraculo::chat", error = %error, "chat turn failed");
                TurnOutcome::Failed { error }
            }
        }
    }

    async fn stream_reply(&self, session_id: &str, input: &str) -> Result<usize> {
        let reply = self.backend.send_chat(session_id, input).await?;
        if let Some(agent) = reply.active_agent {
            self.store.dispatch(Action::SetActiveAgent(agent));
        }
        self.store.dispatch(Action::AddMessage(Message::agent("")));

        let mut accumulator = ReplyAccumulator::default();
        let mut pieces = text_chunks(reply.chunks, self.idle_timeout);
        let mut broken = None;
        while let Some(piece) = pieces.next().await {
            match piece {
                Ok(piece) => self.store.dispatch(accumulator.push(&piece)),
                Err(err) => {
                    broken = Some(err);
                    break;
                }
            }
        }
        // A partial reply is tagged from what arrived.
        self.store.dispatch(Action::FinalizeLastAgentMessage);
        match broken {
            Some(err) => Err(err),
            None => Ok(accumulator.char_count()),
        }
    }
}
