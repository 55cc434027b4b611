use crate::models::{ClearResult, DocumentUpload, SessionInfo, UploadResult};
use bytes::Bytes;
use futures::stream::BoxStream;
use shared::types::Result;
use std::future::Future;

/// Raw body of a chat reply, in transport order.
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

/// Response to a chat message: the agent the backend routed it to, if it said
/// so, and the reply body as it arrives.
pub struct ChatReply {
    pub active_agent: Option<String>,
    pub chunks: ChunkStream,
}

/// Backend agent API as the client consumes it.
pub trait AgentBackend: Send + Sync {
    /// Creates a new session when `session_id` is `None`, fetches it otherwise.
    fn create_or_fetch_session(
        &self,
        session_id: Option<&str>,
    ) -> impl Future<Output = Result<SessionInfo>> + Send;

    fn upload_document(
        &self,
        session_id: &str,
        upload: DocumentUpload,
    ) -> impl Future<Output = Result<UploadResult>> + Send;

    fn send_chat(
        &self,
        session_id: &str,
        message: &str,
    ) -> impl Future<Output = Result<ChatReply>> + Send;

    fn clear_session(&self, session_id: &str) -> impl Future<Output = Result<ClearResult>> + Send;
}
