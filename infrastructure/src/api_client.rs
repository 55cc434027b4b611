use crate::config::Config;
use crate::error::ApiError;
use domain::backend::{AgentBackend, ChatReply};
use domain::models::{ClearResult, DocumentUpload, SessionInfo, UploadResult};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::types::Result;
use std::sync::Arc;
use std::time::Duration;

/// Response header naming the agent that answers a chat message.
pub const AGENT_HEADER: &str = "X-Agent-Active";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ChatRequest<'a> {
    session_id: &'a str,
    message: &'a str,
}

/// HTTP client for the agent API. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    client: Arc<Client>,
    base_url: String,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(ApiError::Config)?;
        Ok(Self {
            client: Arc::new(client),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn create_session(&self) -> Result<SessionInfo> {
        let url = self.url("session");
        let info: SessionInfo = self.call_json(&url, self.client.post(&url)).await?;
        tracing::info!(target: "oraculo::api", session_id = %info.session_id, "session created");
        Ok(info)
    }

    pub async fn fetch_session(&self, session_id: &str) -> Result<SessionInfo> {
        let url = self.url(&format!("session/{session_id}"));
        let info = self.call_json(&url, self.client.get(&url)).await?;
        Ok(info)
    }

    pub async fn upload(&self, session_id: &str, upload: DocumentUpload) -> Result<UploadResult> {
        let url = self.url("upload");
        let size = upload.size_bytes();
        let part = Part::bytes(upload.bytes).file_name(upload.file_name.clone());
        let form = Form::new()
            .text("session_id", session_id.to_string())
            .part("file", part);
        tracing::debug!(target: "oraculo::api", file = %upload.file_name, size, "uploading document");
        let result = self
            .call_json(&url, self.client.post(&url).multipart(form))
            .await?;
        Ok(result)
    }

    /// Opens the chat reply. Only the status line and headers are awaited here;
    /// the body is handed back as a stream.
    pub async fn chat(&self, session_id: &str, message: &str) -> Result<ChatReply> {
        let url = self.url("chat");
        let request = ChatRequest {
            session_id,
            message,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        let response = Self::ensure_success(&url, response).await?;

        let active_agent = response
            .headers()
            .get(AGENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        tracing::debug!(target: "oraculo::api", agent = ?active_agent, "chat stream opened");

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| anyhow::Error::from(ApiError::Stream(e))))
            .boxed();
        Ok(ChatReply {
            active_agent,
            chunks,
        })
    }

    pub async fn clear(&self, session_id: &str) -> Result<ClearResult> {
        let url = self.url("clear");
        let request = self.client.post(&url).query(&[("session_id", session_id)]);
        let result = self.call_json(&url, request).await?;
        Ok(result)
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        url: &str,
        request: RequestBuilder,
    ) -> std::result::Result<T, ApiError> {
        let response = request
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;
        let response = Self::ensure_success(url, response).await?;
        let body = response.text().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn ensure_success(url: &str, response: Response) -> std::result::Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(target: "oraculo::api", url, status = status.as_u16(), "API error");
        Err(ApiError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

impl AgentBackend for ApiClient {
    async fn create_or_fetch_session(&self, session_id: Option<&str>) -> Result<SessionInfo> {
        match session_id {
            None => self.create_session().await,
            Some(id) => self.fetch_session(id).await,
        }
    }

    async fn upload_document(&self, session_id: &str, upload: DocumentUpload) -> Result<UploadResult> {
        self.upload(session_id, upload).await
    }

    async fn send_chat(&self, session_id: &str, message: &str) -> Result<ChatReply> {
        self.chat(session_id, message).await
    }

    async fn clear_session(&self, session_id: &str) -> Result<ClearResult> {
        self.clear(session_id).await
    }
}
