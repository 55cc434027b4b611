use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::utils::{is_web_url, normalized_extension};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// File kinds the backend can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Csv,
    Txt,
    Site,
}

impl DocumentKind {
    /// Detects the kind from a file name or URL. Returns `None` for anything
    /// the backend would reject.
    pub fn detect(name: &str) -> Option<Self> {
        if is_web_url(name) {
            return Some(Self::Site);
        }
        match normalized_extension(Path::new(name))?.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "csv" => Some(Self::Csv),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::Csv => "CSV",
            Self::Txt => "TXT",
            Self::Site => "SITE",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference document as the client knows it.
///
/// The id is fabricated locally after a successful upload; the backend never
/// sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub kind: DocumentKind,
    pub size_bytes: u64,
    pub size_chars: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    pub fn new(name: impl Into<String>, kind: DocumentKind, size_bytes: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            size_bytes,
            size_chars: 0,
            uploaded_at: Utc::now(),
        }
    }
}

/// Aggregate metrics of the indexed corpus. Always replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagStats {
    #[serde(default)]
    pub total_chunks: u64,
    #[serde(rename = "documentos_indexados", default)]
    pub indexed_documents: u64,
    #[serde(rename = "media_chars_chunk", default)]
    pub mean_chars_per_chunk: f64,
    #[serde(rename = "documentos_pulpados", default, skip_serializing_if = "Option::is_none")]
    pub skipped_documents: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chars: Option<u64>,
}

/// Session payload returned by `POST /session` and `GET /session/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(default)]
    pub total_docs: u64,
    #[serde(rename = "agente_ativo")]
    pub active_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_doc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_stats: Option<RagStats>,
}

/// Raw file handed to the upload endpoint.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Body of a successful upload. `rag_error` means the file was stored but
/// indexing failed; it is not a failure of the upload itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_stats: Option<RagStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_docs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
