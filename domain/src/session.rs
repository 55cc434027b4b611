use serde::{Deserialize, Serialize};

/// Agent the backend starts every session with.
pub const DEFAULT_AGENT: &str = "ORCHESTRATOR";

/// Heading marker that identifies a structured (ABNT preview) reply.
pub const STRUCTURED_HEADING_MARKER: &str = "###";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    #[serde(rename = "ai")]
    Agent,
}

/// How a message should be presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    #[default]
    Plain,
    Structured,
}

impl MessageFormat {
    pub fn classify(content: &str) -> Self {
        if content.contains(STRUCTURED_HEADING_MARKER) {
            Self::Structured
        } else {
            Self::Plain
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub format: MessageFormat,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
            format: MessageFormat::Plain,
        }
    }

    /// Agent messages start out plain; the format is settled once the reply is complete.
    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            format: MessageFormat::Plain,
        }
    }

    pub fn is_agent(&self) -> bool {
        self.role == Role::Agent
    }

    pub fn is_structured(&self) -> bool {
        self.format == MessageFormat::Structured
    }
}
