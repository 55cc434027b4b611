use dotenvy::dotenv;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    /// Longest silence tolerated between two chunks of a chat reply.
    pub stream_idle_timeout: Duration,
    /// Deadline for the plain request/response calls.
    pub request_timeout: Duration,
    pub max_upload_bytes: u64,
    /// Documents a session may hold.
    pub max_files: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            stream_idle_timeout: Duration::from_secs(120),
            request_timeout: Duration::from_secs(30),
            max_upload_bytes: 10 * MIB,
            max_files: 10,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        dotenv().ok();
        let defaults = Self::default();
        Self {
            api_base_url: env::var("ORACULO_API_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.api_base_url),
            stream_idle_timeout: env_secs("ORACULO_STREAM_IDLE_TIMEOUT_SECS")
                .unwrap_or(defaults.stream_idle_timeout),
            request_timeout: env_secs("ORACULO_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout),
            max_upload_bytes: env_mib("ORACULO_MAX_UPLOAD_MB")
                .unwrap_or(defaults.max_upload_bytes),
            max_files: env_u64("ORACULO_MAX_FILES")
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.max_files),
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            tracing::warn!(target: "oraculo::config", key, value = %raw, "ignoring invalid setting");
            None
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    env_u64(key).map(Duration::from_secs)
}

fn env_mib(key: &str) -> Option<u64> {
    let mb = env_u64(key)?;
    mib_to_bytes(mb).or_else(|| {
        tracing::warn!(target: "oraculo::config", key, value = mb, "ignoring setting too large to represent");
        None
    })
}

fn mib_to_bytes(mb: u64) -> Option<u64> {
    mb.checked_mul(MIB)
}
