use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

/// Label used when a source URL does not name a GitHub repository.
pub const UNKNOWN_REPOSITORY: &str = "Unknown Repository";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    #[serde(default)]
    pub ingest_timeout: Option<Duration>,
    #[serde(default)]
    pub query_timeout: Option<Duration>,
    #[serde(default)]
    pub certificate_path: Option<std::path::PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            user_agent: format!("gitoracle/{}", env!("CARGO_PKG_VERSION")),
            ingest_timeout: None,
            query_timeout: None,
            certificate_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation. Built only through the constructors below, which keep
/// `is_error` restricted to assistant messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    /// Raw text as typed or as returned by the service; transcoding happens at render time.
    pub content: String,
    #[serde(default)]
    pub sources: Vec<String>,
    pub timestamp: String,
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            timestamp: display_timestamp(),
            is_error: false,
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: Role::Assistant,
            content: content.into(),
            sources,
            timestamp: display_timestamp(),
            is_error: false,
        }
    }

    /// Error-flagged assistant turn explaining why a query failed.
    pub fn failure(reason: &str) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(format!("Sorry, I encountered an error: {reason}"), Vec::new())
        }
    }
}

/// One ingested repository and its conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    /// `owner/name`, or [`UNKNOWN_REPOSITORY`].
    pub repository_label: String,
    pub source_url: String,
    pub messages: Vec<Message>,
    /// Unix seconds at creation.
    #[serde(default)]
    pub created_at: i64,
}

impl Session {
    pub fn new(repository_label: String, source_url: String) -> Self {
        let title = format!("{} - Analysis", repository_name(&repository_label));
        Self {
            id: Uuid::now_v7(),
            title,
            repository_label,
            source_url,
            messages: Vec::new(),
            created_at: OffsetDateTime::now_utc().unix_timestamp(),
        }
    }

    /// Repository part of the label (`widgets` for `acme/widgets`).
    pub fn repository_name(&self) -> &str {
        repository_name(&self.repository_label)
    }
}

fn repository_name(label: &str) -> &str {
    label.split_once('/').map(|(_, name)| name).unwrap_or(label)
}

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Record the local UTC offset. Must run while the process is still single-threaded: on Unix
/// `time` refuses to read the offset once other threads exist.
pub fn capture_local_offset() {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let _ = LOCAL_OFFSET.set(offset);
}

/// Local wall-clock time for message display. UTC if the offset was never captured.
pub fn display_timestamp() -> String {
    let offset = LOCAL_OFFSET.get().copied().unwrap_or(UtcOffset::UTC);
    clock_time(OffsetDateTime::now_utc().to_offset(offset))
}

fn clock_time(at: OffsetDateTime) -> String {
    at.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "--:--:--".into())
}

/// Coarse relative age for session listings.
pub fn time_ago(created_at: i64, now: i64) -> String {
    let secs = (now - created_at).max(0);
    let minutes = secs / 60;
    let hours = secs / 3_600;
    let days = secs / 86_400;
    if days > 0 {
        format!("{days}d ago")
    } else if hours > 0 {
        format!("{hours}h ago")
    } else if minutes > 0 {
        format!("{minutes}m ago")
    } else {
        "Just now".into()
    }
}

/// Events emitted by the command loop for presentation layers.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Ingested { session_id: Uuid, label: String },
    IngestFailed { reason: String },
    Answered { session_id: Uuid, is_error: bool },
    Info(InfoEvent),
}

/// Structured status messages; rendered by [`InfoEvent::to_message`].
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Message(String),
    IngestStarted { url: String },
    IngestBusy,
    QueryBusy,
    SessionGone,
}

impl InfoEvent {
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::IngestStarted { url } => format!("Analyzing {url}…"),
            InfoEvent::IngestBusy => "An analysis is already running".to_string(),
            InfoEvent::QueryBusy => "Still answering the previous question".to_string(),
            InfoEvent::SessionGone => "That conversation no longer exists".to_string(),
        }
    }
}
