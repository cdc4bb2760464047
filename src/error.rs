//! Error types shared by the engine and the controllers.
//!
//! Transport and service failures both end up as a single human-readable string (their
//! `Display`); precondition rejections are separate types because they never reach the
//! network or the conversation history.

use std::time::Duration;
use thiserror::Error;

/// Failure of a call to the analysis service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service could not be reached or the connection broke mid-request.
    #[error("could not reach the analysis service: {0}")]
    Transport(String),
    #[error("request timed out after {}", humantime::format_duration(.0.clone()))]
    Timeout(Duration),
    /// The service answered with a failure status or a logically failed payload.
    #[error("{0}")]
    Service(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Transport(format!("timed out: {e}"))
        } else if e.is_decode() {
            ServiceError::Service(format!("invalid response from analysis service: {e}"))
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

/// Rejection of an ingest request before any side effect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("repository URL is empty")]
    EmptyUrl,
    #[error("an ingestion is already in progress")]
    Busy,
}

/// Rejection of a question before any side effect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("question is empty")]
    EmptyQuestion,
    #[error("a question is already being answered")]
    Busy,
    #[error("conversation {0} does not exist")]
    UnknownSession(uuid::Uuid),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    NotFound(uuid::Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_render_as_plain_messages() {
        assert_eq!(
            ServiceError::Service("No knowledge base found.".into()).to_string(),
            "No knowledge base found."
        );
        assert_eq!(
            ServiceError::Timeout(Duration::from_secs(90)).to_string(),
            "request timed out after 1m 30s"
        );
        assert!(ServiceError::Transport("connection refused".into())
            .to_string()
            .contains("connection refused"));
    }
}
