//! One-shot repository ingestion.
//!
//! `Idle -> Pending -> Idle`. A successful ingest registers a new [`Session`] in the store; a
//! failed one keeps a human-readable error on the controller until the next attempt or until
//! it is dismissed. Ingestion errors never enter conversation history.

use super::busy::{BusyFlag, BusyProbe};
use crate::engine::{with_deadline, AnalysisService};
use crate::error::IngestError;
use crate::model::{Session, UNKNOWN_REPOSITORY};
use crate::store::StoreHandle;
use regex::Regex;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_FAILURE: &str = "Failed to ingest repository";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Created { session_id: Uuid, label: String },
    Failed { reason: String },
}

pub struct IngestionController<S> {
    service: Arc<S>,
    store: StoreHandle,
    pending: BusyFlag,
    last_error: Arc<Mutex<Option<String>>>,
    timeout: Option<Duration>,
}

impl<S: AnalysisService> IngestionController<S> {
    pub fn new(service: Arc<S>, store: StoreHandle) -> Self {
        Self {
            service,
            store,
            pending: BusyFlag::default(),
            last_error: Arc::default(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_set()
    }

    pub fn pending_probe(&self) -> BusyProbe {
        self.pending.probe()
    }

    /// Shared view of the retained failure reason, for the popup.
    pub fn error_view(&self) -> IngestErrorView {
        IngestErrorView(self.last_error.clone())
    }

    pub fn dismiss_error(&self) {
        *self.error_slot() = None;
    }

    /// Ingest `source_url` and, on success, register and activate a new session.
    ///
    /// Rejected without side effects when the URL is blank or another ingestion is pending.
    pub async fn ingest(&self, source_url: &str) -> Result<IngestOutcome, IngestError> {
        let url = source_url.trim();
        if url.is_empty() {
            return Err(IngestError::EmptyUrl);
        }
        let Some(_pending) = self.pending.try_claim() else {
            tracing::warn!(url, "ingest rejected: already pending");
            return Err(IngestError::Busy);
        };
        self.dismiss_error();
        tracing::info!(url, "ingesting repository");

        let failure = match with_deadline(self.timeout, self.service.ingest(url)).await {
            Ok(reply) if reply.success => None,
            Ok(reply) if reply.message.trim().is_empty() => Some(DEFAULT_FAILURE.to_string()),
            Ok(reply) => Some(reply.message),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = failure {
            tracing::warn!(url, %reason, "ingestion failed");
            *self.error_slot() = Some(reason.clone());
            return Ok(IngestOutcome::Failed { reason });
        }

        let label = repository_label(url);
        let session = Session::new(label.clone(), url.to_string());
        let session_id = session.id;
        self.store.lock().add_session(session);
        tracing::info!(%session_id, %label, "repository ingested");
        Ok(IngestOutcome::Created { session_id, label })
    }

    fn error_slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only view of an ingestion controller's retained error. The default view never holds
/// one.
#[derive(Debug, Clone, Default)]
pub struct IngestErrorView(Arc<Mutex<Option<String>>>);

impl IngestErrorView {
    pub fn get(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[cfg(test)]
    pub fn holding(reason: &str) -> Self {
        Self(Arc::new(Mutex::new(Some(reason.to_string()))))
    }
}

fn github_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"github\.com/([^/\s?#]+)/([^/\s?#]+)").ok())
        .as_ref()
}

/// `owner/repo` from a `…github.com/<owner>/<repo>[…]` URL, or [`UNKNOWN_REPOSITORY`].
pub fn repository_label(url: &str) -> String {
    github_pattern()
        .and_then(|re| re.captures(url))
        .map(|caps| {
            let repo = &caps[2];
            let repo = repo.strip_suffix(".git").filter(|r| !r.is_empty()).unwrap_or(repo);
            format!("{}/{}", &caps[1], repo)
        })
        .unwrap_or_else(|| UNKNOWN_REPOSITORY.to_string())
}
