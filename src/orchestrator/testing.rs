//! Scripted in-process analysis service for controller tests.

use crate::engine::{AnalysisService, IngestReply, QueryReply};
use crate::error::ServiceError;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

/// Replies come from the pushed queues, falling back to a success. A gated service parks every
/// call until [`FakeService::release`].
#[derive(Default)]
pub(crate) struct FakeService {
    ingest_replies: Mutex<VecDeque<Result<IngestReply, ServiceError>>>,
    query_replies: Mutex<VecDeque<Result<QueryReply, ServiceError>>>,
    ingested: Mutex<Vec<String>>,
    queries: Mutex<Vec<String>>,
    gated: bool,
    entered: Notify,
    gate: Notify,
}

impl FakeService {
    pub fn gated() -> Self {
        Self {
            gated: true,
            ..Default::default()
        }
    }

    pub fn push_ingest(&self, reply: Result<IngestReply, ServiceError>) {
        self.ingest_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_query(&self, reply: Result<QueryReply, ServiceError>) {
        self.query_replies.lock().unwrap().push_back(reply);
    }

    pub fn ingest_calls(&self) -> usize {
        self.ingested.lock().unwrap().len()
    }

    pub fn ingested_urls(&self) -> Vec<String> {
        self.ingested.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Resolves once a call has reached the service.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    async fn hold(&self) {
        self.entered.notify_one();
        if self.gated {
            self.gate.notified().await;
        }
    }
}

impl AnalysisService for FakeService {
    async fn ingest(&self, source_url: &str) -> Result<IngestReply, ServiceError> {
        self.ingested.lock().unwrap().push(source_url.to_string());
        self.hold().await;
        let scripted = self.ingest_replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(IngestReply {
                success: true,
                message: format!("Successfully ingested and trained on repository: {source_url}"),
            })
        })
    }

    async fn query(&self, question: &str) -> Result<QueryReply, ServiceError> {
        self.queries.lock().unwrap().push(question.to_string());
        self.hold().await;
        let scripted = self.query_replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(QueryReply {
                answer: format!("answer to: {question}"),
                sources: Some(vec!["README.md".into()]),
            })
        })
    }
}
