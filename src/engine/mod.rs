//! Contract of the remote analysis service and its HTTP implementation.

mod http;

pub use http::HttpAnalysisClient;

use crate::error::ServiceError;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

/// Successful-transport reply to an ingest request. `success = false` is a logical failure.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestReply {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryReply {
    #[serde(rename = "response")]
    pub answer: String,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

/// The two operations the session layer consumes. The service remembers the last ingested
/// repository, so a query carries only the question text.
pub trait AnalysisService: Send + Sync + 'static {
    fn ingest(
        &self,
        source_url: &str,
    ) -> impl Future<Output = Result<IngestReply, ServiceError>> + Send;

    fn query(&self, question: &str) -> impl Future<Output = Result<QueryReply, ServiceError>> + Send;
}

/// Await `fut`, failing with [`ServiceError::Timeout`] once `limit` elapses. `None` waits forever.
pub async fn with_deadline<T, F>(limit: Option<Duration>, fut: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ServiceError::Timeout(limit))?,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_expires_into_timeout() {
        let res: Result<(), ServiceError> = with_deadline(
            Some(Duration::from_millis(10)),
            futures::future::pending::<Result<(), ServiceError>>(),
        )
        .await;
        assert!(matches!(res, Err(ServiceError::Timeout(d)) if d == Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn no_deadline_passes_result_through() {
        let res = with_deadline(None, async { Ok::<_, ServiceError>(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }

    #[test]
    fn query_reply_sources_are_optional() {
        let r: QueryReply = serde_json::from_str(r#"{"response":"hi"}"#).unwrap();
        assert_eq!(r.answer, "hi");
        assert!(r.sources.is_none());
    }

    #[test]
    fn ingest_reply_defaults() {
        let r: IngestReply = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(!r.success);
        assert!(r.message.is_empty());
    }
}
