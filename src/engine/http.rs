use super::{AnalysisService, IngestReply, QueryReply};
use crate::error::ServiceError;
use crate::model::ClientConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

const INGEST_FALLBACK: &str = "Failed to ingest repository";
const QUERY_FALLBACK: &str = "Failed to get response";

/// reqwest-backed client for the analysis service (`POST /ingest`, `POST /query`).
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct IngestRequest<'a> {
    github_url: &'a str,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

impl HttpAnalysisClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(cfg.user_agent.clone());
        if let Some(path) = cfg.certificate_path.as_deref() {
            builder = builder.add_root_certificate(load_certificate(path)?);
        }
        let http = builder.build().context("build HTTP client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, fallback: &str) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        tracing::debug!(%url, "POST");
        let resp = self.http.post(&url).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            tracing::debug!(%url, %status, "service returned failure status");
            return Err(ServiceError::Service(error_detail(status, &text, fallback)));
        }
        serde_json::from_str(&text).map_err(|e| {
            ServiceError::Service(format!("invalid response from analysis service: {e}"))
        })
    }
}

impl AnalysisService for HttpAnalysisClient {
    async fn ingest(&self, source_url: &str) -> Result<IngestReply, ServiceError> {
        self.post_json(
            "ingest",
            &IngestRequest {
                github_url: source_url,
            },
            INGEST_FALLBACK,
        )
        .await
    }

    async fn query(&self, question: &str) -> Result<QueryReply, ServiceError> {
        self.post_json("query", &QueryRequest { query: question }, QUERY_FALLBACK)
            .await
    }
}

/// Read a PEM certificate, falling back to DER.
fn load_certificate(path: &Path) -> Result<reqwest::Certificate> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("read certificate {}", path.display()))?;
    reqwest::Certificate::from_pem(&bytes)
        .or_else(|_| reqwest::Certificate::from_der(&bytes))
        .with_context(|| format!("parse certificate {}", path.display()))
}

/// Human-readable reason for a failed response. Uses the body's `detail` (a string, or a list
/// of validation objects carrying `msg`), then `message`, then a generic fallback with the status.
pub(crate) fn error_detail(status: StatusCode, body: &str, fallback: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let from_body = parsed.as_ref().and_then(|v| {
        let detail = match v.get("detail") {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(serde_json::Value::Array(items)) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|i| i.get("msg").and_then(|m| m.as_str()))
                    .collect();
                (!msgs.is_empty()).then(|| msgs.join("; "))
            }
            _ => None,
        };
        detail.or_else(|| {
            v.get("message")
                .and_then(|m| m.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
    });
    from_body.unwrap_or_else(|| format!("{fallback} (HTTP {})", status.as_u16()))
}
