//! Session-layer orchestration.
//!
//! This module owns the two request state machines (repository ingestion and question
//! dispatch) and the command loop that drives them for the TUI. Presentation layers read the
//! shared [`StoreHandle`] directly and call into this module for anything that talks to the
//! analysis service.

mod busy;
mod controller;
mod ingest;
mod query;
#[cfg(test)]
mod testing;

pub use busy::BusyProbe;
pub(crate) use controller::{run_controller, UiCommand};
pub use ingest::{IngestErrorView, IngestOutcome, IngestionController};
pub use query::{QueryDispatcher, SendOutcome};

use crate::engine::AnalysisService;
use crate::model::ClientConfig;
use crate::store::StoreHandle;
use std::sync::Arc;

/// Both controllers wired to one service and one store.
pub struct Orchestrator<S> {
    pub ingest: IngestionController<S>,
    pub query: QueryDispatcher<S>,
    store: StoreHandle,
}

impl<S: AnalysisService> Orchestrator<S> {
    pub fn new(service: S, store: StoreHandle, cfg: &ClientConfig) -> Self {
        let service = Arc::new(service);
        Self {
            ingest: IngestionController::new(service.clone(), store.clone())
                .with_timeout(cfg.ingest_timeout),
            query: QueryDispatcher::new(service, store.clone()).with_timeout(cfg.query_timeout),
            store,
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }
}
