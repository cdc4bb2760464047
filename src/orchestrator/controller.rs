//! Command loop for interactive front ends.
//!
//! Runs ingestions and questions as background tasks and emits events for presentation layers.

use super::{IngestOutcome, Orchestrator, SendOutcome};
use crate::engine::AnalysisService;
use crate::error::{DispatchError, IngestError};
use crate::model::{AppEvent, InfoEvent};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use uuid::Uuid;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Ingest(String),
    Send { session_id: Uuid, text: String },
    DismissIngestError,
    Quit,
}

fn ingest_event(res: Result<IngestOutcome, IngestError>) -> AppEvent {
    match res {
        Ok(IngestOutcome::Created { session_id, label }) => AppEvent::Ingested { session_id, label },
        Ok(IngestOutcome::Failed { reason }) => AppEvent::IngestFailed { reason },
        Err(IngestError::Busy) => AppEvent::Info(InfoEvent::IngestBusy),
        Err(IngestError::EmptyUrl) => {
            AppEvent::Info(InfoEvent::Message("Enter a repository URL first".into()))
        }
    }
}

fn send_event(session_id: Uuid, res: Result<SendOutcome, DispatchError>) -> Option<AppEvent> {
    match res {
        Ok(SendOutcome::Answered { .. }) => Some(AppEvent::Answered {
            session_id,
            is_error: false,
        }),
        Ok(SendOutcome::Failed { .. }) => Some(AppEvent::Answered {
            session_id,
            is_error: true,
        }),
        Err(DispatchError::Busy) => Some(AppEvent::Info(InfoEvent::QueryBusy)),
        Err(DispatchError::UnknownSession(_)) => Some(AppEvent::Info(InfoEvent::SessionGone)),
        Err(DispatchError::EmptyQuestion) => None,
    }
}

/// Serve UI commands until `Quit` (or the command channel closes). In-flight requests are
/// aborted on exit; their user messages stay in history without a reply.
pub(crate) async fn run_controller<S: AnalysisService>(
    orch: Arc<Orchestrator<S>>,
    event_tx: UnboundedSender<AppEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut tasks: JoinSet<Option<AppEvent>> = JoinSet::new();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Ingest(url)) => {
                        if orch.ingest.is_pending() {
                            let _ = event_tx.send(AppEvent::Info(InfoEvent::IngestBusy));
                            continue;
                        }
                        let _ = event_tx.send(AppEvent::Info(InfoEvent::IngestStarted {
                            url: url.trim().to_string(),
                        }));
                        let orch = orch.clone();
                        tasks.spawn(async move { Some(ingest_event(orch.ingest.ingest(&url).await)) });
                    }
                    Some(UiCommand::Send { session_id, text }) => {
                        let orch = orch.clone();
                        tasks.spawn(async move {
                            send_event(session_id, orch.query.send(session_id, &text).await)
                        });
                    }
                    Some(UiCommand::DismissIngestError) => orch.ingest.dismiss_error(),
                    Some(UiCommand::Quit) | None => break,
                }
            }
            Some(joined) = tasks.join_next() => {
                match joined {
                    Ok(Some(ev)) => {
                        let _ = event_tx.send(ev);
                    }
                    Ok(None) => {}
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => {
                        tracing::error!(error = %e, "request task failed");
                        let _ = event_tx.send(AppEvent::Info(InfoEvent::Message(format!(
                            "Request failed: {e}"
                        ))));
                    }
                }
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClientConfig, Session};
    use crate::orchestrator::testing::FakeService;
    use crate::store::StoreHandle;
    use tokio::sync::mpsc::unbounded_channel;

    struct Harness {
        orch: Arc<Orchestrator<FakeService>>,
        cmd_tx: UnboundedSender<UiCommand>,
        event_rx: UnboundedReceiver<AppEvent>,
        loop_handle: tokio::task::JoinHandle<Result<()>>,
    }

    fn start(service: FakeService) -> Harness {
        let orch = Arc::new(Orchestrator::new(
            service,
            StoreHandle::default(),
            &ClientConfig::default(),
        ));
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();
        let loop_handle = tokio::spawn(run_controller(orch.clone(), event_tx, cmd_rx));
        Harness {
            orch,
            cmd_tx,
            event_rx,
            loop_handle,
        }
    }

    #[tokio::test]
    async fn ingest_then_ask_emits_events_in_order() {
        let mut h = start(FakeService::default());
        h.cmd_tx
            .send(UiCommand::Ingest("https://github.com/acme/widgets".into()))
            .unwrap();

        assert!(matches!(
            h.event_rx.recv().await,
            Some(AppEvent::Info(InfoEvent::IngestStarted { .. }))
        ));
        let session_id = match h.event_rx.recv().await {
            Some(AppEvent::Ingested { session_id, label }) => {
                assert_eq!(label, "acme/widgets");
                session_id
            }
            other => panic!("expected ingestion, got {other:?}"),
        };

        h.cmd_tx
            .send(UiCommand::Send {
                session_id,
                text: "What is this?".into(),
            })
            .unwrap();
        assert!(matches!(
            h.event_rx.recv().await,
            Some(AppEvent::Answered { is_error: false, session_id: id }) if id == session_id
        ));
        assert_eq!(
            h.orch.store().lock().session(session_id).unwrap().messages.len(),
            2
        );

        h.cmd_tx.send(UiCommand::Quit).unwrap();
        h.loop_handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn question_for_missing_session_reports_gone() {
        let mut h = start(FakeService::default());
        h.cmd_tx
            .send(UiCommand::Send {
                session_id: Uuid::now_v7(),
                text: "hello".into(),
            })
            .unwrap();
        assert!(matches!(
            h.event_rx.recv().await,
            Some(AppEvent::Info(InfoEvent::SessionGone))
        ));
        drop(h.cmd_tx);
        h.loop_handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_ingest_is_reported_and_dismissable() {
        let service = FakeService::default();
        service.push_ingest(Err(crate::error::ServiceError::Service("boom".into())));
        let mut h = start(service);
        h.cmd_tx
            .send(UiCommand::Ingest("https://github.com/acme/widgets".into()))
            .unwrap();
        let _started = h.event_rx.recv().await;
        assert!(matches!(
            h.event_rx.recv().await,
            Some(AppEvent::IngestFailed { reason }) if reason == "boom"
        ));
        assert_eq!(h.orch.ingest.error_view().get().as_deref(), Some("boom"));

        h.cmd_tx.send(UiCommand::DismissIngestError).unwrap();
        h.cmd_tx.send(UiCommand::Quit).unwrap();
        h.loop_handle.await.unwrap().unwrap();
        assert!(h.orch.ingest.error_view().get().is_none());
    }

    #[tokio::test]
    async fn quit_aborts_in_flight_question() {
        let h = start(FakeService::gated());
        let session = Session::new("acme/a".into(), "https://github.com/acme/a".into());
        let id = session.id;
        h.orch.store().lock().add_session(session);

        h.cmd_tx
            .send(UiCommand::Send {
                session_id: id,
                text: "slow".into(),
            })
            .unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !h.orch.query.is_sending() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        h.cmd_tx.send(UiCommand::Quit).unwrap();
        h.loop_handle.await.unwrap().unwrap();
        assert!(!h.orch.query.is_sending());
        assert_eq!(h.orch.store().lock().session(id).unwrap().messages.len(), 1);
    }
}
