//! Question dispatch for one conversation.
//!
//! `Idle -> Sending -> Idle`. The user's message is appended before the service is called; the
//! answer (or an error-flagged assistant message) is appended when the call settles.

use super::busy::{BusyFlag, BusyProbe};
use crate::engine::{with_deadline, AnalysisService};
use crate::error::DispatchError;
use crate::model::Message;
use crate::store::StoreHandle;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Answered { message_id: Uuid },
    Failed { reason: String },
}

pub struct QueryDispatcher<S> {
    service: Arc<S>,
    store: StoreHandle,
    sending: BusyFlag,
    timeout: Option<Duration>,
}

impl<S: AnalysisService> QueryDispatcher<S> {
    pub fn new(service: Arc<S>, store: StoreHandle) -> Self {
        Self {
            service,
            store,
            sending: BusyFlag::default(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_sending(&self) -> bool {
        self.sending.is_set()
    }

    /// Drives the "Analyzing codebase…" indicator.
    pub fn typing_probe(&self) -> BusyProbe {
        self.sending.probe()
    }

    /// Ask `text` within `session_id`.
    ///
    /// Blank text, an unknown session, or a question already in flight are rejected before
    /// anything is appended. The text is sent and stored exactly as typed.
    pub async fn send(&self, session_id: Uuid, text: &str) -> Result<SendOutcome, DispatchError> {
        if text.trim().is_empty() {
            return Err(DispatchError::EmptyQuestion);
        }
        if !self.store.lock().contains(session_id) {
            return Err(DispatchError::UnknownSession(session_id));
        }
        let Some(_sending) = self.sending.try_claim() else {
            tracing::warn!(%session_id, "question rejected: already sending");
            return Err(DispatchError::Busy);
        };

        self.store
            .lock()
            .append_message(session_id, Message::user(text));
        tracing::info!(%session_id, "question sent");

        let (reply, outcome) = match with_deadline(self.timeout, self.service.query(text)).await {
            Ok(answer) => {
                tracing::info!(
                    %session_id,
                    answer_len = answer.answer.len(),
                    sources = answer.sources.as_ref().map_or(0, Vec::len),
                    "answer received"
                );
                let reply = Message::assistant(answer.answer, answer.sources.unwrap_or_default());
                let outcome = SendOutcome::Answered {
                    message_id: reply.id,
                };
                (reply, outcome)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(%session_id, %reason, "question failed");
                (Message::failure(&reason), SendOutcome::Failed { reason })
            }
        };
        if !self.store.lock().append_message(session_id, reply) {
            tracing::info!(%session_id, "reply arrived after its conversation was deleted");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::QueryReply;
    use crate::error::ServiceError;
    use crate::model::{Role, Session};
    use crate::orchestrator::testing::FakeService;

    fn setup(service: FakeService) -> (Arc<QueryDispatcher<FakeService>>, StoreHandle, Uuid) {
        let store = StoreHandle::default();
        let session = Session::new("acme/widgets".into(), "https://github.com/acme/widgets".into());
        let id = session.id;
        store.lock().add_session(session);
        let dispatcher = QueryDispatcher::new(Arc::new(service), store.clone());
        (Arc::new(dispatcher), store, id)
    }

    fn history(store: &StoreHandle, id: Uuid) -> Vec<Message> {
        store
            .lock()
            .session(id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn blank_question_is_rejected_without_append() {
        let (d, store, id) = setup(FakeService::default());
        assert_eq!(d.send(id, "").await, Err(DispatchError::EmptyQuestion));
        assert_eq!(d.send(id, "  \n\t ").await, Err(DispatchError::EmptyQuestion));
        assert!(history(&store, id).is_empty());
        assert!(d.service.queries().is_empty());
        assert!(!d.is_sending());
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let (d, _store, _id) = setup(FakeService::default());
        let missing = Uuid::now_v7();
        assert_eq!(
            d.send(missing, "hello?").await,
            Err(DispatchError::UnknownSession(missing))
        );
        assert!(d.service.queries().is_empty());
    }

    #[tokio::test]
    async fn success_appends_user_then_answer() {
        let service = FakeService::default();
        service.push_query(Ok(QueryReply {
            answer: "It parses **markdown**.".into(),
            sources: Some(vec!["src/markdown.rs".into(), "README.md".into()]),
        }));
        let (d, store, id) = setup(service);

        let outcome = d.send(id, "  What does it do? ").await.unwrap();
        let messages = history(&store, id);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "  What does it do? ");
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(!messages[1].is_error);
        assert_eq!(messages[1].content, "It parses **markdown**.");
        assert_eq!(messages[1].sources, vec!["src/markdown.rs", "README.md"]);
        assert_eq!(
            outcome,
            SendOutcome::Answered {
                message_id: messages[1].id
            }
        );
        assert_eq!(d.service.queries(), vec!["  What does it do? "]);
        assert!(!d.is_sending());
    }

    #[tokio::test]
    async fn missing_sources_become_empty_list() {
        let service = FakeService::default();
        service.push_query(Ok(QueryReply {
            answer: "hi".into(),
            sources: None,
        }));
        let (d, store, id) = setup(service);
        d.send(id, "hello").await.unwrap();
        assert!(history(&store, id)[1].sources.is_empty());
    }

    #[tokio::test]
    async fn failure_appends_one_error_message() {
        let service = FakeService::default();
        service.push_query(Err(ServiceError::Service("HTTP 500".into())));
        let (d, store, id) = setup(service);

        let outcome = d.send(id, "Why?").await.unwrap();
        assert_eq!(
            outcome,
            SendOutcome::Failed {
                reason: "HTTP 500".into()
            }
        );
        let messages = history(&store, id);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        let errors: Vec<&Message> = messages.iter().filter(|m| m.is_error).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].role, Role::Assistant);
        assert!(errors[0].content.contains("HTTP 500"));
        assert!(!d.is_sending());
    }

    #[tokio::test]
    async fn user_message_visible_before_reply_and_resend_rejected() {
        let (d, store, id) = setup(FakeService::gated());
        let probe = d.typing_probe();

        let first = tokio::spawn({
            let d = d.clone();
            async move { d.send(id, "first").await }
        });
        d.service.wait_entered().await;

        let messages = history(&store, id);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "first");
        assert!(probe.get());

        assert_eq!(d.send(id, "second").await, Err(DispatchError::Busy));
        assert_eq!(history(&store, id).len(), 1);

        d.service.release();
        assert!(matches!(
            first.await.unwrap(),
            Ok(SendOutcome::Answered { .. })
        ));
        assert_eq!(history(&store, id).len(), 2);
        assert!(!probe.get());
        assert_eq!(d.service.queries(), vec!["first"]);
    }

    #[tokio::test]
    async fn reply_to_deleted_session_is_dropped() {
        let (d, store, id) = setup(FakeService::gated());
        let pending = tokio::spawn({
            let d = d.clone();
            async move { d.send(id, "anyone there?").await }
        });
        d.service.wait_entered().await;
        assert!(store.lock().delete_session(id));

        d.service.release();
        assert!(pending.await.unwrap().is_ok());
        assert!(store.lock().session(id).is_none());
        assert!(store.lock().list_sessions().is_empty());
        assert!(!d.is_sending());
    }

    #[tokio::test]
    async fn deadline_becomes_error_message() {
        let (d, store, id) = setup(FakeService::gated());
        let d = QueryDispatcher::new(d.service.clone(), store.clone())
            .with_timeout(Some(Duration::from_millis(20)));
        let outcome = d.send(id, "slow?").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Failed { ref reason } if reason.contains("timed out")));
        let messages = history(&store, id);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].is_error);
    }
}
