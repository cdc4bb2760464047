//! In-memory conversation store.
//!
//! Owns every [`Session`] for the lifetime of the process plus the active-session pointer.
//! All operations are synchronous and do no I/O. Writers share the store through a
//! [`StoreHandle`] and take the lock for exactly one operation at a time.

use crate::error::StoreError;
use crate::model::{Message, Session};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct ConversationStore {
    /// Most recent first.
    sessions: Vec<Session>,
    active: Option<Uuid>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly ingested session at the front and make it active. Returns false (and
    /// changes nothing) if a session with the same id already exists.
    pub fn add_session(&mut self, session: Session) -> bool {
        if self.position(session.id).is_some() {
            tracing::warn!(session_id = %session.id, "duplicate session id ignored");
            return false;
        }
        tracing::debug!(session_id = %session.id, label = %session.repository_label, "session added");
        self.active = Some(session.id);
        self.sessions.insert(0, session);
        true
    }

    pub fn select_session(&mut self, id: Uuid) -> Result<&Session, StoreError> {
        let idx = self.position(id).ok_or(StoreError::NotFound(id))?;
        self.active = Some(id);
        Ok(&self.sessions[idx])
    }

    /// Remove a session. Deleting the active session clears the active pointer. Missing ids
    /// are ignored.
    pub fn delete_session(&mut self, id: Uuid) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        self.sessions.remove(idx);
        if self.active == Some(id) {
            self.active = None;
        }
        tracing::debug!(session_id = %id, "session deleted");
        true
    }

    /// Append to a session's history. A session deleted while a request was in flight simply
    /// drops the message; so does a message whose id is already present.
    pub fn append_message(&mut self, session_id: Uuid, message: Message) -> bool {
        let Some(idx) = self.position(session_id) else {
            tracing::warn!(%session_id, "append to missing session dropped");
            return false;
        };
        let session = &mut self.sessions[idx];
        if session.messages.iter().any(|m| m.id == message.id) {
            tracing::warn!(%session_id, message_id = %message.id, "duplicate message id dropped");
            return false;
        }
        session.messages.push(message);
        true
    }

    pub fn list_sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active.and_then(|id| self.session(id))
    }

    /// Messages currently on display: the active session's history, or nothing.
    pub fn active_messages(&self) -> &[Message] {
        self.active_session()
            .map(|s| s.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Start-new-chat: nothing is active until the next ingestion or selection.
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    pub fn session(&self, id: Uuid) -> Option<&Session> {
        self.position(id).map(|idx| &self.sessions[idx])
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }
}

/// Cloneable handle to the single shared store.
#[derive(Debug, Clone, Default)]
pub struct StoreHandle(Arc<Mutex<ConversationStore>>);

impl StoreHandle {
    /// Lock for one operation. Never hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, ConversationStore> {
        // Store operations leave no partial state, so a poisoned lock is still consistent.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn session(label: &str) -> Session {
        Session::new(label.into(), format!("https://github.com/{label}"))
    }

    #[test]
    fn add_makes_session_active_and_selectable() {
        let mut store = ConversationStore::new();
        let s = session("acme/widgets");
        let id = s.id;
        assert!(store.add_session(s));
        assert_eq!(store.active_session().map(|s| s.id), Some(id));

        store.clear_active();
        assert!(store.active_session().is_none());
        assert_eq!(store.select_session(id).map(|s| s.id), Ok(id));
        assert_eq!(store.active_session().map(|s| s.id), Some(id));
    }

    #[test]
    fn sessions_listed_most_recent_first() {
        let mut store = ConversationStore::new();
        let a = session("acme/a");
        let b = session("acme/b");
        let (a_id, b_id) = (a.id, b.id);
        store.add_session(a);
        store.add_session(b);
        let ids: Vec<Uuid> = store.list_sessions().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b_id, a_id]);
        assert_eq!(store.active_session().map(|s| s.id), Some(b_id));
    }

    #[test]
    fn duplicate_session_id_is_ignored() {
        let mut store = ConversationStore::new();
        let s = session("acme/a");
        store.add_session(s.clone());
        assert!(!store.add_session(s));
        assert_eq!(store.list_sessions().len(), 1);
    }

    #[test]
    fn select_missing_reports_not_found_and_keeps_state() {
        let mut store = ConversationStore::new();
        let s = session("acme/a");
        let id = s.id;
        store.add_session(s);
        let missing = Uuid::now_v7();
        assert_eq!(
            store.select_session(missing).map(|s| s.id),
            Err(StoreError::NotFound(missing))
        );
        assert_eq!(store.active_session().map(|s| s.id), Some(id));
    }

    #[test]
    fn deleting_active_clears_pointer_and_display() {
        let mut store = ConversationStore::new();
        let s = session("acme/a");
        let id = s.id;
        store.add_session(s);
        store.append_message(id, Message::user("hi"));
        assert_eq!(store.active_messages().len(), 1);

        assert!(store.delete_session(id));
        assert!(store.active_session().is_none());
        assert!(store.active_messages().is_empty());
        assert!(!store.delete_session(id));
    }

    #[test]
    fn deleting_inactive_keeps_active() {
        let mut store = ConversationStore::new();
        let a = session("acme/a");
        let b = session("acme/b");
        let (a_id, b_id) = (a.id, b.id);
        store.add_session(a);
        store.add_session(b);
        store.delete_session(a_id);
        assert_eq!(store.active_session().map(|s| s.id), Some(b_id));
    }

    #[test]
    fn append_after_delete_is_noop() {
        let mut store = ConversationStore::new();
        let s = session("acme/a");
        let id = s.id;
        store.add_session(s);
        store.delete_session(id);
        assert!(!store.append_message(id, Message::assistant("late", Vec::new())));
        assert!(store.session(id).is_none());
        assert!(store.list_sessions().is_empty());
    }

    #[test]
    fn appends_keep_order() {
        let mut store = ConversationStore::new();
        let s = session("acme/a");
        let id = s.id;
        store.add_session(s);
        store.append_message(id, Message::user("first"));
        let m1 = Message::user("m1");
        let m2 = Message::assistant("m2", Vec::new());
        let (m1_id, m2_id) = (m1.id, m2.id);
        store.append_message(id, m1);
        store.append_message(id, m2);

        let messages = &store.session(id).unwrap().messages;
        let tail: Vec<Uuid> = messages[messages.len() - 2..].iter().map(|m| m.id).collect();
        assert_eq!(tail, vec![m1_id, m2_id]);
        assert_eq!(messages[2].role, Role::Assistant);
    }

    #[test]
    fn duplicate_message_id_is_dropped() {
        let mut store = ConversationStore::new();
        let s = session("acme/a");
        let id = s.id;
        store.add_session(s);
        let m = Message::user("once");
        assert!(store.append_message(id, m.clone()));
        assert!(!store.append_message(id, m));
        assert_eq!(store.session(id).unwrap().messages.len(), 1);
    }

    #[test]
    fn handle_shares_one_store() {
        let handle = StoreHandle::default();
        let other = handle.clone();
        handle.lock().add_session(session("acme/a"));
        assert_eq!(other.lock().list_sessions().len(), 1);
    }
}
