use crate::orchestrator::{BusyProbe, IngestErrorView};
use crate::store::ConversationStore;
use uuid::Uuid;

pub const SUGGESTED_QUESTIONS: [&str; 6] = [
    "What is the main architecture of this project?",
    "Explain the authentication system",
    "How does the database interaction work?",
    "What are the main API endpoints?",
    "Show me the project structure",
    "What dependencies does this project use?",
];

pub const EXAMPLE_REPOSITORIES: [&str; 3] = [
    "https://github.com/facebook/react",
    "https://github.com/vercel/next.js",
    "https://github.com/microsoft/vscode",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Chat,
    /// Repository URL popup.
    Ingest,
    ConfirmDelete(Uuid),
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Input,
}

/// Presentation state owned by the UI thread. Conversation data lives in the store; this only
/// tracks what the user is looking at and typing.
pub struct UiState {
    pub mode: Mode,
    pub focus: Focus,
    pub input: String,
    pub ingest_input: String,
    pub sidebar_selected: usize,
    pub suggestion_selected: Option<usize>,
    pub example_selected: Option<usize>,
    /// Lines scrolled up from the bottom of the chat.
    pub chat_scroll: usize,
    pub info: String,
    pub ingest_error: IngestErrorView,
    pub ingesting: BusyProbe,
    pub typing: BusyProbe,
    pub tick: u64,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            mode: Mode::Chat,
            focus: Focus::Input,
            input: String::new(),
            ingest_input: String::new(),
            sidebar_selected: 0,
            suggestion_selected: None,
            example_selected: None,
            chat_scroll: 0,
            info: String::new(),
            ingest_error: IngestErrorView::default(),
            ingesting: BusyProbe::default(),
            typing: BusyProbe::default(),
            tick: 0,
        }
    }
}

impl UiState {
    pub fn new(ingesting: BusyProbe, typing: BusyProbe, ingest_error: IngestErrorView) -> Self {
        Self {
            ingesting,
            typing,
            ingest_error,
            ..Default::default()
        }
    }

    /// Keep the sidebar cursor inside the session list.
    pub fn clamp_selection(&mut self, store: &ConversationStore) {
        let n = store.list_sessions().len();
        self.sidebar_selected = self.sidebar_selected.min(n.saturating_sub(1));
    }

    pub fn selected_session_id(&self, store: &ConversationStore) -> Option<Uuid> {
        store
            .list_sessions()
            .get(self.sidebar_selected)
            .map(|s| s.id)
    }

    /// Move the sidebar cursor onto the active session, if any.
    pub fn follow_active(&mut self, store: &ConversationStore) {
        if let Some(active) = store.active_session() {
            if let Some(idx) = store.list_sessions().iter().position(|s| s.id == active.id) {
                self.sidebar_selected = idx;
            }
        }
    }

    pub fn cycle_suggestion(&mut self, forward: bool) {
        self.suggestion_selected = Some(cycle(
            self.suggestion_selected,
            SUGGESTED_QUESTIONS.len(),
            forward,
        ));
    }

    /// Step through the example repositories, copying the highlighted one into the URL input.
    pub fn cycle_example(&mut self, forward: bool) {
        let idx = cycle(self.example_selected, EXAMPLE_REPOSITORIES.len(), forward);
        self.example_selected = Some(idx);
        self.ingest_input = EXAMPLE_REPOSITORIES[idx].to_string();
    }

    pub fn open_ingest(&mut self) {
        self.mode = Mode::Ingest;
        self.example_selected = None;
    }
}

fn cycle(current: Option<usize>, len: usize, forward: bool) -> usize {
    match (current, forward) {
        (None, true) => 0,
        (None, false) => len - 1,
        (Some(i), true) => (i + 1) % len,
        (Some(i), false) => (i + len - 1) % len,
    }
}
