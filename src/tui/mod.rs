mod export;
mod help;
mod render;
mod state;

use crate::cli::{build_config, Cli};
use crate::engine::HttpAnalysisClient;
use crate::model::{time_ago, AppEvent};
use crate::orchestrator::{self, Orchestrator, UiCommand};
use crate::store::{ConversationStore, StoreHandle};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Terminal,
};
use state::{Focus, Mode, UiState, EXAMPLE_REPOSITORIES, SUGGESTED_QUESTIONS};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SCROLL_STEP: usize = 5;

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let client = HttpAnalysisClient::new(&cfg)?;
    let store = StoreHandle::default();
    let orch = Arc::new(Orchestrator::new(client, store.clone(), &cfg));

    // Unbounded channels keep the UI thread from ever blocking on the runtime.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let state = UiState::new(
        orch.ingest.pending_probe(),
        orch.query.typing_probe(),
        orch.ingest.error_view(),
    );
    let initial_repo = args.repo.clone();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || {
        run_threaded(initial_repo, store, state, event_rx, cmd_tx)
    });

    let res = orchestrator::run_controller(orch, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    initial_repo: Option<String>,
    store: StoreHandle,
    mut state: UiState,
    mut event_rx: UnboundedReceiver<AppEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // Nothing to chat about yet, so start on the repository popup.
    state.open_ingest();
    if let Some(repo) = initial_repo.filter(|r| !r.trim().is_empty()) {
        state.ingest_input = repo.trim().to_string();
        let _ = cmd_tx.send(UiCommand::Ingest(state.ingest_input.clone()));
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            let store = store.lock();
            apply_event(&mut state, &store, ev);
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            terminal
                .draw(|f| {
                    let store = store.lock();
                    draw(f.area(), f, &state, &store)
                })
                .ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match handle_key(&mut state, &store, k) {
                    KeyAction::None => {}
                    KeyAction::Command(cmd) => {
                        let _ = cmd_tx.send(cmd);
                    }
                    KeyAction::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                }
                // Redraw right away so typing feels immediate.
                dirty = true;
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

#[derive(Debug)]
enum KeyAction {
    None,
    Command(UiCommand),
    Quit,
}

fn handle_key(state: &mut UiState, store: &StoreHandle, key: KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }
    match state.mode.clone() {
        Mode::Help => {
            state.mode = Mode::Chat;
            KeyAction::None
        }
        Mode::ConfirmDelete(id) => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    let mut store = store.lock();
                    state.info = if store.delete_session(id) {
                        "Conversation deleted".into()
                    } else {
                        "Conversation was already gone".into()
                    };
                    state.clamp_selection(&store);
                    state.chat_scroll = 0;
                    state.mode = Mode::Chat;
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    state.info = "Delete cancelled".into();
                    state.mode = Mode::Chat;
                }
                _ => {}
            }
            KeyAction::None
        }
        Mode::Ingest => handle_ingest_key(state, key),
        Mode::Chat => match key.code {
            KeyCode::Tab | KeyCode::BackTab => {
                state.focus = match state.focus {
                    Focus::Sidebar => Focus::Input,
                    Focus::Input => Focus::Sidebar,
                };
                KeyAction::None
            }
            KeyCode::PageUp => {
                state.chat_scroll = state.chat_scroll.saturating_add(SCROLL_STEP);
                KeyAction::None
            }
            KeyCode::PageDown => {
                state.chat_scroll = state.chat_scroll.saturating_sub(SCROLL_STEP);
                KeyAction::None
            }
            _ => match state.focus {
                Focus::Sidebar => handle_sidebar_key(state, store, key),
                Focus::Input => handle_input_key(state, store, key),
            },
        },
    }
}

fn handle_ingest_key(state: &mut UiState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Esc => {
            state.mode = Mode::Chat;
            if state.ingest_error.get().is_some() {
                return KeyAction::Command(UiCommand::DismissIngestError);
            }
        }
        KeyCode::Up => state.cycle_example(false),
        KeyCode::Down => state.cycle_example(true),
        KeyCode::Backspace => {
            state.ingest_input.pop();
            state.example_selected = None;
        }
        KeyCode::Enter => {
            let url = state.ingest_input.trim().to_string();
            if state.ingesting.get() {
                state.info = "An analysis is already running".into();
            } else if url.is_empty() {
                state.info = "Enter a repository URL first".into();
            } else {
                return KeyAction::Command(UiCommand::Ingest(url));
            }
        }
        KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            state.ingest_input.push(c);
            state.example_selected = None;
        }
        _ => {}
    }
    KeyAction::None
}

fn handle_sidebar_key(state: &mut UiState, store: &StoreHandle, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('q') => return KeyAction::Quit,
        KeyCode::Up | KeyCode::Char('k') => {
            state.sidebar_selected = state.sidebar_selected.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.sidebar_selected = state.sidebar_selected.saturating_add(1);
            state.clamp_selection(&store.lock());
        }
        KeyCode::Enter => {
            let mut store = store.lock();
            if let Some(id) = state.selected_session_id(&store) {
                match store.select_session(id) {
                    Ok(session) => state.info = format!("Opened {}", session.title),
                    Err(e) => state.info = e.to_string(),
                }
                state.focus = Focus::Input;
                state.chat_scroll = 0;
                state.suggestion_selected = None;
            }
        }
        KeyCode::Char('n') => {
            state.ingest_input.clear();
            state.open_ingest();
        }
        KeyCode::Char('c') => {
            store.lock().clear_active();
            state.chat_scroll = 0;
            state.info = "Started a new chat".into();
        }
        KeyCode::Char('d') => {
            if let Some(id) = state.selected_session_id(&store.lock()) {
                state.mode = Mode::ConfirmDelete(id);
            }
        }
        KeyCode::Char('y') => export::copy_source_url(store, state),
        KeyCode::Char('e') => export::export_and_show_path(store, state),
        KeyCode::Char('?') => state.mode = Mode::Help,
        _ => {}
    }
    KeyAction::None
}

fn handle_input_key(state: &mut UiState, store: &StoreHandle, key: KeyEvent) -> KeyAction {
    let active = store
        .lock()
        .active_session()
        .map(|s| (s.id, s.messages.is_empty()));
    match key.code {
        KeyCode::Esc => state.focus = Focus::Sidebar,
        KeyCode::Enter => {
            let Some((session_id, is_empty)) = active else {
                state.open_ingest();
                return KeyAction::None;
            };
            if state.input.trim().is_empty() {
                if let (true, Some(i)) = (is_empty, state.suggestion_selected) {
                    state.input = SUGGESTED_QUESTIONS[i].to_string();
                }
                return KeyAction::None;
            }
            if state.typing.get() {
                state.info = "Still answering the previous question".into();
                return KeyAction::None;
            }
            let text = std::mem::take(&mut state.input);
            state.chat_scroll = 0;
            state.suggestion_selected = None;
            return KeyAction::Command(UiCommand::Send { session_id, text });
        }
        KeyCode::Up | KeyCode::Down => {
            if matches!(active, Some((_, true))) && state.input.is_empty() {
                state.cycle_suggestion(key.code == KeyCode::Down);
            }
        }
        KeyCode::Backspace => {
            state.input.pop();
        }
        KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            state.input.push(c);
        }
        _ => {}
    }
    KeyAction::None
}

fn apply_event(state: &mut UiState, store: &ConversationStore, ev: AppEvent) {
    match ev {
        AppEvent::Ingested { label, .. } => {
            if state.mode == Mode::Ingest {
                state.mode = Mode::Chat;
            }
            state.focus = Focus::Input;
            state.ingest_input.clear();
            state.chat_scroll = 0;
            state.suggestion_selected = None;
            state.follow_active(store);
            state.info = format!("Ready: {label}");
        }
        AppEvent::IngestFailed { reason } => {
            state.info = format!(
                "Analysis failed: {}",
                crate::markdown::strip_controls(&reason)
            );
        }
        AppEvent::Answered {
            session_id,
            is_error,
        } => {
            if store.active_session().map(|s| s.id) == Some(session_id) {
                state.chat_scroll = 0;
            }
            state.info = if is_error {
                "The question could not be answered".into()
            } else {
                "Answer received".into()
            };
        }
        AppEvent::Info(info) => state.info = info.to_message(),
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState, store: &ConversationStore) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(20)].as_ref())
        .split(area);
    draw_sidebar(cols[0], f, state, store);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(4),
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(cols[1]);
    draw_header(rows[0], f, store);
    draw_chat(rows[1], f, state, store);
    draw_typing(rows[2], f, state);
    draw_input(rows[3], f, state, store);
    draw_status(rows[4], f, state);

    match &state.mode {
        Mode::Chat => {}
        Mode::Ingest => draw_ingest_popup(centered_rect(area, 76, 16), f, state),
        Mode::ConfirmDelete(id) => {
            if let Some(session) = store.session(*id) {
                draw_confirm_delete(centered_rect(area, 64, 7), f, &session.title);
            }
        }
        Mode::Help => help::draw_help(centered_rect(area, 70, 30), f),
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn draw_sidebar(area: Rect, f: &mut ratatui::Frame, state: &UiState, store: &ConversationStore) {
    let focused = state.mode == Mode::Chat && state.focus == Focus::Sidebar;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(focused))
        .title("Conversations");

    let sessions = store.list_sessions();
    if sessions.is_empty() {
        let p = Paragraph::new(vec![
            Line::from(Span::styled(
                "No conversations yet.",
                Style::default().fg(Color::Gray),
            )),
            Line::from(""),
            Line::from(vec![
                Span::raw("Press "),
                Span::styled("n", Style::default().fg(Color::Magenta)),
                Span::raw(" to analyze"),
            ]),
            Line::from("a repository."),
        ])
        .block(block);
        f.render_widget(p, area);
        return;
    }

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let active_id = store.active_session().map(|s| s.id);
    let items: Vec<ListItem> = sessions
        .iter()
        .map(|s| {
            let marker = if Some(s.id) == active_id { "● " } else { "  " };
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(marker, Style::default().fg(Color::Green)),
                    Span::styled(
                        s.title.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                ]),
                Line::from(Span::styled(
                    format!(
                        "  {} messages · {}",
                        s.messages.len(),
                        time_ago(s.created_at, now)
                    ),
                    Style::default().fg(Color::Gray),
                )),
            ])
        })
        .collect();

    let mut list_state = ListState::default();
    list_state.select(Some(state.sidebar_selected.min(sessions.len() - 1)));
    let list = List::new(items).block(block).highlight_style(if focused {
        Style::default().bg(Color::DarkGray)
    } else {
        Style::default()
    });
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_header(area: Rect, f: &mut ratatui::Frame, store: &ConversationStore) {
    let lines = match store.active_session() {
        Some(s) => vec![
            Line::from(Span::styled(
                s.repository_name().to_string(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )),
            Line::from(vec![
                Span::styled(s.repository_label.clone(), Style::default().fg(Color::Gray)),
                Span::styled(" · ", Style::default().fg(Color::DarkGray)),
                Span::styled(s.source_url.clone(), Style::default().fg(Color::Cyan)),
            ]),
        ],
        None => vec![
            Line::from(Span::styled(
                "GitOracle",
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Chat with any GitHub repository",
                Style::default().fg(Color::Gray),
            )),
        ],
    };
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn draw_chat(area: Rect, f: &mut ratatui::Frame, state: &UiState, store: &ConversationStore) {
    let block = Block::default().borders(Borders::ALL).title("Chat");
    let width = area.width.saturating_sub(2) as usize;
    let height = area.height.saturating_sub(2) as usize;

    let Some(session) = store.active_session() else {
        let p = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "Welcome to GitOracle",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press n in the sidebar to analyze a GitHub repository,"),
            Line::from("or open an existing conversation."),
        ])
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(p, area);
        return;
    };

    if session.messages.is_empty() {
        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Repository Analyzed!",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )),
            Line::from("Ask me anything about the codebase..."),
            Line::from(""),
            Line::from(Span::styled(
                "Suggestions (↑/↓, then enter):",
                Style::default().fg(Color::Gray),
            )),
        ];
        for (i, q) in SUGGESTED_QUESTIONS.iter().enumerate() {
            let selected = state.suggestion_selected == Some(i);
            lines.push(Line::from(Span::styled(
                format!("{} {q}", if selected { "›" } else { " " }),
                if selected {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default().fg(Color::Magenta)
                },
            )));
        }
        f.render_widget(
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .block(block),
            area,
        );
        return;
    }

    let lines = render::wrap_lines(
        session
            .messages
            .iter()
            .flat_map(render::message_lines)
            .collect(),
        width,
    );
    let bottom = lines.len().saturating_sub(height);
    let scroll = state.chat_scroll.min(bottom);
    let top = u16::try_from(bottom - scroll).unwrap_or(u16::MAX);
    f.render_widget(Paragraph::new(lines).block(block).scroll((top, 0)), area);
}

fn draw_typing(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    if !state.typing.get() {
        return;
    }
    let frame = SPINNER[(state.tick % SPINNER.len() as u64) as usize];
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            format!(" {frame} Analyzing codebase…"),
            Style::default().fg(Color::Magenta),
        ))),
        area,
    );
}

fn draw_input(area: Rect, f: &mut ratatui::Frame, state: &UiState, store: &ConversationStore) {
    let focused = state.mode == Mode::Chat && state.focus == Focus::Input;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(focused))
        .title("Ask about the codebase (enter to send)");

    let line = if store.active_session().is_none() {
        Line::from(Span::styled(
            "Analyze a repository first (n)",
            Style::default().fg(Color::DarkGray),
        ))
    } else if state.input.is_empty() && !focused {
        Line::from(Span::styled(
            "Ask me anything about the codebase...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        // Keep the tail visible when the question is longer than the box.
        let room = area.width.saturating_sub(3) as usize;
        let count = state.input.chars().count();
        let visible: String = state.input.chars().skip(count.saturating_sub(room)).collect();
        Line::from(vec![
            Span::raw(visible),
            Span::styled(
                if focused { "▏" } else { "" },
                Style::default().fg(Color::Yellow),
            ),
        ])
    };
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let p = Paragraph::new(Line::from(vec![
        Span::styled(format!(" {}", state.info), Style::default().fg(Color::Gray)),
        Span::styled("  ? help", Style::default().fg(Color::DarkGray)),
    ]));
    f.render_widget(p, area);
}

fn draw_ingest_popup(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines = vec![
        Line::from("Enter a GitHub repository URL:"),
        if state.ingest_input.is_empty() {
            Line::from(Span::styled(
                "> https://github.com/user/repository",
                Style::default().fg(Color::DarkGray),
            ))
        } else {
            Line::from(vec![
                Span::raw("> "),
                Span::raw(state.ingest_input.clone()),
                Span::styled("▏", Style::default().fg(Color::Yellow)),
            ])
        },
        Line::from(""),
        Line::from(Span::styled(
            "Example repositories:",
            Style::default().fg(Color::Gray),
        )),
    ];
    for (i, url) in EXAMPLE_REPOSITORIES.iter().enumerate() {
        let selected = state.example_selected == Some(i);
        lines.push(Line::from(Span::styled(
            format!("{} {url}", if selected { "›" } else { " " }),
            if selected {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Magenta)
            },
        )));
    }
    lines.push(Line::from(""));

    if state.ingesting.get() {
        let frame = SPINNER[(state.tick % SPINNER.len() as u64) as usize];
        lines.push(Line::from(Span::styled(
            format!("{frame} Analyzing repository… this may take a few minutes for large repositories"),
            Style::default().fg(Color::Yellow),
        )));
    } else if let Some(err) = state.ingest_error.get() {
        lines.push(Line::from(Span::styled(
            format!("Error: {}", crate::markdown::strip_controls(&err)),
            Style::default().fg(Color::Red),
        )));
        lines.push(Line::from(Span::styled(
            "enter to retry · esc to dismiss",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "enter to analyze · ↑/↓ examples · esc to close",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta))
                .title("Analyze Repository"),
        );
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}

fn draw_confirm_delete(area: Rect, f: &mut ratatui::Frame, title: &str) {
    let p = Paragraph::new(vec![
        Line::from(format!("Delete \"{title}\"?")),
        Line::from(Span::styled(
            "The conversation and all of its messages will be removed.",
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Red)),
            Span::raw(" delete   "),
            Span::styled("n", Style::default().fg(Color::Magenta)),
            Span::raw(" cancel"),
        ]),
    ])
    .wrap(Wrap { trim: false })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title("Delete Conversation"),
    );
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
