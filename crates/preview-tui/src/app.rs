//! App: terminal front end for the preview session.
//!
//! - A blocking task reads crossterm events and forwards them as `AppMessage`s.
//! - A second task turns `SessionBroadcast`s into fresh `SessionView` snapshots.
//! - The loop redraws after every message and on a 100 ms tick (toasts, spinner).
//! - User intent leaves as `Command`s on the session's event channel.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use preview_core::SessionEvent;
use preview_proto::protocol::{
    Command, Notice, PlaybackStatus, SessionBroadcast, SessionView, DETAILS_HEADERS,
};
use preview_proto::state::{PersistentState, ViewStore};
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Row, Table},
    Frame, Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::theme;
use crate::widgets::progress_bar::draw_progress;
use crate::widgets::search_input::{SearchAction, SearchInput};
use crate::widgets::toast::ToastManager;

const SEEK_STEP_MS: u64 = 5_000;

pub enum AppMessage {
    Event(Event),
    State(SessionView),
    Notice(Notice),
    /// The session core stopped; nothing will answer commands any more.
    SessionEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Search,
    Tracks,
}

pub struct App {
    event_tx: mpsc::Sender<SessionEvent>,
    view_store: Arc<ViewStore>,
    view: SessionView,
    /// Where the last submitted query is kept between runs.
    state_file: PathBuf,
    search: SearchInput,
    list_state: ListState,
    focus: Focus,
    toast: ToastManager,
    should_quit: bool,
}

impl App {
    pub fn new(
        event_tx: mpsc::Sender<SessionEvent>,
        view_store: Arc<ViewStore>,
        view: SessionView,
        state_file: PathBuf,
    ) -> Self {
        let mut search = SearchInput::new("type an artist, Enter to search");
        match PersistentState::load(&state_file).last_query {
            Some(query) if view.query.is_empty() => search.set_value(&query),
            _ => search.set_value(&view.query),
        }
        let mut app = Self {
            event_tx,
            view_store,
            view: SessionView::default(),
            state_file,
            search,
            list_state: ListState::default(),
            focus: Focus::Search,
            toast: ToastManager::new(),
            should_quit: false,
        };
        app.apply_view(view);
        app
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        mut broadcast_rx: broadcast::Receiver<SessionBroadcast>,
    ) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal ready, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(256);

        // ── Background task: keyboard events ──────────────────────────────────
        let key_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            // Poll so the thread notices when the app has gone away.
            if key_tx.is_closed() {
                break;
            }
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if key_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        });

        // ── Background task: session broadcasts → AppMessage ──────────────────
        let view_store = Arc::clone(&self.view_store);
        tokio::spawn(async move {
            loop {
                let msg = match broadcast_rx.recv().await {
                    Ok(SessionBroadcast::StateUpdated) => {
                        AppMessage::State(view_store.get_state().await)
                    }
                    Ok(SessionBroadcast::Notice(notice)) => AppMessage::Notice(notice),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("broadcast receiver lagged by {} messages", n);
                        AppMessage::State(view_store.get_state().await)
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = tx.send(AppMessage::SessionEnded).await;
                        break;
                    }
                };
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            terminal.draw(|f| self.draw(f))?;

            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => self.handle_message(msg).await,
                    None => break,
                },
                _ = toast_tick.tick() => self.toast.tick(),
            }

            if self.should_quit {
                break;
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        let _ = self.event_tx.send(SessionEvent::Shutdown).await;

        Ok(())
    }

    async fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Event(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if let Some(cmd) = self.handle_key(key) {
                    self.send(cmd).await;
                }
            }
            AppMessage::Event(_) => {}
            AppMessage::State(view) => {
                // Broadcasts may be delivered out of order relative to reads.
                if view.rev >= self.view.rev {
                    self.apply_view(view);
                }
            }
            AppMessage::Notice(notice) => self.toast.notice(&notice),
            AppMessage::SessionEnded => {
                warn!("session ended, quitting");
                self.should_quit = true;
            }
        }
    }

    async fn send(&mut self, cmd: Command) {
        if let Command::Search { query } = &cmd {
            self.remember_query(query).await;
        }
        if self.event_tx.send(SessionEvent::Command(cmd)).await.is_err() {
            warn!("session event loop is gone, quitting");
            self.should_quit = true;
        }
    }

    async fn remember_query(&self, query: &str) {
        let persistent = PersistentState {
            last_query: Some(query.to_string()),
        };
        if let Err(e) = persistent.save(&self.state_file).await {
            warn!("failed to save last query: {}", e);
        }
    }

    fn apply_view(&mut self, view: SessionView) {
        self.toast.set_busy(view.busy, "Searching…");

        let selected = self.list_state.selected();
        match (selected, view.titles.len()) {
            (_, 0) => self.list_state.select(None),
            (None, _) => self.list_state.select(Some(0)),
            (Some(i), n) if i >= n || view.titles != self.view.titles => {
                self.list_state.select(Some(0))
            }
            _ => {}
        }
        self.view = view;
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    /// Map a key press to a session command, updating local UI state.
    fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return None;
        }
        if key.code == KeyCode::Tab {
            self.focus = match self.focus {
                Focus::Search => Focus::Tracks,
                Focus::Tracks => Focus::Search,
            };
            return None;
        }

        match self.focus {
            Focus::Search => match self.search.handle_key(key) {
                SearchAction::Submit(query) => {
                    self.focus = Focus::Tracks;
                    Some(Command::Search { query })
                }
                SearchAction::Leave => {
                    self.focus = Focus::Tracks;
                    None
                }
                SearchAction::None => None,
            },
            Focus::Tracks => match key.code {
                KeyCode::Char('q') => {
                    self.should_quit = true;
                    None
                }
                KeyCode::Char('/') => {
                    self.focus = Focus::Search;
                    None
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.move_selection(-1);
                    None
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.move_selection(1);
                    None
                }
                KeyCode::Enter => self
                    .selected_title()
                    .map(|title| Command::Activate { title }),
                KeyCode::Char(' ') => Some(Command::ToggleTransport),
                KeyCode::Left if self.view.has_loaded_resource => Some(Command::Seek {
                    position_ms: self.view.slider_position_ms.saturating_sub(SEEK_STEP_MS),
                }),
                KeyCode::Right if self.view.has_loaded_resource => Some(Command::Seek {
                    position_ms: self.view.slider_position_ms + SEEK_STEP_MS,
                }),
                _ => None,
            },
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.view.titles.len();
        if len == 0 {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1) as usize;
        self.list_state.select(Some(next));
    }

    fn selected_title(&self) -> Option<String> {
        self.list_state
            .selected()
            .and_then(|i| self.view.titles.get(i))
            .cloned()
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(4),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        self.search
            .draw(frame, chunks[0], self.focus == Focus::Search);
        self.draw_tracks(frame, chunks[1]);
        self.draw_details(frame, chunks[2]);
        draw_progress(
            frame,
            chunks[3],
            self.view.slider_position_ms,
            self.view.slider_max_ms,
        );
        self.draw_status(frame, chunks[4]);
        self.toast.draw(frame, area);
    }

    fn draw_tracks(&mut self, frame: &mut Frame, area: Rect) {
        let focused = self.focus == Focus::Tracks;
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::style_border(focused))
            .title(format!(" Tracks ({}) ", self.view.titles.len()));

        let loaded = self.view.loaded_title.as_deref();
        let items: Vec<ListItem> = self
            .view
            .titles
            .iter()
            .map(|title| {
                let style = if Some(title.as_str()) == loaded
                    && self.view.playback == PlaybackStatus::Playing
                {
                    theme::style_playing()
                } else {
                    theme::style_default()
                };
                ListItem::new(Line::from(Span::styled(title.as_str(), style)))
            })
            .collect();

        let highlight = if focused {
            theme::style_selected_focused()
        } else {
            theme::style_selected()
        };
        let list = List::new(items)
            .block(block)
            .highlight_style(highlight)
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn draw_details(&self, frame: &mut Frame, area: Rect) {
        let header = Row::new(DETAILS_HEADERS.to_vec()).style(theme::style_header());
        let rows: Vec<Row> = self
            .view
            .details
            .iter()
            .map(|row| Row::new(row.columns().to_vec()).style(theme::style_default()))
            .collect();
        let widths = [
            Constraint::Percentage(30),
            Constraint::Percentage(20),
            Constraint::Percentage(25),
            Constraint::Length(8),
            Constraint::Min(12),
        ];
        let table = Table::new(rows, widths).header(header).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme::style_border(false))
                .title(" Details "),
        );
        frame.render_widget(table, area);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let transport_style = match self.view.playback {
            PlaybackStatus::Playing => theme::style_playing(),
            PlaybackStatus::Stopped => theme::style_accent(),
        };
        let mut spans = vec![Span::styled(
            format!(" [{}] ", self.view.transport.text()),
            transport_style,
        )];
        if let Some(title) = &self.view.loaded_title {
            spans.push(Span::styled(format!("{}  ", title), theme::style_secondary()));
        }
        spans.push(Span::styled(
            "Tab focus · / search · Enter play · Space play/stop · ←/→ seek · q quit",
            theme::style_muted(),
        ));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}
