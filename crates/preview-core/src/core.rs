/// SessionCore: single-owner event loop for the search / preview session.
///
/// Owns the `SearchCoordinator` (and the `TrackIndex` inside it) and the
/// `PlaybackController` (and the engine inside it) exclusively.  Presenters,
/// search workers and the engine forwarder only send `SessionEvent`s.
///
/// After every event that changes what a presenter would show, the core
/// updates the `ViewStore` and broadcasts `SessionBroadcast::StateUpdated`.
/// Dialog-worthy outcomes go out as `SessionBroadcast::Notice`.
use std::sync::Arc;

use preview_proto::config::Config;
use preview_proto::protocol::{Command, Notice, SessionBroadcast};
use preview_proto::state::ViewStore;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::catalog::CatalogProvider;
use crate::details;
use crate::engine::{EngineEvent, PlaybackEngine};
use crate::error::{EngineError, SessionError};
use crate::playback::{PlaybackController, Selection, Toggle};
use crate::search::{SearchCompletion, SearchCoordinator, SearchOutcome};

/// All inputs into the SessionCore loop.
#[derive(Debug)]
pub enum SessionEvent {
    /// A command from the TUI or HTTP API.
    Command(Command),
    /// A search worker finished.
    SearchCompleted(SearchCompletion),
    /// Notification from the playback engine (via the forwarder task).
    Engine(EngineEvent),
    Shutdown,
}

impl From<SearchCompletion> for SessionEvent {
    fn from(completion: SearchCompletion) -> Self {
        Self::SearchCompleted(completion)
    }
}

pub struct SessionCore<E> {
    search: SearchCoordinator,
    playback: PlaybackController<E>,
    view: Arc<ViewStore>,
    /// Handed to search workers so their completions come back here.
    event_tx: mpsc::Sender<SessionEvent>,
    broadcast_tx: broadcast::Sender<SessionBroadcast>,
}

impl<E: PlaybackEngine> SessionCore<E> {
    pub fn new(
        config: &Config,
        catalog: Arc<dyn CatalogProvider>,
        engine: E,
        view: Arc<ViewStore>,
        event_tx: mpsc::Sender<SessionEvent>,
        broadcast_tx: broadcast::Sender<SessionBroadcast>,
    ) -> Self {
        Self {
            search: SearchCoordinator::new(catalog, config.search.cancel_superseded),
            playback: PlaybackController::new(engine),
            view,
            event_tx,
            broadcast_tx,
        }
    }

    /// Run the event loop until `Shutdown`, until every sender is gone, or
    /// until a search fails in a way the session cannot recover from.
    pub async fn run(
        mut self,
        mut event_rx: mpsc::Receiver<SessionEvent>,
    ) -> Result<(), SessionError> {
        info!("SessionCore: starting event loop");

        let result = loop {
            match event_rx.recv().await {
                None => {
                    info!("SessionCore: event channel closed, shutting down");
                    break Ok(());
                }
                Some(SessionEvent::Shutdown) => {
                    info!("SessionCore: shutdown requested");
                    break Ok(());
                }
                Some(evt) => {
                    if let Err(e) = self.handle_event(evt).await {
                        error!("SessionCore: {}", e);
                        break Err(e);
                    }
                }
            }
        };

        self.search.cancel_pending();
        result
    }

    /// Apply one event.  Exposed so callers can drive the core step by step.
    pub async fn handle_event(&mut self, evt: SessionEvent) -> Result<(), SessionError> {
        match evt {
            SessionEvent::Command(cmd) => {
                info!("SessionCore: command {:?}", cmd);
                self.handle_command(cmd).await;
                Ok(())
            }
            SessionEvent::SearchCompleted(completion) => self.handle_completion(completion).await,
            SessionEvent::Engine(evt) => {
                self.handle_engine_event(evt).await;
                Ok(())
            }
            SessionEvent::Shutdown => Ok(()),
        }
    }

    // ── commands ──────────────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Search { query } => {
                self.search.submit(query.clone(), self.event_tx.clone());
                self.view.set_search_started(query).await;
            }

            Command::Activate { title } => self.activate(&title).await,

            Command::ToggleTransport => match self.playback.toggle().await {
                Ok(Toggle::Ignored) => {
                    debug!("SessionCore: toggle ignored, nothing loaded");
                    return;
                }
                Ok(_) => self.view.set_playback(self.playback.status()).await,
                Err(e) => self.engine_failed(e),
            },

            Command::Seek { position_ms } => {
                match self.playback.seek(position_ms).await {
                    Ok(()) => self.view.set_slider_position(position_ms).await,
                    Err(e) => self.engine_failed(e),
                }
            }

            Command::GetState => {}
        }
        self.broadcast_state();
    }

    async fn activate(&mut self, title: &str) {
        let reached_engine = match self.playback.select_track(title, self.search.index()).await {
            Ok(Selection::Unresolved) => {
                debug!("SessionCore: activated title {:?} not in index", title);
                return;
            }
            Ok(Selection::NoPreview) => {
                self.notify(Notice::info(
                    "No Preview",
                    format!("\"{}\" has no preview available", title),
                ));
                false
            }
            Ok(Selection::Loaded { .. }) => true,
            Err(e) => {
                self.engine_failed(e);
                true
            }
        };
        // A load that succeeded but failed to start still counts as loaded.
        if reached_engine && self.playback.loaded_title() == Some(title) {
            self.view.set_loaded(title.to_string()).await;
            self.view.set_playback(self.playback.status()).await;
        }
        self.show_details(title).await;
    }

    async fn show_details(&mut self, title: &str) {
        let Some(record) = self.search.index().lookup(title) else {
            return;
        };
        match details::project(record) {
            Ok(row) => self.view.set_details(row).await,
            Err(partial) => {
                warn!("SessionCore: incomplete track record: {}", partial);
                self.notify(Notice::warning("Incomplete Track", partial.to_string()));
            }
        }
    }

    fn engine_failed(&self, e: EngineError) {
        error!("SessionCore: playback engine error: {}", e);
        self.notify(Notice::error("Playback Error", e.to_string()));
    }

    // ── search completions ────────────────────────────────────────────────────

    async fn handle_completion(&mut self, completion: SearchCompletion) -> Result<(), SessionError> {
        let outcome = self.search.complete(completion);
        self.view.set_busy(self.search.is_busy()).await;

        let result = match outcome {
            Ok(SearchOutcome::Applied { count }) => {
                debug!("SessionCore: showing {} titles", count);
                let titles = self.search.index().titles().to_vec();
                self.view.set_search_succeeded(Some(titles)).await;
                Ok(())
            }
            Ok(SearchOutcome::NoResults) => {
                self.view.set_search_succeeded(None).await;
                self.notify(Notice::no_results());
                Ok(())
            }
            Ok(SearchOutcome::NetworkUnavailable(reason)) => {
                self.view.set_search_failed(reason).await;
                self.notify(Notice::network_error());
                Ok(())
            }
            Ok(SearchOutcome::Stale) => Ok(()),
            Err(e) => {
                self.view.set_search_failed(e.to_string()).await;
                Err(e)
            }
        };

        self.broadcast_state();
        result
    }

    // ── engine notifications ──────────────────────────────────────────────────

    async fn handle_engine_event(&mut self, evt: EngineEvent) {
        match evt {
            EngineEvent::StateChanged(state) => {
                if !self.playback.on_engine_state(state) {
                    return;
                }
                debug!("SessionCore: engine reports {:?}", state);
                self.view.set_playback(self.playback.status()).await;
            }
            EngineEvent::DurationChanged { duration_ms } => {
                self.view.set_slider_max(duration_ms).await;
            }
            EngineEvent::PositionChanged { position_ms } => {
                self.view.set_slider_position(position_ms).await;
            }
        }
        self.broadcast_state();
    }

    // ── broadcasts ────────────────────────────────────────────────────────────

    fn broadcast_state(&self) {
        // No receivers is fine: presenters come and go.
        let _ = self.broadcast_tx.send(SessionBroadcast::StateUpdated);
    }

    fn notify(&self, notice: Notice) {
        let _ = self.broadcast_tx.send(SessionBroadcast::Notice(notice));
    }
}

/// Forward engine notifications into the session's event channel.
pub fn spawn_engine_forwarder(
    mut engine_rx: mpsc::Receiver<EngineEvent>,
    event_tx: mpsc::Sender<SessionEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(evt) = engine_rx.recv().await {
            if event_tx.send(SessionEvent::Engine(evt)).await.is_err() {
                break;
            }
        }
        debug!("SessionCore: engine forwarder exiting");
    })
}
