#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use preview_core::search::SearchCompletion;
use preview_core::{
    CatalogError, CatalogProvider, EngineError, EngineEvent, PlaybackEngine, SessionCore,
    SessionError, SessionEvent,
};
use preview_proto::config::Config;
use preview_proto::protocol::{Command, Notice, SessionBroadcast, SessionView, TrackRecord};
use preview_proto::state::ViewStore;
use tokio::sync::{broadcast, mpsc, Notify};

pub fn track(title: &str, preview: &str) -> TrackRecord {
    TrackRecord {
        title: Some(title.to_string()),
        artist_name: Some("Daft Punk".to_string()),
        album_title: Some("Discovery".to_string()),
        duration_seconds: Some(212),
        release_date: Some("2001-03-07".to_string()),
        preview_url: Some(preview.to_string()),
    }
}

// ── fake catalog ──────────────────────────────────────────────────────────────

struct Scripted {
    gate: Option<Arc<Notify>>,
    result: Result<Vec<TrackRecord>, CatalogError>,
}

/// Catalog whose answers are scripted per query.  A gated answer is held
/// back until the test notifies the returned gate.
#[derive(Default)]
pub struct FakeCatalog {
    scripts: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, query: &str, result: Result<Vec<TrackRecord>, CatalogError>) {
        self.scripts.lock().unwrap().insert(
            query.to_string(),
            Scripted { gate: None, result },
        );
    }

    /// Like `respond`, but the answer waits for the returned gate.
    pub fn respond_gated(
        &self,
        query: &str,
        result: Result<Vec<TrackRecord>, CatalogError>,
    ) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.scripts.lock().unwrap().insert(
            query.to_string(),
            Scripted {
                gate: Some(Arc::clone(&gate)),
                result,
            },
        );
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogProvider for FakeCatalog {
    async fn search(&self, artist: &str) -> Result<Vec<TrackRecord>, CatalogError> {
        self.calls.lock().unwrap().push(artist.to_string());
        let (gate, result) = {
            let scripts = self.scripts.lock().unwrap();
            match scripts.get(artist) {
                Some(s) => (s.gate.clone(), s.result.clone()),
                None => (None, Ok(Vec::new())),
            }
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result
    }
}

// ── recording engine ──────────────────────────────────────────────────────────

/// Engine that only writes down what it was asked to do.  Operations named
/// with `fail_on` are recorded and then refused.
#[derive(Clone, Default)]
pub struct RecordingEngine {
    calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingEngine {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().push(op);
    }

    fn record(&self, op: &'static str, call: String) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(&op) {
            return Err(EngineError::Unavailable(format!("{} refused", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl PlaybackEngine for RecordingEngine {
    async fn load(&mut self, url: &str) -> Result<(), EngineError> {
        self.record("load", format!("load {}", url))
    }

    async fn play(&mut self) -> Result<(), EngineError> {
        self.record("play", "play".to_string())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        self.record("stop", "stop".to_string())
    }

    async fn set_position(&mut self, position_ms: u64) -> Result<(), EngineError> {
        self.record("seek", format!("seek {}", position_ms))
    }
}

// ── harness ───────────────────────────────────────────────────────────────────

/// A `SessionCore` wired to a fake catalog and a recording engine, driven
/// one event at a time by the test.
pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub engine: RecordingEngine,
    pub view: Arc<ViewStore>,
    pub core: SessionCore<RecordingEngine>,
    pub event_rx: mpsc::Receiver<SessionEvent>,
    pub broadcast_rx: broadcast::Receiver<SessionBroadcast>,
}

pub struct Parts {
    pub catalog: Arc<FakeCatalog>,
    pub engine: RecordingEngine,
    pub view: Arc<ViewStore>,
    pub core: SessionCore<RecordingEngine>,
    pub event_tx: mpsc::Sender<SessionEvent>,
    pub event_rx: mpsc::Receiver<SessionEvent>,
    pub broadcast_rx: broadcast::Receiver<SessionBroadcast>,
}

pub fn build(catalog: Arc<FakeCatalog>, cancel_superseded: bool) -> Parts {
    let mut config = Config::default();
    config.search.cancel_superseded = cancel_superseded;

    let view = Arc::new(ViewStore::new());
    let engine = RecordingEngine::default();
    let (event_tx, event_rx) = mpsc::channel(64);
    let (broadcast_tx, broadcast_rx) = broadcast::channel(256);

    let core = SessionCore::new(
        &config,
        Arc::clone(&catalog) as Arc<dyn CatalogProvider>,
        engine.clone(),
        Arc::clone(&view),
        event_tx.clone(),
        broadcast_tx,
    );

    Parts {
        catalog,
        engine,
        view,
        core,
        event_tx,
        event_rx,
        broadcast_rx,
    }
}

impl Harness {
    pub fn new(catalog: Arc<FakeCatalog>, cancel_superseded: bool) -> Self {
        let parts = build(catalog, cancel_superseded);
        Self {
            catalog: parts.catalog,
            engine: parts.engine,
            view: parts.view,
            core: parts.core,
            event_rx: parts.event_rx,
            broadcast_rx: parts.broadcast_rx,
        }
    }

    pub async fn command(&mut self, cmd: Command) {
        self.core
            .handle_event(SessionEvent::Command(cmd))
            .await
            .unwrap();
    }

    pub async fn search(&mut self, query: &str) {
        self.command(Command::Search {
            query: query.to_string(),
        })
        .await;
    }

    pub async fn engine_event(&mut self, evt: EngineEvent) {
        self.core
            .handle_event(SessionEvent::Engine(evt))
            .await
            .unwrap();
    }

    /// Next completion posted by a search worker.
    pub async fn next_completion(&mut self) -> SearchCompletion {
        let evt = tokio::time::timeout(Duration::from_secs(5), self.event_rx.recv())
            .await
            .expect("timed out waiting for a search worker")
            .expect("event channel closed");
        match evt {
            SessionEvent::SearchCompleted(completion) => completion,
            other => panic!("expected a search completion, got {:?}", other),
        }
    }

    pub async fn apply(&mut self, completion: SearchCompletion) -> Result<(), SessionError> {
        self.core
            .handle_event(SessionEvent::SearchCompleted(completion))
            .await
    }

    /// Submit `query` and apply its result.
    pub async fn search_and_apply(&mut self, query: &str) -> SessionView {
        self.search(query).await;
        let completion = self.next_completion().await;
        self.apply(completion).await.unwrap();
        self.view.get_state().await
    }

    /// Drain every notice broadcast so far.
    pub fn notices(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(msg) = self.broadcast_rx.try_recv() {
            if let SessionBroadcast::Notice(n) = msg {
                notices.push(n);
            }
        }
        notices
    }
}
