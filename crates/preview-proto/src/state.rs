use crate::protocol::{
    DetailsRow, PlaybackStatus, SearchStatus, SessionView, TransportLabel,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What survives a restart: just enough to pre-fill the search box.
///
/// Owned by the terminal front end; the session core never touches it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistentState {
    #[serde(default)]
    pub last_query: Option<String>,
}

impl PersistentState {
    /// Read `path`, falling back to an empty state when it is missing or corrupt.
    pub fn load(path: &Path) -> Self {
        if let Ok(content) = std::fs::read_to_string(path) {
            if let Ok(persistent) = serde_json::from_str::<PersistentState>(&content) {
                return persistent;
            }
        }
        PersistentState::default()
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Single-writer store for the presentation snapshot.  Only the session core
/// mutates it; presenters read it after a `StateUpdated` broadcast.
pub struct ViewStore {
    state: Arc<RwLock<SessionView>>,
}

impl ViewStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionView {
                rev: 1,
                ..SessionView::default()
            })),
        }
    }

    pub async fn get_state(&self) -> SessionView {
        self.state.read().await.clone()
    }

    pub async fn rev(&self) -> u64 {
        self.state.read().await.rev
    }

    pub async fn set_search_started(&self, query: String) {
        let mut state = self.state.write().await;
        state.query = query;
        state.search_status = SearchStatus::InFlight;
        state.search_error = None;
        state.busy = true;
        state.rev += 1;
    }

    pub async fn set_busy(&self, busy: bool) {
        let mut state = self.state.write().await;
        state.busy = busy;
        state.rev += 1;
    }

    pub async fn set_search_succeeded(&self, titles: Option<Vec<String>>) {
        let mut state = self.state.write().await;
        state.search_status = SearchStatus::Succeeded;
        state.search_error = None;
        // An empty result keeps the previous list on screen.
        if let Some(titles) = titles {
            state.titles = titles;
        }
        state.rev += 1;
    }

    pub async fn set_search_failed(&self, error: String) {
        let mut state = self.state.write().await;
        state.search_status = SearchStatus::Failed;
        state.search_error = Some(error);
        state.rev += 1;
    }

    pub async fn set_details(&self, details: DetailsRow) {
        let mut state = self.state.write().await;
        state.details = Some(details);
        state.rev += 1;
    }

    pub async fn set_loaded(&self, title: String) {
        let mut state = self.state.write().await;
        state.loaded_title = Some(title);
        state.has_loaded_resource = true;
        state.slider_position_ms = 0;
        state.rev += 1;
    }

    pub async fn set_playback(&self, status: PlaybackStatus) {
        let mut state = self.state.write().await;
        state.playback = status;
        state.transport = TransportLabel::for_status(status);
        state.rev += 1;
    }

    pub async fn set_slider_max(&self, max_ms: u64) {
        let mut state = self.state.write().await;
        state.slider_max_ms = max_ms;
        state.rev += 1;
    }

    pub async fn set_slider_position(&self, position_ms: u64) {
        let mut state = self.state.write().await;
        state.slider_position_ms = position_ms;
        state.rev += 1;
    }
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}
