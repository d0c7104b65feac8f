use preview_proto::protocol::{PlaybackStatus, TransportLabel};
use tracing::{debug, info};

use crate::engine::{EngineState, PlaybackEngine};
use crate::error::EngineError;
use crate::index::TrackIndex;

/// Result of activating a title in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Resource handed to the engine and playback requested.
    Loaded { title: String, url: String },
    /// Title is not in the current index.
    Unresolved,
    /// Title resolved but the record carries no preview.
    NoPreview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Started,
    Stopped,
    /// Nothing loaded yet.
    Ignored,
}

/// Transport state machine in front of a `PlaybackEngine`.
///
/// ```text
///   Stopped (no resource) ──select──▶ Stopped (loaded) ──toggle──▶ Playing
///                                          ▲                          │
///                                          └────────── toggle ────────┘
/// ```
pub struct PlaybackController<E> {
    engine: E,
    status: PlaybackStatus,
    has_loaded_resource: bool,
    /// Title of the resource the engine currently holds.
    loaded_title: Option<String>,
}

impl<E: PlaybackEngine> PlaybackController<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            status: PlaybackStatus::Stopped,
            has_loaded_resource: false,
            loaded_title: None,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn has_loaded_resource(&self) -> bool {
        self.has_loaded_resource
    }

    pub fn loaded_title(&self) -> Option<&str> {
        self.loaded_title.as_deref()
    }

    pub fn transport_label(&self) -> TransportLabel {
        TransportLabel::for_status(self.status)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Load the preview of `title` and start playing it.
    pub async fn select_track(
        &mut self,
        title: &str,
        index: &TrackIndex,
    ) -> Result<Selection, EngineError> {
        let Some(record) = index.lookup(title) else {
            debug!("PlaybackController: {:?} not in index", title);
            return Ok(Selection::Unresolved);
        };
        let Some(raw_url) = record.preview_url.as_deref() else {
            debug!("PlaybackController: {:?} has no preview", title);
            return Ok(Selection::NoPreview);
        };

        let url = normalize_preview_url(raw_url);
        info!("PlaybackController: loading {:?} from {}", title, url);
        self.engine.load(&url).await?;
        self.status = PlaybackStatus::Stopped;
        self.has_loaded_resource = true;
        self.loaded_title = Some(title.to_string());

        // A failed start leaves the resource loaded and Stopped.
        self.toggle().await?;
        Ok(Selection::Loaded {
            title: title.to_string(),
            url,
        })
    }

    pub async fn toggle(&mut self) -> Result<Toggle, EngineError> {
        match self.status {
            PlaybackStatus::Playing => {
                self.engine.stop().await?;
                self.status = PlaybackStatus::Stopped;
                Ok(Toggle::Stopped)
            }
            PlaybackStatus::Stopped if self.has_loaded_resource => {
                self.engine.play().await?;
                self.status = PlaybackStatus::Playing;
                Ok(Toggle::Started)
            }
            PlaybackStatus::Stopped => Ok(Toggle::Ignored),
        }
    }

    pub async fn seek(&mut self, position_ms: u64) -> Result<(), EngineError> {
        self.engine.set_position(position_ms).await
    }

    /// Mirror a state the engine reported on its own (end of track, external
    /// pause).  Returns whether anything changed.
    pub fn on_engine_state(&mut self, state: EngineState) -> bool {
        let status = match state {
            EngineState::Playing => PlaybackStatus::Playing,
            EngineState::Stopped => PlaybackStatus::Stopped,
        };
        let changed = status != self.status;
        self.status = status;
        changed
    }
}

/// Give scheme-less preview URLs an explicit `http` scheme.
pub fn normalize_preview_url(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("//") {
        return format!("http://{}", rest);
    }
    if has_scheme(raw) {
        return raw.to_string();
    }
    format!("http://{}", raw)
}

fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
