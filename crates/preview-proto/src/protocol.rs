use serde::{Deserialize, Serialize};

/// One track as returned by the catalog.  Every field is optional: a partial
/// record from the provider must not fail the whole search.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub album_title: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    /// Provider-formatted, shown as-is.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Absolute or scheme-less URL of the streamable preview.
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// User actions forwarded by a presenter (TUI, HTTP API) to the session core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    Search { query: String },
    /// A list entry was activated (double-click / Enter): load and autoplay.
    Activate { title: String },
    ToggleTransport,
    Seek { position_ms: u64 },
    GetState,
}

/// Messages sent from the session core to every presenter.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionBroadcast {
    /// The `SessionView` changed; receivers should re-read it from the `ViewStore`.
    StateUpdated,
    Notice(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A user-visible message (the desktop program showed these as dialogs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn no_results() -> Self {
        Self::info("No Tracks", "No tracks found")
    }

    pub fn network_error() -> Self {
        Self::error(
            "Network Error",
            "Could not retrieve results from the network",
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchStatus {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

/// Transport state as mirrored from the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
}

/// Text of the single transport button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportLabel {
    #[default]
    Play,
    Stop,
}

impl TransportLabel {
    pub fn for_status(status: PlaybackStatus) -> Self {
        match status {
            PlaybackStatus::Playing => Self::Stop,
            PlaybackStatus::Stopped => Self::Play,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Play => "Play",
            Self::Stop => "Stop",
        }
    }
}

/// Column headers of the details table, in display order.
pub const DETAILS_HEADERS: [&str; 5] = ["Title", "Artiste", "Album", "Duration", "Release Date"];

/// One flat row of the details table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsRow {
    pub title: String,
    pub artist_name: String,
    pub album_title: String,
    pub formatted_duration: String,
    pub release_date: String,
}

impl DetailsRow {
    pub fn columns(&self) -> [&str; 5] {
        [
            self.title.as_str(),
            self.artist_name.as_str(),
            self.album_title.as_str(),
            self.formatted_duration.as_str(),
            self.release_date.as_str(),
        ]
    }
}

/// Presentation-facing snapshot of the whole session.  `rev` is a monotonic
/// counter incremented on every change so readers can skip redundant redraws.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionView {
    #[serde(default)]
    pub rev: u64,
    pub query: String,
    pub search_status: SearchStatus,
    pub search_error: Option<String>,
    /// Busy indicator: at least one submitted search has not completed yet.
    pub busy: bool,
    pub titles: Vec<String>,
    pub details: Option<DetailsRow>,
    pub playback: PlaybackStatus,
    pub has_loaded_resource: bool,
    pub loaded_title: Option<String>,
    pub transport: TransportLabel,
    pub slider_max_ms: u64,
    pub slider_position_ms: u64,
}
