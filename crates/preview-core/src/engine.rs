use async_trait::async_trait;

use crate::error::EngineError;

/// What the backend reports about its own transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Playing,
    Stopped,
}

/// Unsolicited notifications from a playback backend.  Delivered to the
/// session core through its event channel, never handled on the backend's
/// own task.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(EngineState),
    DurationChanged { duration_ms: u64 },
    PositionChanged { position_ms: u64 },
}

/// Streaming audio player.  Commands are fire-and-forget from the caller's
/// point of view: the authoritative state comes back as `EngineEvent`s.
#[async_trait]
pub trait PlaybackEngine: Send {
    /// Replace the current resource.  Leaves the engine paused.
    async fn load(&mut self, url: &str) -> Result<(), EngineError>;
    async fn play(&mut self) -> Result<(), EngineError>;
    async fn stop(&mut self) -> Result<(), EngineError>;
    async fn set_position(&mut self, position_ms: u64) -> Result<(), EngineError>;
}
