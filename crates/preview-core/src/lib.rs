//! Session coordination for artist search and track preview: the title
//! index, the search coordinator, the playback controller, the details
//! projection and the single-owner `SessionCore` loop that ties them together.

pub mod catalog;
pub mod core;
pub mod details;
pub mod engine;
pub mod error;
pub mod index;
pub mod mpv;
pub mod playback;
pub mod search;

pub use crate::core::{spawn_engine_forwarder, SessionCore, SessionEvent};
pub use catalog::{CatalogProvider, DeezerCatalog};
pub use engine::{EngineEvent, EngineState, PlaybackEngine};
pub use error::{CatalogError, EngineError, SessionError};
pub use index::TrackIndex;
pub use mpv::MpvEngine;
