//! Shared data model for the previewer workspace: track records, the
//! presentation-facing command / broadcast vocabulary, the session view
//! snapshot, configuration and platform paths.

pub mod config;
pub mod platform;
pub mod protocol;
pub mod state;
