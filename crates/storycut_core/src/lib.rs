//! Timeline model and editing engine: clips on ordered visual layers plus
//! music and sequential voice tracks, with placement, snapping, playback
//! clock, history, persistence, and self-healing load.

pub mod autosave;
pub mod clock;
pub mod editing;
pub mod error;
pub mod history;
pub mod persist;
pub mod placement;
pub mod project;
pub mod sanitize;
pub mod snapping;
pub mod types;
