//! Segment-based compositing renderer: ffprobe resolution, asset
//! materialization, per-segment ffmpeg graphs, audio mixing, and
//! project bundles.

pub mod archive;
pub mod assets;
pub mod engine;
pub mod error;
pub mod export;
pub mod probe;
pub mod segment;
