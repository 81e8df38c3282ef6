use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to execute ffprobe: {0}")]
    FfprobeExec(String),

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error("probe timed out after {0} seconds")]
    ProbeTimeout(u64),

    #[error("implausible media duration: {0} seconds")]
    InvalidDuration(f64),

    #[error("ffmpeg not found")]
    FfmpegNotFound,

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("no clips to render")]
    NoClips,

    #[error("missing source for clip {0}")]
    MissingSource(uuid::Uuid),

    #[error("export cancelled")]
    Cancelled,

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] storycut_core::error::CoreError),
}

pub type Result<T> = std::result::Result<T, RenderError>;
