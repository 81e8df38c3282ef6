use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storycut_core::sanitize;
use storycut_core::types::{TimeUs, Timeline};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::{RenderError, Result};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Durations at or beyond ten hours are treated as probe garbage.
pub const MAX_PLAUSIBLE_SECONDS: f64 = 36_000.0;

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Parsed facts about one media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub duration_us: TimeUs,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub audio_channels: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run ffprobe on a media file. Bounded by `PROBE_TIMEOUT` so one stuck
/// probe cannot wedge clip resolution.
pub async fn probe_media(path: impl AsRef<Path>) -> Result<MediaInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RenderError::FileNotFound(path.to_path_buf()));
    }

    let command = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output();

    let output = tokio::time::timeout(PROBE_TIMEOUT, command)
        .await
        .map_err(|_| RenderError::ProbeTimeout(PROBE_TIMEOUT.as_secs()))?
        .map_err(|e| RenderError::FfprobeExec(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RenderError::FfprobeFailed(stderr.into_owned()));
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    parse_probe_output(&probe)
}

/// Probe just the playable duration, rejecting implausible values.
pub async fn probe_duration(path: impl AsRef<Path>) -> Result<TimeUs> {
    let info = probe_media(path).await?;
    validate_duration(info.duration_us.as_seconds())?;
    Ok(info.duration_us)
}

/// Probe every unresolved sourced clip concurrently and commit the results.
/// Probe failures are committed as fallbacks so the timeline never stays
/// stuck on placeholders. Returns the number of clips that changed.
pub async fn resolve_timeline(timeline: &mut Timeline) -> usize {
    let pending: Vec<(Uuid, PathBuf)> = timeline
        .all_clips()
        .filter(|c| !c.resolved)
        .filter_map(|c| c.source.as_ref().map(|s| (c.id, PathBuf::from(s))))
        .collect();

    let mut tasks = JoinSet::new();
    for (clip_id, path) in pending {
        tasks.spawn(async move {
            let duration = match probe_duration(&path).await {
                Ok(d) => Some(d),
                Err(err) => {
                    tracing::warn!(%clip_id, path = %path.display(), error = %err, "probe failed, committing fallback");
                    None
                }
            };
            (clip_id, duration)
        });
    }

    let mut changed = 0;
    while let Some(joined) = tasks.join_next().await {
        let Ok((clip_id, duration)) = joined else {
            continue;
        };
        if sanitize::apply_probe(timeline, clip_id, duration) {
            changed += 1;
        }
    }
    changed
}

/// Classify a media file by extension first, stream layout second.
pub fn detect_media_kind(path: &Path, info: &MediaInfo) -> MediaKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "tiff" | "svg" => MediaKind::Image,
        "mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a" | "wma" => MediaKind::Audio,
        _ => {
            if info.width > 0 && info.height > 0 {
                MediaKind::Video
            } else if info.audio_channels > 0 {
                MediaKind::Audio
            } else {
                MediaKind::Video
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_duration(seconds: f64) -> Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 || seconds >= MAX_PLAUSIBLE_SECONDS {
        return Err(RenderError::InvalidDuration(seconds));
    }
    Ok(())
}

fn parse_probe_output(probe: &FfprobeOutput) -> Result<MediaInfo> {
    let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    let duration_us = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .map(TimeUs::from_seconds)
        .unwrap_or(TimeUs::ZERO);

    let fps = video_stream
        .and_then(|s| s.r_frame_rate.as_deref())
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);

    Ok(MediaInfo {
        duration_us,
        width: video_stream.and_then(|s| s.width).unwrap_or(0),
        height: video_stream.and_then(|s| s.height).unwrap_or(0),
        fps,
        audio_channels: audio_stream.and_then(|s| s.channels).unwrap_or(0),
    })
}

/// Parse ffprobe frame rate string like "30000/1001" or "30/1" into f64.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().ok()?;
        let d: f64 = den.parse().ok()?;
        if d == 0.0 {
            return None;
        }
        Some(n / d)
    } else {
        rate.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
