use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use storycut_core::types::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use uuid::Uuid;

use crate::assets::AssetStore;
use crate::error::{RenderError, Result};
use crate::segment::{self, RenderSettings};

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Preparing,
    Compositing,
    Assembling,
    Mixing,
    Finalizing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportProgress {
    pub stage: ExportStage,
    pub percent: f64,
}

impl Default for ExportProgress {
    fn default() -> Self {
        Self {
            stage: ExportStage::Preparing,
            percent: 0.0,
        }
    }
}

/// Progress sender that never goes backwards. Stage boundaries land on
/// fixed percentages; ffmpeg time updates interpolate between them.
struct ProgressSink {
    tx: watch::Sender<ExportProgress>,
    last_percent: f64,
}

impl ProgressSink {
    fn new(tx: watch::Sender<ExportProgress>) -> Self {
        Self {
            tx,
            last_percent: 0.0,
        }
    }

    fn send(&mut self, stage: ExportStage, percent: f64) {
        let percent = percent.clamp(0.0, 100.0).max(self.last_percent);
        self.last_percent = percent;
        let _ = self.tx.send(ExportProgress { stage, percent });
    }
}

// ---------------------------------------------------------------------------
// Export job
// ---------------------------------------------------------------------------

/// Render the timeline to a single video file.
///
/// Stages: materialize sources, composite each segment, assemble the
/// segments, mix the audio bed, then mux. The working directory is removed
/// on success, failure, and cancellation alike.
pub async fn export(
    timeline: &Timeline,
    settings: &RenderSettings,
    output: &Path,
    work_dir: &Path,
    progress_tx: watch::Sender<ExportProgress>,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    std::fs::create_dir_all(work_dir)?;
    let mut store = AssetStore::create(work_dir)?;
    let mut sink = ProgressSink::new(progress_tx);

    let result = run_stages(
        timeline, settings, output, work_dir, &mut store, &mut sink, &cancel,
    )
    .await;

    store.cleanup();
    if let Err(err) = std::fs::remove_dir_all(work_dir) {
        tracing::warn!(dir = %work_dir.display(), error = %err, "work dir cleanup failed");
    }

    match &result {
        Ok(()) => sink.send(ExportStage::Done, 100.0),
        Err(err) => tracing::error!(error = %err, "export failed"),
    }
    result
}

async fn run_stages(
    timeline: &Timeline,
    settings: &RenderSettings,
    output: &Path,
    work_dir: &Path,
    store: &mut AssetStore,
    sink: &mut ProgressSink,
    cancel: &AtomicBool,
) -> Result<()> {
    check_cancel(cancel)?;
    if timeline.all_clips().next().is_none() {
        return Err(RenderError::NoClips);
    }

    // Stage 1: copy every referenced source into the job directory.
    sink.send(ExportStage::Preparing, 0.0);
    let mut paths: HashMap<Uuid, PathBuf> = HashMap::new();
    for clip in timeline.all_clips() {
        if let Some(source) = &clip.source {
            paths.insert(clip.id, store.materialize(source)?);
        }
    }
    sink.send(ExportStage::Preparing, 15.0);
    check_cancel(cancel)?;

    // Stage 2: composite one intermediate file per segment.
    let segments = segment::slice_segments(timeline);
    let mut segment_files: Vec<PathBuf> = Vec::new();
    let count = segments.len();
    for (i, seg) in segments.iter().enumerate() {
        check_cancel(cancel)?;
        let seg_file = work_dir.join(format!("segment_{i:04}.mp4"));
        let args = segment::build_segment_args(timeline, &paths, seg, settings, &seg_file)?;

        let base = 15.0 + 60.0 * i as f64 / count as f64;
        let span = 60.0 / count as f64;
        let seg_secs = seg.duration_us().as_seconds();
        run_ffmpeg(&args, |time_secs| {
            let fraction = if seg_secs > 0.0 {
                (time_secs / seg_secs).min(1.0)
            } else {
                1.0
            };
            (ExportStage::Compositing, base + span * fraction)
        }, sink)
        .await?;
        segment_files.push(seg_file);
        sink.send(ExportStage::Compositing, 15.0 + 60.0 * (i + 1) as f64 / count as f64);
    }
    check_cancel(cancel)?;

    // Stage 3: stitch segments without re-encoding.
    let list_path = work_dir.join("segments.txt");
    std::fs::write(&list_path, concat_list(&segment_files))?;
    let video_path = work_dir.join("video.mp4");
    let concat_args: Vec<String> = vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_path.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        video_path.to_string_lossy().into_owned(),
    ];
    run_ffmpeg(&concat_args, |_| (ExportStage::Assembling, 80.0), sink).await?;
    sink.send(ExportStage::Assembling, 80.0);
    check_cancel(cancel)?;

    // Stage 4: mix the audio bed, when there is one.
    let total_us = TimeUs(segments.iter().map(|s| s.duration_us().0).sum());
    let audio_path = work_dir.join("audio.m4a");
    let mixed = match build_audio_mix_args(timeline, &paths, total_us, &audio_path) {
        Some(args) => {
            run_ffmpeg(&args, |_| (ExportStage::Mixing, 90.0), sink).await?;
            true
        }
        None => false,
    };
    sink.send(ExportStage::Mixing, 90.0);
    check_cancel(cancel)?;

    // Stage 5: mux video and audio into the final file.
    let mut mux_args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        video_path.to_string_lossy().into_owned(),
    ];
    if mixed {
        mux_args.push("-i".into());
        mux_args.push(audio_path.to_string_lossy().into_owned());
        mux_args.extend([
            "-map".into(),
            "0:v".into(),
            "-map".into(),
            "1:a".into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "192k".into(),
            "-shortest".into(),
        ]);
    } else {
        mux_args.extend(["-c:v".into(), "copy".into()]);
    }
    mux_args.push(output.to_string_lossy().into_owned());
    run_ffmpeg(&mux_args, |_| (ExportStage::Finalizing, 99.0), sink).await?;
    sink.send(ExportStage::Finalizing, 100.0);
    Ok(())
}

fn check_cancel(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(RenderError::Cancelled);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Audio mixing
// ---------------------------------------------------------------------------

fn is_audible(clip: &Clip) -> bool {
    if clip.muted || clip.volume <= 0.0 || clip.source.is_none() {
        return false;
    }
    clip.kind.is_audio_only() || clip.kind.has_embedded_audio()
}

/// One amix graph over every audible clip: trim the source span, restore
/// the clip rate, set the volume, and delay to the timeline position.
/// Returns `None` when nothing contributes audio.
pub fn build_audio_mix_args(
    timeline: &Timeline,
    paths: &HashMap<Uuid, PathBuf>,
    total_us: TimeUs,
    output: &Path,
) -> Option<Vec<String>> {
    let audible: Vec<&Clip> = timeline.all_clips().filter(|c| is_audible(c)).collect();
    if audible.is_empty() {
        return None;
    }

    let mut args: Vec<String> = vec!["-y".into()];
    let mut filters: Vec<String> = Vec::new();

    for (i, clip) in audible.iter().enumerate() {
        let path = paths.get(&clip.id)?;
        args.push("-i".into());
        args.push(path.to_string_lossy().into_owned());

        let start = clip.source_offset_us.as_seconds();
        let source_duration = clip.duration_us.scale(clip.playback_rate).as_seconds();
        let delay_ms = clip.start_us.0 / 1000;
        let tempo = atempo_chain(clip.playback_rate);
        let volume = clip.volume;

        filters.push(format!(
            "[{i}:a]atrim=start={start:.6}:duration={source_duration:.6},asetpts=PTS-STARTPTS{tempo},volume={volume},adelay={delay_ms}|{delay_ms}[a{i}]"
        ));
    }

    let mut amix_inputs = String::new();
    for i in 0..audible.len() {
        amix_inputs.push_str(&format!("[a{i}]"));
    }
    filters.push(format!(
        "{amix_inputs}amix=inputs={}:duration=longest:dropout_transition=0:normalize=0[mix]",
        audible.len()
    ));

    args.push("-filter_complex".into());
    args.push(filters.join(";"));
    args.push("-map".into());
    args.push("[mix]".into());
    args.push("-t".into());
    args.push(format!("{:.6}", total_us.as_seconds()));
    args.push("-c:a".into());
    args.push("aac".into());
    args.push(output.to_string_lossy().into_owned());
    Some(args)
}

/// atempo only accepts factors in [0.5, 2.0]; larger changes chain stages.
fn atempo_chain(rate: f64) -> String {
    if (rate - 1.0).abs() < f64::EPSILON {
        return String::new();
    }
    let mut chain = String::new();
    let mut remaining = rate;
    while remaining > 2.0 {
        chain.push_str(",atempo=2.0");
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        chain.push_str(",atempo=0.5");
        remaining /= 0.5;
    }
    chain.push_str(&format!(",atempo={remaining}"));
    chain
}

fn concat_list(files: &[PathBuf]) -> String {
    let mut list = String::new();
    for file in files {
        list.push_str(&format!("file '{}'\n", file.display()));
    }
    list
}

// ---------------------------------------------------------------------------
// ffmpeg execution
// ---------------------------------------------------------------------------

async fn run_ffmpeg(
    args: &[String],
    map_progress: impl Fn(f64) -> (ExportStage, f64),
    sink: &mut ProgressSink,
) -> Result<()> {
    let mut child = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::FfmpegNotFound
            } else {
                RenderError::Io(e)
            }
        })?;

    let stderr = child.stderr.take().ok_or(RenderError::FfmpegNotFound)?;
    let reader = BufReader::new(stderr);
    let mut lines = reader.lines();
    let mut tail: Vec<String> = Vec::new();

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(time_secs) = parse_progress_time(&line) {
            let (stage, percent) = map_progress(time_secs);
            sink.send(stage, percent);
        }
        tail.push(line);
        if tail.len() > 20 {
            tail.remove(0);
        }
    }

    let status = child.wait().await.map_err(RenderError::Io)?;
    if !status.success() {
        return Err(RenderError::FfmpegFailed(tail.join("\n")));
    }
    Ok(())
}

/// Pull the `time=` value out of an ffmpeg stderr progress line.
///
/// Example line: `frame=  123 fps= 60 ... time=00:01:02.05 speed=1.50x`
fn parse_progress_time(line: &str) -> Option<f64> {
    extract_value(line, "time=").and_then(|v| parse_time_str(&v))
}

fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    let trimmed = rest.trim_start();
    let end = trimmed
        .find(|c: char| c.is_whitespace())
        .unwrap_or(trimmed.len());
    let val = trimmed[..end].to_string();
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

/// Parse an ffmpeg time string like "00:01:02.05" into seconds.
fn parse_time_str(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let mins: f64 = parts[1].parse().ok()?;
    let secs: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + mins * 60.0 + secs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
