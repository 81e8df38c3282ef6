use std::collections::HashMap;
use std::path::{Path, PathBuf};
use storycut_core::types::*;
use uuid::Uuid;

use crate::error::{RenderError, Result};

/// Fallback span rendered when the timeline has no usable visual content.
pub const EMPTY_SEGMENT_DURATION_US: TimeUs = DEFAULT_CLIP_DURATION_US;

/// Output geometry for one render job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// One composited span. Within a segment the set of active visual clips is
/// constant, so each segment maps to a single ffmpeg filter graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start_us: TimeUs,
    pub end_us: TimeUs,
}

impl Segment {
    pub fn duration_us(&self) -> TimeUs {
        self.end_us - self.start_us
    }
}

// ---------------------------------------------------------------------------
// Segmentation
// ---------------------------------------------------------------------------

/// Slice the timeline at every visible visual clip boundary. Consecutive
/// cut points become segments; a timeline with no visual content yields a
/// single black segment of the default duration.
pub fn slice_segments(timeline: &Timeline) -> Vec<Segment> {
    let mut cuts: Vec<i64> = vec![0];
    for layer in &timeline.layers {
        if !layer.visible {
            continue;
        }
        for clip in &layer.clips {
            if !clip.visible {
                continue;
            }
            cuts.push(clip.start_us.0);
            cuts.push(clip.end_us().0);
        }
    }
    cuts.sort_unstable();
    cuts.dedup();
    cuts.retain(|&c| c >= 0);

    let segments: Vec<Segment> = cuts
        .windows(2)
        .filter(|pair| pair[1] - pair[0] > 0)
        .map(|pair| Segment {
            start_us: TimeUs(pair[0]),
            end_us: TimeUs(pair[1]),
        })
        .collect();

    if segments.is_empty() {
        return vec![Segment {
            start_us: TimeUs::ZERO,
            end_us: EMPTY_SEGMENT_DURATION_US,
        }];
    }
    segments
}

/// Visible visual clips overlapping the segment, bottom layer first so the
/// overlay chain stacks in layer order.
pub fn active_clips<'a>(timeline: &'a Timeline, segment: &Segment) -> Vec<&'a Clip> {
    let mut active: Vec<(usize, &Clip)> = Vec::new();
    for layer in &timeline.layers {
        if !layer.visible {
            continue;
        }
        for clip in &layer.clips {
            if clip.visible
                && clip.start_us < segment.end_us
                && clip.end_us() > segment.start_us
            {
                active.push((layer.order, clip));
            }
        }
    }
    active.sort_by_key(|(order, clip)| (*order, clip.start_us));
    active.into_iter().map(|(_, clip)| clip).collect()
}

// ---------------------------------------------------------------------------
// Filter graph construction
// ---------------------------------------------------------------------------

/// Build the full ffmpeg argument list for one segment: inputs, the
/// compositing filter graph, and encoder flags for the intermediate file.
pub fn build_segment_args(
    timeline: &Timeline,
    paths: &HashMap<Uuid, PathBuf>,
    segment: &Segment,
    settings: &RenderSettings,
    output: &Path,
) -> Result<Vec<String>> {
    let clips = active_clips(timeline, segment);
    let duration = segment.duration_us().as_seconds();

    let mut args: Vec<String> = vec!["-y".into()];
    let mut filter = format!(
        "color=c=black:s={}x{}:r={}:d={:.6}[base]",
        settings.width, settings.height, settings.fps, duration
    );

    let mut input_index = 0usize;
    let mut stage = 0usize;
    let mut current = "base".to_string();

    for clip in clips {
        match clip.kind {
            ClipKind::Video | ClipKind::Image | ClipKind::Scene => {
                let path = paths
                    .get(&clip.id)
                    .ok_or(RenderError::MissingSource(clip.id))?;
                args.push("-i".into());
                args.push(path.to_string_lossy().into_owned());

                let label = format!("c{input_index}");
                filter.push(';');
                filter.push_str(&source_chain(clip, segment, settings, input_index, &label));

                let next = format!("s{stage}");
                filter.push_str(&format!(
                    ";[{current}][{label}]{}[{next}]",
                    overlay_expr(&clip.transform)
                ));
                current = next;
                input_index += 1;
                stage += 1;
            }
            ClipKind::Text => {
                let next = format!("s{stage}");
                filter.push_str(&format!(
                    ";[{current}]{}[{next}]",
                    drawtext_expr(clip)
                ));
                current = next;
                stage += 1;
            }
            _ => {}
        }
    }

    filter.push_str(&format!(";[{current}]format=yuv420p[vout]"));

    args.push("-filter_complex".into());
    args.push(filter);
    args.push("-map".into());
    args.push("[vout]".into());
    args.push("-r".into());
    args.push(settings.fps.to_string());
    args.push("-t".into());
    args.push(format!("{duration:.6}"));
    args.push("-c:v".into());
    args.push("libx264".into());
    args.push("-preset".into());
    args.push("veryfast".into());
    args.push(output.to_string_lossy().into_owned());
    Ok(args)
}

/// Per-clip chain: select the right source span, normalize timestamps,
/// then fit and fade it for compositing.
fn source_chain(
    clip: &Clip,
    segment: &Segment,
    settings: &RenderSettings,
    input_index: usize,
    label: &str,
) -> String {
    let elapsed = segment.start_us - clip.start_us;
    let duration = segment.duration_us().as_seconds();
    let rate = clip.playback_rate;

    let mut chain = format!("[{input_index}:v]");
    match clip.kind {
        ClipKind::Image => {
            // Stills loop a single frame for the segment duration.
            chain.push_str(&format!(
                "loop=loop=-1:size=1:start=0,trim=duration={duration:.6},setpts=PTS-STARTPTS"
            ));
        }
        _ => {
            let trim_start =
                (clip.source_offset_us + TimeUs(elapsed.0.max(0)).scale(rate)).as_seconds();
            let trim_duration = duration * rate;
            chain.push_str(&format!(
                "trim=start={trim_start:.6}:duration={trim_duration:.6},setpts=(PTS-STARTPTS)/{rate}"
            ));
        }
    }

    let scale = clip.transform.scale;
    chain.push_str(&format!(
        ",scale=w='iw*min({w}/iw\\,{h}/ih)*{scale}':h='ih*min({w}/iw\\,{h}/ih)*{scale}'",
        w = settings.width,
        h = settings.height,
    ));

    if clip.transform.rotation != 0.0 {
        chain.push_str(&format!(
            ",rotate={}*PI/180:fillcolor=none",
            clip.transform.rotation
        ));
    }

    if clip.opacity < 1.0 {
        chain.push_str(&format!(
            ",format=rgba,colorchannelmixer=aa={:.4}",
            clip.opacity
        ));
    }

    chain.push_str(&format!("[{label}]"));
    chain
}

/// Overlay placement: transform offsets are percentages of the canvas,
/// measured from center.
fn overlay_expr(transform: &Transform) -> String {
    format!(
        "overlay=x='(W-w)/2+({x}/100*W)':y='(H-h)/2+({y}/100*H)':shortest=1",
        x = transform.x,
        y = transform.y,
    )
}

fn drawtext_expr(clip: &Clip) -> String {
    let text = escape_drawtext(clip.text.as_deref().unwrap_or(""));
    let size = match clip.text_preset.as_deref() {
        Some("headline") => 96,
        Some("subtitle") => 48,
        _ => 64,
    };
    format!(
        "drawtext=text='{text}':fontsize={size}:fontcolor=white:borderw=2:bordercolor=black:\
         x='(w-text_w)/2+({x}/100*w)':y='(h-text_h)/2+({y}/100*h)':alpha={alpha:.4}",
        x = clip.transform.x,
        y = clip.transform.y,
        alpha = clip.opacity,
    )
}

/// drawtext treats backslash, quote, colon, and percent specially.
fn escape_drawtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            ':' => escaped.push_str("\\:"),
            '%' => escaped.push_str("\\%"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
