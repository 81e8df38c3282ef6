use crate::placement::{move_conflicts, resolve_drop};
use crate::types::*;
use tracing::{debug, warn};
use uuid::Uuid;

/// Durations at or past this are treated as corrupt (10 hours).
pub const MAX_PLAUSIBLE_DURATION_US: TimeUs = TimeUs(36_000_000_000);

/// What the self-healing pass touched.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub repaired: Vec<Uuid>,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        self.repaired.is_empty()
    }
}

/// Repair implausible clip state after a load instead of refusing the
/// project. A repaired clip falls back to the placeholder duration and is
/// marked resolved so it is not probed into the same bad value again.
pub fn sanitize_timeline(timeline: &mut Timeline) -> SanitizeReport {
    let mut report = SanitizeReport::default();

    for layer in &mut timeline.layers {
        for clip in &mut layer.clips {
            sanitize_clip(clip, &mut report);
        }
    }
    for clip in &mut timeline.music.clips {
        sanitize_clip(clip, &mut report);
    }
    for clip in &mut timeline.voice.clips {
        sanitize_clip(clip, &mut report);
    }
    timeline.voice.relayout();

    if !report.is_clean() {
        warn!(repaired = report.repaired.len(), "sanitized corrupt clips");
    }
    report
}

fn sanitize_clip(clip: &mut Clip, report: &mut SanitizeReport) {
    let mut repaired = false;

    if clip.duration_us <= TimeUs::ZERO || clip.duration_us >= MAX_PLAUSIBLE_DURATION_US {
        clip.duration_us = DEFAULT_CLIP_DURATION_US;
        clip.resolved = true;
        repaired = true;
    }
    if clip.source_offset_us < TimeUs::ZERO
        || clip.source_offset_us >= MAX_PLAUSIBLE_DURATION_US
    {
        clip.source_offset_us = TimeUs::ZERO;
        repaired = true;
    }
    if clip.start_us < TimeUs::ZERO {
        clip.start_us = TimeUs::ZERO;
        repaired = true;
    }
    if !clip.playback_rate.is_finite() || clip.playback_rate <= 0.0 {
        clip.playback_rate = 1.0;
        repaired = true;
    }
    if !clip.opacity.is_finite() || !(0.0..=1.0).contains(&clip.opacity) {
        clip.opacity = 1.0;
        repaired = true;
    }
    if !clip.volume.is_finite() || !(0.0..=1.0).contains(&clip.volume) {
        clip.volume = 1.0;
        repaired = true;
    }

    if repaired {
        report.repaired.push(clip.id);
    }
}

/// Commit an asynchronous duration probe back into the model by id lookup.
///
/// `duration` is `None` when the probe failed or timed out; the clip keeps
/// its placeholder duration and is flagged as a fallback so editing can
/// continue with a visibly approximate length. A clip deleted while its
/// probe was in flight is a no-op, not an error. Returns whether a clip
/// was updated.
pub fn apply_probe(timeline: &mut Timeline, clip_id: Uuid, duration: Option<TimeUs>) -> bool {
    let Some(slot) = locate_for_probe(timeline, clip_id) else {
        debug!(%clip_id, "probe result for a clip that no longer exists");
        return false;
    };

    match slot {
        ProbeSlot::Layer(li, ci) => {
            let layer = &mut timeline.layers[li];
            let (old_start, duration_us) = {
                let clip = &mut layer.clips[ci];
                commit_probe(clip, duration);
                (clip.start_us, clip.duration_us)
            };

            // The new true duration may collide with a neighbor; reposition
            // silently the same way a drop would.
            if move_conflicts(clip_id, old_start, duration_us, &layer.clips) {
                let others: Vec<Clip> = layer
                    .clips
                    .iter()
                    .filter(|c| c.id != clip_id)
                    .cloned()
                    .collect();
                let new_start = resolve_drop(old_start, duration_us, &others);
                layer.clips[ci].start_us = new_start;
            }
        }
        ProbeSlot::Music(ci) => {
            commit_probe(&mut timeline.music.clips[ci], duration);
        }
        ProbeSlot::Voice(ci) => {
            commit_probe(&mut timeline.voice.clips[ci], duration);
            timeline.voice.relayout();
        }
    }
    true
}

enum ProbeSlot {
    Layer(usize, usize),
    Music(usize),
    Voice(usize),
}

fn locate_for_probe(timeline: &Timeline, clip_id: Uuid) -> Option<ProbeSlot> {
    for (li, layer) in timeline.layers.iter().enumerate() {
        if let Some(ci) = layer.clips.iter().position(|c| c.id == clip_id) {
            return Some(ProbeSlot::Layer(li, ci));
        }
    }
    if let Some(ci) = timeline.music.clips.iter().position(|c| c.id == clip_id) {
        return Some(ProbeSlot::Music(ci));
    }
    if let Some(ci) = timeline.voice.clips.iter().position(|c| c.id == clip_id) {
        return Some(ProbeSlot::Voice(ci));
    }
    None
}

fn commit_probe(clip: &mut Clip, duration: Option<TimeUs>) {
    match duration {
        Some(d) => {
            clip.source_duration_us = Some(d);
            if !clip.resolved {
                // Placeholder clips take the true playable length.
                let played = (d - clip.source_offset_us).scale(1.0 / clip.playback_rate);
                clip.duration_us = played.max(MIN_CLIP_DURATION_US);
            } else if let Some(max_dur) = clip.max_duration_us() {
                if clip.duration_us > max_dur {
                    clip.duration_us = max_dur.max(MIN_CLIP_DURATION_US);
                }
            }
            clip.resolved = true;
            clip.fallback = false;
        }
        None => {
            clip.duration_us = DEFAULT_CLIP_DURATION_US;
            clip.resolved = true;
            clip.fallback = true;
        }
    }
}
