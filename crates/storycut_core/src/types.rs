use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use uuid::Uuid;

/// Smallest duration a clip may have after a resize or split.
pub const MIN_CLIP_DURATION_US: TimeUs = TimeUs(100_000);

/// Placeholder duration for clips whose media has not been probed yet.
pub const DEFAULT_CLIP_DURATION_US: TimeUs = TimeUs(5_000_000);

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0) as i64)
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Scale by a floating-point factor (playback rates).
    pub fn scale(&self, factor: f64) -> Self {
        Self((self.0 as f64 * factor) as i64)
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i64> for TimeUs {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<i64> for TimeUs {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self(self.0 / rhs)
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_us = self.0.unsigned_abs();
        let total_ms = total_us / 1_000;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        if self.0 < 0 {
            write!(f, "-{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        } else {
            write!(f, "{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        }
    }
}

// ---------------------------------------------------------------------------
// ClipKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    Video,
    Image,
    Text,
    Music,
    Voice,
    /// Video-like clip variant produced by scene generation.
    Scene,
}

impl ClipKind {
    /// Kinds that occupy a visual layer and are drawn on the canvas.
    pub fn is_visual(&self) -> bool {
        matches!(self, Self::Video | Self::Image | Self::Text | Self::Scene)
    }

    /// Kinds whose source file carries its own audio track.
    pub fn has_embedded_audio(&self) -> bool {
        matches!(self, Self::Video | Self::Scene)
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::Music | Self::Voice)
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Placement on the canvas, relative to its center. `x`/`y` are percentage
/// offsets of the canvas size, `scale` multiplies the aspect-fit size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Clip
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    pub id: Uuid,
    pub kind: ClipKind,
    pub start_us: TimeUs,
    pub duration_us: TimeUs,
    /// Untrimmed length of the source media, known once probed.
    pub source_duration_us: Option<TimeUs>,
    /// Playback start offset into the source.
    pub source_offset_us: TimeUs,
    /// Path or URL of the backing media. Text clips have none.
    pub source: Option<String>,
    pub text: Option<String>,
    pub text_preset: Option<String>,
    pub transform: Transform,
    pub opacity: f64,
    pub volume: f64,
    pub playback_rate: f64,
    pub visible: bool,
    pub muted: bool,
    /// Voice clips may reference the generation job that produced them.
    pub voice_job: Option<Uuid>,
    /// True once the real source duration has been probed or the clip was
    /// repaired by the sanitizer.
    pub resolved: bool,
    /// Set when resolution failed and the placeholder duration was kept.
    pub fallback: bool,
}

impl Clip {
    /// New clip with the placeholder duration, awaiting resolution.
    pub fn new(kind: ClipKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            start_us: TimeUs::ZERO,
            duration_us: DEFAULT_CLIP_DURATION_US,
            source_duration_us: None,
            source_offset_us: TimeUs::ZERO,
            source: None,
            text: None,
            text_preset: None,
            transform: Transform::default(),
            opacity: 1.0,
            volume: 1.0,
            playback_rate: 1.0,
            visible: true,
            muted: false,
            voice_job: None,
            resolved: false,
            fallback: false,
        }
    }

    /// New clip spanning `[start, start + duration)`.
    pub fn with_span(kind: ClipKind, start_us: TimeUs, duration_us: TimeUs) -> Self {
        let mut clip = Self::new(kind);
        clip.start_us = start_us;
        clip.duration_us = duration_us;
        clip
    }

    pub fn end_us(&self) -> TimeUs {
        self.start_us + self.duration_us
    }

    /// Longest timeline duration this clip can have without playing past the
    /// end of its source. Unknown until the source has been probed.
    pub fn max_duration_us(&self) -> Option<TimeUs> {
        let source = self.source_duration_us?;
        if self.playback_rate > 0.0 {
            Some((source - self.source_offset_us).scale(1.0 / self.playback_rate))
        } else {
            Some(source - self.source_offset_us)
        }
    }
}

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

/// An ordered visual track. Order 0 is drawn first (bottom-most).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Layer {
    pub id: Uuid,
    pub order: usize,
    pub name: String,
    pub locked: bool,
    pub visible: bool,
    pub clips: Vec<Clip>,
}

impl Layer {
    pub fn new(order: usize, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order,
            name: name.into(),
            locked: false,
            visible: true,
            clips: vec![],
        }
    }
}

// ---------------------------------------------------------------------------
// VoiceTrack
// ---------------------------------------------------------------------------

/// Strictly sequential narration track: clips sit back to back in list
/// order. Start times are derived, never positioned directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VoiceTrack {
    pub clips: Vec<Clip>,
}

impl VoiceTrack {
    /// Recompute cumulative start times from list order.
    pub fn relayout(&mut self) {
        let mut cursor = TimeUs::ZERO;
        for clip in &mut self.clips {
            clip.start_us = cursor;
            cursor = cursor + clip.duration_us;
        }
    }

    pub fn total_duration_us(&self) -> TimeUs {
        self.clips
            .iter()
            .fold(TimeUs::ZERO, |acc, c| acc + c.duration_us)
    }
}

// ---------------------------------------------------------------------------
// MusicTrack
// ---------------------------------------------------------------------------

/// Single audio layer of time-positioned clips. Drops resolve collisions,
/// but overlaps that arise later are tolerated for sound layering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MusicTrack {
    pub clips: Vec<Clip>,
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub layers: Vec<Layer>,
    pub music: MusicTrack,
    pub voice: VoiceTrack,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            layers: vec![],
            music: MusicTrack::default(),
            voice: VoiceTrack::default(),
        }
    }

    /// Timeline with `n` empty visual layers, ordered bottom to top.
    pub fn with_layers(n: usize) -> Self {
        let mut tl = Self::new();
        for i in 0..n {
            tl.layers.push(Layer::new(i, format!("Layer {}", i + 1)));
        }
        tl
    }

    pub fn layer(&self, layer_id: Uuid) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == layer_id)
    }

    pub fn layer_mut(&mut self, layer_id: Uuid) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == layer_id)
    }

    pub fn find_clip(&self, clip_id: Uuid) -> Option<&Clip> {
        self.all_clips().find(|c| c.id == clip_id)
    }

    pub fn all_clips(&self) -> impl Iterator<Item = &Clip> {
        self.layers
            .iter()
            .flat_map(|l| l.clips.iter())
            .chain(self.music.clips.iter())
            .chain(self.voice.clips.iter())
    }

    /// End of the last clip on any track. Playback loops back to zero here.
    pub fn max_content_time_us(&self) -> TimeUs {
        self.all_clips()
            .map(|c| c.end_us())
            .max()
            .unwrap_or(TimeUs::ZERO)
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ProjectSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSettings {
    pub active_preset_id: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            active_preset_id: "landscape-1080p".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Unix timestamps, seconds.
    pub created_at: u64,
    pub updated_at: u64,
    pub settings: ProjectSettings,
    pub timeline: Timeline,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
