use crate::types::*;
use std::time::Instant;
use uuid::Uuid;

/// Largest wall-clock delta a single frame may contribute. Tab suspends and
/// debugger pauses otherwise turn into giant jumps.
pub const MAX_FRAME_DELTA_US: TimeUs = TimeUs(100_000);

/// How far a media handle may drift from the authoritative time before it
/// is hard-seeked.
pub const DRIFT_TOLERANCE_US: TimeUs = TimeUs(250_000);

/// Viewport follows playback once the playhead passes this fraction of the
/// visible width...
pub const FOLLOW_TRIGGER: f64 = 0.85;
/// ...and scrolls so the playhead sits at this fraction from the left.
pub const FOLLOW_REST: f64 = 0.15;

// ---------------------------------------------------------------------------
// PlaybackClock
// ---------------------------------------------------------------------------

/// The single authoritative elapsed-time value. Advanced once per animation
/// frame while playing; every media handle is slaved to it.
#[derive(Debug)]
pub struct PlaybackClock {
    elapsed_us: TimeUs,
    playing: bool,
    rate: f64,
    last_frame: Option<Instant>,
}

/// Outcome of one clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    pub elapsed_us: TimeUs,
    /// True when the end of content was reached and the clock reset to zero.
    pub looped: bool,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            elapsed_us: TimeUs::ZERO,
            playing: false,
            rate: 1.0,
            last_frame: None,
        }
    }

    pub fn elapsed_us(&self) -> TimeUs {
        self.elapsed_us
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: f64) {
        if rate > 0.0 {
            self.rate = rate;
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
        self.last_frame = None;
    }

    pub fn pause(&mut self) {
        self.playing = false;
        self.last_frame = None;
    }

    pub fn seek(&mut self, to: TimeUs) {
        self.elapsed_us = to.max(TimeUs::ZERO);
    }

    /// Per-frame tick driven by the animation loop. Uses the wall-clock
    /// delta since the previous frame, scaled by the rate and clamped.
    pub fn tick(&mut self, now: Instant, max_content_us: TimeUs) -> ClockTick {
        if !self.playing {
            return ClockTick {
                elapsed_us: self.elapsed_us,
                looped: false,
            };
        }

        let delta_us = match self.last_frame {
            Some(prev) => TimeUs(now.duration_since(prev).as_micros() as i64),
            None => TimeUs::ZERO,
        };
        self.last_frame = Some(now);

        self.advance(delta_us, max_content_us)
    }

    /// Advance by a raw frame delta. Separate from `tick` so the loop
    /// behavior is testable without real time.
    pub fn advance(&mut self, delta_us: TimeUs, max_content_us: TimeUs) -> ClockTick {
        let clamped = delta_us.min(MAX_FRAME_DELTA_US);
        self.elapsed_us = self.elapsed_us + clamped.scale(self.rate);

        if max_content_us > TimeUs::ZERO && self.elapsed_us >= max_content_us {
            // Loop-to-start, not hold-at-end.
            self.elapsed_us = TimeUs::ZERO;
            self.playing = false;
            self.last_frame = None;
            return ClockTick {
                elapsed_us: TimeUs::ZERO,
                looped: true,
            };
        }

        ClockTick {
            elapsed_us: self.elapsed_us,
            looped: false,
        }
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// MediaHandle
// ---------------------------------------------------------------------------

/// A seekable, rate-adjustable playback surface: an audio element, an
/// external player process, anything that can report its own position.
pub trait MediaHandle {
    fn load(&mut self, source: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek_us(&mut self, position: TimeUs);
    fn set_rate(&mut self, rate: f64);
    fn position_us(&self) -> TimeUs;
}

/// Drift-correction policy for one handle. Owns the identity of the clip
/// the handle currently has loaded so sources are swapped only when the
/// active clip actually changes.
#[derive(Debug, Default)]
pub struct HandleSync {
    active_clip: Option<Uuid>,
}

impl HandleSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_clip(&self) -> Option<Uuid> {
        self.active_clip
    }

    /// Synchronize the handle to the authoritative time. `active` is the
    /// clip under the playhead on this handle's track, if any.
    pub fn sync<H: MediaHandle>(
        &mut self,
        handle: &mut H,
        active: Option<&Clip>,
        elapsed_us: TimeUs,
        playing: bool,
    ) {
        let Some(clip) = active else {
            if self.active_clip.take().is_some() {
                handle.pause();
            }
            return;
        };

        // Swap the source only on identity change, never on a time step
        // within the same clip.
        if self.active_clip != Some(clip.id) {
            if let Some(source) = &clip.source {
                handle.load(source);
            }
            handle.set_rate(clip.playback_rate);
            self.active_clip = Some(clip.id);
        }

        let expected =
            (elapsed_us - clip.start_us).scale(clip.playback_rate) + clip.source_offset_us;
        let drift = TimeUs((handle.position_us() - expected).0.abs());
        if drift > DRIFT_TOLERANCE_US {
            handle.seek_us(expected);
        }

        if playing {
            handle.play();
        } else {
            handle.pause();
        }
    }
}

/// Auto-scroll decision for the timeline viewport. Returns the new view
/// start when the playhead has crossed the trigger edge.
pub fn follow_playhead(
    view_start_us: TimeUs,
    view_width_us: TimeUs,
    playhead_us: TimeUs,
) -> Option<TimeUs> {
    if view_width_us <= TimeUs::ZERO {
        return None;
    }
    let trigger = view_start_us + view_width_us.scale(FOLLOW_TRIGGER);
    if playhead_us < trigger {
        return None;
    }
    let new_start = playhead_us - view_width_us.scale(FOLLOW_REST);
    Some(new_start.max(TimeUs::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeHandle {
        source: Option<String>,
        loads: usize,
        seeks: Vec<TimeUs>,
        position: TimeUs,
        rate: f64,
        playing: bool,
    }

    impl MediaHandle for FakeHandle {
        fn load(&mut self, source: &str) {
            self.source = Some(source.to_string());
            self.loads += 1;
        }
        fn play(&mut self) {
            self.playing = true;
        }
        fn pause(&mut self) {
            self.playing = false;
        }
        fn seek_us(&mut self, position: TimeUs) {
            self.position = position;
            self.seeks.push(position);
        }
        fn set_rate(&mut self, rate: f64) {
            self.rate = rate;
        }
        fn position_us(&self) -> TimeUs {
            self.position
        }
    }

    fn media_clip(start_s: f64, dur_s: f64) -> Clip {
        let mut clip = Clip::with_span(
            ClipKind::Video,
            TimeUs::from_seconds(start_s),
            TimeUs::from_seconds(dur_s),
        );
        clip.source = Some("/media/a.mp4".to_string());
        clip
    }

    // -----------------------------------------------------------------------
    // clock advance / loop
    // -----------------------------------------------------------------------

    #[test]
    fn advance_scales_by_rate() {
        let mut clock = PlaybackClock::new();
        clock.set_rate(2.0);
        clock.play();
        clock.advance(TimeUs(50_000), TimeUs::from_seconds(100.0));
        assert_eq!(clock.elapsed_us(), TimeUs(100_000));
    }

    #[test]
    fn advance_clamps_large_frame_delta() {
        let mut clock = PlaybackClock::new();
        clock.play();
        // A 3-second stall contributes at most 0.1s.
        clock.advance(TimeUs::from_seconds(3.0), TimeUs::from_seconds(100.0));
        assert_eq!(clock.elapsed_us(), TimeUs(100_000));
    }

    #[test]
    fn reaching_end_resets_to_zero_and_stops() {
        let mut clock = PlaybackClock::new();
        clock.set_rate(2.0);
        clock.play();
        clock.seek(TimeUs::from_seconds(9.95));

        let tick = clock.advance(TimeUs(50_000), TimeUs::from_seconds(10.0));
        assert!(tick.looped);
        assert_eq!(clock.elapsed_us(), TimeUs::ZERO);
        assert!(!clock.is_playing());
    }

    #[test]
    fn paused_clock_does_not_advance() {
        let mut clock = PlaybackClock::new();
        clock.seek(TimeUs::from_seconds(2.0));
        let tick = clock.tick(Instant::now(), TimeUs::from_seconds(10.0));
        assert_eq!(tick.elapsed_us, TimeUs::from_seconds(2.0));
        assert!(!tick.looped);
    }

    #[test]
    fn first_tick_after_play_contributes_nothing() {
        let mut clock = PlaybackClock::new();
        clock.play();
        let tick = clock.tick(Instant::now(), TimeUs::from_seconds(10.0));
        assert_eq!(tick.elapsed_us, TimeUs::ZERO);
    }

    #[test]
    fn empty_content_never_loops() {
        let mut clock = PlaybackClock::new();
        clock.play();
        let tick = clock.advance(TimeUs(50_000), TimeUs::ZERO);
        assert!(!tick.looped);
        assert!(clock.is_playing());
    }

    #[test]
    fn seek_clamps_negative_to_zero() {
        let mut clock = PlaybackClock::new();
        clock.seek(TimeUs(-1_000_000));
        assert_eq!(clock.elapsed_us(), TimeUs::ZERO);
    }

    // -----------------------------------------------------------------------
    // handle sync
    // -----------------------------------------------------------------------

    #[test]
    fn sync_loads_source_once_per_clip() {
        let mut sync = HandleSync::new();
        let mut handle = FakeHandle::default();
        let clip = media_clip(1.0, 5.0);

        sync.sync(&mut handle, Some(&clip), TimeUs::from_seconds(1.5), true);
        sync.sync(&mut handle, Some(&clip), TimeUs::from_seconds(2.5), true);
        sync.sync(&mut handle, Some(&clip), TimeUs::from_seconds(3.5), true);

        assert_eq!(handle.loads, 1);
        assert_eq!(sync.active_clip(), Some(clip.id));
    }

    #[test]
    fn sync_swaps_source_on_identity_change() {
        let mut sync = HandleSync::new();
        let mut handle = FakeHandle::default();
        let a = media_clip(0.0, 2.0);
        let b = media_clip(2.0, 2.0);

        sync.sync(&mut handle, Some(&a), TimeUs::from_seconds(1.0), true);
        sync.sync(&mut handle, Some(&b), TimeUs::from_seconds(3.0), true);

        assert_eq!(handle.loads, 2);
        assert_eq!(sync.active_clip(), Some(b.id));
    }

    #[test]
    fn small_drift_is_left_alone() {
        let mut sync = HandleSync::new();
        let mut handle = FakeHandle::default();
        let clip = media_clip(0.0, 10.0);

        // Expected position at elapsed 2.0 is 2.0; handle is 0.2 off.
        handle.position = TimeUs::from_seconds(2.2);
        sync.sync(&mut handle, Some(&clip), TimeUs::from_seconds(2.0), true);
        // The initial load does not seek; drift below tolerance leaves the
        // handle's own clock alone.
        assert!(handle.seeks.is_empty());
    }

    #[test]
    fn large_drift_hard_seeks() {
        let mut sync = HandleSync::new();
        let mut handle = FakeHandle::default();
        let mut clip = media_clip(1.0, 10.0);
        clip.source_offset_us = TimeUs::from_seconds(0.5);
        clip.playback_rate = 2.0;

        handle.position = TimeUs::from_seconds(9.0);
        sync.sync(&mut handle, Some(&clip), TimeUs::from_seconds(3.0), true);

        // Expected: (3.0 - 1.0) * 2.0 + 0.5 = 4.5.
        assert_eq!(handle.seeks, vec![TimeUs::from_seconds(4.5)]);
    }

    #[test]
    fn no_active_clip_pauses_handle() {
        let mut sync = HandleSync::new();
        let mut handle = FakeHandle::default();
        let clip = media_clip(0.0, 2.0);

        sync.sync(&mut handle, Some(&clip), TimeUs::from_seconds(1.0), true);
        assert!(handle.playing);

        sync.sync(&mut handle, None, TimeUs::from_seconds(5.0), true);
        assert!(!handle.playing);
        assert_eq!(sync.active_clip(), None);
    }

    // -----------------------------------------------------------------------
    // viewport follow
    // -----------------------------------------------------------------------

    #[test]
    fn viewport_stays_put_before_trigger() {
        let view_start = TimeUs::ZERO;
        let width = TimeUs::from_seconds(10.0);
        assert_eq!(
            follow_playhead(view_start, width, TimeUs::from_seconds(8.0)),
            None
        );
    }

    #[test]
    fn viewport_scrolls_past_trigger() {
        let view_start = TimeUs::ZERO;
        let width = TimeUs::from_seconds(10.0);
        let new_start = follow_playhead(view_start, width, TimeUs::from_seconds(8.6)).unwrap();
        // Playhead rests at 15% of the width: 8.6 - 1.5 = 7.1.
        assert_eq!(new_start, TimeUs::from_seconds(7.1));
    }

    #[test]
    fn viewport_never_scrolls_negative() {
        let view_start = TimeUs(-1);
        let width = TimeUs::from_seconds(1.0);
        let new_start = follow_playhead(view_start, width, TimeUs::from_seconds(0.9)).unwrap();
        assert!(new_start >= TimeUs::ZERO);
    }
}
