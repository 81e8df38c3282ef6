use crate::error::{CoreError, Result};
use crate::placement::{clamp_resize_end, clamp_resize_start, move_conflicts, resolve_drop};
use crate::types::*;
use uuid::Uuid;

/// Where a clip lives inside the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClipSlot {
    Layer(usize, usize),
    Music(usize),
    Voice(usize),
}

impl Timeline {
    fn locate(&self, clip_id: Uuid) -> Option<ClipSlot> {
        for (li, layer) in self.layers.iter().enumerate() {
            if let Some(ci) = layer.clips.iter().position(|c| c.id == clip_id) {
                return Some(ClipSlot::Layer(li, ci));
            }
        }
        if let Some(ci) = self.music.clips.iter().position(|c| c.id == clip_id) {
            return Some(ClipSlot::Music(ci));
        }
        if let Some(ci) = self.voice.clips.iter().position(|c| c.id == clip_id) {
            return Some(ClipSlot::Voice(ci));
        }
        None
    }

    fn clip_at(&self, slot: ClipSlot) -> &Clip {
        match slot {
            ClipSlot::Layer(li, ci) => &self.layers[li].clips[ci],
            ClipSlot::Music(ci) => &self.music.clips[ci],
            ClipSlot::Voice(ci) => &self.voice.clips[ci],
        }
    }

    fn clip_at_mut(&mut self, slot: ClipSlot) -> &mut Clip {
        match slot {
            ClipSlot::Layer(li, ci) => &mut self.layers[li].clips[ci],
            ClipSlot::Music(ci) => &mut self.music.clips[ci],
            ClipSlot::Voice(ci) => &mut self.voice.clips[ci],
        }
    }

    fn siblings_of(&self, slot: ClipSlot) -> &[Clip] {
        match slot {
            ClipSlot::Layer(li, _) => &self.layers[li].clips,
            ClipSlot::Music(_) => &self.music.clips,
            ClipSlot::Voice(_) => &self.voice.clips,
        }
    }

    fn check_unlocked(&self, slot: ClipSlot) -> Result<()> {
        if let ClipSlot::Layer(li, _) = slot {
            let layer = &self.layers[li];
            if layer.locked {
                return Err(CoreError::LayerLocked(layer.id));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // add / remove
    // -----------------------------------------------------------------------

    /// Drop a clip onto a visual layer. The requested start is adjusted by
    /// collision resolution; the final position is returned.
    pub fn add_clip(&mut self, layer_id: Uuid, mut clip: Clip) -> Result<TimeUs> {
        let layer = self
            .layers
            .iter_mut()
            .find(|l| l.id == layer_id)
            .ok_or(CoreError::LayerNotFound(layer_id))?;
        if layer.locked {
            return Err(CoreError::LayerLocked(layer_id));
        }

        let start = resolve_drop(clip.start_us, clip.duration_us, &layer.clips);
        clip.start_us = start;
        layer.clips.push(clip);
        Ok(start)
    }

    /// Drop a clip onto the music track. Same collision resolution as
    /// visual layers.
    pub fn add_music_clip(&mut self, mut clip: Clip) -> TimeUs {
        let start = resolve_drop(clip.start_us, clip.duration_us, &self.music.clips);
        clip.start_us = start;
        self.music.clips.push(clip);
        start
    }

    /// Insert a voice clip at a list position (or append) and relayout.
    pub fn insert_voice_clip(&mut self, index: Option<usize>, clip: Clip) {
        match index {
            Some(i) if i < self.voice.clips.len() => self.voice.clips.insert(i, clip),
            _ => self.voice.clips.push(clip),
        }
        self.voice.relayout();
    }

    /// Remove a clip from whichever track holds it. Returns the clip.
    pub fn remove_clip(&mut self, clip_id: Uuid) -> Result<Clip> {
        let slot = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        self.check_unlocked(slot)?;

        let clip = match slot {
            ClipSlot::Layer(li, ci) => self.layers[li].clips.remove(ci),
            ClipSlot::Music(ci) => self.music.clips.remove(ci),
            ClipSlot::Voice(ci) => {
                let c = self.voice.clips.remove(ci);
                self.voice.relayout();
                c
            }
        };
        Ok(clip)
    }

    /// Duplicate a clip under a new id, placed by drop resolution right
    /// after the original. Voice clips are inserted after their source in
    /// list order instead.
    pub fn duplicate_clip(&mut self, clip_id: Uuid) -> Result<Uuid> {
        let slot = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        self.check_unlocked(slot)?;

        let mut copy = self.clip_at(slot).clone();
        copy.id = Uuid::new_v4();

        match slot {
            ClipSlot::Layer(li, _) => {
                copy.start_us = copy.end_us();
                let start = resolve_drop(copy.start_us, copy.duration_us, &self.layers[li].clips);
                copy.start_us = start;
                let id = copy.id;
                self.layers[li].clips.push(copy);
                Ok(id)
            }
            ClipSlot::Music(_) => {
                copy.start_us = copy.end_us();
                let id = copy.id;
                self.add_music_clip(copy);
                Ok(id)
            }
            ClipSlot::Voice(ci) => {
                let id = copy.id;
                self.voice.clips.insert(ci + 1, copy);
                self.voice.relayout();
                Ok(id)
            }
        }
    }

    // -----------------------------------------------------------------------
    // move
    // -----------------------------------------------------------------------

    /// Move a clip to a new start time. All-or-nothing: any overlap with a
    /// sibling rejects the move and the model is left untouched.
    pub fn move_clip(&mut self, clip_id: Uuid, new_start: TimeUs) -> Result<()> {
        let slot = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        self.check_unlocked(slot)?;

        if matches!(slot, ClipSlot::Voice(_)) {
            return Err(CoreError::InvalidOperation(
                "voice clips are reordered, not moved in time".into(),
            ));
        }
        if new_start < TimeUs::ZERO {
            return Err(CoreError::InvalidOperation("start must be >= 0".into()));
        }

        let duration = self.clip_at(slot).duration_us;
        if move_conflicts(clip_id, new_start, duration, self.siblings_of(slot)) {
            return Err(CoreError::OverlapDetected);
        }

        self.clip_at_mut(slot).start_us = new_start;
        Ok(())
    }

    /// Change a voice clip's position in list order and relayout.
    pub fn reorder_voice_clip(&mut self, clip_id: Uuid, new_index: usize) -> Result<()> {
        let ci = self
            .voice
            .clips
            .iter()
            .position(|c| c.id == clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        if new_index >= self.voice.clips.len() {
            return Err(CoreError::InvalidOperation(format!(
                "index {} out of bounds ({} voice clips)",
                new_index,
                self.voice.clips.len()
            )));
        }
        let clip = self.voice.clips.remove(ci);
        self.voice.clips.insert(new_index, clip);
        self.voice.relayout();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // resize
    // -----------------------------------------------------------------------

    /// Drag the start handle. The end stays fixed; the new start is clamped
    /// against neighbors, the duration floor and the source length. The
    /// source offset advances by the trimmed amount. Returns the applied
    /// start.
    pub fn resize_clip_start(&mut self, clip_id: Uuid, proposed_start: TimeUs) -> Result<TimeUs> {
        let slot = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        self.check_unlocked(slot)?;
        if matches!(slot, ClipSlot::Voice(_)) {
            return Err(CoreError::InvalidOperation(
                "voice clips cannot be resized from the start edge".into(),
            ));
        }

        let start = {
            let clip = self.clip_at(slot);
            clamp_resize_start(clip, proposed_start, self.siblings_of(slot))
        };

        let clip = self.clip_at_mut(slot);
        let trimmed = start - clip.start_us;
        clip.source_offset_us = TimeUs((clip.source_offset_us + trimmed).0.max(0));
        clip.duration_us = clip.end_us() - start;
        clip.start_us = start;
        Ok(start)
    }

    /// Drag the end handle. The start stays fixed. Returns the applied end.
    pub fn resize_clip_end(&mut self, clip_id: Uuid, proposed_end: TimeUs) -> Result<TimeUs> {
        let slot = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        self.check_unlocked(slot)?;

        let end = {
            let clip = self.clip_at(slot);
            if matches!(slot, ClipSlot::Voice(_)) {
                // Followers are re-laid out afterwards, so the end may grow
                // past them; only the duration bounds apply.
                clamp_resize_end(clip, proposed_end, &[])
            } else {
                clamp_resize_end(clip, proposed_end, self.siblings_of(slot))
            }
        };

        let clip = self.clip_at_mut(slot);
        clip.duration_us = end - clip.start_us;

        if matches!(slot, ClipSlot::Voice(_)) {
            self.voice.relayout();
        }
        Ok(end)
    }

    // -----------------------------------------------------------------------
    // split
    // -----------------------------------------------------------------------

    /// Split a clip at an absolute timeline position. The position must sit
    /// at least the minimum duration away from both edges. The left part
    /// keeps the original id; the right part gets a new id and a source
    /// offset advanced by the elapsed portion. Returns (left, right) ids.
    pub fn split_clip(&mut self, clip_id: Uuid, at: TimeUs) -> Result<(Uuid, Uuid)> {
        let slot = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        self.check_unlocked(slot)?;

        let (start, end) = {
            let clip = self.clip_at(slot);
            (clip.start_us, clip.end_us())
        };
        if at < start + MIN_CLIP_DURATION_US || at > end - MIN_CLIP_DURATION_US {
            return Err(CoreError::InvalidOperation(
                "split position too close to a clip edge".into(),
            ));
        }

        let elapsed = at - start;
        let right_id = Uuid::new_v4();

        let right = {
            let clip = self.clip_at_mut(slot);
            let mut right = clip.clone();
            clip.duration_us = elapsed;
            right.id = right_id;
            right.start_us = at;
            right.duration_us = end - at;
            right.source_offset_us = right.source_offset_us + elapsed;
            right
        };

        match slot {
            ClipSlot::Layer(li, ci) => self.layers[li].clips.insert(ci + 1, right),
            ClipSlot::Music(ci) => self.music.clips.insert(ci + 1, right),
            ClipSlot::Voice(ci) => {
                self.voice.clips.insert(ci + 1, right);
                self.voice.relayout();
            }
        }

        Ok((clip_id, right_id))
    }

    // -----------------------------------------------------------------------
    // attribute edits
    // -----------------------------------------------------------------------

    /// Run a non-structural edit against a clip's attributes. Allowed on
    /// locked layers.
    pub fn update_clip(&mut self, clip_id: Uuid, f: impl FnOnce(&mut Clip)) -> Result<()> {
        let slot = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        f(self.clip_at_mut(slot));
        Ok(())
    }

    pub fn set_clip_volume(&mut self, clip_id: Uuid, volume: f64) -> Result<()> {
        self.update_clip(clip_id, |c| c.volume = volume.clamp(0.0, 1.0))
    }

    /// Change playback rate, re-capping the duration so the clip cannot
    /// play past its source. Voice tracks relayout afterwards.
    pub fn set_clip_playback_rate(&mut self, clip_id: Uuid, rate: f64) -> Result<()> {
        if rate <= 0.0 {
            return Err(CoreError::InvalidOperation(
                "playback rate must be positive".into(),
            ));
        }
        let slot = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;

        let clip = self.clip_at_mut(slot);
        clip.playback_rate = rate;
        if let Some(max_dur) = clip.max_duration_us() {
            if clip.duration_us > max_dur {
                clip.duration_us = max_dur.max(MIN_CLIP_DURATION_US);
            }
        }
        if matches!(slot, ClipSlot::Voice(_)) {
            self.voice.relayout();
        }
        Ok(())
    }

    pub fn set_clip_opacity(&mut self, clip_id: Uuid, opacity: f64) -> Result<()> {
        self.update_clip(clip_id, |c| c.opacity = opacity.clamp(0.0, 1.0))
    }

    pub fn set_clip_transform(&mut self, clip_id: Uuid, transform: Transform) -> Result<()> {
        self.update_clip(clip_id, |c| c.transform = transform)
    }

    pub fn set_clip_visible(&mut self, clip_id: Uuid, visible: bool) -> Result<()> {
        self.update_clip(clip_id, |c| c.visible = visible)
    }

    pub fn set_clip_muted(&mut self, clip_id: Uuid, muted: bool) -> Result<()> {
        self.update_clip(clip_id, |c| c.muted = muted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline_with_clip(start_s: f64, dur_s: f64) -> (Timeline, Uuid, Uuid) {
        let mut tl = Timeline::with_layers(1);
        let clip = Clip::with_span(
            ClipKind::Video,
            TimeUs::from_seconds(start_s),
            TimeUs::from_seconds(dur_s),
        );
        let clip_id = clip.id;
        let layer_id = tl.layers[0].id;
        tl.layers[0].clips.push(clip);
        (tl, layer_id, clip_id)
    }

    // -----------------------------------------------------------------------
    // add_clip
    // -----------------------------------------------------------------------

    #[test]
    fn add_clip_resolves_collision() {
        let (mut tl, layer_id, _) = timeline_with_clip(0.0, 6.0);
        // Desired [5, 9): midpoint 7 vs sibling midpoint 3 -> pushed right to 6.
        let clip = Clip::with_span(
            ClipKind::Video,
            TimeUs::from_seconds(5.0),
            TimeUs::from_seconds(4.0),
        );
        let start = tl.add_clip(layer_id, clip).unwrap();
        assert_eq!(start, TimeUs::from_seconds(6.0));

        let clips = &tl.layers[0].clips;
        assert!(clips[1].end_us() <= clips[0].start_us || clips[0].end_us() <= clips[1].start_us);
    }

    #[test]
    fn add_clip_to_locked_layer_fails() {
        let (mut tl, layer_id, _) = timeline_with_clip(0.0, 2.0);
        tl.layers[0].locked = true;
        let clip = Clip::new(ClipKind::Image);
        let result = tl.add_clip(layer_id, clip);
        assert!(matches!(result.unwrap_err(), CoreError::LayerLocked(_)));
    }

    #[test]
    fn add_clip_unknown_layer_fails() {
        let mut tl = Timeline::new();
        let result = tl.add_clip(Uuid::new_v4(), Clip::new(ClipKind::Video));
        assert!(matches!(result.unwrap_err(), CoreError::LayerNotFound(_)));
    }

    #[test]
    fn add_music_clip_resolves_collision() {
        let mut tl = Timeline::new();
        tl.music.clips.push(Clip::with_span(
            ClipKind::Music,
            TimeUs::ZERO,
            TimeUs::from_seconds(4.0),
        ));
        let clip = Clip::with_span(
            ClipKind::Music,
            TimeUs::from_seconds(3.0),
            TimeUs::from_seconds(4.0),
        );
        let start = tl.add_music_clip(clip);
        assert_eq!(start, TimeUs::from_seconds(4.0));
    }

    // -----------------------------------------------------------------------
    // move_clip
    // -----------------------------------------------------------------------

    #[test]
    fn move_clip_to_free_position() {
        let (mut tl, _, clip_id) = timeline_with_clip(0.0, 5.0);
        tl.move_clip(clip_id, TimeUs::from_seconds(10.0)).unwrap();
        assert_eq!(tl.layers[0].clips[0].start_us, TimeUs::from_seconds(10.0));
    }

    #[test]
    fn rejected_move_leaves_model_identical() {
        let (mut tl, layer_id, _) = timeline_with_clip(0.0, 5.0);
        let second = Clip::with_span(
            ClipKind::Video,
            TimeUs::from_seconds(5.0),
            TimeUs::from_seconds(5.0),
        );
        let second_id = second.id;
        tl.add_clip(layer_id, second).unwrap();

        let before = tl.clone();
        let result = tl.move_clip(second_id, TimeUs::from_seconds(3.0));
        assert!(matches!(result.unwrap_err(), CoreError::OverlapDetected));
        assert_eq!(tl, before);
    }

    #[test]
    fn move_voice_clip_is_rejected() {
        let mut tl = Timeline::new();
        let clip = Clip::new(ClipKind::Voice);
        let clip_id = clip.id;
        tl.insert_voice_clip(None, clip);

        let result = tl.move_clip(clip_id, TimeUs::from_seconds(2.0));
        assert!(result.is_err());
    }

    #[test]
    fn move_clip_on_locked_layer_fails() {
        let (mut tl, _, clip_id) = timeline_with_clip(0.0, 5.0);
        tl.layers[0].locked = true;
        let result = tl.move_clip(clip_id, TimeUs::from_seconds(10.0));
        assert!(matches!(result.unwrap_err(), CoreError::LayerLocked(_)));
    }

    // -----------------------------------------------------------------------
    // voice track
    // -----------------------------------------------------------------------

    #[test]
    fn insert_voice_clip_relayouts() {
        let mut tl = Timeline::new();
        tl.insert_voice_clip(
            None,
            Clip::with_span(ClipKind::Voice, TimeUs(777), TimeUs::from_seconds(3.0)),
        );
        tl.insert_voice_clip(
            None,
            Clip::with_span(ClipKind::Voice, TimeUs(777), TimeUs::from_seconds(2.0)),
        );
        assert_eq!(tl.voice.clips[0].start_us, TimeUs::ZERO);
        assert_eq!(tl.voice.clips[1].start_us, TimeUs::from_seconds(3.0));
    }

    #[test]
    fn reorder_voice_clip_updates_starts() {
        let mut tl = Timeline::new();
        let a = Clip::with_span(ClipKind::Voice, TimeUs::ZERO, TimeUs::from_seconds(3.0));
        let b = Clip::with_span(ClipKind::Voice, TimeUs::ZERO, TimeUs::from_seconds(2.0));
        let (a_id, b_id) = (a.id, b.id);
        tl.insert_voice_clip(None, a);
        tl.insert_voice_clip(None, b);

        tl.reorder_voice_clip(b_id, 0).unwrap();
        assert_eq!(tl.voice.clips[0].id, b_id);
        assert_eq!(tl.voice.clips[0].start_us, TimeUs::ZERO);
        assert_eq!(tl.voice.clips[1].id, a_id);
        assert_eq!(tl.voice.clips[1].start_us, TimeUs::from_seconds(2.0));
    }

    #[test]
    fn remove_voice_clip_closes_gap() {
        let mut tl = Timeline::new();
        let a = Clip::with_span(ClipKind::Voice, TimeUs::ZERO, TimeUs::from_seconds(3.0));
        let b = Clip::with_span(ClipKind::Voice, TimeUs::ZERO, TimeUs::from_seconds(2.0));
        let a_id = a.id;
        tl.insert_voice_clip(None, a);
        tl.insert_voice_clip(None, b);

        tl.remove_clip(a_id).unwrap();
        assert_eq!(tl.voice.clips.len(), 1);
        assert_eq!(tl.voice.clips[0].start_us, TimeUs::ZERO);
    }

    // -----------------------------------------------------------------------
    // resize
    // -----------------------------------------------------------------------

    #[test]
    fn resize_start_advances_source_offset() {
        let (mut tl, _, clip_id) = timeline_with_clip(2.0, 6.0);
        let applied = tl
            .resize_clip_start(clip_id, TimeUs::from_seconds(4.0))
            .unwrap();
        assert_eq!(applied, TimeUs::from_seconds(4.0));

        let clip = &tl.layers[0].clips[0];
        assert_eq!(clip.start_us, TimeUs::from_seconds(4.0));
        assert_eq!(clip.end_us(), TimeUs::from_seconds(8.0));
        assert_eq!(clip.source_offset_us, TimeUs::from_seconds(2.0));
    }

    #[test]
    fn resize_end_is_clamped_by_neighbor() {
        let (mut tl, layer_id, clip_id) = timeline_with_clip(0.0, 3.0);
        tl.add_clip(
            layer_id,
            Clip::with_span(
                ClipKind::Video,
                TimeUs::from_seconds(5.0),
                TimeUs::from_seconds(2.0),
            ),
        )
        .unwrap();

        let applied = tl
            .resize_clip_end(clip_id, TimeUs::from_seconds(9.0))
            .unwrap();
        assert_eq!(applied, TimeUs::from_seconds(5.0));
        assert_eq!(tl.layers[0].clips[0].duration_us, TimeUs::from_seconds(5.0));
    }

    #[test]
    fn resize_voice_clip_end_relayouts_followers() {
        let mut tl = Timeline::new();
        let a = Clip::with_span(ClipKind::Voice, TimeUs::ZERO, TimeUs::from_seconds(3.0));
        let b = Clip::with_span(ClipKind::Voice, TimeUs::ZERO, TimeUs::from_seconds(2.0));
        let a_id = a.id;
        tl.insert_voice_clip(None, a);
        tl.insert_voice_clip(None, b);

        tl.resize_clip_end(a_id, TimeUs::from_seconds(1.0)).unwrap();
        assert_eq!(tl.voice.clips[0].duration_us, TimeUs::from_seconds(1.0));
        assert_eq!(tl.voice.clips[1].start_us, TimeUs::from_seconds(1.0));
    }

    #[test]
    fn voice_clip_end_can_grow_past_its_follower() {
        let mut tl = Timeline::new();
        let mut a = Clip::with_span(ClipKind::Voice, TimeUs::ZERO, TimeUs::from_seconds(3.0));
        a.source_duration_us = Some(TimeUs::from_seconds(10.0));
        let b = Clip::with_span(ClipKind::Voice, TimeUs::ZERO, TimeUs::from_seconds(2.0));
        let a_id = a.id;
        tl.insert_voice_clip(None, a);
        tl.insert_voice_clip(None, b);

        // Restoring a trim extends past the follower's start; the follower
        // is pushed by relayout instead of blocking the resize.
        let end = tl.resize_clip_end(a_id, TimeUs::from_seconds(5.0)).unwrap();
        assert_eq!(end, TimeUs::from_seconds(5.0));
        assert_eq!(tl.voice.clips[0].duration_us, TimeUs::from_seconds(5.0));
        assert_eq!(tl.voice.clips[1].start_us, TimeUs::from_seconds(5.0));

        // The source length still caps the growth.
        let end = tl.resize_clip_end(a_id, TimeUs::from_seconds(12.0)).unwrap();
        assert_eq!(end, TimeUs::from_seconds(10.0));
    }

    // -----------------------------------------------------------------------
    // split
    // -----------------------------------------------------------------------

    #[test]
    fn split_parts_reconstruct_original_span() {
        let (mut tl, _, clip_id) = timeline_with_clip(1.0, 5.0);
        let (left_id, right_id) = tl.split_clip(clip_id, TimeUs::from_seconds(3.0)).unwrap();

        assert_eq!(left_id, clip_id);
        assert_ne!(right_id, clip_id);

        let left = &tl.layers[0].clips[0];
        let right = &tl.layers[0].clips[1];
        assert_eq!(left.start_us, TimeUs::from_seconds(1.0));
        assert_eq!(left.end_us(), TimeUs::from_seconds(3.0));
        assert_eq!(right.start_us, TimeUs::from_seconds(3.0));
        assert_eq!(right.end_us(), TimeUs::from_seconds(6.0));
        assert_eq!(
            left.duration_us + right.duration_us,
            TimeUs::from_seconds(5.0)
        );
    }

    #[test]
    fn split_advances_right_source_offset() {
        let (mut tl, _, clip_id) = timeline_with_clip(1.0, 5.0);
        tl.layers[0].clips[0].source_offset_us = TimeUs::from_seconds(10.0);
        tl.split_clip(clip_id, TimeUs::from_seconds(3.0)).unwrap();

        let right = &tl.layers[0].clips[1];
        assert_eq!(right.source_offset_us, TimeUs::from_seconds(12.0));
    }

    #[test]
    fn split_too_close_to_edge_is_rejected() {
        let (mut tl, _, clip_id) = timeline_with_clip(1.0, 5.0);
        let before = tl.clone();

        assert!(tl.split_clip(clip_id, TimeUs::from_seconds(1.05)).is_err());
        assert!(tl.split_clip(clip_id, TimeUs::from_seconds(5.95)).is_err());
        assert_eq!(tl, before);
    }

    #[test]
    fn split_at_exact_margin_is_allowed() {
        let (mut tl, _, clip_id) = timeline_with_clip(1.0, 5.0);
        assert!(tl.split_clip(clip_id, TimeUs::from_seconds(1.1)).is_ok());
    }

    #[test]
    fn split_voice_clip_renumbers_and_relayouts() {
        let mut tl = Timeline::new();
        let a = Clip::with_span(ClipKind::Voice, TimeUs::ZERO, TimeUs::from_seconds(4.0));
        let b = Clip::with_span(ClipKind::Voice, TimeUs::ZERO, TimeUs::from_seconds(2.0));
        let a_id = a.id;
        tl.insert_voice_clip(None, a);
        tl.insert_voice_clip(None, b);

        // Split first clip at cumulative time 1.5.
        let (_, right_id) = tl.split_clip(a_id, TimeUs::from_seconds(1.5)).unwrap();

        assert_eq!(tl.voice.clips.len(), 3);
        assert_eq!(tl.voice.clips[0].id, a_id);
        assert_eq!(tl.voice.clips[0].duration_us, TimeUs::from_seconds(1.5));
        assert_eq!(tl.voice.clips[1].id, right_id);
        assert_eq!(tl.voice.clips[1].start_us, TimeUs::from_seconds(1.5));
        assert_eq!(tl.voice.clips[1].duration_us, TimeUs::from_seconds(2.5));
        assert_eq!(tl.voice.clips[1].source_offset_us, TimeUs::from_seconds(1.5));
        // Follower pushed to the new cumulative position.
        assert_eq!(tl.voice.clips[2].start_us, TimeUs::from_seconds(4.0));
    }

    // -----------------------------------------------------------------------
    // duplicate / attributes
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_places_copy_after_original() {
        let (mut tl, _, clip_id) = timeline_with_clip(0.0, 4.0);
        let copy_id = tl.duplicate_clip(clip_id).unwrap();
        assert_ne!(copy_id, clip_id);

        let copy = tl.find_clip(copy_id).unwrap();
        assert_eq!(copy.start_us, TimeUs::from_seconds(4.0));
    }

    #[test]
    fn set_volume_clamps_range() {
        let (mut tl, _, clip_id) = timeline_with_clip(0.0, 4.0);
        tl.set_clip_volume(clip_id, 1.7).unwrap();
        assert!((tl.find_clip(clip_id).unwrap().volume - 1.0).abs() < f64::EPSILON);
        tl.set_clip_volume(clip_id, -0.3).unwrap();
        assert!(tl.find_clip(clip_id).unwrap().volume.abs() < f64::EPSILON);
    }

    #[test]
    fn set_playback_rate_recaps_duration() {
        let (mut tl, _, clip_id) = timeline_with_clip(0.0, 8.0);
        tl.update_clip(clip_id, |c| {
            c.source_duration_us = Some(TimeUs::from_seconds(8.0))
        })
        .unwrap();

        tl.set_clip_playback_rate(clip_id, 2.0).unwrap();
        let clip = tl.find_clip(clip_id).unwrap();
        assert_eq!(clip.duration_us, TimeUs::from_seconds(4.0));
    }

    #[test]
    fn set_playback_rate_rejects_nonpositive() {
        let (mut tl, _, clip_id) = timeline_with_clip(0.0, 4.0);
        assert!(tl.set_clip_playback_rate(clip_id, 0.0).is_err());
    }
}
