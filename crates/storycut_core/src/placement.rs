use crate::types::*;
use uuid::Uuid;

/// Check if two half-open spans `[a_start, a_end)` and `[b_start, b_end)`
/// intersect.
pub fn spans_overlap(a_start: TimeUs, a_end: TimeUs, b_start: TimeUs, b_end: TimeUs) -> bool {
    a_start < b_end && b_start < a_end
}

/// Resolve a drop position against the sibling clips already on the track.
///
/// The first sibling whose span intersects the desired span decides the
/// outcome: the new clip is pushed to whichever side is nearer, comparing
/// span midpoints. Only the first conflict is resolved; drop targets are
/// sparse enough that a secondary overlap is not chased.
pub fn resolve_drop(desired_start: TimeUs, duration: TimeUs, siblings: &[Clip]) -> TimeUs {
    let desired_end = desired_start + duration;

    for sibling in siblings {
        if !spans_overlap(desired_start, desired_end, sibling.start_us, sibling.end_us()) {
            continue;
        }

        let desired_mid = desired_start + duration / 2;
        let sibling_mid = sibling.start_us + sibling.duration_us / 2;

        return if desired_mid < sibling_mid {
            TimeUs((sibling.start_us - duration).0.max(0))
        } else {
            sibling.end_us()
        };
    }

    desired_start
}

/// Check whether moving a clip to `new_start` would collide with any
/// sibling. Moves are all-or-nothing: the caller rejects on `true`.
pub fn move_conflicts(
    clip_id: Uuid,
    new_start: TimeUs,
    duration: TimeUs,
    siblings: &[Clip],
) -> bool {
    let new_end = new_start + duration;
    siblings
        .iter()
        .filter(|c| c.id != clip_id)
        .any(|c| spans_overlap(new_start, new_end, c.start_us, c.end_us()))
}

/// Clamp a proposed new start edge for a resize. The end edge stays fixed.
///
/// The start may not cross the nearest sibling edge to the left, may not
/// shrink the clip below the minimum duration, and may not grow it past
/// what the source can supply at the clip's playback rate.
pub fn clamp_resize_start(clip: &Clip, proposed_start: TimeUs, siblings: &[Clip]) -> TimeUs {
    let end = clip.end_us();

    let left_bound = siblings
        .iter()
        .filter(|c| c.id != clip.id && c.end_us() <= clip.start_us)
        .map(|c| c.end_us())
        .max()
        .unwrap_or(TimeUs::ZERO);

    let mut start = proposed_start.max(left_bound).max(TimeUs::ZERO);

    // Duration floor: start can go no later than end - min.
    start = start.min(end - MIN_CLIP_DURATION_US);

    // Source cap: start can go no earlier than end - max playable duration.
    if let Some(max_dur) = clip.max_duration_us() {
        start = start.max(end - max_dur);
    }

    start.max(left_bound).max(TimeUs::ZERO)
}

/// Clamp a proposed new end edge for a resize. The start edge stays fixed.
pub fn clamp_resize_end(clip: &Clip, proposed_end: TimeUs, siblings: &[Clip]) -> TimeUs {
    let start = clip.start_us;

    let right_bound = siblings
        .iter()
        .filter(|c| c.id != clip.id && c.start_us >= clip.end_us())
        .map(|c| c.start_us)
        .min();

    let mut end = proposed_end;
    if let Some(bound) = right_bound {
        end = end.min(bound);
    }

    end = end.max(start + MIN_CLIP_DURATION_US);

    if let Some(max_dur) = clip.max_duration_us() {
        end = end.min(start + max_dur);
    }

    end
}
