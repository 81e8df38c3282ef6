use crate::types::*;
use uuid::Uuid;

/// Resolved snap decision. `time_us` is the value the caller must commit;
/// `snapped` drives the alignment guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapResult {
    pub time_us: TimeUs,
    pub snapped: bool,
}

/// Which track surface a drag is happening on. Each surface has its own
/// set of alignment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapSurface {
    /// Sequential narration track: no absolute positioning, no snapping.
    Voice,
    /// Music track: other music clip edges plus the playhead.
    Music,
    /// Visual layers: all visual and text clip edges plus the playhead.
    Visual,
}

/// Convert a pixel threshold to a time threshold at the current zoom.
pub fn pixel_threshold_us(threshold_px: f64, pixels_per_second: f64) -> TimeUs {
    if pixels_per_second <= 0.0 {
        return TimeUs::ZERO;
    }
    TimeUs::from_seconds(threshold_px / pixels_per_second)
}

/// Find the nearest snap point within the threshold. Returns the original
/// position with `snapped = false` when nothing is close enough.
pub fn find_snap_point(
    position_us: TimeUs,
    snap_points: &[TimeUs],
    threshold_us: TimeUs,
) -> SnapResult {
    let mut best = position_us;
    let mut best_dist = threshold_us.0 + 1; // start beyond threshold

    for &point in snap_points {
        let dist = (position_us.0 - point.0).abs();
        if dist < best_dist {
            best = point;
            best_dist = dist;
        }
    }

    if best_dist <= threshold_us.0 {
        SnapResult {
            time_us: best,
            snapped: true,
        }
    } else {
        SnapResult {
            time_us: position_us,
            snapped: false,
        }
    }
}

/// Collect the snap targets for a drag on the given surface: the relevant
/// clip edges (excluding the dragged clip) plus the playhead.
pub fn collect_snap_points(
    timeline: &Timeline,
    surface: SnapSurface,
    exclude_clip_id: Option<Uuid>,
    playhead_us: TimeUs,
) -> Vec<TimeUs> {
    let mut points = Vec::new();

    match surface {
        SnapSurface::Voice => return points,
        SnapSurface::Music => {
            for clip in &timeline.music.clips {
                if Some(clip.id) == exclude_clip_id {
                    continue;
                }
                points.push(clip.start_us);
                points.push(clip.end_us());
            }
        }
        SnapSurface::Visual => {
            for layer in &timeline.layers {
                for clip in &layer.clips {
                    if Some(clip.id) == exclude_clip_id {
                        continue;
                    }
                    points.push(clip.start_us);
                    points.push(clip.end_us());
                }
            }
        }
    }

    points.push(playhead_us);
    points.sort();
    points.dedup();
    points
}
