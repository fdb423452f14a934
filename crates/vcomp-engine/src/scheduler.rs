//! Segment Scheduler.
//!
//! Assigns every segment a slice of the audio timeline so that the slices
//! are contiguous, non-overlapping and cover exactly `[0, audio_duration]`.

use std::path::Path;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use vcomp_models::VideoSegment;

/// Shortest slice handed to a segment while time allows.
pub const MIN_SEGMENT_DURATION: f64 = 2.0;

const EPSILON: f64 = 1e-9;

/// A scheduled timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// Placed segments, in timeline order
    pub segments: Vec<VideoSegment>,
    /// Valid segments left out because the audio was already covered
    pub dropped: usize,
}

impl Schedule {
    /// Sum of the assigned durations.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }
}

/// Drop segments that cannot be scheduled: invalid declared durations or
/// files that do not exist.
pub fn filter_segments(segments: Vec<VideoSegment>) -> Vec<VideoSegment> {
    retain_schedulable(segments, |path| path.exists())
}

fn retain_schedulable<F>(segments: Vec<VideoSegment>, exists: F) -> Vec<VideoSegment>
where
    F: Fn(&Path) -> bool,
{
    segments
        .into_iter()
        .filter(|segment| {
            if !segment.has_valid_duration() {
                warn!(
                    path = %segment.path.display(),
                    duration = segment.duration,
                    "Skipping segment with invalid duration"
                );
                return false;
            }
            if !exists(&segment.path) {
                warn!(path = %segment.path.display(), "Skipping missing segment file");
                return false;
            }
            true
        })
        .collect()
}

/// Distributes audio time across segments.
#[derive(Debug, Clone, Copy)]
pub struct SegmentScheduler {
    min_segment_duration: f64,
}

impl Default for SegmentScheduler {
    fn default() -> Self {
        Self {
            min_segment_duration: MIN_SEGMENT_DURATION,
        }
    }
}

impl SegmentScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_segment_duration(mut self, seconds: f64) -> Self {
        self.min_segment_duration = seconds.max(0.0);
        self
    }

    /// Schedule `segments` against an audio track of `audio_duration` seconds.
    ///
    /// Each segment gets `min(preferred, max(remaining / left, MIN))`, capped
    /// at the remaining time. A segment with sync points may move its start
    /// to the point nearest the cursor when the previous segment keeps at
    /// least the minimum length. The last placed segment absorbs the tail.
    pub fn schedule(
        &self,
        audio_duration: f64,
        segments: Vec<VideoSegment>,
    ) -> EngineResult<Schedule> {
        if !audio_duration.is_finite() || audio_duration <= 0.0 {
            return Err(EngineError::invalid_input(format!(
                "audio duration must be positive, got {audio_duration}"
            )));
        }

        let valid: Vec<VideoSegment> = segments
            .into_iter()
            .filter(VideoSegment::has_valid_duration)
            .collect();
        if valid.is_empty() {
            return Err(EngineError::NoValidSegments);
        }

        let count = valid.len();
        let mut placed: Vec<VideoSegment> = Vec::with_capacity(count);
        let mut cursor = 0.0;
        let mut dropped = 0;

        for (index, mut segment) in valid.into_iter().enumerate() {
            if audio_duration - cursor <= EPSILON {
                dropped = count - index;
                debug!(dropped, "Audio covered, dropping remaining segments");
                break;
            }

            if let Some(previous) = placed.last_mut() {
                if let Some(snap) = self.snap_point(&segment, previous, cursor, audio_duration) {
                    debug!(
                        path = %segment.path.display(),
                        from = cursor,
                        to = snap,
                        "Snapping segment start to sync point"
                    );
                    let start = previous.start_time;
                    previous.place(start, snap - start);
                    cursor = snap;
                }
            }

            let remaining = audio_duration - cursor;
            let left = (count - index) as f64;
            let ideal = remaining / left;
            let assigned = segment
                .duration
                .min(ideal.max(self.min_segment_duration))
                .min(remaining);

            segment.place(cursor, assigned);
            cursor += assigned;
            placed.push(segment);
        }

        if let Some(last) = placed.last_mut() {
            let start = last.start_time;
            last.place(start, audio_duration - start);
            last.end_time = audio_duration;
        }

        Ok(Schedule {
            segments: placed,
            dropped,
        })
    }

    /// Sync point the boundary with `previous` should move to, if any.
    fn snap_point(
        &self,
        segment: &VideoSegment,
        previous: &VideoSegment,
        cursor: f64,
        audio_duration: f64,
    ) -> Option<f64> {
        let nearest = segment
            .sync_points
            .iter()
            .copied()
            .filter(|p| p.is_finite())
            .min_by(|a, b| (a - cursor).abs().total_cmp(&(b - cursor).abs()))?;

        let keeps_previous = nearest - previous.start_time >= self.min_segment_duration;
        let leaves_time = audio_duration - nearest > EPSILON;
        (keeps_previous && leaves_time).then_some(nearest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn segments(durations: &[f64]) -> Vec<VideoSegment> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| VideoSegment::new(format!("clip{i}.mp4"), *d))
            .collect()
    }

    fn assert_contiguous(schedule: &Schedule, audio: f64) {
        let mut cursor = 0.0;
        for segment in &schedule.segments {
            assert!((segment.start_time - cursor).abs() < 1e-9);
            assert!(segment.duration > 0.0);
            assert!((segment.end_time - (segment.start_time + segment.duration)).abs() < 1e-9);
            cursor = segment.end_time;
        }
        assert!((cursor - audio).abs() < 1e-9);
        assert!((schedule.total_duration() - audio).abs() < 1e-9);
    }

    fn durations(schedule: &Schedule) -> Vec<f64> {
        schedule.segments.iter().map(|s| s.duration).collect()
    }

    #[test]
    fn test_covers_audio_exactly() {
        let scheduler = SegmentScheduler::new();
        for (audio, prefs) in [
            (60.0, vec![10.0, 50.0, 10.0]),
            (30.0, vec![5.0, 5.0]),
            (7.3, vec![20.0]),
            (45.5, vec![3.0, 8.0, 12.0, 1.0, 30.0]),
            (3.0, vec![5.0, 5.0, 5.0]),
        ] {
            let schedule = scheduler.schedule(audio, segments(&prefs)).unwrap();
            assert_contiguous(&schedule, audio);
        }
    }

    #[test]
    fn test_preferred_durations_with_tail_absorption() {
        let schedule = SegmentScheduler::new()
            .schedule(60.0, segments(&[10.0, 50.0, 10.0]))
            .unwrap();
        // Middle is capped at ideal 50/2; last absorbs the tail
        assert_eq!(durations(&schedule), vec![10.0, 25.0, 25.0]);
        assert_eq!(schedule.segments[0].duration, 10.0);
    }

    #[test]
    fn test_short_segments_stretch_last() {
        let schedule = SegmentScheduler::new()
            .schedule(60.0, segments(&[5.0, 5.0]))
            .unwrap();
        assert_eq!(durations(&schedule), vec![5.0, 55.0]);
    }

    #[test]
    fn test_drops_segments_after_audio_is_covered() {
        let schedule = SegmentScheduler::new()
            .schedule(3.0, segments(&[5.0, 5.0, 5.0]))
            .unwrap();
        assert_eq!(durations(&schedule), vec![2.0, 1.0]);
        assert_eq!(schedule.dropped, 1);
    }

    #[test]
    fn test_invalid_segments_are_skipped() {
        let schedule = SegmentScheduler::new()
            .schedule(10.0, segments(&[f64::NAN, -1.0, 0.0, 4.0]))
            .unwrap();
        assert_eq!(schedule.segments.len(), 1);
        assert_eq!(schedule.segments[0].path, Path::new("clip3.mp4"));
        assert_eq!(schedule.segments[0].duration, 10.0);
    }

    #[test]
    fn test_no_valid_segments() {
        let err = SegmentScheduler::new()
            .schedule(10.0, segments(&[0.0, f64::INFINITY]))
            .unwrap_err();
        assert!(matches!(err, EngineError::NoValidSegments));

        let err = SegmentScheduler::new().schedule(10.0, Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::NoValidSegments));
    }

    #[test]
    fn test_rejects_bad_audio_duration() {
        let err = SegmentScheduler::new()
            .schedule(0.0, segments(&[5.0]))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_sync_point_moves_boundary() {
        let mut input = segments(&[10.0, 10.0, 10.0]);
        input[1].sync_points = vec![2.5, 12.0, 40.0];

        let schedule = SegmentScheduler::new().schedule(30.0, input).unwrap();
        assert_contiguous(&schedule, 30.0);
        // Cursor was 10.0; nearest sync point 12.0 extends the first segment
        assert_eq!(schedule.segments[0].duration, 12.0);
        assert_eq!(schedule.segments[1].start_time, 12.0);
    }

    #[test]
    fn test_sync_point_ignored_when_previous_too_short() {
        let mut input = segments(&[10.0, 10.0]);
        input[1].sync_points = vec![1.0];

        let schedule = SegmentScheduler::new().schedule(20.0, input).unwrap();
        assert_eq!(schedule.segments[1].start_time, 10.0);
    }

    #[test]
    fn test_sync_point_ignored_at_audio_end() {
        let mut input = segments(&[10.0, 10.0]);
        input[1].sync_points = vec![20.0];

        let schedule = SegmentScheduler::new().schedule(20.0, input).unwrap();
        assert_eq!(schedule.segments[1].start_time, 10.0);
        assert_contiguous(&schedule, 20.0);
    }

    #[test]
    fn test_filter_segments_checks_files() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("a.mp4");
        std::fs::write(&present, b"").unwrap();

        let kept = filter_segments(vec![
            VideoSegment::new(&present, 5.0),
            VideoSegment::new(dir.path().join("missing.mp4"), 5.0),
            VideoSegment::new(&present, -2.0),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].path, present);
    }
}
