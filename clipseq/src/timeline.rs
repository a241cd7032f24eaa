//! Clip timeline normalisation: pins the timeline to the media bounds, drops
//! records that cannot be placed and fills holes with gap clips.

use thiserror::Error;

use crate::clips::{ClipList, ClipRecord, MAX_IMPORTANCE};
use crate::error::{Result, SeqError};
use crate::rate::RateInfo;
use crate::time::{self, Seconds, TimeValue};

/// Name given to synthesised gap records.
pub const GAP_NAME: &str = "Gap";

/// Why a record was left out of the timeline.
#[derive(Error, Debug)]
pub enum DropReason {
    #[error("missing start or end time")]
    MissingTime,

    #[error(transparent)]
    Invalid(#[from] SeqError),

    #[error("end is not after start")]
    Empty,
}

/// A record dropped during normalisation.
#[derive(Debug)]
pub struct TimelineIssue {
    /// 1-based position in the input list.
    pub position: usize,
    pub name: String,
    pub reason: DropReason,
}

/// Ordered, gap-filled clip list covering `[0, duration]`.
#[derive(Debug, Default)]
pub struct NormalizedTimeline {
    pub clips: Vec<ClipRecord>,
    pub issues: Vec<TimelineIssue>,
}

impl NormalizedTimeline {
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn gap_count(&self) -> usize {
        self.clips
            .iter()
            .filter(|c| c.name.as_deref() == Some(GAP_NAME))
            .count()
    }

    pub fn to_clip_list(&self) -> ClipList {
        ClipList {
            clips: self.clips.clone(),
        }
    }
}

/// Normalise `list` against the true media duration.
///
/// The duration must be positive; zero or negative durations fail with
/// [`SeqError::EmptyMedia`] attributed to `source`.
pub fn normalize(
    list: &ClipList,
    duration: &Seconds,
    rate: RateInfo,
    source: &std::path::Path,
) -> Result<NormalizedTimeline> {
    if *duration <= Seconds::from_integer(0) {
        return Err(SeqError::EmptyMedia {
            path: source.to_path_buf(),
        });
    }

    let clock = time::seconds_to_clock_string(duration);
    let limit_frames = time::seconds_to_frames(&duration.ceil(), rate.timebase).ok_or_else(|| {
        SeqError::DurationOutOfRange {
            path: source.to_path_buf(),
            duration: duration.to_string(),
        }
    })?;
    let media_end = time::parse_flexible_time(&TimeValue::text(clock.as_str()), rate)?;

    let mut records = list.clips.clone();
    if let Some(first) = records.first_mut() {
        if !first.start_time.as_ref().is_some_and(|t| t.is_text("00:00")) {
            first.start_time = Some(TimeValue::text("00:00"));
        }
    }
    // An early last end is covered by a trailing gap instead.
    if let Some(last) = records.last_mut() {
        let fits = last
            .end_time
            .as_ref()
            .and_then(|t| time::parse_flexible_time(t, rate).ok())
            .is_some_and(|end| end <= media_end);
        if !fits {
            last.end_time = Some(TimeValue::text(clock.as_str()));
        }
    }

    let mut timeline = NormalizedTimeline::default();
    let mut placed: Vec<(ClipRecord, i64, i64)> = Vec::with_capacity(records.len());

    for (idx, record) in records.into_iter().enumerate() {
        let position = idx + 1;
        match place(&record, rate, limit_frames, &clock) {
            Ok((start, end)) => {
                let importance = record.track_level() as i64;
                placed.push((
                    ClipRecord {
                        importance: Some(importance),
                        ..record
                    },
                    start,
                    end,
                ));
            }
            Err(reason) => {
                let name = record.display_name(position);
                log::warn!("Dropping clip #{} '{}': {}", position, name, reason);
                timeline.issues.push(TimelineIssue {
                    position,
                    name,
                    reason,
                });
            }
        }
    }

    if placed.is_empty() {
        log::debug!("No placeable clips left after normalisation");
        return Ok(timeline);
    }

    let mut covered = 0i64;
    for (record, start, end) in placed {
        if start > covered {
            push_gap(&mut timeline.clips, covered, start, rate);
        }
        timeline.clips.push(record);
        covered = end;
    }
    if covered < media_end {
        push_gap(&mut timeline.clips, covered, media_end, rate);
    }

    log::debug!(
        "Normalised timeline: {} clip(s), {} gap(s), {} dropped",
        timeline.clips.len(),
        timeline.gap_count(),
        timeline.issues.len()
    );
    Ok(timeline)
}

/// Convert a record's bounds to frames and check them against the media.
fn place(
    record: &ClipRecord,
    rate: RateInfo,
    limit_frames: i64,
    clock: &str,
) -> std::result::Result<(i64, i64), DropReason> {
    let (Some(start_value), Some(end_value)) = (&record.start_time, &record.end_time) else {
        return Err(DropReason::MissingTime);
    };
    let start = time::parse_flexible_time(start_value, rate)?;
    let end = time::parse_flexible_time(end_value, rate)?;

    if start < 0 || end > limit_frames {
        return Err(SeqError::ClipOutOfRange {
            name: record.name.clone().unwrap_or_default(),
            start: start_value.to_string(),
            end: end_value.to_string(),
            duration: clock.to_string(),
        }
        .into());
    }
    if end <= start {
        return Err(DropReason::Empty);
    }
    Ok((start, end))
}

fn push_gap(clips: &mut Vec<ClipRecord>, from: i64, to: i64, rate: RateInfo) {
    if from >= to {
        return;
    }
    clips.push(ClipRecord::new(
        gap_bound(from, rate),
        gap_bound(to, rate),
        GAP_NAME,
        MAX_IMPORTANCE as i64,
    ));
}

/// `MM:SS` on whole seconds, `HH:MM:SS:FF` otherwise. Both parse back to
/// exactly `frames`.
fn gap_bound(frames: i64, rate: RateInfo) -> TimeValue {
    let timebase = rate.timebase as i64;
    if timebase > 0 && frames % timebase == 0 {
        let seconds = Seconds::from_integer((frames / timebase) as i128);
        TimeValue::Text(time::seconds_to_clock_string(&seconds))
    } else {
        TimeValue::Text(time::frames_to_timecode(frames, rate.timebase))
    }
}
