//! Driving the terminal emulator from a cast's events and grouping the
//! resulting output into timed, screenshot-bearing frames.

use crate::cast::{CastEvent, CastHeader, EventKind};
use crate::error::Result;
use crate::{SparseBuffer, Term, VoidPtyWriter};

/// Tunables for [`sample_frames`]. Mirrors the three knobs the original
/// renderer exposes on its frame grouping pass.
#[derive(Debug, Clone, Copy)]
pub struct FrameSamplerOptions {
    /// Minimum duration a frame may have, in milliseconds. Gaps shorter than
    /// this are coalesced into the frame being built. Floored to 1.
    pub min_frame_dur_ms: u64,
    /// Maximum duration a single frame may have, in milliseconds. Longer
    /// gaps are clamped and the excess is tracked as dropped time. `None`
    /// falls back to the header's `idle_time_limit`, if present.
    pub max_frame_dur_ms: Option<u64>,
    /// Duration appended to the final frame so a looping animation pauses
    /// visibly before it repeats.
    pub last_frame_dur_ms: u64,
}

impl Default for FrameSamplerOptions {
    fn default() -> Self {
        FrameSamplerOptions {
            min_frame_dur_ms: 1,
            max_frame_dur_ms: None,
            last_frame_dur_ms: 1000,
        }
    }
}

/// A single emitted frame: a relative start time, a duration and the
/// terminal screenshot that should be visible for that span.
#[derive(Debug, Clone)]
pub struct TimedFrame {
    pub start_ms: u64,
    pub duration_ms: u64,
    pub buffer: SparseBuffer,
}

/// Replays `events` through a fresh emulator sized to the cast's header
/// geometry, grouping output bytes into [`TimedFrame`]s per the policy
/// described above. Returns the `(columns, rows)` geometry alongside the
/// frames.
pub fn sample_frames(
    events: Vec<CastEvent>,
    header: &CastHeader,
    options: FrameSamplerOptions,
) -> Result<(u32, u32, Vec<TimedFrame>)> {
    let columns = header.width;
    let rows = header.height;
    let min_frame_dur_ms = options.min_frame_dur_ms.max(1);
    let max_frame_dur_ms = options.max_frame_dur_ms.or_else(|| {
        header
            .idle_time_limit
            .map(|limit| (limit * 1000.0).round() as u64)
    });

    let mut term = Term::new(rows as u16, columns as u16, VoidPtyWriter);

    let mut frames = Vec::new();
    let mut current_time_s = 0.0f64;
    let mut current_bytes = String::new();
    let mut dropped_time = 0.0f64;

    let mut emit = |term: &mut Term<VoidPtyWriter>,
                    frames: &mut Vec<TimedFrame>,
                    current_time_s: f64,
                    duration_s: f64,
                    payload: &str| {
        for byte in payload.bytes() {
            term.process(byte);
        }
        frames.push(TimedFrame {
            start_ms: (current_time_s * 1000.0).round() as u64,
            duration_ms: (duration_s * 1000.0).round() as u64,
            buffer: term.snapshot(columns as u16, rows as u16),
        });
    };

    for event in events {
        if event.kind != EventKind::Output {
            continue;
        }

        let gap = event.time - (current_time_s + dropped_time);
        if gap * 1000.0 < min_frame_dur_ms as f64 {
            current_bytes.push_str(&event.payload);
            continue;
        }

        let mut gap = gap;
        if let Some(max_ms) = max_frame_dur_ms {
            let max_s = max_ms as f64 / 1000.0;
            if gap > max_s {
                dropped_time += gap - max_s;
                gap = max_s;
            }
        }

        emit(&mut term, &mut frames, current_time_s, gap, &current_bytes);
        current_time_s += gap;
        current_bytes.clear();
        current_bytes.push_str(&event.payload);
    }

    let last_duration_s = options.last_frame_dur_ms as f64 / 1000.0;
    emit(
        &mut term,
        &mut frames,
        current_time_s,
        last_duration_s,
        &current_bytes,
    );

    Ok((columns, rows, frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> CastHeader {
        CastHeader::new(10, 2)
    }

    fn event(time: f64, payload: &str) -> CastEvent {
        CastEvent {
            time,
            kind: EventKind::Output,
            payload: payload.to_owned(),
        }
    }

    #[test]
    fn small_gaps_below_min_coalesce_into_one_padding_frame() {
        // Mirrors the corrected version of the "rapid typing" scenario:
        // two 10ms/20ms gaps, both below a 50ms minimum, never split.
        let events = vec![event(0.0, "a"), event(0.01, "b"), event(0.03, "c")];
        let options = FrameSamplerOptions {
            min_frame_dur_ms: 50,
            max_frame_dur_ms: None,
            last_frame_dur_ms: 1000,
        };
        let (_, _, frames) = sample_frames(events, &header(), options).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].start_ms, 0);
        assert_eq!(frames[0].duration_ms, 1000);
    }

    #[test]
    fn gaps_above_min_split_into_separate_frames() {
        let events = vec![event(0.0, "a"), event(0.1, "b"), event(0.3, "c")];
        let options = FrameSamplerOptions {
            min_frame_dur_ms: 50,
            max_frame_dur_ms: None,
            last_frame_dur_ms: 500,
        };
        let (_, _, frames) = sample_frames(events, &header(), options).unwrap();
        // "a" then gap of 100ms -> frame 0; "b" then gap of 200ms -> frame 1;
        // trailing "c" -> final padding frame.
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].duration_ms, 100);
        assert_eq!(frames[1].duration_ms, 200);
        assert_eq!(frames[2].duration_ms, 500);
    }

    #[test]
    fn excess_gap_time_is_dropped_and_later_gaps_measure_from_it() {
        let events = vec![event(0.0, "a"), event(1.0, "b"), event(1.05, "c")];
        let options = FrameSamplerOptions {
            min_frame_dur_ms: 200,
            max_frame_dur_ms: Some(100),
            last_frame_dur_ms: 100,
        };
        let (_, _, frames) = sample_frames(events, &header(), options).unwrap();
        // First gap (1.0s) clamps to 100ms, dropping 0.9s. The next gap,
        // measured from current_time + dropped_time (1.05 - 1.0 = 50ms),
        // is below the 200ms minimum and coalesces into the final frame.
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].duration_ms, 100);
        assert_eq!(frames[1].duration_ms, 100);
    }

    #[test]
    fn idle_time_limit_supplies_default_max_duration() {
        let mut header = header();
        header.idle_time_limit = Some(0.05);
        let events = vec![event(0.0, "a"), event(1.0, "b")];
        let options = FrameSamplerOptions {
            min_frame_dur_ms: 1,
            max_frame_dur_ms: None,
            last_frame_dur_ms: 100,
        };
        let (_, _, frames) = sample_frames(events, &header, options).unwrap();
        assert_eq!(frames[0].duration_ms, 50);
    }

    #[test]
    fn input_events_are_ignored() {
        let events = vec![
            CastEvent {
                time: 0.0,
                kind: EventKind::Input,
                payload: "x".to_owned(),
            },
            event(0.2, "a"),
        ];
        let options = FrameSamplerOptions {
            min_frame_dur_ms: 1,
            max_frame_dur_ms: None,
            last_frame_dur_ms: 10,
        };
        let (_, _, frames) = sample_frames(events, &header(), options).unwrap();
        // The input event contributes no gap and no payload: the first
        // frame is an empty screen spanning up to "a"'s timestamp, and the
        // trailing padding frame is the only one containing "a".
        assert_eq!(frames.len(), 2);
        let text: String = frames[1]
            .buffer
            .values()
            .flat_map(|row| row.values())
            .map(|c| c.text)
            .collect();
        assert_eq!(text, "a");
    }
}
