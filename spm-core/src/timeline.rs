//! Timeline geometry for the marker editor
//!
//! Markers of one scene are laid out on horizontal lanes so overlapping
//! ranges never share a row. Drag edits are clamped here so the editor can
//! stay a thin layer: moves keep the span inside the scene, resizes keep it
//! at least [`MIN_SPAN_SECONDS`] long.

use serde::{Deserialize, Serialize};
use spm_common::db::PlaylistItem;

use crate::marker::MarkerRecord;

/// Shortest span a resize may produce
pub const MIN_SPAN_SECONDS: f64 = 0.5;

/// Length assumed for point markers with no end time
pub const DEFAULT_SPAN_SECONDS: f64 = 20.0;

pub const LANE_HEIGHT_PX: f64 = 24.0;
pub const LANE_GAP_PX: f64 = 4.0;

/// Time range of one marker, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSpan {
    pub start: f64,
    /// `None` for point markers
    pub end: Option<f64>,
}

impl TimelineSpan {
    pub fn new(start: f64, end: Option<f64>) -> Self {
        Self { start, end }
    }

    /// End used for layout; point markers extend by [`DEFAULT_SPAN_SECONDS`]
    pub fn effective_end(&self) -> f64 {
        match self.end {
            Some(end) if end > self.start => end,
            _ => self.start + DEFAULT_SPAN_SECONDS,
        }
    }

    pub fn length(&self) -> f64 {
        self.effective_end() - self.start
    }
}

impl From<&MarkerRecord> for TimelineSpan {
    fn from(marker: &MarkerRecord) -> Self {
        Self::new(marker.seconds, marker.end_seconds)
    }
}

impl From<&PlaylistItem> for TimelineSpan {
    fn from(item: &PlaylistItem) -> Self {
        Self::new(item.start_time, item.end_time)
    }
}

/// Assign each span a lane so that no two spans in a lane overlap
///
/// Greedy interval partitioning: spans in start order (ties by end, then
/// input position) go to the lowest lane whose last span ended at or before
/// their start. Uses the minimum number of lanes. The result is indexed like
/// the input.
pub fn assign_lanes(spans: &[TimelineSpan]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by(|&a, &b| {
        spans[a]
            .start
            .total_cmp(&spans[b].start)
            .then(spans[a].effective_end().total_cmp(&spans[b].effective_end()))
            .then(a.cmp(&b))
    });

    let mut lane_ends: Vec<f64> = Vec::new();
    let mut lanes = vec![0; spans.len()];

    for index in order {
        let span = &spans[index];
        let lane = match lane_ends.iter().position(|end| *end <= span.start) {
            Some(lane) => lane,
            None => {
                lane_ends.push(f64::NEG_INFINITY);
                lane_ends.len() - 1
            }
        };
        lane_ends[lane] = span.effective_end();
        lanes[index] = lane;
    }

    lanes
}

/// Number of lanes used by an assignment
pub fn lane_count(lanes: &[usize]) -> usize {
    lanes.iter().max().map_or(0, |max| max + 1)
}

/// Horizontal zoom of the timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineScale {
    pub px_per_second: f64,
}

impl TimelineScale {
    const MIN_PX_PER_SECOND: f64 = 0.001;

    pub fn new(px_per_second: f64) -> Self {
        let px_per_second = if px_per_second.is_finite() {
            px_per_second.max(Self::MIN_PX_PER_SECOND)
        } else {
            Self::MIN_PX_PER_SECOND
        };
        Self { px_per_second }
    }

    /// Scale showing `duration_seconds` across `width_px`
    pub fn fit(duration_seconds: f64, width_px: f64) -> Self {
        if duration_seconds <= 0.0 {
            return Self::new(width_px);
        }
        Self::new(width_px / duration_seconds)
    }

    pub fn seconds_to_px(&self, seconds: f64) -> f64 {
        seconds * self.px_per_second
    }

    pub fn px_to_seconds(&self, px: f64) -> f64 {
        px / self.px_per_second
    }
}

/// Which end of a span a resize drags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Start,
    End,
}

/// Shift a span by `delta` seconds, keeping it inside `[0, duration]`
///
/// Length is preserved; a span longer than the scene pins to zero.
pub fn clamp_move(span: TimelineSpan, delta: f64, duration: f64) -> TimelineSpan {
    let length = span.length();
    let latest_start = (duration - length).max(0.0);
    let start = (span.start + delta).clamp(0.0, latest_start);
    let shift = start - span.start;

    TimelineSpan {
        start,
        end: span.end.filter(|end| *end > span.start).map(|end| end + shift),
    }
}

/// Drag one edge of a span by `delta` seconds
///
/// The moved edge stays within `[0, duration]` and at least
/// [`MIN_SPAN_SECONDS`] from the other edge. Resizing a point marker gives it
/// an explicit end.
pub fn clamp_resize(span: TimelineSpan, edge: Edge, delta: f64, duration: f64) -> TimelineSpan {
    let end = span.effective_end();

    match edge {
        Edge::Start => {
            let latest = (end - MIN_SPAN_SECONDS).max(0.0);
            TimelineSpan {
                start: (span.start + delta).clamp(0.0, latest),
                end: Some(end),
            }
        }
        Edge::End => {
            let earliest = span.start + MIN_SPAN_SECONDS;
            let latest = duration.max(earliest);
            TimelineSpan {
                start: span.start,
                end: Some((end + delta).clamp(earliest, latest)),
            }
        }
    }
}

/// Axis-aligned rectangle in timeline pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Rectangle spanning two drag corners, in any order
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Overlap test; touching edges do not count
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Pixel rectangle of a span drawn on `lane`
pub fn marker_rect(span: &TimelineSpan, lane: usize, scale: &TimelineScale) -> Rect {
    Rect {
        x: scale.seconds_to_px(span.start),
        y: lane as f64 * (LANE_HEIGHT_PX + LANE_GAP_PX),
        width: scale.seconds_to_px(span.length()),
        height: LANE_HEIGHT_PX,
    }
}

/// Indices of spans whose rectangles intersect `selection`
pub fn select_in_rect(
    spans: &[TimelineSpan],
    lanes: &[usize],
    scale: &TimelineScale,
    selection: &Rect,
) -> Vec<usize> {
    spans
        .iter()
        .zip(lanes)
        .enumerate()
        .filter(|(_, (span, lane))| marker_rect(span, **lane, scale).intersects(selection))
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: f64, end: f64) -> TimelineSpan {
        TimelineSpan::new(start, Some(end))
    }

    #[test]
    fn test_non_overlapping_spans_share_a_lane() {
        let lanes = assign_lanes(&[span(0.0, 10.0), span(10.0, 20.0), span(25.0, 30.0)]);
        assert_eq!(lanes, vec![0, 0, 0]);
    }

    #[test]
    fn test_overlaps_use_minimum_lanes() {
        let spans = [span(0.0, 10.0), span(5.0, 15.0), span(8.0, 12.0), span(12.0, 20.0)];
        let lanes = assign_lanes(&spans);
        assert_eq!(lane_count(&lanes), 3);

        for (i, a) in spans.iter().enumerate() {
            for (j, b) in spans.iter().enumerate().skip(i + 1) {
                if lanes[i] == lanes[j] {
                    assert!(a.effective_end() <= b.start || b.effective_end() <= a.start);
                }
            }
        }
    }

    #[test]
    fn test_lanes_indexed_by_input_order() {
        let lanes = assign_lanes(&[span(5.0, 15.0), span(0.0, 10.0)]);
        assert_eq!(lanes, vec![1, 0]);
    }

    #[test]
    fn test_point_markers_take_default_length() {
        let point = TimelineSpan::new(0.0, None);
        assert_eq!(point.length(), DEFAULT_SPAN_SECONDS);
        let lanes = assign_lanes(&[point, span(DEFAULT_SPAN_SECONDS - 1.0, 40.0)]);
        assert_eq!(lanes, vec![0, 1]);
    }

    #[test]
    fn test_scale_conversions() {
        let scale = TimelineScale::fit(120.0, 600.0);
        assert_eq!(scale.px_per_second, 5.0);
        assert_eq!(scale.seconds_to_px(10.0), 50.0);
        assert_eq!(scale.px_to_seconds(50.0), 10.0);
        assert!(TimelineScale::new(0.0).px_per_second > 0.0);
    }

    #[test]
    fn test_move_clamps_and_preserves_length() {
        let moved = clamp_move(span(10.0, 20.0), 500.0, 100.0);
        assert_eq!(moved, span(90.0, 100.0));

        let moved = clamp_move(span(10.0, 20.0), -50.0, 100.0);
        assert_eq!(moved, span(0.0, 10.0));

        let point = clamp_move(TimelineSpan::new(5.0, None), 3.0, 100.0);
        assert_eq!(point, TimelineSpan::new(8.0, None));
    }

    #[test]
    fn test_resize_respects_minimum_length_and_bounds() {
        let shrunk = clamp_resize(span(10.0, 20.0), Edge::Start, 30.0, 100.0);
        assert_eq!(shrunk, span(20.0 - MIN_SPAN_SECONDS, 20.0));

        let grown = clamp_resize(span(10.0, 20.0), Edge::End, 500.0, 100.0);
        assert_eq!(grown, span(10.0, 100.0));

        let collapsed = clamp_resize(span(10.0, 20.0), Edge::End, -30.0, 100.0);
        assert_eq!(collapsed, span(10.0, 10.0 + MIN_SPAN_SECONDS));

        let widened = clamp_resize(span(10.0, 20.0), Edge::Start, -30.0, 100.0);
        assert_eq!(widened, span(0.0, 20.0));
    }

    #[test]
    fn test_resizing_point_marker_sets_end() {
        let resized = clamp_resize(TimelineSpan::new(0.0, None), Edge::End, 5.0, 100.0);
        assert_eq!(resized.end, Some(DEFAULT_SPAN_SECONDS + 5.0));
    }

    #[test]
    fn test_select_in_rect() {
        let spans = [span(0.0, 10.0), span(5.0, 15.0), span(40.0, 50.0)];
        let lanes = assign_lanes(&spans);
        let scale = TimelineScale::new(10.0);

        // Drag from right to left across the first lane only
        let selection = Rect::from_corners(120.0, 5.0, 0.0, 10.0);
        assert_eq!(select_in_rect(&spans, &lanes, &scale, &selection), vec![0]);

        let both_lanes = Rect::from_corners(60.0, 0.0, 70.0, 40.0);
        assert_eq!(select_in_rect(&spans, &lanes, &scale, &both_lanes), vec![0, 1]);

        let empty = Rect::from_corners(200.0, 0.0, 300.0, 40.0);
        assert!(select_in_rect(&spans, &lanes, &scale, &empty).is_empty());
    }
}
