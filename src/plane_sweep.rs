/// Per-query unique anchor classification.
///
/// A plane sweep over interval endpoints finds the spans of the query axis
/// covered by exactly one alignment ("unique segments"). An alignment is kept
/// when the unique segments fully contained in it add up to the required
/// length, or, optionally, when a single unique segment matches it exactly.

/// A query-side interval, normalized so `begin <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryInterval {
    pub begin: u64,
    pub end: u64,
}

impl QueryInterval {
    /// Build from raw record coordinates, which may be strand-swapped.
    pub fn from_raw(query_start: u64, query_end: u64) -> Self {
        QueryInterval {
            begin: query_start.min(query_end),
            end: query_start.max(query_end),
        }
    }

    pub fn width(&self) -> u64 {
        self.end - self.begin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Start,
    Stop,
}

struct Event {
    position: u64,
    kind: EventKind,
}

/// Maximal spans covered by exactly one interval, as parallel left/right
/// endpoint vectors in position order. Segments never overlap; zero-width
/// segments appear when endpoints coincide.
///
/// Events are stable-sorted on position only, so events at equal positions
/// keep insertion order (per interval: start before stop, intervals in
/// ordinal order). The tie order decides whether a touching start/stop pair
/// counts as overlapping.
fn unique_segments(intervals: &[QueryInterval]) -> (Vec<u64>, Vec<u64>) {
    let mut events = Vec::with_capacity(intervals.len() * 2);
    for interval in intervals {
        events.push(Event {
            position: interval.begin,
            kind: EventKind::Start,
        });
        events.push(Event {
            position: interval.end,
            kind: EventKind::Stop,
        });
    }
    events.sort_by_key(|event| event.position);

    let mut coverage: i64 = 0;
    let mut last_position: u64 = 0;
    let mut lefts = Vec::new();
    let mut rights = Vec::new();
    for event in &events {
        if coverage == 1 {
            lefts.push(last_position);
            rights.push(event.position);
        }
        match event.kind {
            EventKind::Start => coverage += 1,
            EventKind::Stop => coverage -= 1,
        }
        last_position = event.position;
    }
    (lefts, rights)
}

/// Iterative lower bound: index of the first element `>= value`, i.e. the
/// insertion point when `value` is absent.
fn lower_bound(values: &[u64], value: u64) -> usize {
    let mut left = 0usize;
    let mut right = values.len();
    while left < right {
        let mid = (left + right) / 2;
        if values[mid] < value {
            left = mid + 1;
        } else {
            right = mid;
        }
    }
    left
}

/// Total width of the unique segments fully contained in `interval`, plus
/// whether the first segment at or after `interval.begin` matches it exactly.
///
/// An insertion point past the last segment (including an empty segment list)
/// yields zero coverage and no exact match rather than an out-of-range
/// access.
fn unique_coverage(interval: &QueryInterval, lefts: &[u64], rights: &[u64]) -> (u64, bool) {
    let mut index = lower_bound(lefts, interval.begin);
    let exact_match =
        index < lefts.len() && lefts[index] == interval.begin && rights[index] == interval.end;
    let mut total = 0u64;
    while index < lefts.len() && lefts[index] >= interval.begin && rights[index] <= interval.end {
        total += rights[index] - lefts[index];
        index += 1;
    }
    (total, exact_match)
}

/// Classify one query's intervals, returning the ordinals to keep in
/// ascending order.
///
/// A lone interval skips the sweep: it is kept when `keep_small_uniques` is
/// set or its width meets the threshold.
pub fn summarize_plane_sweep(
    intervals: &[QueryInterval],
    unique_length_required: u64,
    keep_small_uniques: bool,
) -> Vec<usize> {
    if intervals.is_empty() {
        return Vec::new();
    }
    if intervals.len() == 1 {
        if keep_small_uniques || intervals[0].width() >= unique_length_required {
            return vec![0];
        }
        return Vec::new();
    }

    let (lefts, rights) = unique_segments(intervals);

    let mut kept = Vec::new();
    for (ordinal, interval) in intervals.iter().enumerate() {
        let (covered, exact_match) = unique_coverage(interval, &lefts, &rights);
        if covered >= unique_length_required || (keep_small_uniques && exact_match) {
            kept.push(ordinal);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(begin: u64, end: u64) -> QueryInterval {
        QueryInterval::from_raw(begin, end)
    }

    #[test]
    fn lower_bound_insertion_points() {
        let values = [10, 20, 20, 30];
        assert_eq!(lower_bound(&values, 5), 0);
        assert_eq!(lower_bound(&values, 10), 0);
        assert_eq!(lower_bound(&values, 20), 1);
        assert_eq!(lower_bound(&values, 25), 3);
        assert_eq!(lower_bound(&values, 31), 4);
        assert_eq!(lower_bound(&[], 7), 0);
    }

    #[test]
    fn from_raw_normalizes_swapped_coordinates() {
        assert_eq!(interval(500, 100), interval(100, 500));
        assert_eq!(interval(500, 100).width(), 400);
    }

    #[test]
    fn segments_of_overlapping_pair() {
        let (lefts, rights) = unique_segments(&[interval(0, 100), interval(50, 150)]);
        assert_eq!(lefts, vec![0, 100]);
        assert_eq!(rights, vec![50, 150]);
    }

    #[test]
    fn segments_never_overlap_and_stay_within_input() {
        let intervals = [
            interval(0, 100),
            interval(50, 150),
            interval(140, 400),
            interval(350, 360),
        ];
        let (lefts, rights) = unique_segments(&intervals);
        let total_input: u64 = intervals.iter().map(|iv| iv.width()).sum();
        let mut total_unique = 0;
        for pair in 0..lefts.len() {
            assert!(lefts[pair] <= rights[pair]);
            if pair > 0 {
                assert!(
                    lefts[pair] >= rights[pair - 1],
                    "segments must not overlap: {lefts:?} {rights:?}"
                );
            }
            total_unique += rights[pair] - lefts[pair];
        }
        assert!(total_unique <= total_input);
    }

    /// No position covered exactly once: the decision must fall back to zero
    /// coverage instead of faulting on the empty segment list.
    #[test]
    fn degenerate_empty_segment_list_is_zero_coverage() {
        let target = interval(10, 2000);
        let (covered, exact_match) = unique_coverage(&target, &[], &[]);
        assert_eq!(covered, 0);
        assert!(!exact_match);
    }

    #[test]
    fn insertion_point_past_last_segment_is_zero_coverage() {
        let target = interval(500, 600);
        let (covered, exact_match) = unique_coverage(&target, &[0, 100], &[50, 150]);
        assert_eq!(covered, 0);
        assert!(!exact_match);
    }

    #[test]
    fn identical_intervals_share_no_unique_length() {
        let kept = summarize_plane_sweep(&[interval(10, 2000), interval(10, 2000)], 100, true);
        assert!(kept.is_empty(), "fully repetitive pair must be dropped");
    }

    #[test]
    fn zero_threshold_keeps_everything() {
        let kept = summarize_plane_sweep(&[interval(10, 2000), interval(10, 2000)], 0, false);
        assert_eq!(kept, vec![0, 1]);
    }
}
