use anyhow::anyhow;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// An inclusive range of calendar days. For a booking this is
/// `[check_in, check_out]`; for a date filter it is the selected range.
///
/// The ordering invariant (`start <= end`) is enforced at construction so
/// that `overlaps` and `ViewWindow::project` stay total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateInterval {
    pub fn new(start: NaiveDate, end: NaiveDate) -> anyhow::Result<Self> {
        if end < start {
            return Err(anyhow!("interval ends before it starts: {start} > {end}"));
        }
        Ok(Self { start, end })
    }

    /// Degenerate single-day interval. Used for open-ended date filters,
    /// which collapse to `[day, day]`.
    pub fn day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// Constructs from possibly unordered endpoints by swapping them.
    /// Used when reading records whose fields are not checked upstream.
    pub fn normalized(a: NaiveDate, b: NaiveDate) -> Self {
        if b < a {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whole days between start and end. A booking's night count.
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Inclusive-boundary intersection test: two intervals overlap iff
    /// each starts no later than the other ends. A degenerate interval
    /// overlaps anything containing its day.
    pub fn overlaps(&self, other: DateInterval) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

impl std::fmt::Display for DateInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// The visible calendar span: `days` equal-width columns starting at
/// `start`, covering `[start, start + days)` in whole-day units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewWindow {
    start: NaiveDate,
    days: u32,
}

/// Normalized horizontal placement of an interval on the day grid.
/// Fractions of the full window width, so the rendering layer can
/// position bars with percentage arithmetic regardless of column width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub offset_fraction: f64,
    pub width_fraction: f64,
}

impl ViewWindow {
    pub fn new(start: NaiveDate, days: u32) -> anyhow::Result<Self> {
        if days == 0 {
            return Err(anyhow!("view window must span at least one day"));
        }
        Ok(Self { start, days })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    /// First day past the window (exclusive bound).
    pub fn end(&self) -> NaiveDate {
        self.start + Duration::days(i64::from(self.days))
    }

    /// The window's days as an inclusive interval, for overlap queries.
    pub fn as_interval(&self) -> DateInterval {
        DateInterval {
            start: self.start,
            end: self.start + Duration::days(i64::from(self.days) - 1),
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.as_interval().contains(day)
    }

    /// Projects an interval onto the day grid.
    ///
    /// Returns `None` when the interval lies entirely outside the window.
    /// A partially visible interval is clipped to the window, so it still
    /// renders as a partial bar rather than being dropped or mis-sized.
    /// The returned `width_fraction` is strictly positive: a clip that
    /// leaves zero visible days yields `None`.
    pub fn project(&self, interval: DateInterval) -> Option<Layout> {
        let days = i64::from(self.days);
        let start_offset = (interval.start - self.start).num_days();
        let duration = interval.nights();

        if start_offset >= days || start_offset + duration <= 0 {
            return None;
        }

        let visible_start = start_offset.max(0);
        let visible_duration = (days - visible_start).min(duration - (-start_offset).max(0));
        if visible_duration <= 0 {
            return None;
        }

        Some(Layout {
            offset_fraction: visible_start as f64 / days as f64,
            width_fraction: visible_duration as f64 / days as f64,
        })
    }

    /// Maps a layout back onto whole grid columns: `(first_column, span)`.
    /// Exact for layouts produced by `project`, since the fractions are
    /// ratios of whole day counts.
    pub fn columns(&self, layout: Layout) -> (usize, usize) {
        let days = f64::from(self.days);
        let first = (layout.offset_fraction * days).round() as usize;
        let span = (layout.width_fraction * days).round().max(1.0) as usize;
        (first, span)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{DateInterval, ViewWindow};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    fn iv(start: NaiveDate, end: NaiveDate) -> DateInterval {
        DateInterval::new(start, end).expect("valid interval")
    }

    #[test]
    fn rejects_reversed_endpoints() {
        assert!(DateInterval::new(d(2023, 11, 5), d(2023, 11, 4)).is_err());
        let swapped = DateInterval::normalized(d(2023, 11, 5), d(2023, 11, 4));
        assert_eq!(swapped.start(), d(2023, 11, 4));
        assert_eq!(swapped.end(), d(2023, 11, 5));
    }

    #[test]
    fn overlap_is_symmetric_and_inclusive() {
        let a = iv(d(2023, 11, 1), d(2023, 11, 5));
        let b = iv(d(2023, 11, 5), d(2023, 11, 9));
        let c = iv(d(2023, 11, 6), d(2023, 11, 9));

        // shared boundary day counts as overlap
        assert!(a.overlaps(b));
        assert!(b.overlaps(a));
        assert!(!a.overlaps(c));
        assert!(!c.overlaps(a));
    }

    #[test]
    fn contained_interval_always_overlaps() {
        let outer = iv(d(2023, 11, 1), d(2023, 11, 30));
        let inner = iv(d(2023, 11, 10), d(2023, 11, 12));
        assert!(inner.overlaps(outer));
        assert!(outer.overlaps(inner));
    }

    #[test]
    fn degenerate_interval_overlaps_containing_range() {
        let day = DateInterval::day(d(2023, 11, 15));
        let range = iv(d(2023, 11, 1), d(2023, 11, 30));
        assert!(day.overlaps(range));
        assert!(range.overlaps(day));
        assert_eq!(day.nights(), 0);
    }

    #[test]
    fn window_rejects_zero_days() {
        assert!(ViewWindow::new(d(2023, 11, 1), 0).is_err());
    }

    #[test]
    fn interval_starting_just_past_window_is_dropped() {
        // offset 14 on a 14-day window: first day outside the grid
        let window = ViewWindow::new(d(2023, 11, 1), 14).expect("window");
        let stay = iv(d(2023, 11, 15), d(2023, 11, 18));
        assert!(window.project(stay).is_none());
    }

    #[test]
    fn interval_ending_before_window_is_dropped() {
        let window = ViewWindow::new(d(2023, 11, 10), 7).expect("window");
        let stay = iv(d(2023, 11, 1), d(2023, 11, 10));
        // check-out lands on the window start day: offset -9 + duration 9 == 0
        assert!(window.project(stay).is_none());
    }

    #[test]
    fn fully_visible_interval_keeps_exact_fractions() {
        let window = ViewWindow::new(d(2023, 11, 1), 14).expect("window");
        let stay = iv(d(2023, 11, 5), d(2023, 11, 8));
        let layout = window.project(stay).expect("visible");

        assert!((layout.offset_fraction - 4.0 / 14.0).abs() < 1e-12);
        assert!((layout.width_fraction - 3.0 / 14.0).abs() < 1e-12);
        assert!(layout.offset_fraction + layout.width_fraction <= 1.0);
        // width * days recovers the night count
        assert!((layout.width_fraction * 14.0 - stay.nights() as f64).abs() < 1e-9);
        assert_eq!(window.columns(layout), (4, 3));
    }

    #[test]
    fn partially_visible_interval_is_clipped() {
        let window = ViewWindow::new(d(2023, 11, 10), 7).expect("window");
        let stay = iv(d(2023, 11, 8), d(2023, 11, 13));
        let layout = window.project(stay).expect("partially visible");

        assert_eq!(layout.offset_fraction, 0.0);
        assert!((layout.width_fraction - 3.0 / 7.0).abs() < 1e-12);
        assert_eq!(window.columns(layout), (0, 3));
    }

    #[test]
    fn interval_overhanging_the_far_edge_is_clipped() {
        let window = ViewWindow::new(d(2023, 11, 1), 7).expect("window");
        let stay = iv(d(2023, 11, 6), d(2023, 11, 12));
        let layout = window.project(stay).expect("visible");

        assert!((layout.offset_fraction - 5.0 / 7.0).abs() < 1e-12);
        assert!((layout.width_fraction - 2.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_interval_inside_window_has_no_bar() {
        let window = ViewWindow::new(d(2023, 11, 1), 7).expect("window");
        let stay = DateInterval::day(d(2023, 11, 3));
        // zero nights occupy no grid column
        assert!(window.project(stay).is_none());
    }

    #[test]
    fn window_interval_covers_exactly_its_days() {
        let window = ViewWindow::new(d(2023, 11, 1), 14).expect("window");
        assert!(window.contains(d(2023, 11, 1)));
        assert!(window.contains(d(2023, 11, 14)));
        assert!(!window.contains(d(2023, 11, 15)));
        assert_eq!(window.end(), d(2023, 11, 15));
    }
}
