//! Calendar-month decomposition of a requested date range

use chrono::{Datelike, Days, Months, NaiveDate};
use recfetch_core::FetchError;

use crate::state::DateWindow;

/// Split `[start, end]` into month-aligned windows.
///
/// The first window starts at `start` and the last ends at `end`; every
/// window in between is a full calendar month. Windows are returned in
/// chronological order and partition the range without gaps or overlaps.
pub fn plan(start: NaiveDate, end: NaiveDate) -> Result<Vec<DateWindow>, FetchError> {
    DateWindow::new(start, end)?;

    let mut windows = Vec::new();
    let mut cursor = first_of_month(start);
    while cursor <= end {
        let window_start = cursor.max(start);
        let next = cursor.checked_add_months(Months::new(1));
        let window_end = next
            .and_then(|n| n.pred_opt())
            .map_or(end, |last| last.min(end));
        windows.push(DateWindow {
            start: window_start,
            end: window_end,
        });
        match next {
            Some(n) => cursor = n,
            None => break,
        }
    }
    Ok(windows)
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    d - Days::new(u64::from(d.day0()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn w(start: NaiveDate, end: NaiveDate) -> DateWindow {
        DateWindow { start, end }
    }

    /// Windows must tile [start, end] exactly, in order.
    fn assert_partitions(windows: &[DateWindow], start: NaiveDate, end: NaiveDate) {
        assert!(!windows.is_empty());
        assert_eq!(windows[0].start, start);
        assert_eq!(windows[windows.len() - 1].end, end);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
        }
        for window in windows {
            assert!(window.start <= window.end);
            assert_eq!(window.start.year(), window.end.year());
            assert_eq!(window.start.month(), window.end.month());
        }
        let days: i64 = windows.iter().map(DateWindow::days).sum();
        assert_eq!(days, (end - start).num_days() + 1);
    }

    #[test]
    fn spans_three_months() {
        let windows = plan(date(2024, 1, 15), date(2024, 3, 10)).unwrap();
        assert_eq!(
            windows,
            vec![
                w(date(2024, 1, 15), date(2024, 1, 31)),
                w(date(2024, 2, 1), date(2024, 2, 29)),
                w(date(2024, 3, 1), date(2024, 3, 10)),
            ]
        );
    }

    #[test]
    fn within_one_month() {
        let windows = plan(date(2023, 6, 3), date(2023, 6, 20)).unwrap();
        assert_eq!(windows, vec![w(date(2023, 6, 3), date(2023, 6, 20))]);
    }

    #[test]
    fn single_day() {
        let windows = plan(date(2023, 12, 31), date(2023, 12, 31)).unwrap();
        assert_eq!(windows, vec![w(date(2023, 12, 31), date(2023, 12, 31))]);
    }

    #[test]
    fn crosses_year_boundary() {
        let windows = plan(date(2023, 12, 31), date(2024, 1, 1)).unwrap();
        assert_eq!(
            windows,
            vec![
                w(date(2023, 12, 31), date(2023, 12, 31)),
                w(date(2024, 1, 1), date(2024, 1, 1)),
            ]
        );
    }

    #[test]
    fn non_leap_february() {
        let windows = plan(date(2023, 2, 1), date(2023, 3, 1)).unwrap();
        assert_eq!(windows[0], w(date(2023, 2, 1), date(2023, 2, 28)));
        assert_eq!(windows[1], w(date(2023, 3, 1), date(2023, 3, 1)));
    }

    #[test]
    fn reversed_range_rejected() {
        let err = plan(date(2024, 3, 10), date(2024, 1, 15)).unwrap_err();
        assert!(matches!(err, FetchError::InvalidRange { .. }));
    }

    #[test]
    fn partitions_many_ranges() {
        let base = date(2023, 1, 1);
        for start_offset in (0..800).step_by(37) {
            for len in [0u64, 1, 27, 28, 30, 31, 59, 61, 365, 400] {
                let start = base + Days::new(start_offset);
                let end = start + Days::new(len);
                let windows = plan(start, end).unwrap();
                assert_partitions(&windows, start, end);
            }
        }
    }

    #[test]
    fn range_reaching_max_date() {
        let end = NaiveDate::MAX;
        let start = first_of_month(end);
        let windows = plan(start, end).unwrap();
        assert_eq!(windows, vec![w(start, end)]);
    }
}
