use chrono::{Datelike, NaiveDateTime};
use tracing::{debug, warn};

use crate::config::TargetPeriod;
use crate::error::{CbocError, Result};

/// How snapshot entries are labelled in the item list, e.g. "Jan 31, 2025 11:43:10 PM".
pub const LABEL_FORMAT: &str = "%b %d, %Y %I:%M:%S %p";
/// The form the archive's filter box expects for dated entries.
pub const SEARCH_FORMAT: &str = "%Y%m%d%H%M%S";

pub fn parse_label(label: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(label.trim(), LABEL_FORMAT).ok()
}

/// Text to type into the filter box to find `label`.
pub fn compact_search_text(label: &str) -> String {
    match parse_label(label) {
        Some(t) => t.format(SEARCH_FORMAT).to_string(),
        None => label.to_string(),
    }
}

fn is_month_end(t: NaiveDateTime) -> bool {
    t.date().succ_opt().map_or(true, |next| next.month() != t.month())
}

/// Pick the snapshot that holds the complete data for `period`.
///
/// The earliest entry after the month ends is the default. An entry dated on
/// the last day of the month itself wins over it, since it already holds the
/// full month and nothing later has been posted to it.
pub fn select_snapshot(labels: &[String], period: TargetPeriod) -> Result<String> {
    let end = period.end_instant();
    let mut first_after: Option<(NaiveDateTime, &String)> = None;
    let mut last_within: Option<(NaiveDateTime, &String)> = None;

    for label in labels {
        let Some(t) = parse_label(label) else {
            warn!("Could not parse date {label:?}");
            continue;
        };
        if t > end && first_after.map_or(true, |(best, _)| t < best) {
            first_after = Some((t, label));
        }
        if period.contains(t.date()) && last_within.map_or(true, |(best, _)| t > best) {
            last_within = Some((t, label));
        }
    }

    let mut chosen = first_after;
    if let Some((t, label)) = last_within {
        if is_month_end(t) {
            chosen = Some((t, label));
        }
    }
    debug!("snapshot for {period}: {chosen:?}");
    chosen
        .map(|(_, label)| label.clone())
        .ok_or(CbocError::DateFileNotFound {
            year: period.year,
            month: period.month,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn january() -> TargetPeriod {
        TargetPeriod::new(2025, 1).unwrap()
    }

    #[test]
    fn test_parse_label() {
        let t = parse_label("Feb 3, 2025 9:00:00 AM").unwrap();
        assert_eq!(t.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-02-03 09:00:00");
        assert!(parse_label("DGL060").is_none());
    }

    #[test]
    fn test_compact_search_text() {
        assert_eq!(compact_search_text("Jan 31, 2025 11:43:10 PM"), "20250131234310");
        assert_eq!(compact_search_text("953300"), "953300");
    }

    #[test]
    fn test_month_end_entry_beats_later_entry() {
        let items = labels(&["Feb 3, 2025 9:00:00 AM", "Jan 31, 2025 11:43:10 PM"]);
        assert_eq!(select_snapshot(&items, january()).unwrap(), "Jan 31, 2025 11:43:10 PM");
    }

    #[test]
    fn test_mid_month_entry_alone_is_not_enough() {
        let items = labels(&["Jan 15, 2025 10:00:00 AM"]);
        let err = select_snapshot(&items, january()).unwrap_err();
        assert!(matches!(err, CbocError::DateFileNotFound { year: 2025, month: 1 }));
    }

    #[test]
    fn test_mid_month_entry_falls_back_to_first_after() {
        let items = labels(&[
            "Mar 1, 2025 8:00:00 AM",
            "Jan 15, 2025 10:00:00 AM",
            "Feb 3, 2025 9:00:00 AM",
            "Dec 31, 2024 11:00:00 PM",
        ]);
        assert_eq!(select_snapshot(&items, january()).unwrap(), "Feb 3, 2025 9:00:00 AM");
    }

    #[test]
    fn test_unparseable_labels_are_ignored() {
        let items = labels(&["Reports", "Feb 1, 2025 12:00:01 AM"]);
        assert_eq!(select_snapshot(&items, january()).unwrap(), "Feb 1, 2025 12:00:01 AM");
        assert!(select_snapshot(&labels(&["Reports"]), january()).is_err());
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let december = TargetPeriod::new(2024, 12).unwrap();
        let items = labels(&["Jan 2, 2025 7:30:00 AM", "Dec 20, 2024 7:30:00 AM"]);
        assert_eq!(select_snapshot(&items, december).unwrap(), "Jan 2, 2025 7:30:00 AM");
    }
}
