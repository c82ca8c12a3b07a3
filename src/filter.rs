use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::domain::{Dated, Expense, Trip};
use crate::range::DateRange;

/// Optional narrowing of the active range to one exact date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayFilter {
    #[default]
    AllDays,
    Day(NaiveDate),
}

impl DayFilter {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            DayFilter::AllDays => true,
            DayFilter::Day(day) => date == *day,
        }
    }
}

/// Records whose date falls inside `range`, sorted ascending by date.
/// Pure: the input slice is untouched, and filtering an already-filtered
/// set with the same range returns the same set.
pub fn filter_by_range<T: Dated + Clone>(records: &[T], range: &DateRange) -> Vec<T> {
    let mut out: Vec<T> = records
        .iter()
        .filter(|r| range.contains(r.date()))
        .cloned()
        .collect();
    out.sort_by_key(|r| r.date());
    out
}

/// Records on exactly `day`, independent of any range.
pub fn filter_by_date<T: Dated + Clone>(records: &[T], day: NaiveDate) -> Vec<T> {
    records.iter().filter(|r| r.date() == day).cloned().collect()
}

/// Range filter plus the optional day refinement, in display order.
pub fn apply<T: Dated + Clone>(records: &[T], range: &DateRange, day: DayFilter) -> Vec<T> {
    let mut out = filter_by_range(records, range);
    out.retain(|r| day.matches(r.date()));
    out
}

/// Distinct dates present in the current range, ascending. Feeds the
/// day-refinement option list.
pub fn available_days(trips: &[Trip], expenses: &[Expense], range: &DateRange) -> Vec<NaiveDate> {
    let mut days = BTreeSet::new();
    for t in trips {
        if range.contains(t.date) {
            days.insert(t.date);
        }
    }
    for e in expenses {
        if range.contains(e.date) {
            days.insert(e.date);
        }
    }
    days.into_iter().collect()
}
