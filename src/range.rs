use chrono::{Datelike, Duration, NaiveDate};

/// Named shorthand for the visible time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Today,
    Week,
    Month,
    Custom,
}

/// Inclusive calendar-date window. Both endpoints are local calendar
/// dates; no absolute-time values are involved, so a record can never
/// drift into an adjacent day through timezone conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self::new(day, day)
    }

    /// Monday through Sunday of the week containing `reference`. The week
    /// deliberately begins on Monday regardless of locale.
    pub fn week_of(reference: NaiveDate) -> Self {
        let monday =
            reference - Duration::days(i64::from(reference.weekday().num_days_from_monday()));
        Self::new(monday, monday + Duration::days(6))
    }

    /// First through last calendar day of the month containing
    /// `reference`, rolling December over into the next January.
    pub fn month_of(reference: NaiveDate) -> Self {
        let (year, month) = (reference.year(), reference.month());
        let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(reference);

        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .map(|first_of_next| first_of_next - Duration::days(1))
            .unwrap_or(reference);

        Self::new(start, end)
    }

    /// Inclusive on both endpoints. An inverted range (`start > end`)
    /// matches nothing.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Resolve a preset against a reference date. For `Custom` the caller
/// supplies the window; when absent it collapses to the reference day.
pub fn resolve(preset: Preset, reference: NaiveDate, custom: Option<DateRange>) -> DateRange {
    match preset {
        Preset::Today => DateRange::single(reference),
        Preset::Week => DateRange::week_of(reference),
        Preset::Month => DateRange::month_of(reference),
        Preset::Custom => custom.unwrap_or_else(|| DateRange::single(reference)),
    }
}
