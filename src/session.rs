use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{Expense, Trip};
use crate::filter::{self, DayFilter};
use crate::range::DateRange;
use crate::report::{self, DayTotals, Totals};
use crate::store::LedgerStore;

/// Everything the renderer needs for one screen: the filtered record
/// sets, the totals, the per-day cards, and the day-selector options.
#[derive(Debug, Clone)]
pub struct View {
    pub trips: Vec<Trip>,
    pub expenses: Vec<Expense>,
    pub totals: Totals,
    pub per_day: BTreeMap<NaiveDate, DayTotals>,
    pub days: Vec<NaiveDate>,
}

/// Explicit application state: the record store, the active window, the
/// day refinement, and the two sync guards. Replaces the ambient globals
/// of the old app so the whole engine is testable in isolation.
#[derive(Debug)]
pub struct Session {
    pub store: LedgerStore,
    range: DateRange,
    day: DayFilter,

    /// Set once the initial load (cache or remote) has completed; remote
    /// saves are refused before that to avoid clobbering server data
    /// with an empty startup state.
    loaded: bool,

    /// At most one outstanding sync per session.
    sync_in_flight: bool,
}

impl Session {
    pub fn new(store: LedgerStore, range: DateRange) -> Self {
        Self {
            store,
            range,
            day: DayFilter::AllDays,
            loaded: false,
            sync_in_flight: false,
        }
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn day(&self) -> DayFilter {
        self.day
    }

    /// Changing the window keeps the day refinement only if that day is
    /// still present; otherwise it falls back to "all days".
    pub fn select_range(&mut self, range: DateRange) {
        self.range = range;
        self.reconcile_day();
    }

    /// A day outside the current option list resets to "all days" rather
    /// than erroring.
    pub fn select_day(&mut self, day: DayFilter) {
        self.day = day;
        self.reconcile_day();
    }

    /// Called after every store mutation: the option list may have
    /// shrunk underneath the current selection.
    pub fn reconcile_day(&mut self) {
        if let DayFilter::Day(day) = self.day {
            let days = filter::available_days(&self.store.trips, &self.store.expenses, &self.range);
            if !days.contains(&day) {
                self.day = DayFilter::AllDays;
            }
        }
    }

    /// Recompute the full cascade from the current state. Pure with
    /// respect to the store.
    pub fn view(&self) -> View {
        let trips = filter::apply(&self.store.trips, &self.range, self.day);
        let expenses = filter::apply(&self.store.expenses, &self.range, self.day);
        let totals = report::aggregate(&trips, &expenses);
        let per_day = report::by_day(&trips);
        let days = filter::available_days(&self.store.trips, &self.store.expenses, &self.range);

        View {
            trips,
            expenses,
            totals,
            per_day,
            days,
        }
    }

    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Claim the single sync slot; returns false if a sync is already
    /// outstanding.
    pub fn try_begin_sync(&mut self) -> bool {
        if self.sync_in_flight {
            return false;
        }
        self.sync_in_flight = true;
        true
    }

    pub fn end_sync(&mut self) {
        self.sync_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("test date")
    }

    fn session_with_week() -> Session {
        let mut store = LedgerStore::default();
        let today = date("2024-06-13");
        store.add_trip(
            date("2024-06-10"),
            "Centro".to_string(),
            Decimal::from(5000),
            Decimal::from(12),
            today,
            1,
        );
        store.add_expense(date("2024-06-10"), "Gasolina".to_string(), Decimal::from(1500), 2);
        Session::new(store, DateRange::week_of(today))
    }

    #[test]
    fn view_runs_the_full_cascade() {
        let session = session_with_week();
        let view = session.view();

        assert_eq!(view.trips.len(), 1);
        assert_eq!(view.expenses.len(), 1);
        assert_eq!(view.totals.net_profit, Decimal::from(3500));
        assert_eq!(view.per_day.len(), 1);
        assert_eq!(view.days, vec![date("2024-06-10")]);
    }

    #[test]
    fn deleting_last_record_of_selected_day_resets_refinement() {
        let mut session = session_with_week();
        session.select_day(DayFilter::Day(date("2024-06-10")));
        assert_eq!(session.day(), DayFilter::Day(date("2024-06-10")));

        let trip_id = session.store.trips[0].id;
        let expense_id = session.store.expenses[0].id;
        session.store.remove_trip(trip_id);
        session.store.remove_expense(expense_id);
        session.reconcile_day();

        assert_eq!(session.day(), DayFilter::AllDays);
        let view = session.view();
        assert!(view.days.is_empty());
        assert_eq!(view.totals.income, Decimal::ZERO);
    }

    #[test]
    fn selecting_day_absent_from_range_falls_back_to_all_days() {
        let mut session = session_with_week();
        session.select_day(DayFilter::Day(date("2024-06-11")));
        assert_eq!(session.day(), DayFilter::AllDays);
    }

    #[test]
    fn narrowing_range_drops_stale_day_selection() {
        let mut session = session_with_week();
        session.select_day(DayFilter::Day(date("2024-06-10")));

        session.select_range(DateRange::single(date("2024-06-12")));
        assert_eq!(session.day(), DayFilter::AllDays);
    }

    #[test]
    fn sync_slot_admits_one_sync_at_a_time() {
        let mut session = session_with_week();
        assert!(session.try_begin_sync());
        assert!(!session.try_begin_sync());
        session.end_sync();
        assert!(session.try_begin_sync());
    }

    #[test]
    fn loaded_guard_starts_unset() {
        let mut session = session_with_week();
        assert!(!session.is_loaded());
        session.mark_loaded();
        assert!(session.is_loaded());
    }
}
