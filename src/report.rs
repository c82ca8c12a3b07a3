use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::{Expense, Trip};

/// Financial totals for the currently filtered view. All sums treat
/// missing numerics as zero; they never carry a not-a-number through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub income: Decimal,
    pub distance_km: Decimal,
    pub expense_total: Decimal,
    pub net_profit: Decimal,
}

impl Totals {
    /// Sign hook for the renderer: negative net profit gets a distinct
    /// visual treatment, but the decision itself stays pure.
    pub fn is_loss(&self) -> bool {
        self.net_profit < Decimal::ZERO
    }
}

pub fn aggregate(trips: &[Trip], expenses: &[Expense]) -> Totals {
    let income = trips.iter().map(|t| t.price).sum();
    let distance_km = trips.iter().map(|t| t.distance_km).sum();
    let expense_total = expenses.iter().map(|e| e.amount).sum::<Decimal>();

    Totals {
        income,
        distance_km,
        expense_total,
        net_profit: income - expense_total,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayTotals {
    pub income: Decimal,
    pub distance_km: Decimal,
}

/// Per-day breakdown, grouped strictly by exact date and ordered
/// ascending. Two trips on different dates never share a bucket, even
/// when they fall on the same weekday.
pub fn by_day(trips: &[Trip]) -> BTreeMap<NaiveDate, DayTotals> {
    let mut buckets: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();
    for t in trips {
        let bucket = buckets.entry(t.date).or_default();
        bucket.income += t.price;
        bucket.distance_km += t.distance_km;
    }
    buckets
}
