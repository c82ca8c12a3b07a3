use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::domain::{Expense, LedgerSnapshot, Trip, classify};

/// The only mutable state: in-memory trip and expense collections,
/// mirrored to a JSON cache file in the same shape as the remote store.
#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    pub trips: Vec<Trip>,
    pub expenses: Vec<Expense>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LedgerStore {
    /// Adopt a snapshot (local cache or remote pull). `date_input` is a
    /// derived value, so it is reclassified here rather than trusted.
    pub fn from_snapshot(snapshot: LedgerSnapshot, today: NaiveDate) -> Self {
        let mut store = Self {
            trips: snapshot.trips,
            expenses: snapshot.expenses,
            updated_at: Some(snapshot.updated_at),
        };
        for trip in &mut store.trips {
            trip.date_input = classify(trip.date, today);
        }
        store
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> LedgerSnapshot {
        LedgerSnapshot {
            trips: self.trips.clone(),
            expenses: self.expenses.clone(),
            updated_at: now,
        }
    }

    /// Missing cache file means "no data yet", not an error.
    pub fn load(path: &Path, today: NaiveDate) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Self::from_snapshot(snapshot, today))
    }

    pub fn save(&self, path: &Path, now: DateTime<Utc>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot(now))?;
        atomic_write(path, json.as_bytes())
    }

    /// Creation epoch-millis, bumped while taken. Uniqueness is required;
    /// ordering across bumps is not.
    pub fn alloc_id(&self, now_millis: i64) -> i64 {
        let mut id = now_millis;
        while self.id_taken(id) {
            id += 1;
        }
        id
    }

    fn id_taken(&self, id: i64) -> bool {
        self.trips.iter().any(|t| t.id == id) || self.expenses.iter().any(|e| e.id == id)
    }

    pub fn add_trip(
        &mut self,
        date: NaiveDate,
        client: String,
        price: Decimal,
        distance_km: Decimal,
        today: NaiveDate,
        now_millis: i64,
    ) -> i64 {
        let id = self.alloc_id(now_millis);
        self.trips.push(Trip {
            id,
            date,
            client,
            price,
            distance_km,
            date_input: classify(date, today),
        });
        id
    }

    pub fn update_trip(
        &mut self,
        id: i64,
        date: Option<NaiveDate>,
        client: Option<String>,
        price: Option<Decimal>,
        distance_km: Option<Decimal>,
        today: NaiveDate,
    ) -> Result<()> {
        let trip = self
            .trips
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| anyhow!("No such trip: {id}"))?;

        if let Some(date) = date {
            trip.date = date;
            trip.date_input = classify(date, today);
        }
        if let Some(client) = client {
            trip.client = client;
        }
        if let Some(price) = price {
            trip.price = price;
        }
        if let Some(km) = distance_km {
            trip.distance_km = km;
        }
        Ok(())
    }

    pub fn remove_trip(&mut self, id: i64) -> bool {
        let before = self.trips.len();
        self.trips.retain(|t| t.id != id);
        self.trips.len() != before
    }

    pub fn add_expense(
        &mut self,
        date: NaiveDate,
        concept: String,
        amount: Decimal,
        now_millis: i64,
    ) -> i64 {
        let id = self.alloc_id(now_millis);
        self.expenses.push(Expense {
            id,
            date,
            concept,
            amount,
        });
        id
    }

    pub fn update_expense(
        &mut self,
        id: i64,
        date: Option<NaiveDate>,
        concept: Option<String>,
        amount: Option<Decimal>,
    ) -> Result<()> {
        let expense = self
            .expenses
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| anyhow!("No such expense: {id}"))?;

        if let Some(date) = date {
            expense.date = date;
        }
        if let Some(concept) = concept {
            expense.concept = concept;
        }
        if let Some(amount) = amount {
            expense.amount = amount;
        }
        Ok(())
    }

    pub fn remove_expense(&mut self, id: i64) -> bool {
        let before = self.expenses.len();
        self.expenses.retain(|e| e.id != id);
        self.expenses.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty() && self.expenses.is_empty()
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().context("ledger path requires a parent dir")?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create dir {}", parent.display()))?;

    let tmp = parent.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|s| s.to_str()).unwrap_or("rutero")
    ));

    {
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("Failed to create temp file {}", tmp.display()))?;
        f.write_all(contents)
            .with_context(|| format!("Failed to write temp file {}", tmp.display()))?;
        f.sync_all()
            .with_context(|| format!("Failed to sync temp file {}", tmp.display()))?;
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
