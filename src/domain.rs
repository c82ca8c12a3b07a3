use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the date of a trip was last entered in the UI. Persisted on the
/// wire as `tipoFechaUI` for compatibility with the hosted store, but
/// always recomputed from `date` via [`classify`] — never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DateInputMode {
    #[serde(rename = "hoy")]
    Today,
    #[serde(rename = "ayer")]
    Yesterday,
    #[default]
    #[serde(rename = "custom")]
    Custom,
}

pub fn classify(date: NaiveDate, today: NaiveDate) -> DateInputMode {
    if date == today {
        DateInputMode::Today
    } else if date == today - Duration::days(1) {
        DateInputMode::Yesterday
    } else {
        DateInputMode::Custom
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: i64,

    /// Sole temporal key for filtering. `NaiveDate` serializes as
    /// `YYYY-MM-DD`, which sorts identically to chronological order.
    #[serde(rename = "fecha")]
    pub date: NaiveDate,

    #[serde(rename = "cliente", default)]
    pub client: String,

    #[serde(rename = "precio", with = "lenient_amount", default)]
    pub price: Decimal,

    #[serde(rename = "km", with = "lenient_amount", default)]
    pub distance_km: Decimal,

    #[serde(rename = "tipoFechaUI", default)]
    pub date_input: DateInputMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,

    #[serde(rename = "fecha")]
    pub date: NaiveDate,

    /// Older snapshots stored the label under `descripcion` or `detalle`.
    #[serde(
        rename = "concepto",
        alias = "descripcion",
        alias = "detalle",
        default
    )]
    pub concept: String,

    #[serde(rename = "monto", with = "lenient_amount", default)]
    pub amount: Decimal,
}

/// Whole-ledger document exchanged with the remote store and written to
/// the local cache. Field names match the hosted JSON bin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(rename = "viajes", default)]
    pub trips: Vec<Trip>,

    #[serde(rename = "gastos", default)]
    pub expenses: Vec<Expense>,

    #[serde(rename = "ultimaActualizacion", default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Anything carrying a calendar date; lets the filter engine treat trips
/// and expenses uniformly.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for Trip {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for Expense {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Coerce free-form numeric input: unparseable becomes 0, negatives are
/// clamped to 0. Data entry never fails on formatting.
pub fn coerce_amount(raw: &str) -> Decimal {
    raw.trim()
        .parse::<Decimal>()
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO)
}

/// Wire amounts are JSON numbers in the hosted store, but legacy rows may
/// carry strings, nulls, or garbage. Apply the same coercion as the CLI.
mod lenient_amount {
    use rust_decimal::Decimal;
    use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Decimal, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_f64(amount.to_f64().unwrap_or(0.0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Decimal, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(f64),
            Text(String),
        }

        let value = match Option::<Raw>::deserialize(de)? {
            None => Decimal::ZERO,
            Some(Raw::Num(n)) => Decimal::from_f64(n).unwrap_or(Decimal::ZERO),
            Some(Raw::Text(s)) => s.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO),
        };
        Ok(value.max(Decimal::ZERO))
    }
}
