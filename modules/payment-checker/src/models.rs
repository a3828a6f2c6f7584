//! Payment record domain types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use uuid::Uuid;

/// Status of a tracked payment. Terminal iff `Paid` or `Unpaid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Unpaid,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Unpaid)
    }

    /// Parse the upstream's free-form status string. Anything that isn't a
    /// recognized terminal status is treated as still pending — the fetcher
    /// already returns an empty string on decode failure, which lands here
    /// the same way.
    pub fn from_upstream(raw: &str) -> Self {
        match raw {
            "PAID" => PaymentStatus::Paid,
            "UNPAID" => PaymentStatus::Unpaid,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Tracked payment row, mirroring `payment_records`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub tag: String,
    pub description: String,
    #[serde(with = "decimal_number")]
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Emits a JSON number for `amount`, accepts both a JSON number and a JSON
/// string on the way in. Values only lose precision at this boundary if a
/// downstream strict-JSON-number parser re-interprets the emitted number as
/// `f64`; internally `amount` is always carried as `Decimal`.
mod decimal_number {
    use super::*;

    pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use rust_decimal::prelude::ToPrimitive;
        serializer.serialize_f64(value.to_f64().unwrap_or_default())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumberOrString {
            Number(f64),
            String(String),
        }

        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::String(s) => {
                Decimal::from_str(&s).map_err(serde::de::Error::custom)
            }
            NumberOrString::Number(n) => {
                Decimal::try_from(n).map_err(serde::de::Error::custom)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_terminal_only_for_paid_or_unpaid() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Paid.is_terminal());
        assert!(PaymentStatus::Unpaid.is_terminal());
    }

    #[test]
    fn unrecognized_upstream_status_is_pending() {
        assert_eq!(PaymentStatus::from_upstream("WHATEVER"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_upstream(""), PaymentStatus::Pending);
    }

    #[test]
    fn amount_accepts_string_or_number_on_decode() {
        let record_json = serde_json::json!({
            "id": "11111111-1111-1111-1111-111111111111",
            "tag": "t",
            "description": "d",
            "amount": "123.45",
            "status": "PENDING",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        });
        let record: PaymentRecord = serde_json::from_value(record_json).unwrap();
        assert_eq!(record.amount, Decimal::from_str("123.45").unwrap());

        let record_json_num = serde_json::json!({
            "id": "11111111-1111-1111-1111-111111111111",
            "tag": "t",
            "description": "d",
            "amount": 123.45,
            "status": "PENDING",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        });
        let record_num: PaymentRecord = serde_json::from_value(record_json_num).unwrap();
        assert_eq!(record_num.amount, Decimal::from_str("123.45").unwrap());
    }
}
