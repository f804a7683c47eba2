// src/ingest/payments.rs

use chrono::FixedOffset;
use serde_json::Value;

use super::{IngestError, as_number, as_text, field};
use crate::{
    models::payment::{PaymentRecord, PaymentStatus},
    utils::dates::parse_portal_value,
};

const DATE_KEYS: &[&str] = &["date", "purchase_date", "created_at", "payment_date", "paid_at", "createdAt"];
const AMOUNT_KEYS: &[&str] = &["amount", "price", "total"];
const STATUS_KEYS: &[&str] = &["status", "payment_status", "paymentStatus"];

/// Maps raw payment objects onto [`PaymentRecord`]s.
///
/// A record without a usable date is dropped with a warning: one bad row
/// must not hide the rest of a student's history. A missing or unreadable
/// amount becomes `0`.
pub fn normalize_payments(
    raw: &[Value],
    offset: FixedOffset,
) -> Result<Vec<PaymentRecord>, IngestError> {
    let mut records = Vec::with_capacity(raw.len());

    for (index, value) in raw.iter().enumerate() {
        let obj = value.as_object().ok_or(IngestError::NotAnObject { index })?;

        let Some(date) = field(obj, DATE_KEYS).and_then(|v| parse_portal_value(v, offset)) else {
            tracing::warn!(
                index,
                raw_date = ?field(obj, DATE_KEYS),
                "Skipping payment with missing or malformed date"
            );
            continue;
        };

        let amount = field(obj, AMOUNT_KEYS).and_then(as_number).unwrap_or(0.0);
        let status = match field(obj, STATUS_KEYS) {
            None => PaymentStatus::Paid,
            Some(v) => parse_status(v, index),
        };

        records.push(PaymentRecord { date, amount, status });
    }

    Ok(records)
}

fn parse_status(value: &Value, index: usize) -> PaymentStatus {
    let text = as_text(value)
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();

    match text.as_str() {
        "paid" | "completed" | "complete" | "success" | "successful" | "2" | "1" => PaymentStatus::Paid,
        "pending" | "processing" | "0" => PaymentStatus::Pending,
        "failed" | "cancelled" | "canceled" | "declined" | "chargedback" | "-1" | "-2" | "-3" => {
            PaymentStatus::Failed
        }
        other => {
            tracing::warn!(index, status = other, "Unknown payment status, treating as pending");
            PaymentStatus::Pending
        }
    }
}
