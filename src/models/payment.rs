// src/models/payment.rs

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Settlement state of a single payment, as reported by the payments backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Failed,
}

/// One payment made by a student for a class.
/// Records are never edited; a new payment is a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentRecord {
    /// Portal-local timestamp of the payment.
    pub date: NaiveDateTime,
    pub amount: f64,
    pub status: PaymentStatus,
}

/// Per-class grace period settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct PaymentTrackingConfig {
    /// Whether monthly payment tracking applies to the class at all.
    pub enabled: bool,

    /// Days after the next payment date during which access is still granted.
    #[serde(default, alias = "freeDays")]
    #[validate(range(max = 366, message = "free_days must be at most 366."))]
    pub free_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AccessState {
    NoTracking,
    NoPayment,
    Paid,
    PaymentRequired,
}

/// Computed access decision for one enrollment. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AccessStatus {
    pub can_access: bool,
    pub status: AccessState,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_payment_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_end_date: Option<NaiveDate>,
}

/// DTO for evaluating access from inline data.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EvaluateAccessRequest {
    #[validate(nested)]
    pub tracking: PaymentTrackingConfig,

    /// Raw payment objects as returned by the payments backend.
    #[validate(length(max = 2000, message = "Too many payments in one request."))]
    #[schema(value_type = Vec<Object>)]
    #[serde(default)]
    pub payments: Vec<serde_json::Value>,

    /// Evaluation instant, defaults to the current portal-local time.
    pub now: Option<String>,
}

/// DTO for caching a student's payment history.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PaymentHistoryRequest {
    #[validate(length(max = 2000, message = "Too many payments in one request."))]
    #[schema(value_type = Vec<Object>)]
    pub payments: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentHistoryResponse {
    pub class_id: String,
    pub stored: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccessQuery {
    /// Evaluate at this date/time instead of now.
    pub at: Option<String>,
}
