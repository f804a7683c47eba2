// src/services/access.rs

use std::{fmt, str::FromStr};

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::payment::{
    AccessState, AccessStatus, PaymentRecord, PaymentStatus, PaymentTrackingConfig,
};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// How `now` is compared against the end of the grace period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessComparison {
    /// `now` is truncated to its date; the grace end date is inclusive.
    #[default]
    CalendarDay,
    /// The grace period ends at midnight starting the end date; time of day counts.
    Instant,
}

impl FromStr for AccessComparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calendar-day" | "calendar_day" | "day" => Ok(AccessComparison::CalendarDay),
            "instant" => Ok(AccessComparison::Instant),
            other => Err(format!("unknown access comparison '{}'", other)),
        }
    }
}

impl fmt::Display for AccessComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessComparison::CalendarDay => f.write_str("calendar-day"),
            AccessComparison::Instant => f.write_str("instant"),
        }
    }
}

/// Decides whether a student may currently open a class, based on their
/// most recent settled payment and the class's grace period.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentAccessCalculator {
    comparison: AccessComparison,
}

impl PaymentAccessCalculator {
    pub fn new(comparison: AccessComparison) -> Self {
        Self { comparison }
    }

    pub fn evaluate(
        &self,
        config: &PaymentTrackingConfig,
        payments: &[PaymentRecord],
        now: NaiveDateTime,
    ) -> AccessStatus {
        if !config.enabled {
            return AccessStatus {
                can_access: true,
                status: AccessState::NoTracking,
                message: "Payment tracking is not enabled for this class.".to_string(),
                days_remaining: None,
                next_payment_date: None,
                grace_period_end_date: None,
            };
        }

        // `max_by_key` keeps the last of equal dates, matching a stable sort followed by `last()`.
        let latest = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid)
            .max_by_key(|p| p.date);

        let Some(latest) = latest else {
            return AccessStatus {
                can_access: false,
                status: AccessState::NoPayment,
                message: "No payment found for this class.".to_string(),
                days_remaining: None,
                next_payment_date: None,
                grace_period_end_date: None,
            };
        };

        let next_payment_date = first_of_next_month(latest.date.date());
        let grace_period_end_date = next_payment_date
            .checked_add_days(Days::new(u64::from(config.free_days)))
            .unwrap_or(NaiveDate::MAX);

        let days_remaining = match self.comparison {
            AccessComparison::CalendarDay => {
                let today = now.date();
                (today <= grace_period_end_date)
                    .then(|| (grace_period_end_date - today).num_days())
            }
            AccessComparison::Instant => {
                let end = grace_period_end_date.and_time(NaiveTime::MIN);
                (now <= end).then(|| ceil_days((end - now).num_milliseconds()))
            }
        };

        tracing::debug!(
            latest_payment = %latest.date,
            %next_payment_date,
            %grace_period_end_date,
            comparison = %self.comparison,
            "Evaluated class access"
        );

        match days_remaining {
            Some(days) => AccessStatus {
                can_access: true,
                status: AccessState::Paid,
                message: format!(
                    "Access granted until {}. {} day(s) remaining.",
                    grace_period_end_date, days
                ),
                days_remaining: Some(days),
                next_payment_date: Some(next_payment_date),
                grace_period_end_date: Some(grace_period_end_date),
            },
            None => AccessStatus {
                can_access: false,
                status: AccessState::PaymentRequired,
                message: format!(
                    "Payment required. The grace period ended on {}.",
                    grace_period_end_date
                ),
                days_remaining: None,
                next_payment_date: None,
                grace_period_end_date: None,
            },
        }
    }
}

/// First day of the month after `date`'s month.
pub fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
}

fn ceil_days(millis: i64) -> i64 {
    if millis <= 0 {
        return 0;
    }
    (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
}
