// src/cache.rs

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::{Duration, Instant},
};

use crate::models::payment::{PaymentRecord, PaymentTrackingConfig};

#[derive(Debug)]
struct CachedPayments {
    records: Vec<PaymentRecord>,
    loaded_at: Instant,
}

#[derive(Debug, Default)]
struct CacheInner {
    tracking: HashMap<String, PaymentTrackingConfig>,
    /// Keyed by `(student_id, class_id)`.
    payments: HashMap<(String, String), CachedPayments>,
}

/// Process-wide cache of class settings and enrollment payment histories.
///
/// Cloning yields another handle to the same cache. Access statuses are never
/// cached; they are recomputed from these inputs on every request.
#[derive(Debug, Clone)]
pub struct EnrollmentCache {
    inner: Arc<RwLock<CacheInner>>,
    ttl: Duration,
}

impl EnrollmentCache {
    /// Payment histories older than `ttl` are treated as missing.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner::default())),
            ttl,
        }
    }

    pub fn put_tracking(&self, class_id: &str, config: PaymentTrackingConfig) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.tracking.insert(class_id.to_string(), config);
    }

    pub fn tracking(&self, class_id: &str) -> Option<PaymentTrackingConfig> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.tracking.get(class_id).copied()
    }

    /// Stores one enrollment's history. Expired histories of other enrollments are swept out on the way.
    pub fn put_payments(&self, student_id: &str, class_id: &str, records: Vec<PaymentRecord>) {
        let ttl = self.ttl;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = inner.payments.len();
        inner.payments.retain(|_, entry| entry.loaded_at.elapsed() < ttl);
        let swept = before - inner.payments.len();
        if swept > 0 {
            tracing::debug!(swept, "Dropped expired payment histories");
        }
        inner.payments.insert(
            (student_id.to_string(), class_id.to_string()),
            CachedPayments {
                records,
                loaded_at: Instant::now(),
            },
        );
    }

    /// The cached history, or `None` when it was never loaded, was invalidated or has expired.
    /// An expired history is removed.
    pub fn payments(&self, student_id: &str, class_id: &str) -> Option<Vec<PaymentRecord>> {
        let key = (student_id.to_string(), class_id.to_string());
        {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            match inner.payments.get(&key) {
                None => return None,
                Some(entry) if entry.loaded_at.elapsed() < self.ttl => return Some(entry.records.clone()),
                Some(_) => {}
            }
        }

        // Re-checked under the write lock: the history may have been reloaded in between.
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.payments.get(&key) {
            Some(entry) if entry.loaded_at.elapsed() < self.ttl => Some(entry.records.clone()),
            Some(_) => {
                inner.payments.remove(&key);
                tracing::debug!(student_id, class_id, "Cached payment history expired");
                None
            }
            None => None,
        }
    }

    /// Drops one enrollment's payment history, e.g. after a payment completes.
    pub fn invalidate(&self, student_id: &str, class_id: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner
            .payments
            .remove(&(student_id.to_string(), class_id.to_string()))
            .is_some()
    }

    /// Drops a class's settings and every enrollment history cached for it.
    pub fn invalidate_class(&self, class_id: &str) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = inner.payments.len();
        inner.payments.retain(|(_, class), _| class != class_id);
        let removed = before - inner.payments.len();
        removed + usize::from(inner.tracking.remove(class_id).is_some())
    }

    /// Empties the cache so everything is reloaded from the backends. Returns the number of entries dropped.
    pub fn refresh(&self) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let removed = inner.payments.len() + inner.tracking.len();
        inner.payments.clear();
        inner.tracking.clear();
        tracing::info!(removed, "Enrollment cache cleared");
        removed
    }
}
