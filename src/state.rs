use crate::{cache::EnrollmentCache, config::Config, services::access::PaymentAccessCalculator};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub cache: EnrollmentCache,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let cache = EnrollmentCache::new(config.cache_ttl);
        Self { config, cache }
    }

    pub fn calculator(&self) -> PaymentAccessCalculator {
        PaymentAccessCalculator::new(self.config.access_comparison)
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for EnrollmentCache {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}
