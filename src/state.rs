use crate::auth::{jwt::JwtKeys, repo::UserRepo};
use crate::config::AppConfig;
use crate::contact::repo::ContactRepo;
use crate::db::HealthProbe;
use crate::rate_limit::RateLimiter;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepo>,
    pub contacts: Arc<dyn ContactRepo>,
    pub probe: Arc<dyn HealthProbe>,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtKeys>,
    pub limiter: RateLimiter,
}

impl AppState {
    /// Builds state around one store serving every repository role.
    pub fn new<S>(config: AppConfig, store: Arc<S>) -> Self
    where
        S: UserRepo + ContactRepo + HealthProbe + 'static,
    {
        Self::from_parts(config, store.clone(), store.clone(), store)
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserRepo>,
        contacts: Arc<dyn ContactRepo>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        let jwt = Arc::new(JwtKeys::new(&config.jwt));
        let limiter = RateLimiter::new(config.rate_limit);
        Self {
            users,
            contacts,
            probe,
            config: Arc::new(config),
            jwt,
            limiter,
        }
    }
}
