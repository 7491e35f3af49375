use std::sync::Arc;

use sqlx::PgPool;

use crate::adapters::AdapterRegistry;
use crate::config::Config;
use crate::notify::Notifier;
use crate::rate_limit::PlatformRateLimiter;
use crate::retry::RetryPolicy;
use crate::session::SessionFactory;
use crate::settings::SettingsStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub adapters: AdapterRegistry,
    pub limiter: PlatformRateLimiter,
    pub retry: RetryPolicy,
    pub sessions: Arc<dyn SessionFactory>,
    pub settings: Arc<dyn SettingsStore>,
    pub notifier: Arc<dyn Notifier>,
}
