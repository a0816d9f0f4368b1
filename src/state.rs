use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::repository::pricing_config::PricingConfig;
use crate::services::holidays::HolidayCalendar;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub holidays: Arc<HolidayCalendar>,
    /// Per-property pricing configuration snapshots, keyed by property id.
    pub pricing_cache: Cache<String, Arc<PricingConfig>>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_pool = match &config.database_url {
            Some(url) => Some(
                PgPoolOptions::new()
                    .max_connections(config.db_pool_max_connections)
                    .min_connections(config.db_pool_min_connections)
                    .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
                    .idle_timeout(Duration::from_secs(config.db_pool_idle_timeout_seconds))
                    .connect_lazy(url)?,
            ),
            None => {
                tracing::warn!("DATABASE_URL is not set — running without persistence");
                None
            }
        };

        let pricing_cache = Cache::builder()
            .time_to_live(Duration::from_secs(config.pricing_cache_ttl_seconds))
            .max_capacity(config.pricing_cache_max_entries)
            .build();

        let holidays = Arc::new(
            HolidayCalendar::brazil().with_dates(config.holiday_extra_dates.iter().copied()),
        );

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            holidays,
            pricing_cache,
        })
    }
}
