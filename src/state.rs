use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::services::{ScheduleSummaryAggregator, SqliteSummarySource, SummaryCache};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub summary: Arc<ScheduleSummaryAggregator>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: AppConfig) -> Self {
        let cache = Arc::new(SummaryCache::new(config.summary_cache_ttl));
        let source = Arc::new(SqliteSummarySource::new(db.clone()));

        Self {
            summary: Arc::new(ScheduleSummaryAggregator::new(source, cache)),
            config: Arc::new(config),
            db,
        }
    }
}
