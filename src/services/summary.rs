//! Public "when do classes run" summary, cached with a TTL.
//!
//! The cache moves `EMPTY -> COMPUTING -> POPULATED(expires_at) -> EMPTY`.
//! While computing, every caller waits on the same spawned task, so a burst
//! of requests costs one store round trip. The task runs detached from its
//! callers: an abandoned request still fills the cache.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::db::repository::{self, SummaryRow};
use crate::error::{AppError, StoreContext};
use crate::models::{DayOfWeek, MainPageScheduleSummary};

pub const DEFAULT_MIN_AGE: i64 = 4;
pub const OPEN_ENDED_AGE: i64 = 100;
pub const DEFAULT_DURATION_MINUTES: i64 = 60;
pub const DEFAULT_MAX_STUDENTS: i64 = 20;

pub type SharedSummary = Option<Arc<MainPageScheduleSummary>>;

#[async_trait]
pub trait SummarySource: Send + Sync {
    /// One row per schedule slot of every active class.
    async fn load_summary_rows(&self) -> Result<Vec<SummaryRow>, AppError>;
}

pub struct SqliteSummarySource {
    db: SqlitePool,
}

impl SqliteSummarySource {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SummarySource for SqliteSummarySource {
    async fn load_summary_rows(&self) -> Result<Vec<SummaryRow>, AppError> {
        repository::fetch_summary_rows(&self.db)
            .await
            .op("load_summary_rows")
    }
}

struct CachedSummary {
    value: SharedSummary,
    expires_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entry: Option<CachedSummary>,
    in_flight: Option<watch::Receiver<Option<SharedSummary>>>,
    // Bumped by invalidate(); a computation started under an older
    // generation must not store its result.
    generation: u64,
}

pub struct SummaryCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl SummaryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.entry = None;
        state.in_flight = None;
        state.generation += 1;
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store(&self, generation: u64, value: SharedSummary) {
        let mut state = self.lock();
        if state.generation != generation {
            debug!("discarding schedule summary computed before invalidation");
            return;
        }
        state.entry = Some(CachedSummary {
            value,
            expires_at: Instant::now() + self.ttl,
        });
        state.in_flight = None;
    }
}

pub struct ScheduleSummaryAggregator {
    source: Arc<dyn SummarySource>,
    cache: Arc<SummaryCache>,
}

impl ScheduleSummaryAggregator {
    pub fn new(source: Arc<dyn SummarySource>, cache: Arc<SummaryCache>) -> Self {
        Self { source, cache }
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Cached summary, or `None` when nothing is scheduled or the last
    /// computation failed (failures are only logged).
    pub async fn get_main_page_schedule_data(&self) -> SharedSummary {
        let mut rx = {
            let mut state = self.cache.lock();

            let fresh = state
                .entry
                .as_ref()
                .filter(|entry| entry.expires_at > Instant::now())
                .map(|entry| entry.value.clone());
            if let Some(value) = fresh {
                return value;
            }
            state.entry = None;

            // A sender that went away without answering leaves a closed channel.
            let joinable = state
                .in_flight
                .as_ref()
                .filter(|rx| rx.has_changed().is_ok())
                .cloned();

            match joinable {
                Some(rx) => rx,
                None => {
                    let (tx, rx) = watch::channel(None);
                    state.in_flight = Some(rx.clone());

                    let generation = state.generation;
                    let source = Arc::clone(&self.source);
                    let cache = Arc::clone(&self.cache);
                    tokio::spawn(async move {
                        let value = compute(source.as_ref()).await;
                        cache.store(generation, value.clone());
                        let _ = tx.send(Some(value));
                    });
                    rx
                }
            }
        };

        match rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone().flatten(),
            Err(_) => None,
        }
    }
}

async fn compute(source: &dyn SummarySource) -> SharedSummary {
    match source.load_summary_rows().await {
        Ok(rows) => summarize(&rows).map(Arc::new),
        Err(e) => {
            error!("schedule summary computation failed: {}", e);
            None
        }
    }
}

/// Reduces every active slot into one display summary.
pub fn summarize(rows: &[SummaryRow]) -> Option<MainPageScheduleSummary> {
    if rows.is_empty() {
        return None;
    }

    let days: BTreeSet<DayOfWeek> = rows.iter().map(|r| r.day_of_week).collect();
    let days = days
        .into_iter()
        .map(DayOfWeek::name)
        .collect::<Vec<_>>()
        .join(" & ");

    let times: BTreeSet<NaiveTime> = rows.iter().map(|r| r.start_time).collect();
    let time_range = match (times.first(), times.last()) {
        (Some(first), Some(last)) if first == last => format_time(*first),
        (Some(first), Some(last)) => format!("{} - {}", format_time(*first), format_time(*last)),
        _ => String::new(),
    };

    let min_age = rows
        .iter()
        .map(|r| r.min_age.unwrap_or(DEFAULT_MIN_AGE))
        .min()
        .unwrap_or(DEFAULT_MIN_AGE);
    let open_ended = rows
        .iter()
        .any(|r| r.max_age.is_none_or(|age| age >= OPEN_ENDED_AGE));
    let max_age = if open_ended {
        None
    } else {
        rows.iter().filter_map(|r| r.max_age).max()
    };
    let age_range = match max_age {
        Some(max) => format!("{}-{}", min_age, max),
        None => format!("{}+", min_age),
    };

    let durations: HashMap<&str, i64> = rows
        .iter()
        .map(|r| {
            (
                r.program_id.as_str(),
                r.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            )
        })
        .collect();
    let average = durations.values().sum::<i64>() as f64 / durations.len() as f64;
    let duration = format!("{} minutes", average.round() as i64);

    let max_students = rows
        .iter()
        .map(|r| r.max_capacity.unwrap_or(DEFAULT_MAX_STUDENTS))
        .max()
        .unwrap_or(DEFAULT_MAX_STUDENTS);

    Some(MainPageScheduleSummary {
        days,
        time_range,
        age_range,
        duration,
        max_students,
        min_age,
        max_age,
    })
}

fn format_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}
