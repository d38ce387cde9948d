//! Ingestion and query orchestration
//!
//! [`OutageService`] owns the fetch, parse, normalize, store pipeline and
//! the read paths the API serves from. Ingestion is triggered, never
//! streaming: each trigger runs one full cycle against the source page.
//!
//! Concurrent triggers are collapsed into a single upstream fetch. The
//! first caller becomes the leader and runs the cycle; callers arriving
//! while it runs subscribe to a watch channel and share the leader's
//! outcome. A fetched page whose content hash matches the previously
//! applied one short-circuits the cycle and only refreshes the
//! last-scrape timestamp.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::fetcher::SourceFetcher;
use crate::models::{IngestHealth, QueueId, QueueStatus, ScheduleEntry};
use crate::normalize::{normalize, status_at, total_hours_off};
use crate::parser::PublicationParser;
use crate::storage::OutageStore;

/// Outcome of one ingestion cycle
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Dates whose snapshots were replaced in this cycle
    pub dates: Vec<NaiveDate>,
    /// True when the fetched page matched the previously applied content
    pub unchanged: bool,
}

/// Outcome broadcast to triggers that joined a running cycle. Errors
/// cross the channel as strings since [`Error`] is not clonable.
type SharedOutcome = std::result::Result<IngestReport, String>;

/// Orchestrates ingestion cycles and serves schedule queries
pub struct OutageService {
    fetcher: SourceFetcher,
    parser: PublicationParser,
    store: Arc<OutageStore>,
    timezone: Tz,
    /// Receiver for the cycle currently in flight, if any
    inflight: Mutex<Option<watch::Receiver<Option<SharedOutcome>>>>,
}

impl OutageService {
    pub fn new(fetcher: SourceFetcher, store: Arc<OutageStore>, timezone: Tz) -> Self {
        Self {
            fetcher,
            parser: PublicationParser::new(),
            store,
            timezone,
            inflight: Mutex::new(None),
        }
    }

    /// Run one ingestion cycle, or join the cycle already in flight
    ///
    /// On any failure the stored schedules are left exactly as they were;
    /// readers keep serving the last applied snapshot.
    pub async fn trigger_update(&self) -> Result<IngestReport> {
        enum Role {
            Leader(watch::Sender<Option<SharedOutcome>>),
            Follower(watch::Receiver<Option<SharedOutcome>>),
        }

        // The lock guard never crosses an await point.
        let role = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.as_ref() {
                Some(rx) => Role::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *inflight = Some(rx);
                    Role::Leader(tx)
                }
            }
        };

        let mut rx = match role {
            Role::Leader(tx) => return self.lead_cycle(tx).await,
            Role::Follower(rx) => rx,
        };

        // Follower path: wait for the leader's outcome.
        let outcome = rx
            .wait_for(|outcome| outcome.is_some())
            .await
            .map_err(|_| Error::Ingest("ingestion cycle abandoned".to_string()))?;

        match outcome.as_ref() {
            Some(Ok(report)) => Ok(report.clone()),
            Some(Err(msg)) => Err(Error::Ingest(msg.clone())),
            None => unreachable!(),
        }
    }

    /// Run the cycle as leader and broadcast the outcome
    async fn lead_cycle(
        &self,
        tx: watch::Sender<Option<SharedOutcome>>,
    ) -> Result<IngestReport> {
        let result = self.run_cycle().await;

        // Clear the in-flight marker before broadcasting so a trigger
        // arriving after the broadcast starts a fresh cycle.
        *self.inflight.lock().unwrap() = None;

        let shared = match &result {
            Ok(report) => Ok(report.clone()),
            Err(e) => Err(e.to_string()),
        };
        let _ = tx.send(Some(shared));

        result
    }

    #[instrument(skip(self))]
    async fn run_cycle(&self) -> Result<IngestReport> {
        let html = self.fetcher.fetch_page().await?;
        let hash = content_hash(&html);
        let now = Utc::now();

        if self.store.source_hash()?.as_deref() == Some(hash.as_str()) {
            info!("source content unchanged, refreshing last-scrape only");
            self.store.touch_last_scrape(now)?;
            return Ok(IngestReport {
                dates: Vec::new(),
                unchanged: true,
            });
        }

        let days = self.parser.parse_publication(&html)?;

        let mut dates = Vec::with_capacity(days.len());
        for day in days {
            let normalized = day
                .queues
                .into_iter()
                .map(|(queue, intervals)| (queue, normalize(intervals)))
                .collect();

            self.store
                .apply_snapshot(day.date, &normalized, day.message.as_deref(), now)?;
            dates.push(day.date);
        }
        dates.sort();

        self.store.set_source_hash(&hash)?;
        info!(dates = ?dates, "ingestion cycle applied");

        Ok(IngestReport {
            dates,
            unchanged: false,
        })
    }

    /// Today's date in the utility's civil timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    /// Render a stored timestamp in the utility's civil timezone
    ///
    /// Everything the API exposes uses civil time, regardless of where
    /// the process runs; storage keeps UTC internally.
    pub fn to_civil(&self, at: DateTime<Utc>) -> DateTime<Tz> {
        at.with_timezone(&self.timezone)
    }

    /// Stored entry for one queue and date
    pub fn entry(&self, queue: QueueId, date: NaiveDate) -> Result<Option<ScheduleEntry>> {
        self.store.entry(queue, date)
    }

    /// All stored entries for a date
    pub fn entries_for_date(&self, date: NaiveDate) -> Result<Vec<ScheduleEntry>> {
        self.store.entries_for_date(date)
    }

    /// Operational message for a date, independent of any queue
    pub fn message(&self, date: NaiveDate) -> Result<Option<String>> {
        self.store.message(date)
    }

    /// Dates with stored schedules, most recent first
    pub fn available_dates(&self) -> Result<Vec<NaiveDate>> {
        self.store.list_dates()
    }

    /// Ingestion health for the status endpoint
    pub fn health(&self) -> Result<IngestHealth> {
        self.store.health()
    }

    /// Current status of a stored entry, relative to now in the utility's
    /// civil timezone
    pub fn status_of(&self, entry: &ScheduleEntry) -> QueueStatus {
        status_at(
            entry.date,
            &entry.intervals,
            Utc::now().with_timezone(&self.timezone),
        )
    }

    /// Total outage hours of an entry, one decimal place
    pub fn hours_off(&self, entry: &ScheduleEntry) -> f64 {
        total_hours_off(&entry.intervals)
    }

    /// Timestamp of the last successful ingestion
    pub fn last_scrape(&self) -> Result<Option<DateTime<Utc>>> {
        self.store.last_scrape()
    }
}

impl std::fmt::Debug for OutageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutageService")
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

/// SHA-256 hex digest of the fetched page, used for unchanged-content
/// detection between cycles
fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_and_distinguishes() {
        let a = content_hash("графік один");
        let b = content_hash("графік два");

        assert_eq!(a, content_hash("графік один"));
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
