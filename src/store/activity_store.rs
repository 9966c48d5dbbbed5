use std::{
    cmp::Reverse,
    collections::HashMap,
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::error::StoreError;

use super::entities::{ActivityRecord, AppUsageSummary, NewActivity, UNCATEGORIZED};

/// Interface for the durable, queryable log of activity records.
///
/// `append` must be durable before it returns the assigned id. The read
/// operations have no side effects. Storage failures always propagate; an
/// empty result means the range genuinely held no records.
pub trait ActivityStore {
    /// Persists one activity sample and returns its store-assigned id.
    /// A missing or empty category is stored as [UNCATEGORIZED]; a missing
    /// duration is stored as 0 and a negative one is clamped to 0.
    fn append(&mut self, activity: NewActivity)
    -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Returns up to `limit` records, newest first. `limit` must be positive.
    fn recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ActivityRecord>, StoreError>> + Send;

    /// Returns records with `start <= timestamp <= end`, newest first.
    fn by_time_range(
        &self,
        start: i64,
        end: i64,
    ) -> impl Future<Output = Result<Vec<ActivityRecord>, StoreError>> + Send;

    /// Returns per-application totals over `start <= timestamp <= end`,
    /// ordered by total time descending. Ties keep the order in which the
    /// applications first appear in the log scan.
    fn summary(
        &self,
        start: i64,
        end: i64,
    ) -> impl Future<Output = Result<Vec<AppUsageSummary>, StoreError>> + Send;
}

const LOG_FILE_NAME: &str = "activities.log";

/// The main realization of [ActivityStore]: a single append-only file with
/// one JSON record per line. Appends take an exclusive advisory lock, reads a
/// shared one, so a reader in another process never observes a half-written
/// line.
pub struct JsonlActivityStore {
    log_path: PathBuf,
    appender: File,
    next_id: u64,
}

impl JsonlActivityStore {
    /// Opens (or creates) the log under `data_dir`. The next record id is
    /// recovered by scanning the existing log, so ids keep increasing across
    /// restarts.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        let log_path = data_dir.join(LOG_FILE_NAME);

        terminate_damaged_tail(&log_path)?;

        let appender = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let next_id = last_assigned_id(&log_path)?.map_or(1, |id| id + 1);
        debug!("Opened activity log {log_path:?}, next id {next_id}");

        Ok(Self {
            log_path,
            appender: File::from_std(appender),
            next_id,
        })
    }

    async fn read_all(&self) -> Result<Vec<ActivityRecord>, StoreError> {
        let file = match File::open(&self.log_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;
        let mut lines = BufReader::new(file).lines();
        let mut records = vec![];
        while let Some(line) = lines.next_line().await? {
            match serde_json::from_str::<ActivityRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    // A shutdown can cut a write short. Tolerate the damaged
                    // line instead of losing the whole log.
                    warn!("Skipping illegal record line in {:?}: {e}", self.log_path)
                }
            }
        }
        lines.into_inner().into_inner().unlock_async().await?;
        Ok(records)
    }

    async fn records_between(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        check_range(start, end)?;
        let mut records = self.read_all().await?;
        records.retain(|record| start <= record.timestamp && record.timestamp <= end);
        records.sort_by_key(|record| record.timestamp);
        Ok(records)
    }
}

impl ActivityStore for JsonlActivityStore {
    async fn append(&mut self, activity: NewActivity) -> Result<u64, StoreError> {
        let record = ActivityRecord {
            id: self.next_id,
            timestamp: activity.timestamp,
            app_name: activity.app_name,
            window_title: activity.window_title,
            category: activity
                .category
                .filter(|category| !category.is_empty())
                .unwrap_or_else(|| UNCATEGORIZED.into()),
            duration: activity.duration.unwrap_or(0).max(0),
        };

        let mut buffer = serde_json::to_vec(&record)?;
        buffer.push(b'\n');

        // Semi-safe acquire-release for the log file.
        self.appender.lock_exclusive()?;
        let result = write_line(&mut self.appender, &buffer).await;
        self.appender.unlock_async().await?;
        result?;

        self.next_id += 1;
        Ok(record.id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ActivityRecord>, StoreError> {
        if limit == 0 {
            return Err(StoreError::InvalidArgument(
                "limit must be positive".into(),
            ));
        }
        let mut records = self.read_all().await?;
        records.sort_by_key(|record| record.timestamp);
        let cutoff = records.len().saturating_sub(limit);
        records.drain(..cutoff);
        records.reverse();
        Ok(records)
    }

    async fn by_time_range(&self, start: i64, end: i64) -> Result<Vec<ActivityRecord>, StoreError> {
        let mut records = self.records_between(start, end).await?;
        records.reverse();
        Ok(records)
    }

    async fn summary(&self, start: i64, end: i64) -> Result<Vec<AppUsageSummary>, StoreError> {
        let records = self.records_between(start, end).await?;

        let mut positions = HashMap::<Arc<str>, usize>::new();
        let mut summaries = Vec::<AppUsageSummary>::new();
        for record in records {
            let position = *positions.entry(record.app_name.clone()).or_insert_with(|| {
                summaries.push(AppUsageSummary {
                    app_name: record.app_name.clone(),
                    total_time: 0,
                    count: 0,
                });
                summaries.len() - 1
            });
            summaries[position].total_time += record.duration;
            summaries[position].count += 1;
        }

        // Stable sort, so equal totals keep first-seen scan order.
        summaries.sort_by_key(|summary| Reverse(summary.total_time));
        Ok(summaries)
    }
}

async fn write_line(file: &mut File, buffer: &[u8]) -> Result<(), StoreError> {
    file.write_all(buffer).await?;
    file.flush().await?;
    Ok(())
}

/// Scans an existing log for the highest assigned id. Returns [None] for an
/// empty or absent log.
fn last_assigned_id(log_path: &Path) -> Result<Option<u64>, StoreError> {
    use std::io::BufRead;

    let file = match std::fs::File::open(log_path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut last_id = None;
    for line in std::io::BufReader::new(file).lines() {
        let line = line?;
        match serde_json::from_str::<ActivityRecord>(&line) {
            Ok(record) => last_id = last_id.max(Some(record.id)),
            Err(e) => warn!("Skipping illegal record line in {log_path:?}: {e}"),
        }
    }
    Ok(last_id)
}

/// A shutdown can cut an append short, leaving a line without a terminator.
/// Closing that line on open keeps the next record from merging into it; the
/// damaged line itself is skipped by the readers.
fn terminate_damaged_tail(log_path: &Path) -> Result<(), StoreError> {
    use std::io::{Read, Seek, SeekFrom, Write};

    let mut file = match std::fs::OpenOptions::new().read(true).append(true).open(log_path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    if file.metadata()?.len() == 0 {
        return Ok(());
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        warn!("Activity log {log_path:?} ends mid-record, sealing the damaged line");
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn check_range(start: i64, end: i64) -> Result<(), StoreError> {
    if start > end {
        return Err(StoreError::InvalidArgument(format!(
            "range start {start} is after end {end}"
        )));
    }
    Ok(())
}
