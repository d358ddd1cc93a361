//! In-process table of ingestion jobs.
//!
//! Jobs are created `queued`, moved to `running` when the pipeline starts and
//! end `succeeded` or `failed`. Each job keeps timestamped log lines. Finished
//! jobs older than the retention window are evicted whenever a job is created
//! or the table is listed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kubepath_core::IngestionMode;

use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// A point-in-time copy of one job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJob {
    pub id: Uuid,
    pub cluster: String,
    /// Where resources were collected from (kubeconfig or snapshot path).
    pub source: String,
    pub mode: IngestionMode,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub logs: Vec<String>,
}

const MAX_RETENTION_HOURS: u64 = 24 * 365 * 100;

/// Shared, mutex-protected job table. Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct JobStore {
    jobs: Arc<Mutex<HashMap<Uuid, IngestionJob>>>,
    retention: Duration,
}

impl JobStore {
    /// Retention is capped at one hundred years.
    pub fn new(retention_hours: u64) -> Self {
        let hours = retention_hours.min(MAX_RETENTION_HOURS) as i64;
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            retention: Duration::hours(hours),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, IngestionJob>> {
        // Records stay readable after a panic elsewhere.
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new `queued` job.
    pub fn create(&self, cluster: &str, source: &str, mode: IngestionMode) -> IngestionJob {
        let job = IngestionJob {
            id: Uuid::new_v4(),
            cluster: cluster.to_string(),
            source: source.to_string(),
            mode,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            logs: Vec::new(),
        };
        let mut jobs = self.lock();
        jobs.insert(job.id, job.clone());
        self.evict(&mut jobs, Utc::now());
        job
    }

    /// Record a status transition. `running` stamps the start time; a
    /// finished status stamps the finish time.
    pub fn update_status(&self, id: Uuid, status: JobStatus) -> Result<()> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| IngestError::JobNotFound(id.to_string()))?;
        job.status = status;
        let now = Utc::now();
        if status == JobStatus::Running {
            job.started_at = Some(now);
        }
        if status.is_finished() {
            job.finished_at = Some(now);
        }
        Ok(())
    }

    /// Append a timestamped log line.
    pub fn append_log(&self, id: Uuid, message: &str) -> Result<()> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| IngestError::JobNotFound(id.to_string()))?;
        job.logs.push(format!("{} {message}", Utc::now().to_rfc3339()));
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<IngestionJob> {
        self.lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| IngestError::JobNotFound(id.to_string()))
    }

    /// All retained jobs, newest first.
    pub fn list(&self) -> Vec<IngestionJob> {
        let mut jobs = self.lock();
        self.evict(&mut jobs, Utc::now());
        let mut listed: Vec<IngestionJob> = jobs.values().cloned().collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed
    }

    fn evict(&self, jobs: &mut HashMap<Uuid, IngestionJob>, now: DateTime<Utc>) {
        let threshold = now - self.retention;
        let before = jobs.len();
        jobs.retain(|_, job| job.finished_at.map_or(true, |done| done >= threshold));
        let evicted = before - jobs.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted finished ingestion jobs");
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(24)
    }
}
