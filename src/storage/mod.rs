//! Storage layer for the classifier subsystem
//!
//! Provides the abstractions the orchestrator consumes for persisting
//! training jobs, job-to-exploration mappings, and trained classifier data.
//! Real datastore backends live with the embedding application; this crate
//! ships an in-memory reference backend used by tests.

pub mod memory;

use crate::error::Result;
use crate::types::{
    ClassifierData, ClassifierTrainingJob, JobId, NewTrainingJob, TrainingJobExplorationMapping,
    TrainingJobStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Opaque cursor into a paginated job scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobCursor(pub u64);

/// One page of a job scan, in storage order
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<ClassifierTrainingJob>,

    /// Cursor for the next page; `None` when the scan is exhausted
    pub cursor: Option<JobCursor>,

    /// Whether further pages remain
    pub more: bool,
}

/// Keyed persistence for classifier training jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Retrieve a job by ID; errors with `NotFound` if absent
    async fn get_job(&self, id: JobId) -> Result<ClassifierTrainingJob>;

    /// Retrieve many jobs, preserving input order; missing IDs yield `None`
    async fn get_jobs(&self, ids: &[JobId]) -> Result<Vec<Option<ClassifierTrainingJob>>>;

    /// Create a single job, returning its assigned ID
    async fn create_job(&self, job: NewTrainingJob) -> Result<JobId>;

    /// Create a batch of jobs atomically, returning assigned IDs in order
    async fn create_jobs(&self, jobs: Vec<NewTrainingJob>) -> Result<Vec<JobId>>;

    /// Replace a batch of stored jobs atomically; every ID must exist
    async fn put_jobs(&self, jobs: Vec<ClassifierTrainingJob>) -> Result<()>;

    /// Scan jobs in storage order, one page at a time
    async fn query_jobs(&self, cursor: Option<JobCursor>) -> Result<JobPage>;

    /// Atomically lease a job: compare the stored status and check time
    /// against the values the caller scanned and, only on a match, advance
    /// `next_scheduled_check_time`. Returns the refreshed job, or `None`
    /// when the compare-and-swap loses (a concurrent worker got there
    /// first). This is the primitive that keeps concurrent dequeue correct.
    async fn lease_job(
        &self,
        id: JobId,
        expected_status: TrainingJobStatus,
        expected_check_time: DateTime<Utc>,
        next_scheduled_check_time: DateTime<Utc>,
    ) -> Result<Option<ClassifierTrainingJob>>;

    /// Delete a job; a no-op for IDs that do not exist
    async fn delete_job(&self, id: JobId) -> Result<()>;
}

/// Keyed persistence for training-job-to-exploration mappings
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Fetch mappings for the given states of one exploration version,
    /// index-aligned with `state_names`; missing keys yield `None`
    async fn get_mappings(
        &self,
        exploration_id: &str,
        exploration_version: u32,
        state_names: &[String],
    ) -> Result<Vec<Option<TrainingJobExplorationMapping>>>;

    /// Create a batch of mappings atomically; errors with `AlreadyExists`
    /// when any (exploration, version, state) key is already mapped
    async fn create_mappings(&self, mappings: Vec<TrainingJobExplorationMapping>) -> Result<()>;
}

/// Keyed persistence for trained classifier data
#[async_trait]
pub trait ClassifierDataStore: Send + Sync {
    /// Retrieve classifier data by its owning job ID; errors if absent
    async fn get_classifier(&self, id: JobId) -> Result<ClassifierData>;

    /// Retrieve classifier data, or `None` if absent
    async fn try_get_classifier(&self, id: JobId) -> Result<Option<ClassifierData>>;

    /// Create classifier data; errors with `AlreadyExists` on a duplicate ID
    async fn create_classifier(&self, data: ClassifierData) -> Result<JobId>;

    /// Delete classifier data; a no-op for IDs that do not exist
    async fn delete_classifier(&self, id: JobId) -> Result<()>;
}
