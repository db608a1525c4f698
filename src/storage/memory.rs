//! In-memory reference backend
//!
//! Implements all three store traits behind a single `tokio::sync::RwLock`.
//! Scan order is insertion order, which gives `query_jobs` a stable,
//! deterministic pagination. Intended for tests and embedding applications
//! that do not need durable persistence.

use crate::error::{MathesisError, Result};
use crate::storage::{ClassifierDataStore, JobCursor, JobPage, JobStore, MappingStore};
use crate::types::{
    ClassifierData, ClassifierTrainingJob, JobId, NewTrainingJob, TrainingJobExplorationMapping,
    TrainingJobStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Default number of jobs returned per `query_jobs` page
pub const DEFAULT_PAGE_SIZE: usize = 20;

type MappingKey = (String, u32, String);

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, ClassifierTrainingJob>,
    scan_order: Vec<JobId>,
    mappings: HashMap<MappingKey, TrainingJobExplorationMapping>,
    classifiers: HashMap<JobId, ClassifierData>,
}

/// In-memory store for jobs, mappings, and classifier data
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    page_size: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Construct with a custom scan page size (small sizes exercise
    /// pagination in tests)
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            page_size: page_size.max(1),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn mapping_key(mapping: &TrainingJobExplorationMapping) -> MappingKey {
    (
        mapping.exploration_id.clone(),
        mapping.exploration_version,
        mapping.state_name.clone(),
    )
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn get_job(&self, id: JobId) -> Result<ClassifierTrainingJob> {
        let inner = self.inner.read().await;
        inner
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| MathesisError::NotFound(format!("training job {}", id)))
    }

    async fn get_jobs(&self, ids: &[JobId]) -> Result<Vec<Option<ClassifierTrainingJob>>> {
        let inner = self.inner.read().await;
        Ok(ids.iter().map(|id| inner.jobs.get(id).cloned()).collect())
    }

    async fn create_job(&self, job: NewTrainingJob) -> Result<JobId> {
        let ids = self.create_jobs(vec![job]).await?;
        Ok(ids[0])
    }

    async fn create_jobs(&self, jobs: Vec<NewTrainingJob>) -> Result<Vec<JobId>> {
        let mut inner = self.inner.write().await;
        let mut ids = Vec::with_capacity(jobs.len());
        for new_job in jobs {
            let id = JobId::new();
            inner
                .jobs
                .insert(id, ClassifierTrainingJob::from_new(id, new_job));
            inner.scan_order.push(id);
            ids.push(id);
        }
        debug!(count = ids.len(), "created training jobs");
        Ok(ids)
    }

    async fn put_jobs(&self, jobs: Vec<ClassifierTrainingJob>) -> Result<()> {
        let mut inner = self.inner.write().await;
        // All-or-nothing: verify every ID before touching the map.
        for job in &jobs {
            if !inner.jobs.contains_key(&job.job_id) {
                return Err(MathesisError::NotFound(format!(
                    "training job {}",
                    job.job_id
                )));
            }
        }
        for job in jobs {
            inner.jobs.insert(job.job_id, job);
        }
        Ok(())
    }

    async fn query_jobs(&self, cursor: Option<JobCursor>) -> Result<JobPage> {
        let inner = self.inner.read().await;
        let offset = cursor.map(|c| c.0 as usize).unwrap_or(0);
        let end = (offset + self.page_size).min(inner.scan_order.len());
        let jobs = inner.scan_order[offset.min(end)..end]
            .iter()
            .filter_map(|id| inner.jobs.get(id).cloned())
            .collect();
        let more = end < inner.scan_order.len();
        Ok(JobPage {
            jobs,
            cursor: more.then_some(JobCursor(end as u64)),
            more,
        })
    }

    async fn lease_job(
        &self,
        id: JobId,
        expected_status: TrainingJobStatus,
        expected_check_time: DateTime<Utc>,
        next_scheduled_check_time: DateTime<Utc>,
    ) -> Result<Option<ClassifierTrainingJob>> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| MathesisError::NotFound(format!("training job {}", id)))?;
        if job.status != expected_status || job.next_scheduled_check_time != expected_check_time {
            debug!(%id, expected = %expected_status, actual = %job.status, "lease lost");
            return Ok(None);
        }
        job.next_scheduled_check_time = next_scheduled_check_time;
        Ok(Some(job.clone()))
    }

    async fn delete_job(&self, id: JobId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.jobs.remove(&id).is_some() {
            inner.scan_order.retain(|other| *other != id);
        }
        Ok(())
    }
}

#[async_trait]
impl MappingStore for InMemoryStore {
    async fn get_mappings(
        &self,
        exploration_id: &str,
        exploration_version: u32,
        state_names: &[String],
    ) -> Result<Vec<Option<TrainingJobExplorationMapping>>> {
        let inner = self.inner.read().await;
        Ok(state_names
            .iter()
            .map(|name| {
                inner
                    .mappings
                    .get(&(
                        exploration_id.to_string(),
                        exploration_version,
                        name.clone(),
                    ))
                    .cloned()
            })
            .collect())
    }

    async fn create_mappings(&self, mappings: Vec<TrainingJobExplorationMapping>) -> Result<()> {
        let mut inner = self.inner.write().await;
        // At most one mapping per key, including duplicates within the batch.
        let mut keys = Vec::with_capacity(mappings.len());
        for mapping in &mappings {
            let key = mapping_key(mapping);
            if inner.mappings.contains_key(&key) || keys.contains(&key) {
                return Err(MathesisError::AlreadyExists(format!(
                    "mapping for ({}, {}, {})",
                    key.0, key.1, key.2
                )));
            }
            keys.push(key);
        }
        for mapping in mappings {
            inner.mappings.insert(mapping_key(&mapping), mapping);
        }
        Ok(())
    }
}

#[async_trait]
impl ClassifierDataStore for InMemoryStore {
    async fn get_classifier(&self, id: JobId) -> Result<ClassifierData> {
        self.try_get_classifier(id)
            .await?
            .ok_or_else(|| MathesisError::NotFound(format!("classifier data {}", id)))
    }

    async fn try_get_classifier(&self, id: JobId) -> Result<Option<ClassifierData>> {
        let inner = self.inner.read().await;
        Ok(inner.classifiers.get(&id).cloned())
    }

    async fn create_classifier(&self, data: ClassifierData) -> Result<JobId> {
        let mut inner = self.inner.write().await;
        if inner.classifiers.contains_key(&data.id) {
            return Err(MathesisError::AlreadyExists(format!(
                "classifier data {}",
                data.id
            )));
        }
        let id = data.id;
        inner.classifiers.insert(id, data);
        Ok(id)
    }

    async fn delete_classifier(&self, id: JobId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.classifiers.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrainingExample;

    fn new_job(state_name: &str, status: TrainingJobStatus) -> NewTrainingJob {
        NewTrainingJob {
            algorithm_id: "TextClassifier".to_string(),
            interaction_id: "TextInput".to_string(),
            exploration_id: "exp1".to_string(),
            exploration_version: 1,
            next_scheduled_check_time: Utc::now(),
            state_name: state_name.to_string(),
            status,
            training_data: vec![TrainingExample::new("doc", vec!["0".to_string()])],
        }
    }

    #[tokio::test]
    async fn test_create_and_get_job() {
        let store = InMemoryStore::new();
        let id = store
            .create_job(new_job("Home", TrainingJobStatus::New))
            .await
            .unwrap();

        let job = store.get_job(id).await.unwrap();
        assert_eq!(job.job_id, id);
        assert_eq!(job.state_name, "Home");

        // Reads are idempotent without intervening writes.
        let again = store.get_job(id).await.unwrap();
        assert_eq!(job, again);
    }

    #[tokio::test]
    async fn test_get_jobs_preserves_order_and_gaps() {
        let store = InMemoryStore::new();
        let id = store
            .create_job(new_job("Home", TrainingJobStatus::New))
            .await
            .unwrap();
        let missing = JobId::new();

        let jobs = store.get_jobs(&[missing, id]).await.unwrap();
        assert!(jobs[0].is_none());
        assert_eq!(jobs[1].as_ref().unwrap().job_id, id);
    }

    #[tokio::test]
    async fn test_query_jobs_pagination() {
        let store = InMemoryStore::with_page_size(2);
        for i in 0..5 {
            store
                .create_job(new_job(&format!("State{}", i), TrainingJobStatus::New))
                .await
                .unwrap();
        }

        let page1 = store.query_jobs(None).await.unwrap();
        assert_eq!(page1.jobs.len(), 2);
        assert!(page1.more);

        let page2 = store.query_jobs(page1.cursor).await.unwrap();
        assert_eq!(page2.jobs.len(), 2);
        assert!(page2.more);

        let page3 = store.query_jobs(page2.cursor).await.unwrap();
        assert_eq!(page3.jobs.len(), 1);
        assert!(!page3.more);
        assert!(page3.cursor.is_none());

        // Insertion order is preserved across pages.
        assert_eq!(page1.jobs[0].state_name, "State0");
        assert_eq!(page3.jobs[0].state_name, "State4");
    }

    #[tokio::test]
    async fn test_lease_job_compare_and_swap() {
        let store = InMemoryStore::new();
        let id = store
            .create_job(new_job("Home", TrainingJobStatus::New))
            .await
            .unwrap();

        let scanned = store.get_job(id).await.unwrap();
        let lease_until = Utc::now() + chrono::Duration::minutes(5);
        let leased = store
            .lease_job(
                id,
                TrainingJobStatus::New,
                scanned.next_scheduled_check_time,
                lease_until,
            )
            .await
            .unwrap();
        assert_eq!(leased.unwrap().next_scheduled_check_time, lease_until);

        // A second worker still holding the pre-lease check time loses the
        // compare-and-swap.
        let lost = store
            .lease_job(
                id,
                TrainingJobStatus::New,
                scanned.next_scheduled_check_time,
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(lost.is_none());

        // So does one that scanned before the job was dispatched.
        let mut job = store.get_job(id).await.unwrap();
        job.status = TrainingJobStatus::Pending;
        store.put_jobs(vec![job.clone()]).await.unwrap();

        let lost = store
            .lease_job(
                id,
                TrainingJobStatus::New,
                job.next_scheduled_check_time,
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(lost.is_none());
    }

    #[tokio::test]
    async fn test_put_jobs_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let id = store
            .create_job(new_job("Home", TrainingJobStatus::New))
            .await
            .unwrap();

        let mut stored = store.get_job(id).await.unwrap();
        stored.status = TrainingJobStatus::Pending;

        let mut phantom = stored.clone();
        phantom.job_id = JobId::new();

        let err = store.put_jobs(vec![stored, phantom]).await.unwrap_err();
        assert!(matches!(err, MathesisError::NotFound(_)));

        // The valid job in the failed batch was not applied either.
        let reread = store.get_job(id).await.unwrap();
        assert_eq!(reread.status, TrainingJobStatus::New);
    }

    #[tokio::test]
    async fn test_mapping_uniqueness() {
        let store = InMemoryStore::new();
        let job_id = JobId::new();
        let mapping = TrainingJobExplorationMapping::new("exp1", 1, "Home", job_id);

        store.create_mappings(vec![mapping.clone()]).await.unwrap();

        let err = store.create_mappings(vec![mapping]).await.unwrap_err();
        assert!(matches!(err, MathesisError::AlreadyExists(_)));

        // A different version for the same state is a distinct key.
        store
            .create_mappings(vec![TrainingJobExplorationMapping::new(
                "exp1", 2, "Home", job_id,
            )])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_classifier_data_created_at_most_once() {
        let store = InMemoryStore::new();
        let data = ClassifierData {
            id: JobId::new(),
            exploration_id: "exp1".to_string(),
            exploration_version_when_created: 1,
            state_name: "Home".to_string(),
            algorithm_id: "TextClassifier".to_string(),
            classifier_data: serde_json::json!({"centroids": {}}),
            data_schema_version: 1,
        };

        store.create_classifier(data.clone()).await.unwrap();
        let err = store.create_classifier(data.clone()).await.unwrap_err();
        assert!(matches!(err, MathesisError::AlreadyExists(_)));

        store.delete_classifier(data.id).await.unwrap();
        assert!(store.try_get_classifier(data.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_job_is_idempotent() {
        let store = InMemoryStore::new();
        let id = store
            .create_job(new_job("Home", TrainingJobStatus::New))
            .await
            .unwrap();

        store.delete_job(id).await.unwrap();
        store.delete_job(id).await.unwrap();
        assert!(store.get_job(id).await.is_err());
        assert!(store.query_jobs(None).await.unwrap().jobs.is_empty());
    }
}
