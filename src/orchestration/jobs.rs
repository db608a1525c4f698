//! Training job orchestrator
//!
//! Owns the classifier training-job lifecycle: creating jobs when an
//! exploration version introduces newly trainable states, re-mapping
//! carried-over states to existing jobs instead of retraining, advancing job
//! status under the configured transition table, and handing out work to
//! training workers via a lease-based dequeue.

use crate::config::ClassifierConfig;
use crate::content::Exploration;
use crate::error::{MathesisError, Result};
use crate::services::AlgorithmRegistry;
use crate::storage::{ClassifierDataStore, JobStore, MappingStore};
use crate::types::{
    ClassifierData, ClassifierTrainingJob, JobId, NewTrainingJob, TrainingExample,
    TrainingJobExplorationMapping, TrainingJobStatus,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Orchestrates the classifier training-job lifecycle over abstract stores
pub struct TrainingJobOrchestrator {
    config: Arc<ClassifierConfig>,
    jobs: Arc<dyn JobStore>,
    mappings: Arc<dyn MappingStore>,
    classifiers: Arc<dyn ClassifierDataStore>,
}

impl TrainingJobOrchestrator {
    pub fn new(
        config: Arc<ClassifierConfig>,
        jobs: Arc<dyn JobStore>,
        mappings: Arc<dyn MappingStore>,
        classifiers: Arc<dyn ClassifierDataStore>,
    ) -> Self {
        Self {
            config,
            jobs,
            mappings,
            classifiers,
        }
    }

    /// Create NEW training jobs for states whose training data changed in
    /// this exploration version (all trainable states when the version is 1),
    /// plus one mapping per created job.
    ///
    /// Jobs and mappings are each persisted as one atomic batch. There is no
    /// rollback across the two batches: a failure after job creation leaves
    /// unmapped jobs behind.
    pub async fn handle_trainable_states(
        &self,
        exploration: &Exploration,
        state_names: &[String],
    ) -> Result<Vec<JobId>> {
        let mut candidates = Vec::with_capacity(state_names.len());
        for state_name in state_names {
            let state = exploration.state(state_name).ok_or_else(|| {
                MathesisError::NotFound(format!(
                    "state '{}' in exploration {}",
                    state_name, exploration.id
                ))
            })?;
            let interaction_id = state.interaction.id.clone();
            let algorithm_id = self
                .config
                .algorithm_id_for_interaction(&interaction_id)
                .ok_or_else(|| {
                    MathesisError::Config(format!(
                        "no algorithm configured for interaction '{}'",
                        interaction_id
                    ))
                })?
                .to_string();

            let candidate = NewTrainingJob {
                algorithm_id,
                interaction_id,
                exploration_id: exploration.id.clone(),
                exploration_version: exploration.version,
                next_scheduled_check_time: Utc::now(),
                state_name: state_name.clone(),
                status: TrainingJobStatus::New,
                training_data: state.training_data(),
            };
            candidate.validate(&self.config)?;
            candidates.push(candidate);
        }

        let job_ids = self.jobs.create_jobs(candidates).await?;
        info!(
            exploration_id = %exploration.id,
            exploration_version = exploration.version,
            count = job_ids.len(),
            "created training jobs"
        );

        let mut job_mappings = Vec::with_capacity(job_ids.len());
        for (state_name, job_id) in state_names.iter().zip(&job_ids) {
            let mapping = TrainingJobExplorationMapping::new(
                exploration.id.clone(),
                exploration.version,
                state_name.clone(),
                *job_id,
            );
            mapping.validate()?;
            job_mappings.push(mapping);
        }
        self.mappings.create_mappings(job_mappings).await?;

        Ok(job_ids)
    }

    /// Map carried-over states of a new exploration version to the previous
    /// version's training jobs, sharing trained classifiers instead of
    /// retraining.
    ///
    /// `new_to_old_state_names` resolves renames between the versions. A
    /// state whose old-version job is missing is logged and skipped rather
    /// than failing the batch; the number of skipped states is returned so
    /// callers can surface the inconsistency.
    pub async fn handle_non_retrainable_states(
        &self,
        exploration: &Exploration,
        state_names: &[String],
        new_to_old_state_names: &HashMap<String, String>,
    ) -> Result<usize> {
        if exploration.version <= 1 {
            return Err(MathesisError::Precondition(format!(
                "carried-over states cannot exist for exploration version {}",
                exploration.version
            )));
        }
        let old_version = exploration.version - 1;

        let mut old_state_names = Vec::with_capacity(state_names.len());
        for current_state_name in state_names {
            let old_state_name =
                new_to_old_state_names
                    .get(current_state_name)
                    .ok_or_else(|| {
                        MathesisError::NotFound(format!(
                            "previous-version name for state '{}'",
                            current_state_name
                        ))
                    })?;
            old_state_names.push(old_state_name.clone());
        }

        let old_jobs = self
            .get_classifier_training_jobs(&exploration.id, old_version, &old_state_names)
            .await?;

        let mut job_mappings = Vec::new();
        let mut skipped = 0usize;
        for (index, old_job) in old_jobs.iter().enumerate() {
            let Some(old_job) = old_job else {
                error!(
                    state_name = %old_state_names[index],
                    exploration_id = %exploration.id,
                    exploration_version = old_version,
                    "no training job found for carried-over state"
                );
                skipped += 1;
                continue;
            };
            let mapping = TrainingJobExplorationMapping::new(
                exploration.id.clone(),
                exploration.version,
                state_names[index].clone(),
                old_job.job_id,
            );
            mapping.validate()?;
            job_mappings.push(mapping);
        }

        self.mappings.create_mappings(job_mappings).await?;
        Ok(skipped)
    }

    /// Look up the training jobs mapped to the given states of one
    /// exploration version, index-aligned with `state_names`. States without
    /// a mapping (or whose mapped job record is gone) yield `None`.
    pub async fn get_classifier_training_jobs(
        &self,
        exploration_id: &str,
        exploration_version: u32,
        state_names: &[String],
    ) -> Result<Vec<Option<ClassifierTrainingJob>>> {
        let state_mappings = self
            .mappings
            .get_mappings(exploration_id, exploration_version, state_names)
            .await?;

        let job_ids: Vec<JobId> = state_mappings
            .iter()
            .flatten()
            .map(|mapping| mapping.job_id)
            .collect();
        let mut found_jobs = self.jobs.get_jobs(&job_ids).await?.into_iter();

        Ok(state_mappings
            .iter()
            .map(|mapping| match mapping {
                Some(_) => found_jobs.next().flatten(),
                None => None,
            })
            .collect())
    }

    /// Retrieve a training job by ID
    pub async fn get_training_job(&self, job_id: JobId) -> Result<ClassifierTrainingJob> {
        self.jobs.get_job(job_id).await
    }

    /// Create a single training job outside the exploration-save flow
    pub async fn create_training_job(
        &self,
        algorithm_id: &str,
        interaction_id: &str,
        exploration_id: &str,
        exploration_version: u32,
        state_name: &str,
        training_data: Vec<TrainingExample>,
        status: TrainingJobStatus,
    ) -> Result<JobId> {
        let candidate = NewTrainingJob {
            algorithm_id: algorithm_id.to_string(),
            interaction_id: interaction_id.to_string(),
            exploration_id: exploration_id.to_string(),
            exploration_version,
            next_scheduled_check_time: Utc::now(),
            state_name: state_name.to_string(),
            status,
            training_data,
        };
        candidate.validate(&self.config)?;
        self.jobs.create_job(candidate).await
    }

    /// Delete a training job and any classifier data it produced; a no-op
    /// for IDs that do not exist
    pub async fn delete_training_job(&self, job_id: JobId) -> Result<()> {
        self.classifiers.delete_classifier(job_id).await?;
        self.jobs.delete_job(job_id).await
    }

    /// Move a batch of jobs to `status`, enforcing the configured transition
    /// table.
    ///
    /// Fail-fast with no partial commit: every job in the batch is validated
    /// before anything is written, and the first missing job or illegal
    /// transition aborts the whole call.
    async fn update_jobs_status(
        &self,
        job_ids: &[JobId],
        status: TrainingJobStatus,
    ) -> Result<()> {
        let stored = self.jobs.get_jobs(job_ids).await?;

        let mut updated = Vec::with_capacity(job_ids.len());
        for (index, job) in stored.into_iter().enumerate() {
            let mut job = job.ok_or_else(|| {
                MathesisError::NotFound(format!("training job {}", job_ids[index]))
            })?;
            job.update_status(status, &self.config)?;
            job.validate(&self.config)?;
            updated.push(job);
        }

        self.jobs.put_jobs(updated).await
    }

    /// Mark a job as dispatched to a worker
    pub async fn mark_training_job_pending(&self, job_id: JobId) -> Result<()> {
        self.update_jobs_status(&[job_id], TrainingJobStatus::Pending)
            .await
    }

    /// Mark a job as successfully trained
    pub async fn mark_training_job_complete(&self, job_id: JobId) -> Result<()> {
        self.update_jobs_status(&[job_id], TrainingJobStatus::Complete)
            .await
    }

    /// Mark a batch of jobs as failed
    pub async fn mark_training_jobs_failed(&self, job_ids: &[JobId]) -> Result<()> {
        self.update_jobs_status(job_ids, TrainingJobStatus::Failed)
            .await
    }

    /// Dequeue the next runnable training job.
    ///
    /// Scans job records page by page in storage order, up to the configured
    /// page cap. PENDING jobs whose lease has expired are presumed dead and
    /// bulk-marked FAILED (skipping any a concurrent worker reclaimed
    /// first); PENDING jobs within their lease are left alone.
    /// NEW and FAILED jobs are runnable. The first runnable job is leased by
    /// advancing its `next_scheduled_check_time` through the store's
    /// compare-and-swap; losing the race to a concurrent worker falls
    /// through to the next runnable job from the same scan. Returns `None`
    /// when nothing is runnable.
    pub async fn fetch_next_job(&self) -> Result<Option<ClassifierTrainingJob>> {
        let now = Utc::now();
        let mut cursor = None;
        let mut runnable_jobs = Vec::new();
        let mut stale_job_ids = Vec::new();
        let mut pages_scanned = 0usize;

        loop {
            let page = self.jobs.query_jobs(cursor).await?;
            for job in page.jobs {
                match job.status {
                    TrainingJobStatus::Pending => {
                        if job.next_scheduled_check_time <= now {
                            stale_job_ids.push(job.job_id);
                        }
                    }
                    TrainingJobStatus::New | TrainingJobStatus::Failed => {
                        runnable_jobs.push(job);
                    }
                    TrainingJobStatus::Complete => {}
                }
            }
            pages_scanned += 1;
            cursor = page.cursor;
            if !runnable_jobs.is_empty()
                || !page.more
                || pages_scanned >= self.config.max_scan_pages
            {
                break;
            }
        }

        if !stale_job_ids.is_empty() {
            self.reclaim_stale_jobs(&stale_job_ids, now).await?;
        }

        for job in runnable_jobs {
            let lease_until = now + self.config.job_lease_ttl;
            if let Some(leased) = self
                .jobs
                .lease_job(
                    job.job_id,
                    job.status,
                    job.next_scheduled_check_time,
                    lease_until,
                )
                .await?
            {
                debug!(job_id = %leased.job_id, "leased training job");
                return Ok(Some(leased));
            }
        }
        Ok(None)
    }

    /// Mark expired PENDING jobs from a scan as FAILED.
    ///
    /// A concurrent worker may have reclaimed (or re-dispatched) any of
    /// these jobs since the scan observed them, so each one is re-checked at
    /// update time and silently skipped unless it is still an expired
    /// PENDING job. Losing this race must never fail the dequeue.
    async fn reclaim_stale_jobs(&self, job_ids: &[JobId], now: DateTime<Utc>) -> Result<()> {
        let stored = self.jobs.get_jobs(job_ids).await?;

        let mut reclaimed = Vec::new();
        for job in stored.into_iter().flatten() {
            if job.status != TrainingJobStatus::Pending || job.next_scheduled_check_time > now {
                debug!(job_id = %job.job_id, "stale job already reclaimed elsewhere");
                continue;
            }
            let mut job = job;
            job.update_status(TrainingJobStatus::Failed, &self.config)?;
            reclaimed.push(job);
        }

        if !reclaimed.is_empty() {
            warn!(
                count = reclaimed.len(),
                "reclaiming stale pending jobs as failed"
            );
            self.jobs.put_jobs(reclaimed).await?;
        }
        Ok(())
    }

    /// Persist the trained payload of a completed job as classifier data.
    ///
    /// Fails with `AlreadyExists` when data for the job exists, and with a
    /// configuration error when the job's algorithm no longer matches the
    /// one configured for its interaction type.
    pub async fn create_classifier(
        &self,
        job_id: JobId,
        classifier_data: serde_json::Value,
    ) -> Result<JobId> {
        if self.classifiers.try_get_classifier(job_id).await?.is_some() {
            return Err(MathesisError::AlreadyExists(format!(
                "classifier data for job {}",
                job_id
            )));
        }

        let job = self.get_training_job(job_id).await?;
        let data_schema_version = self
            .config
            .data_schema_version_for(&job.interaction_id, &job.algorithm_id)
            .ok_or_else(|| {
                MathesisError::Config(format!(
                    "algorithm '{}' is not configured for interaction '{}'",
                    job.algorithm_id, job.interaction_id
                ))
            })?;

        let classifier = ClassifierData {
            id: job_id,
            exploration_id: job.exploration_id,
            exploration_version_when_created: job.exploration_version,
            state_name: job.state_name,
            algorithm_id: job.algorithm_id,
            classifier_data,
            data_schema_version,
        };
        classifier.validate()?;
        self.classifiers.create_classifier(classifier).await
    }

    /// Retrieve trained classifier data by its owning job ID
    pub async fn get_classifier(&self, classifier_id: JobId) -> Result<ClassifierData> {
        self.classifiers.get_classifier(classifier_id).await
    }

    /// Delete trained classifier data; a no-op for IDs that do not exist
    pub async fn delete_classifier(&self, classifier_id: JobId) -> Result<()> {
        self.classifiers.delete_classifier(classifier_id).await
    }

    /// One worker step: dequeue a job, train its algorithm, persist the
    /// trained payload, and complete the job. Failures mark the job FAILED
    /// and propagate. Returns `None` when the queue is empty.
    ///
    /// The PENDING mark is the final arbiter between workers: the
    /// transition table admits it exactly once per dispatch, so a worker
    /// that loses the race backs off empty-handed.
    pub async fn process_next_job(
        &self,
        algorithms: &AlgorithmRegistry,
    ) -> Result<Option<JobId>> {
        let Some(job) = self.fetch_next_job().await? else {
            return Ok(None);
        };
        if let Err(err) = self.mark_training_job_pending(job.job_id).await {
            if matches!(err, MathesisError::StateTransition { .. }) {
                debug!(job_id = %job.job_id, "lost dispatch race, backing off");
                return Ok(None);
            }
            return Err(err);
        }

        let training_result = async {
            let mut classifier = algorithms.get_classifier_by_algorithm_id(&job.algorithm_id)?;
            classifier.train(&job.training_data);
            self.create_classifier(job.job_id, classifier.export()).await
        }
        .await;

        match training_result {
            Ok(_) => {
                self.mark_training_job_complete(job.job_id).await?;
                info!(job_id = %job.job_id, "training job complete");
                Ok(Some(job.job_id))
            }
            Err(err) => {
                error!(job_id = %job.job_id, error = %err, "training job failed");
                self.mark_training_jobs_failed(&[job.job_id]).await?;
                Err(err)
            }
        }
    }
}
