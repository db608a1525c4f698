//! Core data types for classifier training jobs
//!
//! Defines the training-record entities: training jobs, the mappings that tie
//! exploration versions to jobs, and the trained classifier data produced
//! when a job completes. These are transient projections of store records;
//! they carry no persistence behavior beyond invariant checks and the status
//! transition rule, and must be re-validated before every write.

use crate::config::ClassifierConfig;
use crate::error::{MathesisError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for classifier training jobs
///
/// Wraps a UUID to provide type safety and prevent mixing job IDs with
/// other identifiers in the system. The value is opaque to callers; the
/// job store assigns it at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a new random job ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job ID from a string
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| MathesisError::validation("job_id", e.to_string()))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a classifier training job
///
/// A job is created NEW, moves to PENDING while dispatched to a worker, and
/// ends COMPLETE or FAILED. The allowed edges live in
/// [`ClassifierConfig::allowed_status_transitions`], not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainingJobStatus {
    New,
    Pending,
    Complete,
    Failed,
}

impl std::fmt::Display for TrainingJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrainingJobStatus::New => "NEW",
            TrainingJobStatus::Pending => "PENDING",
            TrainingJobStatus::Complete => "COMPLETE",
            TrainingJobStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// One labeled training example
///
/// An empty label set marks a negative example (a confirmed unclassified
/// answer); otherwise labels carry answer-group indices rendered as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub document: String,
    pub labels: Vec<String>,
}

impl TrainingExample {
    pub fn new(document: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            document: document.into(),
            labels,
        }
    }

    /// Negative example carrying the empty label set
    pub fn unlabeled(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            labels: Vec::new(),
        }
    }
}

/// Fields of a training job before the store has assigned it an ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrainingJob {
    pub algorithm_id: String,
    pub interaction_id: String,
    pub exploration_id: String,
    pub exploration_version: u32,
    pub next_scheduled_check_time: DateTime<Utc>,
    pub state_name: String,
    pub status: TrainingJobStatus,
    pub training_data: Vec<TrainingExample>,
}

impl NewTrainingJob {
    /// Validate the candidate job against configuration
    ///
    /// Checks required fields and that the algorithm matches the one
    /// configured for the interaction type. Never mutates on failure.
    pub fn validate(&self, config: &ClassifierConfig) -> Result<()> {
        validate_job_fields(
            &self.algorithm_id,
            &self.interaction_id,
            &self.exploration_id,
            self.exploration_version,
            &self.state_name,
            config,
        )
    }
}

/// A classifier training job keyed by (exploration, version, state)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierTrainingJob {
    pub job_id: JobId,
    pub algorithm_id: String,
    pub interaction_id: String,
    pub exploration_id: String,
    pub exploration_version: u32,
    pub next_scheduled_check_time: DateTime<Utc>,
    pub state_name: String,
    pub status: TrainingJobStatus,
    pub training_data: Vec<TrainingExample>,
}

impl ClassifierTrainingJob {
    /// Materialize a stored job from its candidate fields and assigned ID
    pub fn from_new(job_id: JobId, new: NewTrainingJob) -> Self {
        Self {
            job_id,
            algorithm_id: new.algorithm_id,
            interaction_id: new.interaction_id,
            exploration_id: new.exploration_id,
            exploration_version: new.exploration_version,
            next_scheduled_check_time: new.next_scheduled_check_time,
            state_name: new.state_name,
            status: new.status,
            training_data: new.training_data,
        }
    }

    /// Validate the job against configuration
    pub fn validate(&self, config: &ClassifierConfig) -> Result<()> {
        validate_job_fields(
            &self.algorithm_id,
            &self.interaction_id,
            &self.exploration_id,
            self.exploration_version,
            &self.state_name,
            config,
        )
    }

    /// Move the job to a new status, enforcing the configured transition table
    pub fn update_status(
        &mut self,
        new_status: TrainingJobStatus,
        config: &ClassifierConfig,
    ) -> Result<()> {
        if !config.is_transition_allowed(self.status, new_status) {
            return Err(MathesisError::StateTransition {
                from: self.status,
                to: new_status,
            });
        }
        self.status = new_status;
        Ok(())
    }
}

fn validate_job_fields(
    algorithm_id: &str,
    interaction_id: &str,
    exploration_id: &str,
    exploration_version: u32,
    state_name: &str,
    config: &ClassifierConfig,
) -> Result<()> {
    if algorithm_id.is_empty() {
        return Err(MathesisError::validation("algorithm_id", "must not be empty"));
    }
    if interaction_id.is_empty() {
        return Err(MathesisError::validation(
            "interaction_id",
            "must not be empty",
        ));
    }
    if exploration_id.is_empty() {
        return Err(MathesisError::validation(
            "exploration_id",
            "must not be empty",
        ));
    }
    if exploration_version < 1 {
        return Err(MathesisError::validation(
            "exploration_version",
            "must be at least 1",
        ));
    }
    if state_name.is_empty() {
        return Err(MathesisError::validation("state_name", "must not be empty"));
    }
    match config.algorithm_id_for_interaction(interaction_id) {
        Some(configured) if configured == algorithm_id => Ok(()),
        Some(configured) => Err(MathesisError::validation(
            "algorithm_id",
            format!(
                "'{}' does not match the algorithm '{}' configured for interaction '{}'",
                algorithm_id, configured, interaction_id
            ),
        )),
        None => Err(MathesisError::validation(
            "interaction_id",
            format!("no classifier configured for interaction '{}'", interaction_id),
        )),
    }
}

/// Mapping from one (exploration, version, state) key to a training job
///
/// Many versions may map to the same job when a state is carried over
/// unmodified. Mappings are created once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingJobExplorationMapping {
    pub exploration_id: String,
    pub exploration_version: u32,
    pub state_name: String,
    pub job_id: JobId,
}

impl TrainingJobExplorationMapping {
    pub fn new(
        exploration_id: impl Into<String>,
        exploration_version: u32,
        state_name: impl Into<String>,
        job_id: JobId,
    ) -> Self {
        Self {
            exploration_id: exploration_id.into(),
            exploration_version,
            state_name: state_name.into(),
            job_id,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.exploration_id.is_empty() {
            return Err(MathesisError::validation(
                "exploration_id",
                "must not be empty",
            ));
        }
        if self.exploration_version < 1 {
            return Err(MathesisError::validation(
                "exploration_version",
                "must be at least 1",
            ));
        }
        if self.state_name.is_empty() {
            return Err(MathesisError::validation("state_name", "must not be empty"));
        }
        Ok(())
    }
}

/// Trained classifier payload produced by a completed training job
///
/// `id` equals the originating job's ID; the store refuses to create a
/// second record for the same job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierData {
    pub id: JobId,
    pub exploration_id: String,
    pub exploration_version_when_created: u32,
    pub state_name: String,
    pub algorithm_id: String,
    /// Opaque trained-model payload; consumers hand it to the algorithm
    pub classifier_data: serde_json::Value,
    pub data_schema_version: u32,
}

impl ClassifierData {
    pub fn validate(&self) -> Result<()> {
        if self.exploration_id.is_empty() {
            return Err(MathesisError::validation(
                "exploration_id",
                "must not be empty",
            ));
        }
        if self.exploration_version_when_created < 1 {
            return Err(MathesisError::validation(
                "exploration_version_when_created",
                "must be at least 1",
            ));
        }
        if self.state_name.is_empty() {
            return Err(MathesisError::validation("state_name", "must not be empty"));
        }
        if self.algorithm_id.is_empty() {
            return Err(MathesisError::validation("algorithm_id", "must not be empty"));
        }
        if self.data_schema_version < 1 {
            return Err(MathesisError::validation(
                "data_schema_version",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
