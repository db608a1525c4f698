//! Configuration for the classifier subsystem
//!
//! All tunables are carried in an explicit [`ClassifierConfig`] value that is
//! handed to the orchestrator and the classification engine at construction
//! time. Nothing in this crate reads ambient global state.

use crate::types::TrainingJobStatus;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved label the classifier algorithm predicts when an answer matches
/// no trained answer group.
pub const DEFAULT_CLASSIFIER_LABEL: &str = "_default";

/// Per-interaction classifier wiring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionClassifierSpec {
    /// Algorithm used to train classifiers for this interaction type
    pub algorithm_id: String,

    /// Schema version written into newly created classifier data
    pub current_data_schema_version: u32,
}

/// Configuration for training-job orchestration and answer classification
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Global feature flag; `classify` refuses to run when disabled
    pub enable_ml_classifiers: bool,

    /// Interaction id -> classifier wiring
    pub interaction_classifier_mapping: HashMap<String, InteractionClassifierSpec>,

    /// Allowed status transitions for training jobs
    pub allowed_status_transitions: HashMap<TrainingJobStatus, Vec<TrainingJobStatus>>,

    /// Lease duration granted to a worker when a job is dispatched
    pub job_lease_ttl: Duration,

    /// Label treated as "no answer group matched" by the algorithm
    pub default_classifier_label: String,

    /// Upper bound on pages scanned per `fetch_next_job` call
    pub max_scan_pages: usize,
}

impl ClassifierConfig {
    /// Look up the algorithm configured for an interaction type
    pub fn algorithm_id_for_interaction(&self, interaction_id: &str) -> Option<&str> {
        self.interaction_classifier_mapping
            .get(interaction_id)
            .map(|spec| spec.algorithm_id.as_str())
    }

    /// Current data schema version for an (interaction, algorithm) pair.
    ///
    /// Returns `None` when the interaction is unknown or the algorithm does
    /// not match the configured one, in which case classifier data must not
    /// be created for the pair.
    pub fn data_schema_version_for(
        &self,
        interaction_id: &str,
        algorithm_id: &str,
    ) -> Option<u32> {
        self.interaction_classifier_mapping
            .get(interaction_id)
            .filter(|spec| spec.algorithm_id == algorithm_id)
            .map(|spec| spec.current_data_schema_version)
    }

    /// Whether a training job may move from `from` to `to`
    pub fn is_transition_allowed(&self, from: TrainingJobStatus, to: TrainingJobStatus) -> bool {
        self.allowed_status_transitions
            .get(&from)
            .map(|allowed| allowed.contains(&to))
            .unwrap_or(false)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let mut interaction_classifier_mapping = HashMap::new();
        interaction_classifier_mapping.insert(
            "TextInput".to_string(),
            InteractionClassifierSpec {
                algorithm_id: "TextClassifier".to_string(),
                current_data_schema_version: 1,
            },
        );

        let mut allowed_status_transitions = HashMap::new();
        allowed_status_transitions.insert(
            TrainingJobStatus::New,
            vec![TrainingJobStatus::Pending],
        );
        allowed_status_transitions.insert(
            TrainingJobStatus::Pending,
            vec![TrainingJobStatus::Complete, TrainingJobStatus::Failed],
        );
        // Failed jobs may be rescheduled for retry.
        allowed_status_transitions.insert(
            TrainingJobStatus::Failed,
            vec![TrainingJobStatus::Pending],
        );
        allowed_status_transitions.insert(TrainingJobStatus::Complete, vec![]);

        Self {
            enable_ml_classifiers: false,
            interaction_classifier_mapping,
            allowed_status_transitions,
            job_lease_ttl: Duration::minutes(5),
            default_classifier_label: DEFAULT_CLASSIFIER_LABEL.to_string(),
            max_scan_pages: 16,
        }
    }
}
