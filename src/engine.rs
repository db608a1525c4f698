//! Answer classification engine
//!
//! Evaluates a learner's answer against a state's answer groups at
//! submission time. Trainable interactions go through the configured
//! classifier algorithm; anything the classifier cannot place falls back to
//! the state's default outcome.

use crate::config::ClassifierConfig;
use crate::content::{Outcome, State};
use crate::error::{MathesisError, Result};
use crate::services::{AlgorithmRegistry, InteractionRegistry};
use crate::types::TrainingExample;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of classifying one answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedAnswer {
    /// Outcome of the matched answer group (or the default outcome)
    pub outcome: Outcome,

    /// Index into the answer groups list; equals the number of answer
    /// groups when the default outcome was matched
    pub answer_group_index: usize,

    /// Index of the matched rule spec within the group; 0 for the default
    /// outcome
    pub rule_spec_index: usize,

    /// 0.0 when the default outcome was matched
    pub classification_certainty: f32,
}

/// Classifies answers against a state's rule groups
pub struct ClassificationEngine {
    config: Arc<ClassifierConfig>,
    algorithms: Arc<AlgorithmRegistry>,
    interactions: Arc<InteractionRegistry>,
}

impl ClassificationEngine {
    pub fn new(
        config: Arc<ClassifierConfig>,
        algorithms: Arc<AlgorithmRegistry>,
        interactions: Arc<InteractionRegistry>,
    ) -> Self {
        Self {
            config,
            algorithms,
            interactions,
        }
    }

    /// Classify an answer submitted to a state.
    ///
    /// Requires the ML classification flag to be enabled and the state's
    /// interaction to be classifier-trainable. Returns the matched answer
    /// group, or a synthetic match on the default outcome when the
    /// classifier places the answer nowhere.
    pub fn classify(&self, state: &State, answer: &str) -> Result<ClassifiedAnswer> {
        if !self.config.enable_ml_classifiers {
            return Err(MathesisError::Precondition(
                "ML classification is disabled".to_string(),
            ));
        }

        let interaction_id = &state.interaction.id;
        let handler = self
            .interactions
            .get_interaction_by_id(interaction_id)
            .filter(|handler| handler.trainable)
            .ok_or_else(|| MathesisError::UnsupportedInteraction(interaction_id.clone()))?;

        let normalized_answer = handler.normalizer.normalize(answer);
        debug!(interaction = %interaction_id, "classifying answer");

        if let Some(matched) = self.match_trainable_rule(state, &normalized_answer)? {
            return Ok(matched);
        }

        if let Some(default_outcome) = &state.interaction.default_outcome {
            return Ok(ClassifiedAnswer {
                outcome: default_outcome.clone(),
                answer_group_index: state.interaction.answer_groups.len(),
                rule_spec_index: 0,
                classification_certainty: 0.0,
            });
        }

        Err(MathesisError::NoMatch(
            "state has no matching answer group and no default outcome".to_string(),
        ))
    }

    /// Train the configured algorithm on the state's examples and predict a
    /// label for the normalized answer.
    ///
    /// Returns `None` when there is nothing to train on, when the predicted
    /// label is the reserved default label, or when the predicted group
    /// carries no classifier-backed rule spec.
    fn match_trainable_rule(
        &self,
        state: &State,
        normalized_answer: &str,
    ) -> Result<Option<ClassifiedAnswer>> {
        let mut training_examples: Vec<TrainingExample> = state
            .interaction
            .confirmed_unclassified_answers
            .iter()
            .map(|doc| TrainingExample::unlabeled(doc.clone()))
            .collect();
        training_examples.extend(state.training_data());

        if training_examples.is_empty() {
            return Ok(None);
        }

        let algorithm_id = self
            .config
            .algorithm_id_for_interaction(&state.interaction.id)
            .ok_or_else(|| {
                MathesisError::Config(format!(
                    "no algorithm configured for interaction '{}'",
                    state.interaction.id
                ))
            })?;
        let mut classifier = self
            .algorithms
            .get_classifier_by_algorithm_id(algorithm_id)?;

        classifier.train(&training_examples);
        let labels = classifier.predict(&[normalized_answer.to_string()]);
        let predicted_label = labels.first().ok_or_else(|| {
            MathesisError::Other("classifier returned no prediction".to_string())
        })?;

        if *predicted_label == self.config.default_classifier_label {
            return Ok(None);
        }

        let group_index: usize = predicted_label.parse().map_err(|_| {
            MathesisError::Other(format!(
                "classifier predicted non-index label '{}'",
                predicted_label
            ))
        })?;
        let group = state
            .interaction
            .answer_groups
            .get(group_index)
            .ok_or_else(|| {
                MathesisError::Other(format!(
                    "classifier predicted out-of-range answer group {}",
                    group_index
                ))
            })?;

        // A predicted group without a classifier-backed rule spec is treated
        // as no-match rather than surfacing an index from a different group.
        let Some(rule_spec_index) = group.classifier_rule_index() else {
            warn!(
                group_index,
                "predicted answer group has no classifier rule spec"
            );
            return Ok(None);
        };

        Ok(Some(ClassifiedAnswer {
            outcome: group.outcome.clone(),
            answer_group_index: group_index,
            rule_spec_index,
            classification_certainty: 1.0,
        }))
    }
}
