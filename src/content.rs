//! Exploration content consumed by the classifier subsystem
//!
//! Only the slice of exploration structure that answer classification and
//! job orchestration actually touch is modeled here: states, their
//! interaction instances, answer groups, rule specs, and outcomes. Full
//! exploration editing lives with the embedding application.

use crate::types::TrainingExample;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rule type marking a rule spec as classifier-backed
pub const RULE_TYPE_CLASSIFIER: &str = "FuzzyMatches";

/// Routing target for a matched answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Destination state name
    pub dest: String,

    /// Feedback shown to the learner
    pub feedback: Vec<String>,
}

/// A single rule within an answer group
///
/// `training_data` is only populated for classifier-backed rules; hard rules
/// carry their parameters elsewhere and are matched outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub rule_type: String,

    #[serde(default)]
    pub training_data: Vec<String>,
}

impl RuleSpec {
    pub fn is_classifier_rule(&self) -> bool {
        self.rule_type == RULE_TYPE_CLASSIFIER
    }
}

/// A bucket routing answers to an outcome via rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerGroup {
    pub rule_specs: Vec<RuleSpec>,
    pub outcome: Outcome,
}

impl AnswerGroup {
    /// Index of the first classifier-backed rule spec, if any
    pub fn classifier_rule_index(&self) -> Option<usize> {
        self.rule_specs.iter().position(RuleSpec::is_classifier_rule)
    }
}

/// The interaction attached to a state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionInstance {
    /// Interaction type id, resolved against the interaction registry
    pub id: String,

    pub answer_groups: Vec<AnswerGroup>,

    /// Outcome used when no answer group matches; absent on malformed states
    pub default_outcome: Option<Outcome>,

    /// Answers editors have confirmed as belonging to no answer group;
    /// used as negative training examples
    #[serde(default)]
    pub confirmed_unclassified_answers: Vec<String>,
}

/// One node of an exploration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub interaction: InteractionInstance,
}

impl State {
    /// Flatten the classifier-rule examples of every answer group into
    /// labeled training data, each example labeled with its group index.
    pub fn training_data(&self) -> Vec<TrainingExample> {
        let mut examples = Vec::new();
        for (group_index, group) in self.interaction.answer_groups.iter().enumerate() {
            let Some(rule_index) = group.classifier_rule_index() else {
                continue;
            };
            let rule_spec = &group.rule_specs[rule_index];
            examples.extend(rule_spec.training_data.iter().map(|doc| {
                TrainingExample::new(doc.clone(), vec![group_index.to_string()])
            }));
        }
        examples
    }
}

/// A versioned exploration, reduced to the states the classifier needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exploration {
    pub id: String,
    pub version: u32,
    pub states: HashMap<String, State>,
}

impl Exploration {
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }
}
