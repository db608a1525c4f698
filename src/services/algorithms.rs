//! Classifier algorithm capability and registry
//!
//! Training algorithms are opaque collaborators behind the
//! [`ClassifierAlgorithm`] trait: they learn from labeled examples, predict a
//! label per document, and export an opaque payload for persistence. Concrete
//! algorithms are selected by id through [`AlgorithmRegistry`], never by
//! type hierarchy.

use crate::error::{MathesisError, Result};
use crate::types::TrainingExample;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A trainable classifier selected by algorithm id
#[cfg_attr(test, mockall::automock)]
pub trait ClassifierAlgorithm: Send {
    /// Learn from labeled examples. An empty label set counts toward the
    /// default label.
    fn train(&mut self, examples: &[TrainingExample]);

    /// Predict one label per input document
    fn predict(&self, documents: &[String]) -> Vec<String>;

    /// Export the trained model as an opaque payload
    fn export(&self) -> serde_json::Value;
}

impl std::fmt::Debug for dyn ClassifierAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClassifierAlgorithm")
    }
}

type AlgorithmFactory = Box<dyn Fn() -> Box<dyn ClassifierAlgorithm> + Send + Sync>;

/// Registry mapping algorithm ids to instance factories
pub struct AlgorithmRegistry {
    factories: HashMap<String, AlgorithmFactory>,
}

impl AlgorithmRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with the stock text classifier under the
    /// given algorithm id
    pub fn with_default_text_classifier(algorithm_id: &str, default_label: &str) -> Self {
        let mut registry = Self::new();
        let label = default_label.to_string();
        registry.register(algorithm_id, move || {
            Box::new(BagOfWordsClassifier::new(&label))
        });
        registry
    }

    /// Register a factory under an algorithm id, replacing any previous one
    pub fn register<F>(&mut self, algorithm_id: &str, factory: F)
    where
        F: Fn() -> Box<dyn ClassifierAlgorithm> + Send + Sync + 'static,
    {
        self.factories
            .insert(algorithm_id.to_string(), Box::new(factory));
    }

    /// Instantiate a fresh classifier for an algorithm id
    pub fn get_classifier_by_algorithm_id(
        &self,
        algorithm_id: &str,
    ) -> Result<Box<dyn ClassifierAlgorithm>> {
        self.factories
            .get(algorithm_id)
            .map(|factory| factory())
            .ok_or_else(|| MathesisError::NotFound(format!("algorithm {}", algorithm_id)))
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable form of a trained [`BagOfWordsClassifier`]
#[derive(Debug, Serialize, Deserialize)]
struct BagOfWordsModel {
    default_label: String,
    centroids: HashMap<String, HashMap<String, f32>>,
}

/// Stock text classifier: per-label token-count centroids scored by cosine
/// similarity
///
/// This is a lightweight stand-in for a real statistical model. It predicts
/// the default label whenever it has no trained signal for a document.
pub struct BagOfWordsClassifier {
    default_label: String,
    centroids: HashMap<String, HashMap<String, f32>>,
}

impl BagOfWordsClassifier {
    pub fn new(default_label: &str) -> Self {
        Self {
            default_label: default_label.to_string(),
            centroids: HashMap::new(),
        }
    }

    fn tokenize(document: &str) -> HashMap<String, f32> {
        let mut counts = HashMap::new();
        for token in document
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            *counts.entry(token.to_string()).or_insert(0.0) += 1.0;
        }
        counts
    }

    fn cosine_similarity(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
        let dot_product: f32 = a
            .iter()
            .filter_map(|(token, weight)| b.get(token).map(|other| weight * other))
            .sum();
        let magnitude_a: f32 = a.values().map(|x| x * x).sum::<f32>().sqrt();
        let magnitude_b: f32 = b.values().map(|x| x * x).sum::<f32>().sqrt();

        if magnitude_a == 0.0 || magnitude_b == 0.0 {
            return 0.0;
        }
        dot_product / (magnitude_a * magnitude_b)
    }
}

impl ClassifierAlgorithm for BagOfWordsClassifier {
    fn train(&mut self, examples: &[TrainingExample]) {
        for example in examples {
            let label = example
                .labels
                .first()
                .cloned()
                .unwrap_or_else(|| self.default_label.clone());
            let centroid = self.centroids.entry(label).or_default();
            for (token, count) in Self::tokenize(&example.document) {
                *centroid.entry(token).or_insert(0.0) += count;
            }
        }
    }

    fn predict(&self, documents: &[String]) -> Vec<String> {
        documents
            .iter()
            .map(|document| {
                let features = Self::tokenize(document);
                let mut best_label = self.default_label.clone();
                let mut best_score = 0.0_f32;
                for (label, centroid) in &self.centroids {
                    let score = Self::cosine_similarity(&features, centroid);
                    if score > best_score {
                        best_score = score;
                        best_label = label.clone();
                    }
                }
                best_label
            })
            .collect()
    }

    fn export(&self) -> serde_json::Value {
        serde_json::to_value(BagOfWordsModel {
            default_label: self.default_label.clone(),
            centroids: self.centroids.clone(),
        })
        .unwrap_or_else(|_| serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CLASSIFIER_LABEL;

    fn trained_classifier() -> BagOfWordsClassifier {
        let mut classifier = BagOfWordsClassifier::new(DEFAULT_CLASSIFIER_LABEL);
        classifier.train(&[
            TrainingExample::new("the answer is a permutation of elements", vec!["0".into()]),
            TrainingExample::new("permutation and ordering of the elements", vec!["0".into()]),
            TrainingExample::new("multiply the options for each choice", vec!["1".into()]),
            TrainingExample::new("three times two is six choices", vec!["1".into()]),
            TrainingExample::unlabeled("dunno, just guessed"),
        ]);
        classifier
    }

    #[test]
    fn test_predicts_trained_labels() {
        let classifier = trained_classifier();
        let labels = classifier.predict(&[
            "it's a permutation of 3 elements".to_string(),
            "multiply 3 options by 2 choices".to_string(),
        ]);
        assert_eq!(labels, vec!["0".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_unknown_document_predicts_default_label() {
        let classifier = trained_classifier();
        let labels = classifier.predict(&["zzz qqq www".to_string()]);
        assert_eq!(labels, vec![DEFAULT_CLASSIFIER_LABEL.to_string()]);
    }

    #[test]
    fn test_untrained_classifier_predicts_default_label() {
        let classifier = BagOfWordsClassifier::new(DEFAULT_CLASSIFIER_LABEL);
        let labels = classifier.predict(&["anything at all".to_string()]);
        assert_eq!(labels, vec![DEFAULT_CLASSIFIER_LABEL.to_string()]);
    }

    #[test]
    fn test_export_round_trips_through_serde() {
        let classifier = trained_classifier();
        let payload = classifier.export();
        let model: BagOfWordsModel = serde_json::from_value(payload).unwrap();
        assert_eq!(model.default_label, DEFAULT_CLASSIFIER_LABEL);
        assert!(model.centroids.contains_key("0"));
        assert!(model.centroids.contains_key("1"));
    }

    #[test]
    fn test_registry_lookup() {
        let registry =
            AlgorithmRegistry::with_default_text_classifier("TextClassifier", DEFAULT_CLASSIFIER_LABEL);
        assert!(registry
            .get_classifier_by_algorithm_id("TextClassifier")
            .is_ok());

        let err = registry
            .get_classifier_by_algorithm_id("NoSuchAlgorithm")
            .unwrap_err();
        assert!(matches!(err, MathesisError::NotFound(_)));
    }
}
