//! Mathesis - Answer Classification and Training Job Orchestration
//!
//! A classifier subsystem for interactive learning content (explorations
//! composed of states). It provides:
//! - A training-job lifecycle keyed by (exploration, version, state), with
//!   a configurable status state machine and lease-based dequeue
//! - Retraining-vs-reuse decisions when exploration versions carry states
//!   over unchanged
//! - Answer classification at evaluation time through pluggable classifier
//!   algorithms and per-interaction answer normalization
//!
//! # Architecture
//!
//! The crate is organized into several layers:
//! - **Types**: training records (jobs, mappings, classifier data)
//! - **Content**: the slice of exploration structure classification needs
//! - **Storage**: async store traits plus an in-memory reference backend
//! - **Services**: algorithm and interaction registries
//! - **Engine / Orchestration**: answer classification and the job lifecycle
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mathesis::{
//!     AlgorithmRegistry, ClassifierConfig, InMemoryStore, TrainingJobOrchestrator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(ClassifierConfig::default());
//!     let store = Arc::new(InMemoryStore::new());
//!     let orchestrator = TrainingJobOrchestrator::new(
//!         config.clone(), store.clone(), store.clone(), store,
//!     );
//!
//!     // Exploration saves enqueue jobs for trainable states...
//!     orchestrator.handle_trainable_states(&exploration, &state_names).await?;
//!
//!     // ...and workers drain the queue.
//!     let algorithms = AlgorithmRegistry::with_default_text_classifier(
//!         "TextClassifier", mathesis::DEFAULT_CLASSIFIER_LABEL,
//!     );
//!     while orchestrator.process_next_job(&algorithms).await?.is_some() {}
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod services;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::{ClassifierConfig, InteractionClassifierSpec, DEFAULT_CLASSIFIER_LABEL};
pub use content::{
    AnswerGroup, Exploration, InteractionInstance, Outcome, RuleSpec, State, RULE_TYPE_CLASSIFIER,
};
pub use engine::{ClassificationEngine, ClassifiedAnswer};
pub use error::{MathesisError, Result};
pub use orchestration::TrainingJobOrchestrator;
pub use services::{
    AlgorithmRegistry, AnswerNormalizer, BagOfWordsClassifier, ClassifierAlgorithm,
    InteractionHandler, InteractionRegistry,
};
pub use storage::{memory::InMemoryStore, ClassifierDataStore, JobStore, MappingStore};
pub use types::{
    ClassifierData, ClassifierTrainingJob, JobId, NewTrainingJob, TrainingExample,
    TrainingJobExplorationMapping, TrainingJobStatus,
};
