//! Pluggable capabilities: classifier algorithms and interaction handling

pub mod algorithms;
pub mod interactions;

pub use algorithms::{AlgorithmRegistry, BagOfWordsClassifier, ClassifierAlgorithm};
pub use interactions::{AnswerNormalizer, InteractionHandler, InteractionRegistry};
