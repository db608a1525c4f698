//! Training job lifecycle orchestration

pub mod jobs;

pub use jobs::TrainingJobOrchestrator;
