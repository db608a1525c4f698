//! Interaction registry
//!
//! Interaction types vary in how they normalize a learner's answer and in
//! whether a string classifier can be trained for them. Each type is a small
//! capability record looked up by id, not a type hierarchy.

use std::collections::HashMap;

/// Answer normalization behavior for an interaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerNormalizer {
    /// Trim surrounding whitespace and collapse internal runs
    Text,

    /// Pass the raw answer through unchanged
    Identity,
}

impl AnswerNormalizer {
    pub fn normalize(&self, raw: &str) -> String {
        match self {
            AnswerNormalizer::Text => raw.split_whitespace().collect::<Vec<_>>().join(" "),
            AnswerNormalizer::Identity => raw.to_string(),
        }
    }
}

/// Capability record for one interaction type
#[derive(Debug, Clone)]
pub struct InteractionHandler {
    pub id: String,

    /// Whether a string classifier can be trained for this interaction
    pub trainable: bool,

    pub normalizer: AnswerNormalizer,
}

/// Registry mapping interaction ids to their capability records
pub struct InteractionRegistry {
    handlers: HashMap<String, InteractionHandler>,
}

impl InteractionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry pre-populated with the stock interactions
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(InteractionHandler {
            id: "TextInput".to_string(),
            trainable: true,
            normalizer: AnswerNormalizer::Text,
        });
        registry.register(InteractionHandler {
            id: "EndExploration".to_string(),
            trainable: false,
            normalizer: AnswerNormalizer::Identity,
        });
        registry
    }

    pub fn register(&mut self, handler: InteractionHandler) {
        self.handlers.insert(handler.id.clone(), handler);
    }

    pub fn get_interaction_by_id(&self, id: &str) -> Option<&InteractionHandler> {
        self.handlers.get(id)
    }
}

impl Default for InteractionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_normalization() {
        let normalizer = AnswerNormalizer::Text;
        assert_eq!(normalizer.normalize("  hello   world  "), "hello world");
        assert_eq!(normalizer.normalize("plain"), "plain");
    }

    #[test]
    fn test_default_registry() {
        let registry = InteractionRegistry::with_defaults();

        let text = registry.get_interaction_by_id("TextInput").unwrap();
        assert!(text.trainable);

        let end = registry.get_interaction_by_id("EndExploration").unwrap();
        assert!(!end.trainable);

        assert!(registry.get_interaction_by_id("CodeRepl").is_none());
    }

    #[test]
    fn test_register_replaces_handler() {
        let mut registry = InteractionRegistry::with_defaults();
        registry.register(InteractionHandler {
            id: "TextInput".to_string(),
            trainable: false,
            normalizer: AnswerNormalizer::Identity,
        });
        assert!(!registry.get_interaction_by_id("TextInput").unwrap().trainable);
    }
}
