//! Inference configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Switches for the optional parts of the inference pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Trust parameter and return annotations when present.
    pub use_annotations: bool,
    /// Infer return types of unannotated functions from their bodies.
    pub infer_return_types: bool,
    /// Promote fixed arrays to lists when list mutation is observed.
    pub promote_mutated_arrays: bool,
    /// Classify homogeneous literal lists as fixed arrays.
    pub literal_arrays: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            use_annotations: true,
            infer_return_types: true,
            promote_mutated_arrays: true,
            literal_arrays: true,
        }
    }
}

impl InferenceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_annotations(mut self) -> Self {
        self.use_annotations = false;
        self
    }

    pub fn without_return_inference(mut self) -> Self {
        self.infer_return_types = false;
        self
    }

    pub fn without_array_promotion(mut self) -> Self {
        self.promote_mutated_arrays = false;
        self
    }

    pub fn without_literal_arrays(mut self) -> Self {
        self.literal_arrays = false;
        self
    }

    /// Parse a configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid inference configuration")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_everything() {
        let config = InferenceConfig::default();
        assert!(config.use_annotations);
        assert!(config.infer_return_types);
        assert!(config.promote_mutated_arrays);
        assert!(config.literal_arrays);
    }

    #[test]
    fn test_builders() {
        let config = InferenceConfig::new()
            .ignore_annotations()
            .without_array_promotion();
        assert!(!config.use_annotations);
        assert!(!config.promote_mutated_arrays);
        assert!(config.infer_return_types);
    }

    #[test]
    fn test_partial_toml() {
        let config = InferenceConfig::from_toml_str("literal_arrays = false\n").unwrap();
        assert!(!config.literal_arrays);
        assert!(config.use_annotations);
    }

    #[test]
    fn test_rejects_wrong_types() {
        assert!(InferenceConfig::from_toml_str("use_annotations = \"yes\"").is_err());
    }
}
