//! Plant type to remote model registry.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Built-in plant to model mapping.
pub const DEFAULT_MODELS: &[(&str, &str)] = &[
    ("rice", "rice-plant-leaf-disease-classification/1"),
    ("cassava", "cassava-model/1"),
    ("sugarcane", "sugarcane-leaf-disease/2"),
    ("tea", "tea-leaf-plant-diseases/1"),
    ("mango", "mango-leaf-disease-detection/1"),
];

/// Opaque identifier of a hosted model, `<model-name>/<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Model name without the version segment.
    pub fn name(&self) -> &str {
        self.0.rsplit_once('/').map(|(name, _)| name).unwrap_or(&self.0)
    }

    /// Version segment.
    pub fn version(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, v)| v).unwrap_or_default()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModelId {
    type Err = ModelIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.rsplit_once('/') {
            Some((name, version))
                if !name.is_empty()
                    && !version.is_empty()
                    && !version.contains(char::is_whitespace)
                    && !name.contains(char::is_whitespace) =>
            {
                Ok(ModelId(s.to_string()))
            }
            _ => Err(ModelIdParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid model identifier '{0}', expected <model-name>/<version>")]
pub struct ModelIdParseError(String);

/// Returned when a plant label is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid plant type '{plant}'. Choose from {valid_choices:?}")]
pub struct UnknownPlant {
    pub plant: String,
    pub valid_choices: Vec<String>,
}

/// Errors raised while building a registry from configuration.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Malformed registry entry '{0}', expected plant=model/version")]
    MalformedEntry(String),

    #[error(transparent)]
    InvalidModelId(#[from] ModelIdParseError),
}

/// Immutable plant type to model mapping.
///
/// Keys are lowercase plant labels. Iteration and the list of valid choices
/// are sorted by label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRegistry {
    entries: BTreeMap<String, ModelId>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        let entries = DEFAULT_MODELS
            .iter()
            .map(|(plant, model)| ((*plant).to_string(), ModelId((*model).to_string())))
            .collect();
        Self { entries }
    }
}

impl ModelRegistry {
    /// Empty registry.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace an entry.
    pub fn with_entry(mut self, plant: &str, model: ModelId) -> Self {
        self.entries.insert(normalize(plant), model);
        self
    }

    /// Merge `plant=model/version` pairs separated by commas into the registry.
    ///
    /// Blank segments are ignored so trailing commas are harmless.
    pub fn with_overrides(mut self, overrides: &str) -> Result<Self, RegistryError> {
        for entry in overrides.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (plant, model) = entry
                .split_once('=')
                .ok_or_else(|| RegistryError::MalformedEntry(entry.to_string()))?;
            let plant = normalize(plant);
            if plant.is_empty() {
                return Err(RegistryError::MalformedEntry(entry.to_string()));
            }
            self.entries.insert(plant, model.parse()?);
        }
        Ok(self)
    }

    /// Resolve a plant label to its model.
    pub fn resolve(&self, plant: &str) -> Result<&ModelId, UnknownPlant> {
        self.entries
            .get(&normalize(plant))
            .ok_or_else(|| UnknownPlant {
                plant: plant.to_string(),
                valid_choices: self.choices(),
            })
    }

    /// Sorted list of accepted plant labels.
    pub fn choices(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(plant: &str) -> String {
    plant.trim().to_lowercase()
}
