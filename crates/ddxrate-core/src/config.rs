use crate::errors::{Result, StudyError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default generation model, overridable per call or via study.yaml.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash-preview-09-2025";
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Defaults applied to diagnosis generation when a call carries no
/// explicit override. The diagnosis count bounds also parameterize the
/// response schema the adapter validates against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub default_model: String,
    pub default_temperature: f64,
    pub min_diagnoses: u8,
    pub max_diagnoses: u8,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            default_temperature: DEFAULT_TEMPERATURE,
            min_diagnoses: 1,
            max_diagnoses: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub base_url: String,
    pub generation: GenerationConfig,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            base_url: OPENROUTER_BASE_URL.to_string(),
            generation: GenerationConfig::default(),
        }
    }
}

impl StudyConfig {
    /// Load study.yaml, falling back to defaults when the file does not
    /// exist. Unknown keys are warned about, not rejected.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no study config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            StudyError::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;

        let mut ignored_keys = std::collections::HashSet::new();
        let deserializer = serde_yaml::Deserializer::from_str(&raw);
        let cfg: StudyConfig = serde_ignored::deserialize(deserializer, |path| {
            ignored_keys.insert(path.to_string());
        })
        .map_err(|e| StudyError::Config(format!("failed to parse YAML: {}", e)))?;

        if !ignored_keys.is_empty() {
            tracing::warn!(?ignored_keys, "ignored unknown config fields");
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let g = &self.generation;
        if g.min_diagnoses == 0 {
            return Err(StudyError::Config("min_diagnoses must be at least 1".into()));
        }
        if g.max_diagnoses < g.min_diagnoses {
            return Err(StudyError::Config(format!(
                "max_diagnoses ({}) must be >= min_diagnoses ({})",
                g.max_diagnoses, g.min_diagnoses
            )));
        }
        if g.default_model.trim().is_empty() {
            return Err(StudyError::Config("default_model must not be empty".into()));
        }
        Ok(())
    }
}

/// Resolve the OpenRouter credential: an explicit value wins, then the
/// OPENROUTER_API_KEY environment variable. Resolved before any network
/// call so a missing key fails fast.
pub fn resolve_api_key(explicit: Option<&str>) -> Result<String> {
    if let Some(key) = explicit {
        if !key.trim().is_empty() {
            return Ok(key.to_string());
        }
    }
    match std::env::var("OPENROUTER_API_KEY") {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(StudyError::MissingCredential),
    }
}

pub fn write_sample_config(path: &Path) -> Result<()> {
    std::fs::write(
        path,
        r#"# ddxrate study configuration
base_url: "https://openrouter.ai/api/v1"
generation:
  default_model: "google/gemini-2.5-flash-preview-09-2025"
  default_temperature: 0.1
  min_diagnoses: 1
  max_diagnoses: 5
"#,
    )
    .map_err(|e| StudyError::Config(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
