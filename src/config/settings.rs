//! Optional YAML settings file merged beneath CLI flags.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use clap::ValueEnum;

use super::AppConfig;
use crate::answer::{ProviderKind, ResponseSize};

/// Provider settings persisted between runs. Every field is optional and a
/// CLI flag or env var for the same value always wins.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub response_size: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub whisper_model: Option<String>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))
    }

    /// Fill unset config fields from the settings file. Enum-valued entries
    /// accept the same spellings as the matching CLI flag.
    pub fn apply(&self, cfg: &mut AppConfig) -> Result<()> {
        if cfg.provider.is_none() {
            if let Some(provider) = &self.provider {
                let parsed = ProviderKind::from_str(provider, true)
                    .map_err(|_| anyhow!("settings: unknown provider '{provider}'"))?;
                cfg.provider = Some(parsed);
            }
        }
        if cfg.response_size.is_none() {
            if let Some(size) = &self.response_size {
                let parsed = ResponseSize::from_str(size, true)
                    .map_err(|_| anyhow!("settings: unknown response size '{size}'"))?;
                cfg.response_size = Some(parsed);
            }
        }
        if cfg.model.is_none() {
            cfg.model.clone_from(&self.model);
        }
        if cfg.temperature.is_none() {
            cfg.temperature = self.temperature;
        }
        if cfg.openai_api_key.is_none() {
            cfg.openai_api_key.clone_from(&self.openai_api_key);
        }
        if cfg.gemini_api_key.is_none() {
            cfg.gemini_api_key.clone_from(&self.gemini_api_key);
        }
        if cfg.whisper_model.is_none() {
            cfg.whisper_model.clone_from(&self.whisper_model);
        }
        Ok(())
    }
}
