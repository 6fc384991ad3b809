//! Service configuration.
//!
//! Defaults are compiled in; a TOML file may override any subset of
//! fields. Unknown keys are rejected rather than ignored, so a typo in a
//! deployment file fails loudly.

use crate::audit;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which states a doctor may complete a consultation from.
///
/// The clinic's legacy workflow let a doctor close out any open
/// appointment, accepted or not. The default here requires the booking
/// to have been accepted first; `any_open` preserves the legacy
/// allowance for clinics that want walk-in completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    #[default]
    AcceptedOnly,
    AnyOpen,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub completion: CompletionPolicy,
    pub audit_enabled: bool,
    pub audit_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            completion: CompletionPolicy::default(),
            audit_enabled: true,
            audit_capacity: audit::DEFAULT_CAPACITY,
        }
    }
}

/// Fields a config file may set; everything is optional and merged over
/// the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    completion: Option<CompletionPolicy>,
    audit_enabled: Option<bool>,
    audit_capacity: Option<usize>,
}

impl ServiceConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let partial: PartialConfig = toml::from_str(raw).context("failed to parse config")?;
        Ok(Self::default().merged(partial))
    }

    fn merged(mut self, partial: PartialConfig) -> Self {
        if let Some(completion) = partial.completion {
            self.completion = completion;
        }
        if let Some(audit_enabled) = partial.audit_enabled {
            self.audit_enabled = audit_enabled;
        }
        if let Some(audit_capacity) = partial.audit_capacity {
            self.audit_capacity = audit_capacity;
        }
        self
    }
}
