//! Gateway configuration.
//!
//! Loaded once at startup from an optional `notegate.toml`, then overlaid with
//! environment variables. Credentials normally come from the environment:
//! `GEMINI_API_KEY`, then `GEMINI_API_KEY_1`, `GEMINI_API_KEY_2`, ... until the
//! first missing index.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_BASE_URL;
use crate::error::{GatewayError, Result};
use crate::tier::{GenerationParams, TierBinding, TierTable};

/// Top-level gateway configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub tiers: TiersConfig,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `GatewayError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Overlay values from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup.
    #[must_use]
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.credentials.api_keys.extend(env_credentials(&lookup));

        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(fast) = non_empty("GEMINI_FAST_MODEL").or_else(|| non_empty("GEMINI_MODEL")) {
            self.models.fast = fast;
        }
        if let Some(deep) = non_empty("GEMINI_DEEP_MODEL") {
            self.models.deep = deep;
        }
        self
    }

    /// Distinct, non-blank credentials in configuration order.
    #[must_use]
    pub fn api_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for key in &self.credentials.api_keys {
            let key = key.trim();
            if !key.is_empty() && !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
        keys
    }

    /// Check everything that would make the gateway unusable.
    ///
    /// # Errors
    /// Returns `GatewayError::Config` when no credential is configured, a model
    /// name is blank, or tier parameters are out of range.
    pub fn validate(&self) -> Result<()> {
        if self.api_keys().is_empty() {
            return Err(GatewayError::Config(
                "no API credentials configured (set GEMINI_API_KEY)".into(),
            ));
        }
        for (name, model) in [("fast", &self.models.fast), ("deep", &self.models.deep)] {
            if model.trim().is_empty() {
                return Err(GatewayError::Config(format!("models.{name} must not be empty")));
            }
        }
        for (name, params) in [("fast", &self.tiers.fast), ("deep", &self.tiers.deep)] {
            if !(0.0..=2.0).contains(&params.temperature) {
                return Err(GatewayError::Config(format!(
                    "tiers.{name}.temperature must be within 0..=2, got {}",
                    params.temperature
                )));
            }
            if !(0.0..=1.0).contains(&params.top_p) {
                return Err(GatewayError::Config(format!(
                    "tiers.{name}.top_p must be within 0..=1, got {}",
                    params.top_p
                )));
            }
            if params.max_output_tokens == 0 {
                return Err(GatewayError::Config(format!(
                    "tiers.{name}.max_output_tokens must be positive"
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn tier_table(&self) -> TierTable {
        TierTable::new(
            TierBinding {
                model: self.models.fast.clone(),
                params: self.tiers.fast,
            },
            TierBinding {
                model: self.models.deep.clone(),
                params: self.tiers.deep,
            },
        )
    }
}

/// `GEMINI_API_KEY`, then `GEMINI_API_KEY_1..` up to the first gap.
fn env_credentials(lookup: &impl Fn(&str) -> Option<String>) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(primary) = lookup("GEMINI_API_KEY") {
        keys.push(primary);
    }
    let mut index = 1;
    while let Some(key) = lookup(&format!("GEMINI_API_KEY_{index}")) {
        keys.push(key);
        index += 1;
    }
    keys
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Credentials given directly in the file. Usually empty.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .finish()
    }
}

/// Upstream model identifier per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_fast_model")]
    pub fast: String,
    #[serde(default = "default_deep_model")]
    pub deep: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            fast: default_fast_model(),
            deep: default_deep_model(),
        }
    }
}

/// Generation parameters per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiersConfig {
    #[serde(default = "GenerationParams::fast")]
    pub fast: GenerationParams,
    #[serde(default = "GenerationParams::deep")]
    pub deep: GenerationParams,
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            fast: GenerationParams::fast(),
            deep: GenerationParams::deep(),
        }
    }
}

/// Rotation timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Seconds after which exhausted credentials are retried.
    #[serde(default = "default_reset_window_secs")]
    pub reset_window_secs: u64,
    /// Pause when every credential is exhausted at once.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl FailoverConfig {
    #[must_use]
    pub fn reset_window(&self) -> Duration {
        Duration::from_secs(self.reset_window_secs)
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            reset_window_secs: default_reset_window_secs(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

/// Provider endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Hard timeout for one upstream call in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Prompt template overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Directory of `<operation>.toml` overrides.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_fast_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_deep_model() -> String {
    "gemini-2.5-pro".to_string()
}
fn default_reset_window_secs() -> u64 {
    300
}
fn default_cooldown_ms() -> u64 {
    3000
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_request_timeout_ms() -> u64 {
    60_000
}
