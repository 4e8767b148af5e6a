//! Service configuration.
//!
//! Precedence: environment (`KYB__PORT`, `KYB__SCHEDULER`, ...) > TOML file > defaults.
//! The file path comes from `KYB_CONFIG` (default `config/kyb.toml`) and is skipped when missing.
//! The scheduler API key is never read from the file: `OPENROUTER_API_KEY` or `KYB_LLM_API_KEY`.

use crate::orchestrator::llm_scheduler::{DEFAULT_API_URL, DEFAULT_MODEL};
use crate::orchestrator::RunLimits;
use crate::store::DEFAULT_STORE_PATH;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/kyb.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    /// In-process sample registry.
    Fixture,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerMode {
    Fixed,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KybConfig {
    pub host: String,
    pub port: u16,
    pub provider_mode: ProviderMode,
    pub provider_base_url: String,
    pub provider_timeout_ms: u64,
    pub scheduler_timeout_ms: u64,
    pub run_timeout_ms: u64,
    pub max_steps: usize,
    pub scheduler: SchedulerMode,
    pub llm_api_url: String,
    pub llm_model: String,
    pub store_path: String,
    #[serde(skip)]
    pub llm_api_key: Option<String>,
}

impl KybConfig {
    /// Load using `KYB_CONFIG` (or the default path) plus environment overrides.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var("KYB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Some(Path::new(&path)))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 5001_i64)?
            .set_default("provider_mode", "fixture")?
            .set_default("provider_base_url", "http://127.0.0.1:5100")?
            .set_default("provider_timeout_ms", 10_000_i64)?
            .set_default("scheduler_timeout_ms", 15_000_i64)?
            .set_default("run_timeout_ms", 60_000_i64)?
            .set_default("max_steps", 10_i64)?
            .set_default("scheduler", "fixed")?
            .set_default("llm_api_url", DEFAULT_API_URL)?
            .set_default("llm_model", DEFAULT_MODEL)?
            .set_default("store_path", DEFAULT_STORE_PATH)?;

        let builder = match path {
            Some(p) if p.exists() => builder.add_source(config::File::from(p)),
            _ => builder,
        };

        let built = builder
            .add_source(config::Environment::with_prefix("KYB").separator("__"))
            .build()?;

        let mut cfg: KybConfig = built.try_deserialize()?;
        cfg.validate()?;
        cfg.llm_api_key = api_key_from_env();
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.max_steps == 0 {
            return Err(config::ConfigError::Message(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if self.provider_timeout_ms == 0 || self.scheduler_timeout_ms == 0 || self.run_timeout_ms == 0
        {
            return Err(config::ConfigError::Message(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn limits(&self) -> RunLimits {
        RunLimits {
            provider_timeout: Duration::from_millis(self.provider_timeout_ms),
            scheduler_timeout: Duration::from_millis(self.scheduler_timeout_ms),
            run_timeout: Duration::from_millis(self.run_timeout_ms),
            max_steps: self.max_steps,
        }
    }
}

fn api_key_from_env() -> Option<String> {
    ["OPENROUTER_API_KEY", "KYB_LLM_API_KEY"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
