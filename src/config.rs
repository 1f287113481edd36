use serde::{Deserialize, Serialize};
use std::{
  env, fs,
  path::{Path, PathBuf},
  time::Duration,
};

use crate::error::ConfigError;
use crate::types::{DEFAULT_MAX_CAS_RETRIES, DEFAULT_STORE_TIMEOUT_MS, LEGACY_REACHABILITY_DEPTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", content = "hops", rename_all = "camelCase")]
pub enum ReachabilityDepth {
  #[default]
  TotalRounds,
  Fixed(u32),
}

impl ReachabilityDepth {
  pub fn legacy() -> Self {
    ReachabilityDepth::Fixed(LEGACY_REACHABILITY_DEPTH)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
  pub reachability_depth: ReachabilityDepth,
  pub max_cas_retries: u32,
  pub store_timeout_ms: u64,
  pub log_filter: String,
  pub log_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    EngineConfig {
      reachability_depth: ReachabilityDepth::TotalRounds,
      max_cas_retries: DEFAULT_MAX_CAS_RETRIES,
      store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
      log_filter: "info".to_string(),
      log_dir: None,
    }
  }
}

impl EngineConfig {
  pub fn store_timeout(&self) -> Duration {
    Duration::from_millis(self.store_timeout_ms.max(1))
  }
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn parse_reachability_depth(raw: &str) -> Option<ReachabilityDepth> {
  let value = raw.trim().to_ascii_lowercase();
  match value.as_str() {
    "total" | "total_rounds" | "rounds" => Some(ReachabilityDepth::TotalRounds),
    "legacy" => Some(ReachabilityDepth::legacy()),
    other => other.parse::<u32>().ok().map(ReachabilityDepth::Fixed),
  }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
  value
    .parse::<T>()
    .map_err(|_| ConfigError::InvalidEnv { key: key.to_string(), value })
}

pub fn apply_overrides(
  mut config: EngineConfig,
  lookup: impl Fn(&str) -> Option<String>,
) -> Result<EngineConfig, ConfigError> {
  if let Some(value) = lookup("BRACKET_REACHABILITY_DEPTH") {
    config.reachability_depth = parse_reachability_depth(&value).ok_or_else(|| ConfigError::InvalidEnv {
      key: "BRACKET_REACHABILITY_DEPTH".to_string(),
      value,
    })?;
  }
  if let Some(value) = lookup("BRACKET_MAX_CAS_RETRIES") {
    config.max_cas_retries = parse_env("BRACKET_MAX_CAS_RETRIES", value)?;
  }
  if let Some(value) = lookup("BRACKET_STORE_TIMEOUT_MS") {
    config.store_timeout_ms = parse_env("BRACKET_STORE_TIMEOUT_MS", value)?;
  }
  if let Some(value) = lookup("BRACKET_LOG_FILTER") {
    config.log_filter = value;
  }
  if let Some(value) = lookup("BRACKET_LOG_DIR") {
    config.log_dir = Some(PathBuf::from(value));
  }
  Ok(config)
}

pub fn apply_env_defaults(config: EngineConfig) -> Result<EngineConfig, ConfigError> {
  apply_overrides(config, env_default)
}

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
  let Some(path) = path.filter(|p| p.is_file()) else {
    return apply_env_defaults(EngineConfig::default());
  };
  let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.display().to_string(),
    source,
  })?;
  let config = serde_json::from_str::<EngineConfig>(&data).map_err(|source| ConfigError::Parse {
    path: path.display().to_string(),
    source,
  })?;
  if config.max_cas_retries == 0 {
    tracing::warn!("maxCasRetries is 0; conflicting writes will fail on the first attempt");
  }
  apply_env_defaults(config)
}
