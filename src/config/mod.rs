//! Config Resolver (C1).
//!
//! Layers, lowest precedence first: built-in defaults, a config file
//! auto-discovered beside the executable, an explicit `--config` file,
//! `WHISPER_`-prefixed environment variables, then command-line flags. Each
//! layer contributes a flat JSON object that is merged key-by-key into one
//! accumulator before a single bind into `EffectiveConfig` — see
//! `SPEC_FULL.md` §4.1 / §9.

pub mod cli;

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use cli::CliArgs;

/// Inference device selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Auto,
    Cpu,
    Gpu,
}

/// The immutable, fully-resolved configuration. Built once at startup (or
/// once per `--download` invocation) and observed by every other component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_sec: u64,
    pub model_id: String,
    pub language: String,
    pub max_concurrent: usize,
    pub queue_wait_sec: u64,
    pub sample_rate: u32,
    pub max_file_size_mb: u64,
    pub device: Device,
    pub log_level: String,
    pub log_file_path: String,
    pub log_max_bytes: u64,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_sec: 120,
            model_id: "whisper-base".to_string(),
            language: "auto".to_string(),
            max_concurrent: 4,
            queue_wait_sec: 10,
            sample_rate: 16_000,
            max_file_size_mb: 100,
            device: Device::Auto,
            log_level: "info".to_string(),
            log_file_path: "logs/whisper-server.log".to_string(),
            log_max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl EffectiveConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    /// The URL-fetch timeout is always at least `requestTimeoutSec + 10`.
    pub fn url_fetch_timeout_sec(&self) -> u64 {
        self.request_timeout_sec + 10
    }
}

/// Recursively rewrite snake_case object keys to camelCase, so config files
/// may be written either way. Leaves values untouched.
fn camelize_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(to_camel_case(&k), camelize_keys(v));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(camelize_keys).collect())
        }
        other => other,
    }
}

fn to_camel_case(key: &str) -> String {
    if !key.contains('_') {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Locate the auto-discovered config file: `config.json` beside the running
/// executable.
fn discovered_config_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    let candidate = dir.join("config.json");
    candidate.exists().then_some(candidate)
}

fn load_camelized_file(path: &Path) -> Option<serde_json::Value> {
    let text = std::fs::read_to_string(path).ok()?;
    let raw: serde_json::Value = serde_json::from_str(&text).ok()?;
    Some(camelize_keys(raw))
}

/// Resolve the layered configuration into one `EffectiveConfig`.
///
/// Unknown keys surviving any layer are logged at debug level and otherwise
/// ignored (figment/serde already drops them on `extract`).
pub fn resolve(cli: &CliArgs) -> Result<EffectiveConfig, figment::Error> {
    let mut figment = Figment::new().merge(Serialized::defaults(EffectiveConfig::default()));

    if let Some(discovered) = discovered_config_path() {
        if let Some(camelized) = load_camelized_file(&discovered) {
            tracing::debug!(path = %discovered.display(), "merging auto-discovered config file");
            figment = figment.merge(Json::string(&camelized.to_string()));
        }
    }

    if let Some(explicit) = &cli.config {
        if let Some(camelized) = load_camelized_file(explicit) {
            tracing::debug!(path = %explicit.display(), "merging explicit config file");
            figment = figment.merge(Json::string(&camelized.to_string()));
        } else {
            tracing::debug!(path = %explicit.display(), "explicit config file missing or unreadable");
        }
    }

    figment = figment.merge(Env::prefixed("WHISPER_").split("__"));

    let overrides = cli.as_overrides();
    if overrides.as_object().map(|m| !m.is_empty()).unwrap_or(false) {
        figment = figment.merge(Json::string(&overrides.to_string()));
    }

    figment.extract()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_serialize_and_merge() {
        let cli = CliArgs {
            host: None,
            port: None,
            model: None,
            language: None,
            timeout: None,
            max_concurrent: None,
            queue_wait: None,
            max_file_size_mb: None,
            device: None,
            log_level: None,
            config: None,
            download: None,
        };
        let resolved = resolve(&cli).expect("resolve should succeed with no overrides");
        let defaults = EffectiveConfig::default();
        assert_eq!(resolved.host, defaults.host);
        assert_eq!(resolved.port, defaults.port);
        assert_eq!(resolved.model_id, defaults.model_id);
        assert_eq!(resolved.max_concurrent, defaults.max_concurrent);
    }

    #[test]
    fn cli_overrides_win_over_defaults() {
        let cli = CliArgs {
            host: None,
            port: Some(9000),
            model: Some("tiny".to_string()),
            language: None,
            timeout: None,
            max_concurrent: None,
            queue_wait: None,
            max_file_size_mb: None,
            device: None,
            log_level: None,
            config: None,
            download: None,
        };
        let resolved = resolve(&cli).unwrap();
        assert_eq!(resolved.port, 9000);
        assert_eq!(resolved.model_id, "tiny");
    }

    #[test]
    fn camelizes_snake_case_keys() {
        let raw = serde_json::json!({"model_name": "whisper-base", "nested": {"timeout_seconds": 30}});
        let out = camelize_keys(raw);
        assert_eq!(out["modelName"], serde_json::json!("whisper-base"));
        assert_eq!(out["nested"]["timeoutSeconds"], serde_json::json!(30));
    }
}
