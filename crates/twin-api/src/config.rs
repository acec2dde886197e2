//! Engine configuration: optional JSON file, then environment overrides.

use std::fs;
use std::path::Path;

use contracts::{ApiError, ErrorCode, TwinConfig, SCHEMA_VERSION_V1};
use tracing::info;

pub const ENV_SEED: &str = "TWIN_SEED";
pub const ENV_MODEL_SEED: &str = "TWIN_MODEL_SEED";
pub const ENV_HIDDEN_SIZE: &str = "TWIN_HIDDEN_SIZE";

/// Defaults, overlaid by `path` when given, overlaid by the process environment.
pub fn load_config(path: Option<&Path>) -> Result<TwinConfig, ApiError> {
    let config = match path {
        Some(path) => read_config_file(path)?,
        None => TwinConfig::default(),
    };
    let config = apply_overrides(config, |key| std::env::var(key).ok())?;
    info!(
        seed = config.seed,
        model_seed = config.model_seed,
        hidden_size = config.hidden_size,
        "configuration loaded"
    );
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<TwinConfig, ApiError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        config_error(
            "config file could not be read",
            format!("path={} error={err}", path.display()),
        )
    })?;
    let config: TwinConfig = serde_json::from_str(&raw).map_err(|err| {
        config_error(
            "config file is not a valid TwinConfig",
            format!("path={} error={err}", path.display()),
        )
    })?;
    if config.schema_version != SCHEMA_VERSION_V1 {
        return Err(config_error(
            "unsupported config schema_version",
            format!(
                "found={} expected={SCHEMA_VERSION_V1}",
                config.schema_version
            ),
        ));
    }
    Ok(config)
}

/// Applies `TWIN_*` overrides read through `lookup`. Blank values are ignored.
pub fn apply_overrides(
    mut config: TwinConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<TwinConfig, ApiError> {
    let read = |key: &str| {
        lookup(key)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
    };

    if let Some(raw) = read(ENV_SEED) {
        config.seed = parse_override(ENV_SEED, &raw)?;
    }
    if let Some(raw) = read(ENV_MODEL_SEED) {
        config.model_seed = parse_override(ENV_MODEL_SEED, &raw)?;
    }
    if let Some(raw) = read(ENV_HIDDEN_SIZE) {
        config.hidden_size = parse_override(ENV_HIDDEN_SIZE, &raw)?;
    }
    Ok(config)
}

fn parse_override<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| config_error("invalid environment override", format!("{key}={raw}")))
}

fn config_error(message: &str, details: String) -> ApiError {
    ApiError::new(ErrorCode::ConfigurationError, message, Some(details))
}
