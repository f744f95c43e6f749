//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If `~/.tabrelay/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `TABRELAY_*` environment overrides (highest priority)
//! 4. Validate cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tabrelay_core::constants::{MAX_EXECUTE_RETRIES, MIN_KEEPALIVE_INTERVAL};
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::RelaySettings;

/// Resolve the path to the settings file (`~/.tabrelay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tabrelay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TABRELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("TABRELAY_PORT", 1, 65535) {
        settings.server.port = v;
    }

    // ── Timing ──────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("TABRELAY_EXECUTE_TIMEOUT_MS", 100, 3_600_000) {
        settings.timing.execute_timeout_ms = v;
    }
    if let Some(v) = read_env_u64(
        "TABRELAY_KEEPALIVE_INTERVAL_MS",
        min_keepalive_ms(),
        600_000,
    ) {
        settings.timing.keepalive_interval_ms = v;
    }
    if let Some(v) = read_env_u64("TABRELAY_LIVENESS_TIMEOUT_MS", 100, 3_600_000) {
        settings.timing.liveness_timeout_ms = v;
    }
    if let Some(v) = read_env_usize("TABRELAY_RESULT_CACHE_SIZE", 1, 1_000_000) {
        settings.timing.result_cache_size = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TABRELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("TABRELAY_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Reject combinations that would make the relay misbehave.
pub fn validate(settings: &RelaySettings) -> Result<()> {
    let timing = &settings.timing;
    if timing.execute_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "executeTimeoutMs must be greater than zero".into(),
        ));
    }
    if timing.keepalive_interval_ms < min_keepalive_ms() {
        return Err(SettingsError::InvalidValue(format!(
            "keepaliveIntervalMs must be at least {}",
            min_keepalive_ms()
        )));
    }
    if timing.liveness_timeout_ms <= timing.keepalive_interval_ms {
        return Err(SettingsError::InvalidValue(
            "livenessTimeoutMs must exceed keepaliveIntervalMs".into(),
        ));
    }
    if timing.execute_retries > MAX_EXECUTE_RETRIES {
        return Err(SettingsError::InvalidValue(format!(
            "executeRetries must be at most {MAX_EXECUTE_RETRIES}"
        )));
    }
    if timing.result_cache_size == 0 {
        return Err(SettingsError::InvalidValue(
            "resultCacheSize must be at least 1".into(),
        ));
    }
    if settings.server.send_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "sendQueueCapacity must be at least 1".into(),
        ));
    }
    Ok(())
}

fn min_keepalive_ms() -> u64 {
    MIN_KEEPALIVE_INTERVAL.as_millis() as u64
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}
