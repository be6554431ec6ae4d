//! File loading, deep merge and environment overrides.
//!
//! Merge rules: objects merge per key, arrays and scalars are replaced, and
//! nulls in the user file are skipped so they never erase a default.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{StoreBackend, VoxnoteSettings};

/// Variables read for the summarization token, highest priority first.
pub const TOKEN_ENV_VARS: [&str; 2] = ["VOXNOTE_SUMMARIZATION_API_TOKEN", "HF_TOKEN"];

/// `~/.voxnote/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".voxnote").join("settings.json")
}

pub fn load_settings() -> Result<VoxnoteSettings> {
    load_settings_from_path(&settings_path())
}

/// Defaults, then the file at `path` if it exists, then process environment.
/// A missing file is not an error; malformed JSON is.
pub fn load_settings_from_path(path: &Path) -> Result<VoxnoteSettings> {
    let mut settings = load_file_layer(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    settings.validate()?;
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<VoxnoteSettings> {
    let defaults = serde_json::to_value(VoxnoteSettings::default())?;
    let merged = if path.exists() {
        debug!(path = %path.display(), "loading settings file");
        let user: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        deep_merge(defaults, user)
    } else {
        debug!(path = %path.display(), "no settings file, using defaults");
        defaults
    };
    Ok(serde_json::from_value(merged)?)
}

pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `VOXNOTE_*` overrides read through `env`. Invalid values are logged
/// and ignored.
pub fn apply_overrides<F>(settings: &mut VoxnoteSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env(env);

    // server
    if let Some(v) = env.string("VOXNOTE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.parsed("VOXNOTE_PORT", parse_u16_range(1, u16::MAX)) {
        settings.server.port = v;
    }
    if let Some(v) = env.parsed("VOXNOTE_MAX_UPLOAD_BYTES", parse_u64_range(1024, 1 << 30)) {
        settings.server.max_upload_bytes = v;
    }

    // summarizer
    if let Some(v) = env.first_string(&TOKEN_ENV_VARS) {
        settings.summarizer.summarization_api_token = Some(v);
    }
    if let Some(v) = env.parsed("VOXNOTE_SUMMARIZER_ENABLED", parse_bool) {
        settings.summarizer.enabled = v;
    }
    if let Some(v) = env.string("VOXNOTE_SUMMARIZER_URL") {
        settings.summarizer.api_url = v;
    }
    if let Some(v) = env.parsed("VOXNOTE_SUMMARIZER_MAX_RETRIES", parse_u32_range(0, 20)) {
        settings.summarizer.max_retries = v;
    }

    // transcription
    if let Some(v) = env.string("VOXNOTE_MODEL_DIR") {
        settings.transcription.model_dir = Some(v);
    }
    if let Some(v) = env.parsed("VOXNOTE_AUTO_DOWNLOAD", parse_bool) {
        settings.transcription.auto_download = v;
    }

    // store
    if let Some(v) = env.parsed("VOXNOTE_STORE_BACKEND", parse_backend) {
        settings.store.backend = v;
    }
    if let Some(v) = env.string("VOXNOTE_SQLITE_PATH") {
        settings.store.sqlite_path = Some(v);
    }
    if let Some(v) = env.first_string(&["VOXNOTE_POSTGREST_URL", "SUPABASE_URL"]) {
        settings.store.postgrest_url = Some(v);
    }
    if let Some(v) = env.first_string(&["VOXNOTE_POSTGREST_KEY", "SUPABASE_KEY"]) {
        settings.store.postgrest_key = Some(v);
    }

    // logging
    if let Some(v) = env.string("VOXNOTE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.parsed("VOXNOTE_LOG_JSON", parse_bool) {
        settings.logging.json = v;
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    /// First non-empty variable in priority order.
    fn first_string(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.string(name))
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let raw = self.string(name)?;
        let value = parse(raw.trim());
        if value.is_none() {
            warn!(key = name, value = %raw, "invalid env var, ignoring");
        }
        value
    }
}

pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_u16_range(min: u16, max: u16) -> impl Fn(&str) -> Option<u16> {
    move |val| val.parse().ok().filter(|n| (min..=max).contains(n))
}

fn parse_u32_range(min: u32, max: u32) -> impl Fn(&str) -> Option<u32> {
    move |val| val.parse().ok().filter(|n| (min..=max).contains(n))
}

fn parse_u64_range(min: u64, max: u64) -> impl Fn(&str) -> Option<u64> {
    move |val| val.parse().ok().filter(|n| (min..=max).contains(n))
}

fn parse_backend(val: &str) -> Option<StoreBackend> {
    serde_json::from_value(Value::String(val.to_lowercase())).ok()
}
