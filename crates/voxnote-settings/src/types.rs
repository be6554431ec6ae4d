use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use voxnote_core::security::ApiToken;
use voxnote_core::summary::SummaryParameters;

use crate::errors::{Result, SettingsError};

fn voxnote_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".voxnote")
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoxnoteSettings {
    pub server: ServerSettings,
    pub summarizer: SummarizerSettings,
    pub transcription: TranscriptionSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

impl VoxnoteSettings {
    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let s = &self.summarizer;
        if s.min_length > s.max_length {
            return Err(SettingsError::InvalidValue(format!(
                "summarizer.minLength ({}) exceeds maxLength ({})",
                s.min_length, s.max_length
            )));
        }
        if s.request_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "summarizer.requestTimeoutSecs must be positive".into(),
            ));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxUploadBytes must be positive".into(),
            ));
        }
        if self.store.backend == StoreBackend::Postgrest {
            if self.store.postgrest_url.as_deref().map_or(true, str::is_empty) {
                return Err(SettingsError::InvalidValue(
                    "store.postgrestUrl is required for the postgrest backend".into(),
                ));
            }
            if self.store.key().is_none() {
                return Err(SettingsError::InvalidValue(
                    "store.postgrestKey is required for the postgrest backend".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Remote summarization endpoint and retry tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummarizerSettings {
    pub enabled: bool,
    pub api_url: String,
    /// Bearer token for the inference API. Never serialized.
    #[serde(skip_serializing)]
    pub summarization_api_token: Option<String>,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    pub model_loading_delay_secs: u64,
    pub rate_limit_delay_secs: u64,
    pub transport_delay_secs: u64,
    pub max_length: u32,
    pub min_length: u32,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://api-inference.huggingface.co/models/facebook/bart-large-cnn"
                .to_string(),
            summarization_api_token: None,
            max_retries: 3,
            request_timeout_secs: 30,
            model_loading_delay_secs: 10,
            rate_limit_delay_secs: 60,
            transport_delay_secs: 5,
            max_length: 130,
            min_length: 30,
        }
    }
}

impl SummarizerSettings {
    pub fn token(&self) -> Option<ApiToken> {
        ApiToken::from_config(self.summarization_api_token.as_deref())
    }

    /// Enabled and holding a credential.
    pub fn is_available(&self) -> bool {
        self.enabled && self.token().is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn model_loading_delay(&self) -> Duration {
        Duration::from_secs(self.model_loading_delay_secs)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs(self.rate_limit_delay_secs)
    }

    pub fn transport_delay(&self) -> Duration {
        Duration::from_secs(self.transport_delay_secs)
    }

    pub fn parameters(&self) -> SummaryParameters {
        SummaryParameters {
            max_length: self.max_length,
            min_length: self.min_length,
            do_sample: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionSettings {
    /// Defaults to `~/.voxnote/models/parakeet`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<String>,
    pub auto_download: bool,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model_dir: None,
            auto_download: true,
        }
    }
}

impl TranscriptionSettings {
    pub fn model_dir(&self) -> PathBuf {
        self.model_dir
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| voxnote_home().join("models").join("parakeet"))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Postgrest,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Defaults to `~/.voxnote/voxnote.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgrest_url: Option<String>,
    /// Service key sent as `apikey` and bearer token. Never serialized.
    #[serde(skip_serializing)]
    pub postgrest_key: Option<String>,
    pub table: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            sqlite_path: None,
            postgrest_url: None,
            postgrest_key: None,
            table: "recordings".to_string(),
        }
    }
}

impl StoreSettings {
    pub fn sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| voxnote_home().join("voxnote.db"))
    }

    pub fn key(&self) -> Option<ApiToken> {
        ApiToken::from_config(self.postgrest_key.as_deref())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}
