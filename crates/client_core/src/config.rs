use std::{collections::HashMap, fs, path::Path};

use thiserror::Error;
use url::Url;

pub const SETTINGS_FILE: &str = "showgo.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// http(s), without a trailing slash.
    pub backend_url: String,
    pub anon_key: String,
    pub image_bucket: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("backend url '{0}' must be an http(s) url")]
    InvalidUrl(String),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("failed to parse {path}: {source}")]
    File {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default)]
struct Layered {
    backend_url: Option<String>,
    anon_key: Option<String>,
    image_bucket: Option<String>,
    request_timeout_secs: Option<String>,
}

/// Defaults, then `showgo.toml` in the working directory, then environment.
pub fn load_settings() -> Result<ClientSettings, SettingsError> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings, SettingsError> {
    let mut layered = Layered::default();

    if let Ok(raw) = fs::read_to_string(file) {
        let file_cfg = toml::from_str::<HashMap<String, String>>(&raw).map_err(|source| {
            SettingsError::File {
                path: file.display().to_string(),
                source,
            }
        })?;
        if let Some(v) = file_cfg.get("backend_url") {
            layered.backend_url = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("anon_key") {
            layered.anon_key = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("image_bucket") {
            layered.image_bucket = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("request_timeout_secs") {
            layered.request_timeout_secs = Some(v.clone());
        }
    }

    if let Some(v) = env("SHOWGO_BACKEND_URL") {
        layered.backend_url = Some(v);
    }
    if let Some(v) = env("APP__BACKEND_URL") {
        layered.backend_url = Some(v);
    }

    if let Some(v) = env("SHOWGO_ANON_KEY") {
        layered.anon_key = Some(v);
    }
    if let Some(v) = env("APP__ANON_KEY") {
        layered.anon_key = Some(v);
    }

    if let Some(v) = env("APP__IMAGE_BUCKET") {
        layered.image_bucket = Some(v);
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        layered.request_timeout_secs = Some(v);
    }

    finish(layered)
}

fn finish(layered: Layered) -> Result<ClientSettings, SettingsError> {
    let backend_url = non_empty(layered.backend_url).ok_or(SettingsError::Missing("backend_url"))?;
    let anon_key = non_empty(layered.anon_key).ok_or(SettingsError::Missing("anon_key"))?;

    let parsed = Url::parse(&backend_url).map_err(|_| SettingsError::InvalidUrl(backend_url.clone()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SettingsError::InvalidUrl(backend_url));
    }

    let request_timeout_secs = match non_empty(layered.request_timeout_secs) {
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(SettingsError::InvalidValue {
                key: "request_timeout_secs",
                value: raw,
            })?,
        None => 15,
    };

    Ok(ClientSettings {
        backend_url: backend_url.trim_end_matches('/').to_string(),
        anon_key,
        image_bucket: non_empty(layered.image_bucket).unwrap_or_else(|| "event-images".into()),
        request_timeout_secs,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
