use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::defaults::{
    DEFAULT_HOST, DEFAULT_MAX_INPUT_LENGTH, DEFAULT_MAX_REPLY_TOKENS, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL, DEFAULT_PERSONA, DEFAULT_PORT, DEFAULT_PROVIDER_URL, DEFAULT_TEMPERATURE,
};
use super::paths::AppPaths;
use super::validation::validate_config;
use crate::context::{EstimatorKind, WindowPolicy};
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "max_reply_tokens", "default_max_tokens"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub max_input_length: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f64,
    pub max_reply_tokens: u32,
    pub default_max_tokens: u64,
    pub window_policy: WindowPolicy,
    pub persona_path: Option<String>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_reply_tokens: DEFAULT_MAX_REPLY_TOKENS,
            default_max_tokens: DEFAULT_MAX_TOKENS,
            window_policy: WindowPolicy::default(),
            persona_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenizerSettings {
    pub kind: EstimatorKind,
    pub path: Option<String>,
}

/// Typed view of `config.yml` merged with `secrets.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub app: AppSettings,
    pub chat: ChatSettings,
    pub provider: ProviderSettings,
    pub tokenizer: TokenizerSettings,
}

impl AppConfig {
    pub fn from_value(value: &Value) -> Result<Self, ApiError> {
        validate_config(value)?;
        serde_json::from_value(value.clone())
            .map_err(|err| ApiError::BadRequest(format!("Invalid config: {}", err)))
    }

    /// Resolves the persona text, reading `chat.persona_path` relative to the
    /// project root when it is set.
    pub fn persona(&self, paths: &AppPaths) -> Result<String, ApiError> {
        let Some(raw) = self.chat.persona_path.as_deref() else {
            return Ok(DEFAULT_PERSONA.to_string());
        };
        let path = resolve_relative(raw, &paths.project_root);
        let text = fs::read_to_string(&path).map_err(|err| {
            ApiError::Internal(format!("Failed to read persona {}: {}", path.display(), err))
        })?;
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Persona file {} is empty",
                path.display()
            )));
        }
        Ok(text)
    }

    pub fn tokenizer_path(&self, paths: &AppPaths) -> Option<PathBuf> {
        self.tokenizer
            .path
            .as_deref()
            .map(|raw| resolve_relative(raw, &paths.project_root))
    }
}

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("SKEPTIC_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Public config deep-merged with secrets, then environment overrides.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.secrets_path());
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged);
        validate_config(&merged)?;
        Ok(merged)
    }

    pub fn load_app_config(&self) -> Result<AppConfig, ApiError> {
        AppConfig::from_value(&self.load_config()?)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

fn resolve_relative(raw: &str, root: &Path) -> PathBuf {
    let candidate = PathBuf::from(raw);
    if candidate.is_absolute() {
        candidate
    } else {
        root.join(candidate)
    }
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => Value::Object(Map::new()),
            Err(err) => {
                tracing::warn!("Ignoring unparsable config {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn apply_env_overrides(config: &mut Value) {
    if let Some(port) = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
    {
        set_path(config, &["server", "port"], Value::from(port));
    }
    if let Ok(key) = env::var("OPENAI_API_KEY") {
        if !key.trim().is_empty() {
            set_path(config, &["provider", "api_key"], Value::String(key));
        }
    }
}

fn set_path(config: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = config;
    for key in parents {
        if !current.get(*key).is_some_and(Value::is_object) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }
        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
    if let Some(map) = current.as_object_mut() {
        map.insert((*last).to_string(), value);
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
