use serde_json::{Map, Value};
use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(app) = expect_optional_object(root, "app")? {
        validate_u64_field(
            app,
            "app.max_input_length",
            "max_input_length",
            1,
            10_000_000,
        )?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, u64::from(u16::MAX))?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(chat) = expect_optional_object(root, "chat")? {
        validate_optional_string_field(chat, "chat.model", "model")?;
        validate_f64_field(chat, "chat.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(
            chat,
            "chat.max_reply_tokens",
            "max_reply_tokens",
            1,
            1_000_000,
        )?;
        validate_u64_field(
            chat,
            "chat.default_max_tokens",
            "default_max_tokens",
            1,
            100_000_000,
        )?;
        validate_enum_field(
            chat,
            "chat.window_policy",
            "window_policy",
            &["evict_oldest", "refuse"],
        )?;
        validate_optional_string_field(chat, "chat.persona_path", "persona_path")?;
    }

    if let Some(provider) = expect_optional_object(root, "provider")? {
        validate_optional_string_field(provider, "provider.base_url", "base_url")?;
        validate_optional_string_field(provider, "provider.api_key", "api_key")?;
    }

    if let Some(tokenizer) = expect_optional_object(root, "tokenizer")? {
        validate_enum_field(tokenizer, "tokenizer.kind", "kind", &["bpe", "heuristic"])?;
        validate_optional_string_field(tokenizer, "tokenizer.path", "path")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    map: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(inner)) => Ok(Some(inner)),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_u64_field(
    map: &Map<String, Value>,
    label: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = map.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let number = value
        .as_u64()
        .ok_or_else(|| config_type_error(label, "non-negative integer"))?;
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config: {} must be between {} and {}",
            label, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    map: &Map<String, Value>,
    label: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = map.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let number = value
        .as_f64()
        .ok_or_else(|| config_type_error(label, "number"))?;
    if !(min..=max).contains(&number) {
        return Err(ApiError::BadRequest(format!(
            "Invalid config: {} must be between {} and {}",
            label, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    map: &Map<String, Value>,
    label: &str,
    key: &str,
) -> Result<(), ApiError> {
    match map.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(config_type_error(label, "string")),
    }
}

fn validate_enum_field(
    map: &Map<String, Value>,
    label: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ApiError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(value)) if allowed.contains(&value.as_str()) => Ok(()),
        Some(_) => Err(ApiError::BadRequest(format!(
            "Invalid config: {} must be one of: {}",
            label,
            allowed.join(", ")
        ))),
    }
}

fn validate_string_array_field(
    map: &Map<String, Value>,
    label: &str,
    key: &str,
) -> Result<(), ApiError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Array(items)) => {
            if items.iter().all(Value::is_string) {
                Ok(())
            } else {
                Err(config_type_error(label, "array of strings"))
            }
        }
        Some(_) => Err(config_type_error(label, "array of strings")),
    }
}

fn config_type_error(label: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!("Invalid config: {} must be {}", label, expected))
}
