//! Schema checks for GlovedBot JSON5 configuration.
//!
//! Every layer is checked on its own so an unknown key or a mistyped value is
//! reported against the file it came from.

use crate::ConfigError;
use serde_json::{Map, Value};

const PROVIDERS: &[&str] = &["openai", "mistral", "google"];

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(
        map,
        &["$schema", "bot", "llm", "memory", "chat", "retry"],
        layer,
        "",
    )?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("bot") {
        validate_bot(value, layer, "bot")?;
    }
    if let Some(value) = map.get("llm") {
        validate_llm(value, layer, "llm")?;
    }
    if let Some(value) = map.get("memory") {
        validate_memory(value, layer, "memory")?;
    }
    if let Some(value) = map.get("chat") {
        validate_chat(value, layer, "chat")?;
    }
    if let Some(value) = map.get("retry") {
        validate_retry(value, layer, "retry")?;
    }
    Ok(())
}

/// Validate the "bot" block.
fn validate_bot(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["name", "instructions", "example_conversations"],
        layer,
        path,
    )?;
    if let Some(value) = map.get("name") {
        expect_string(value, layer, &join_path(path, "name"))?;
    }
    if let Some(value) = map.get("instructions") {
        expect_string(value, layer, &join_path(path, "instructions"))?;
    }
    if let Some(value) = map.get("example_conversations") {
        let conversations_path = join_path(path, "example_conversations");
        let conversations = expect_array(value, layer, &conversations_path)?;
        for (idx, conversation) in conversations.iter().enumerate() {
            let conversation_path = format!("{conversations_path}[{idx}]");
            let messages = expect_array(conversation, layer, &conversation_path)?;
            for (line, message) in messages.iter().enumerate() {
                validate_example_message(message, layer, &format!("{conversation_path}[{line}]"))?;
            }
        }
    }
    Ok(())
}

/// Validate one `{ user, text }` example line.
fn validate_example_message(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["user", "text"], layer, path)?;
    for key in ["user", "text"] {
        let key_path = join_path(path, key);
        let Some(value) = map.get(key) else {
            return Err(invalid_field(layer, &key_path, "missing required field"));
        };
        expect_string(value, layer, &key_path)?;
    }
    Ok(())
}

/// Validate the "llm" block.
fn validate_llm(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "provider",
            "chat_model",
            "summary_model",
            "embedding_model",
            "api_key_env",
            "base_url",
            "temperature",
        ],
        layer,
        path,
    )?;
    if let Some(value) = map.get("provider") {
        let provider_path = join_path(path, "provider");
        let Some(provider) = value.as_str() else {
            return Err(invalid_field(layer, &provider_path, "expected string"));
        };
        if !PROVIDERS.contains(&provider) {
            return Err(invalid_field(
                layer,
                &provider_path,
                "expected one of: openai, mistral, google",
            ));
        }
    }
    for key in [
        "chat_model",
        "summary_model",
        "embedding_model",
        "api_key_env",
        "base_url",
    ] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("temperature") {
        expect_f64(value, layer, &join_path(path, "temperature"))?;
    }
    Ok(())
}

/// Validate the "memory" block.
fn validate_memory(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["path", "recall_k", "notes_capacity", "min_score"],
        layer,
        path,
    )?;
    if let Some(value) = map.get("path") {
        expect_string(value, layer, &join_path(path, "path"))?;
    }
    for key in ["recall_k", "notes_capacity"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("min_score") {
        expect_f64(value, layer, &join_path(path, "min_score"))?;
    }
    Ok(())
}

/// Validate the "chat" block.
fn validate_chat(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let counts = [
        "max_message_history",
        "max_chars_per_reply",
        "stream_segment_chars",
        "response_delay_ms",
    ];
    let mut allowed = counts.to_vec();
    allowed.push("stream_replies");
    ensure_allowed_keys(map, &allowed, layer, path)?;
    for key in counts {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("stream_replies") {
        expect_bool(value, layer, &join_path(path, "stream_replies"))?;
    }
    Ok(())
}

/// Validate the "retry" block.
fn validate_retry(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "max_retries",
            "initial_delay_ms",
            "max_delay_ms",
            "backoff_multiplier",
            "timeout_ms",
        ],
        layer,
        path,
    )?;
    for key in ["max_retries", "initial_delay_ms", "max_delay_ms", "timeout_ms"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("backoff_multiplier") {
        expect_f64(value, layer, &join_path(path, "backoff_multiplier"))?;
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

/// Expect a JSON array or return a typed error.
fn expect_array<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Vec<Value>, ConfigError> {
    match value {
        Value::Array(arr) => Ok(arr),
        _ => Err(invalid_field(layer, path, "expected array")),
    }
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Non-negative integers only; counts and durations cannot be negative.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_number() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

/// Join nested paths for error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
