//! Mapping between the client-facing session vocabulary and the backend's.
//!
//! Clients speak `{command: [..], workingDir, name}`; the backend speaks
//! `{command: "..", cwd, title}`. Records flowing back to clients keep every
//! backend key and gain the client-facing aliases.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tunnelforge_types::{Session, DEFAULT_COLS, DEFAULT_ROWS};

use super::GatewayError;

pub const DEFAULT_TITLE: &str = "Terminal";
pub const CREATED_MESSAGE: &str = "Session created successfully";

/// Build the backend create payload from a client create request.
///
/// The result carries exactly `command`, `cwd`, `title`, `cols` and `rows`.
pub fn create_request_to_backend(request: &Value, fallback_cwd: &str) -> Result<Value, GatewayError> {
    let request = request
        .as_object()
        .ok_or_else(|| GatewayError::Validation("request body must be a JSON object".into()))?;

    let command = command_line(request.get("command"))?;
    let cwd = first_non_empty(request, &["workingDir", "cwd"]).unwrap_or(fallback_cwd);
    let title = first_non_empty(request, &["name", "title"]).unwrap_or(DEFAULT_TITLE);
    let cols = dimension(request, "cols", DEFAULT_COLS)?;
    let rows = dimension(request, "rows", DEFAULT_ROWS)?;

    Ok(json!({
        "command": command,
        "cwd": cwd,
        "title": title,
        "cols": cols,
        "rows": rows,
    }))
}

/// Join a string-or-array command into one command line.
fn command_line(command: Option<&Value>) -> Result<String, GatewayError> {
    let line = match command {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(parts)) => {
            let mut words = Vec::with_capacity(parts.len());
            for part in parts {
                let word = part.as_str().ok_or_else(|| {
                    GatewayError::Validation("command array must contain only strings".into())
                })?;
                if !word.is_empty() {
                    words.push(word);
                }
            }
            words.join(" ")
        }
        Some(Value::Null) | None => String::new(),
        Some(_) => {
            return Err(GatewayError::Validation(
                "command must be a string or an array of strings".into(),
            ))
        }
    };

    if line.is_empty() {
        return Err(GatewayError::Validation("command is required".into()));
    }
    Ok(line)
}

fn first_non_empty<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .find(|value| !value.trim().is_empty())
}

fn dimension(object: &Map<String, Value>, key: &str, default: u16) -> Result<u16, GatewayError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .filter(|n| *n > 0)
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| GatewayError::Validation(format!("{key} must be a positive integer"))),
    }
}

/// Client response for a successful create.
pub fn created_to_client(backend: &Value) -> Result<Value, GatewayError> {
    let id = backend
        .get("id")
        .or_else(|| backend.get("sessionId"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            GatewayError::InvalidBackendResponse("create response carries no session id".into())
        })?;

    Ok(json!({
        "sessionId": id,
        "message": CREATED_MESSAGE,
    }))
}

/// Add the client-facing aliases to one backend session record. Records
/// without a `status` get one inferred from `active` and `exitCode`.
pub fn session_to_client(record: Value) -> Value {
    let inferred_status = match record.get("status") {
        Some(_) => None,
        None => Session::deserialize(&record)
            .ok()
            .map(|session| session.effective_status()),
    };
    let Value::Object(mut record) = record else {
        return record;
    };

    if let Some(status) = inferred_status {
        record.insert("status".to_string(), json!(status));
    }

    let aliases = [
        ("title", "name"),
        ("cwd", "workingDir"),
        ("createdAt", "startedAt"),
        ("updatedAt", "lastModified"),
    ];
    for (backend_key, client_key) in aliases {
        if let Some(value) = record.get(backend_key).cloned() {
            record.insert(client_key.to_string(), value);
        }
    }

    if let Some(Value::String(command)) = record.get("command").cloned() {
        record.insert("command".to_string(), json!([command]));
    }

    Value::Object(record)
}

/// Map a backend list response. Accepts a bare array or `{sessions: [..]}`.
pub fn session_list_to_client(list: Value) -> Value {
    match list {
        Value::Array(records) => Value::Array(records.into_iter().map(session_to_client).collect()),
        Value::Object(mut wrapper) => {
            if let Some(Value::Array(records)) = wrapper.remove("sessions") {
                Value::Array(records.into_iter().map(session_to_client).collect())
            } else {
                Value::Object(wrapper)
            }
        }
        other => other,
    }
}
