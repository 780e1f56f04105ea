//! Transport-level errors and extraction of server error bodies.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Message shown for any request that never completed.
pub const FETCH_FAILED: &str = "Failed to fetch: is the server running?";

/// One server-side validation message for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors returned by a [`Transport`](super::Transport).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The request never completed (connection refused, reset, ...).
    #[error("Failed to fetch: {0}")]
    Transport(String),

    /// Non-2xx response, with the server message when it sent one.
    #[error("{message} (status {status})")]
    Status { status: u16, message: String },

    /// Non-2xx response carrying a field -> messages map.
    #[error("Validation failed (status {status}): {} error(s)", .fields.len())]
    Validation { status: u16, fields: Vec<FieldError> },

    /// A success response whose body could not be decoded.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// The client itself is misconfigured (bad base URL, TLS setup, ...).
    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    /// Builds the error for a non-2xx response from its raw body.
    ///
    /// Field maps are taken from an `errors` object when present, otherwise
    /// from top-level keys whose values are lists of strings. Without any
    /// field messages the `message` (or `error`) string is used.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let fields = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => fields,
            _ => return Self::generic(status),
        };

        let field_errors = match fields.get("errors") {
            Some(Value::Object(errors)) => collect_field_errors(errors),
            _ => collect_field_errors(&fields),
        };
        if !field_errors.is_empty() {
            return ApiError::Validation {
                status,
                fields: field_errors,
            };
        }

        match ["message", "error"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
        {
            Some(message) if !message.is_empty() => ApiError::Status {
                status,
                message: message.to_string(),
            },
            _ => Self::generic(status),
        }
    }

    fn generic(status: u16) -> Self {
        ApiError::Status {
            status,
            message: format!("Request failed with status {}", status),
        }
    }

    /// HTTP status, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } | ApiError::Validation { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// User-facing messages, one per notification.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ApiError::Transport(_) => vec![FETCH_FAILED.to_string()],
            ApiError::Status { message, .. } => vec![message.clone()],
            ApiError::Validation { fields, .. } => fields.iter().map(ToString::to_string).collect(),
            ApiError::Decode(_) | ApiError::Configuration(_) => vec![self.to_string()],
        }
    }
}

fn collect_field_errors(fields: &Map<String, Value>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for (field, value) in fields {
        let Value::Array(messages) = value else {
            continue;
        };
        for message in messages.iter().filter_map(Value::as_str) {
            errors.push(FieldError {
                field: field.clone(),
                message: message.to_string(),
            });
        }
    }
    errors
}
