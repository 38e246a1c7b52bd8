//! Structural validation of chat request payloads.
//!
//! Works on raw `serde_json::Value` so every rejection carries a precise,
//! user-facing reason. Checks run in a fixed order and the first failure
//! wins. All functions are pure.

use serde_json::Value;

use crate::llm::types::{ChatMessage, Role};

pub const MAX_MESSAGES: usize = 50;
pub const MAX_MESSAGE_LENGTH: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Request body must be an object")]
    RequestNotObject,
    #[error("Request body must contain a messages array")]
    MissingMessages,
    #[error("Messages must be an array")]
    MessagesNotArray,
    #[error("Messages array cannot be empty")]
    EmptyConversation,
    #[error("Messages array cannot exceed {max} messages")]
    TooManyMessages { max: usize },
    #[error("Message at index {index}: {reason}")]
    AtIndex { index: usize, reason: Box<ValidationError> },
    #[error("Message must be an object")]
    MessageNotObject,
    #[error("Message must have a valid role")]
    InvalidRole,
    #[error("Message role must be one of: user, assistant, system")]
    UnknownRole,
    #[error("Message must have a valid content string")]
    InvalidContent,
    #[error("Message content exceeds maximum length of {max} characters")]
    ContentTooLong { max: usize },
    #[error("Message content cannot be empty")]
    EmptyContent,
}

impl crate::error::ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        "E_VALIDATION"
    }
}

/// Validate a single message.
///
/// # Errors
///
/// Returns the first rule the message breaks.
pub fn validate_message(raw: &Value) -> Result<(), ValidationError> {
    check_message(raw).map(|_| ())
}

/// Validate a conversation: 1..=50 messages, each independently valid.
///
/// # Errors
///
/// Returns the first rule broken; per-message failures name the index.
pub fn validate_conversation(raw: &Value) -> Result<(), ValidationError> {
    check_conversation(raw).map(|_| ())
}

/// Validate a request body of the form `{ "messages": [...] }`.
///
/// # Errors
///
/// Returns the first rule broken.
pub fn validate_request(body: &Value) -> Result<(), ValidationError> {
    parse_request(body).map(|_| ())
}

/// Validate a request body and return its typed conversation.
///
/// # Errors
///
/// Same as [`validate_request`].
pub fn parse_request(body: &Value) -> Result<Vec<ChatMessage>, ValidationError> {
    let Some(obj) = body.as_object() else {
        return Err(ValidationError::RequestNotObject);
    };
    match obj.get("messages") {
        None | Some(Value::Null) => Err(ValidationError::MissingMessages),
        Some(messages) => check_conversation(messages),
    }
}

fn check_conversation(raw: &Value) -> Result<Vec<ChatMessage>, ValidationError> {
    let Some(items) = raw.as_array() else {
        return Err(ValidationError::MessagesNotArray);
    };
    if items.is_empty() {
        return Err(ValidationError::EmptyConversation);
    }
    if items.len() > MAX_MESSAGES {
        return Err(ValidationError::TooManyMessages { max: MAX_MESSAGES });
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            check_message(item).map_err(|reason| ValidationError::AtIndex { index, reason: Box::new(reason) })
        })
        .collect()
}

fn check_message(raw: &Value) -> Result<ChatMessage, ValidationError> {
    let Some(obj) = raw.as_object() else {
        return Err(ValidationError::MessageNotObject);
    };

    let role = match obj.get("role").and_then(Value::as_str) {
        Some(r) if !r.is_empty() => Role::parse(r).ok_or(ValidationError::UnknownRole)?,
        _ => return Err(ValidationError::InvalidRole),
    };

    let content = match obj.get("content").and_then(Value::as_str) {
        Some(c) if !c.is_empty() => c,
        _ => return Err(ValidationError::InvalidContent),
    };
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::ContentTooLong { max: MAX_MESSAGE_LENGTH });
    }
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }

    // Non-string ids are opaque to the pipeline and dropped.
    let id = obj.get("id").and_then(Value::as_str).map(str::to_owned);
    Ok(ChatMessage { role, content: content.to_owned(), id })
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
