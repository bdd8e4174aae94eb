//! Error types for the fraud-analysis API client.
//!
//! # Design
//! Decoding never fails (non-JSON bodies become `Decoded::Raw`) and general
//! endpoints do not interpret status codes, so the pure core only has two
//! failure modes: a payload that cannot be serialized, and a rejected upload.

use std::fmt;

/// Message used when a rejected upload carries no `error` field.
pub const UPLOAD_FAILED: &str = "Upload failed";

/// Errors returned by `ApiClient` build and parse methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request payload could not be serialized to JSON.
    Serialization(String),

    /// The upload endpoint returned a non-2xx status. `message` is the
    /// server's `error` field, or `UPLOAD_FAILED` when none was supplied.
    Upload { status: u16, message: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Serialization(msg) => write!(f, "serialization failed: {msg}"),
            ApiError::Upload { message, .. } => f.write_str(message),
        }
    }
}

impl std::error::Error for ApiError {}
