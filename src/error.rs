//! Unified application error model.
//! Analysis-time failures (the query cannot be supported) and post-processing
//! contract violations share one enum so callers can surface them uniformly,
//! whether they come from the library, the HTTP client adapter or the CLI.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    #[error("{code}: {message}")]
    MalformedQuery { code: String, message: String },
    #[error("{code}: {message}")]
    UnsupportedAggregate { code: String, message: String },
    #[error("{code}: {message}")]
    UnsupportedUnit { code: String, message: String },
    #[error("{code}: {message}")]
    Contract { code: String, message: String },
    #[error("{code}: {message}")]
    Datastore { code: String, message: String },
    #[error("{code}: {message}")]
    Config { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::MalformedQuery { code, .. }
            | AppError::UnsupportedAggregate { code, .. }
            | AppError::UnsupportedUnit { code, .. }
            | AppError::Contract { code, .. }
            | AppError::Datastore { code, .. }
            | AppError::Config { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::MalformedQuery { message, .. }
            | AppError::UnsupportedAggregate { message, .. }
            | AppError::UnsupportedUnit { message, .. }
            | AppError::Contract { message, .. }
            | AppError::Datastore { message, .. }
            | AppError::Config { message, .. } => message.as_str(),
        }
    }

    pub fn malformed<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::MalformedQuery { code: code.into(), message: msg.into() } }
    pub fn unsupported_aggregate<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::UnsupportedAggregate { code: code.into(), message: msg.into() } }
    pub fn unsupported_unit<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::UnsupportedUnit { code: code.into(), message: msg.into() } }
    pub fn contract<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Contract { code: code.into(), message: msg.into() } }
    pub fn datastore<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Datastore { code: code.into(), message: msg.into() } }
    pub fn config<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Config { code: code.into(), message: msg.into() } }

    /// True for errors raised while analyzing the query text, before anything
    /// is sent to the datastore.
    pub fn is_analysis(&self) -> bool {
        matches!(
            self,
            AppError::MalformedQuery { .. } | AppError::UnsupportedAggregate { .. } | AppError::UnsupportedUnit { .. }
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Datastore { code: "bad_response".into(), message: err.to_string() }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Datastore { code: "http".into(), message: err.to_string() }
    }
}

impl From<regex::Error> for AppError {
    fn from(err: regex::Error) -> Self {
        AppError::Contract { code: "regex".into(), message: err.to_string() }
    }
}
