//! Application error type and its JSON mapping.

use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Per-field validation messages, keyed by the camelCase field name.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(value)` when no errors were collected.
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, AppError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Missing or invalid authorization header")]
    MissingCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    /// Sign-in or refresh rejected by the identity provider.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    /// Provider rejected the global sign-out.
    #[error("Sign out failed: {0}")]
    SignOutFailed(#[source] anyhow::Error),

    /// A feature needs configuration the process was started without.
    #[error("Configuration error: {0}")]
    Configuration(&'static str),

    #[error("{public}: {source}")]
    Infrastructure {
        public: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Wraps a lower-level failure; `public` is the only part sent to the client.
    pub fn infra(public: &'static str) -> impl FnOnce(anyhow::Error) -> AppError {
        move |source| AppError::Infrastructure { public, source }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(source: anyhow::Error) -> Self {
        AppError::Infrastructure {
            public: "Internal server error",
            source,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(FieldErrors::single("body", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(FieldErrors::single("query", rejection.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, details) = match &self {
            AppError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                "Validation Error",
                None,
                Some(fields),
            ),
            AppError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                Some("Missing or invalid authorization header"),
                None,
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                Some("Invalid or expired token"),
                None,
            ),
            AppError::AuthenticationFailed(msg) => (
                StatusCode::UNAUTHORIZED,
                "Authentication Failed",
                Some(*msg),
                None,
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", Some(*msg), None),
            AppError::SignOutFailed(source) => {
                tracing::error!(error = ?source, "global sign out failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Sign Out Failed",
                    Some("Failed to sign out"),
                    None,
                )
            }
            AppError::Configuration(msg) => {
                tracing::error!("{}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration Error",
                    Some(*msg),
                    None,
                )
            }
            AppError::Infrastructure { public, source } => {
                tracing::error!(error = ?source, "{}", public);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    Some(*public),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error,
            message,
            details,
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
