use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// The persistence collaborator failed (read or write).
    StoreUnavailable(sqlx::Error),
    /// Target user record does not exist at all.
    ProfileNotFound(String),
    /// User exists but has never submitted a financial profile.
    /// Distinct from `ProfileNotFound` so callers can route the user to
    /// profile completion instead of showing a generic 404.
    FinancialProfileMissing(String),
    /// Malformed request (empty user id list, bad query parameters).
    InvalidInput(String),
    /// No valid caller identity was supplied.
    Unauthenticated(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::StoreUnavailable(e) => write!(f, "Store unavailable: {}", e),
            AppError::ProfileNotFound(msg) => write!(f, "Profile not found: {}", msg),
            AppError::FinancialProfileMissing(msg) => {
                write!(f, "Financial profile missing: {}", msg)
            }
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::StoreUnavailable(e) => {
                tracing::error!("Store error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Persistence store unavailable".to_string(),
                )
            }
            AppError::ProfileNotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::FinancialProfileMissing(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthenticated(msg) => {
                tracing::warn!("Unauthenticated request: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// Make AppError cloneable for WithContext variant
impl Clone for AppError {
    /// Clones the error.
    ///
    /// Note: `sqlx::Error` is not cloneable, so `StoreUnavailable` is simplified to `RowNotFound` during cloning.
    fn clone(&self) -> Self {
        match self {
            AppError::StoreUnavailable(_e) => AppError::StoreUnavailable(sqlx::Error::RowNotFound),
            AppError::ProfileNotFound(msg) => AppError::ProfileNotFound(msg.clone()),
            AppError::FinancialProfileMissing(msg) => {
                AppError::FinancialProfileMissing(msg.clone())
            }
            AppError::InvalidInput(msg) => AppError::InvalidInput(msg.clone()),
            AppError::Unauthenticated(msg) => AppError::Unauthenticated(msg.clone()),
            AppError::InternalError(msg) => AppError::InternalError(msg.clone()),
            AppError::WithContext { source, context } => AppError::WithContext {
                source: source.clone(),
                context: context.clone(),
            },
        }
    }
}

impl From<sqlx::Error> for AppError {
    /// Converts a `sqlx::Error` into an `AppError`.
    fn from(err: sqlx::Error) -> Self {
        AppError::StoreUnavailable(err)
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    #[allow(dead_code)]
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::StoreUnavailable(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::StoreUnavailable(e)),
            context: f(),
        })
    }
}
