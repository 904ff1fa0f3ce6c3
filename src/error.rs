use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read slot {key}: {message}")]
    Read { key: String, message: String },

    #[error("failed to write slot {key}: {message}")]
    Write { key: String, message: String },

    #[error("slot {key} holds malformed data: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode slot {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum AppError {
    /// A required input is empty. `field` uses the persisted (camelCase) field name.
    #[error("validation error: {field} is required")]
    Validation { field: &'static str },

    #[error("validation error: {field} {reason}")]
    InvalidInput {
        field: &'static str,
        reason: &'static str,
    },

    #[error("invalid transition: cannot {action} while {from}")]
    InvalidTransition { from: String, action: String },

    #[error("invalid id")]
    InvalidId,

    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("confirmation required")]
    ConfirmationRequired,

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("hashing error: {0}")]
    Hashing(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Response body code, e.g. `ASSIGNED_TO_REQUIRED` or `REPORT_NOT_FOUND`.
    pub fn code(&self) -> String {
        match self {
            AppError::Validation { field } => format!("{}_REQUIRED", screaming_snake(field)),
            AppError::InvalidInput { field, .. } => {
                format!("{}_MUST_BE_VALID", screaming_snake(field))
            }
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION".to_string(),
            AppError::InvalidId => "INVALID_ID".to_string(),
            AppError::NotFound(code) | AppError::Conflict(code) => code.to_string(),
            AppError::Unauthorized => "UNAUTHORIZED".to_string(),
            AppError::InvalidCredentials => "INVALID_CREDENTIALS".to_string(),
            AppError::ConfirmationRequired => "CONFIRMATION_REQUIRED".to_string(),
            AppError::Token(_) => "GENERATING_FAILED".to_string(),
            AppError::Hashing(_) => "HASHING_FAILED".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. }
            | AppError::InvalidInput { .. }
            | AppError::InvalidId
            | AppError::ConfirmationRequired => StatusCode::BAD_REQUEST,
            AppError::InvalidTransition { .. } | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Token(_) | AppError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).body(self.code())
    }
}

fn screaming_snake(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, c) in field.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            out.push('_');
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_code_names_the_field() {
        let error = AppError::Validation {
            field: "assignedTo",
        };
        assert_eq!(error.code(), "ASSIGNED_TO_REQUIRED");
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_input_code() {
        let error = AppError::InvalidInput {
            field: "email",
            reason: "is not an email address",
        };
        assert_eq!(error.code(), "EMAIL_MUST_BE_VALID");
    }

    #[test]
    fn transition_errors_are_conflicts() {
        let error = AppError::InvalidTransition {
            from: "Resolved".to_string(),
            action: "mark_invalid".to_string(),
        };
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.code(), "INVALID_TRANSITION");
    }
}
