use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Broad failure categories every error code falls into.
///
/// Callers branch on the kind (retry toast, re-login, cooldown message)
/// rather than on individual codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    NotFound,
    Authorization,
    Policy,
    Validation,
    Internal,
}

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Profile and location errors
/// - E2xxx: Relationship graph errors
/// - E3xxx: Messaging errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthenticated,
    Forbidden,
    ServiceUnavailable,
    BadRequest,
    TokenExpired,
    TokenInvalid,

    // Profile (E1xxx)
    ProfileNotFound,
    ActivitiesCooldown,
    TooManyPhotos,
    PhotoUploadFailed,
    InvalidCoordinates,
    LocationNotFound,
    NotLocationOwner,

    // Graph (E2xxx)
    CannotTargetSelf,
    MatchNotFound,
    NotMatchParticipant,
    PairBlocked,

    // Messaging (E3xxx)
    ConversationNotFound,
    NotConversationMember,
    MessagingBlocked,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthenticated => "E0004",
            Self::Forbidden => "E0005",
            Self::ServiceUnavailable => "E0006",
            Self::BadRequest => "E0007",
            Self::TokenExpired => "E0008",
            Self::TokenInvalid => "E0009",

            // Profile
            Self::ProfileNotFound => "E1001",
            Self::ActivitiesCooldown => "E1002",
            Self::TooManyPhotos => "E1003",
            Self::PhotoUploadFailed => "E1004",
            Self::InvalidCoordinates => "E1005",
            Self::LocationNotFound => "E1006",
            Self::NotLocationOwner => "E1007",

            // Graph
            Self::CannotTargetSelf => "E2001",
            Self::MatchNotFound => "E2002",
            Self::NotMatchParticipant => "E2003",
            Self::PairBlocked => "E2004",

            // Messaging
            Self::ConversationNotFound => "E3001",
            Self::NotConversationMember => "E3002",
            Self::MessagingBlocked => "E3003",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated | Self::TokenExpired | Self::TokenInvalid => ErrorKind::Authentication,
            Self::NotFound | Self::ProfileNotFound | Self::LocationNotFound
            | Self::MatchNotFound | Self::ConversationNotFound => ErrorKind::NotFound,
            Self::Forbidden | Self::NotLocationOwner | Self::NotMatchParticipant
            | Self::NotConversationMember => ErrorKind::Authorization,
            Self::ActivitiesCooldown | Self::PairBlocked | Self::MessagingBlocked => ErrorKind::Policy,
            Self::ValidationError | Self::BadRequest | Self::TooManyPhotos
            | Self::PhotoUploadFailed | Self::InvalidCoordinates | Self::CannotTargetSelf => ErrorKind::Validation,
            Self::InternalError | Self::ServiceUnavailable => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ActivitiesCooldown => StatusCode::CONFLICT,
            _ => match self.kind() {
                ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Authorization | ErrorKind::Policy => StatusCode::FORBIDDEN,
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthenticated, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Error code carried by this error, if it is a known one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            AppError::Known { code, .. } => Some(*code),
            AppError::Validation(_) => Some(ErrorCode::ValidationError),
            AppError::Database(diesel::result::Error::NotFound) => Some(ErrorCode::NotFound),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().map(|c| c.kind()).unwrap_or(ErrorKind::Internal)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
