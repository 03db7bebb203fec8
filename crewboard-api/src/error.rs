/// Error handling for the API server
///
/// Every handler and guard returns `Result<T, ApiError>`. An `ApiError` renders
/// as the failure envelope:
///
/// ```json
/// { "status": "fail", "error": { "message": "...", "errors": null } }
/// ```
///
/// Store and other internal failures are logged and replaced by a generic
/// message; their text never reaches the client.
///
/// # Example
///
/// ```
/// use crewboard_api::error::{ApiError, ApiResult};
///
/// fn find(found: bool) -> ApiResult<()> {
///     if !found {
///         return Err(ApiError::NotFound("A project with the given ID does not exist".to_string()));
///     }
///     Ok(())
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crewboard_shared::auth::authorization::AuthzError;
use crewboard_shared::auth::jwt::JwtError;
use crewboard_shared::auth::middleware::AuthError;
use crewboard_shared::auth::password::PasswordError;
use crewboard_shared::store::StorageError;
use crewboard_shared::team::TeamError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message returned for every internal failure
pub const INTERNAL_MESSAGE: &str = "Some error occurred, try again";

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Payload validation failed (400)
    ///
    /// `message` is the first violation; `errors` lists all of them.
    Validation {
        message: String,
        errors: Vec<ValidationErrorDetail>,
    },

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate email
    Conflict(String),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Failure envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always "fail"
    pub status: String,

    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message
    pub message: String,

    /// Per-field details, for validation failures
    pub errors: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Validation { message, errors } => {
                write!(f, "Validation failed: {} ({} errors)", message, errors.len())
            }
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, errors) = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => (msg, None),
            ApiError::Validation { message, errors } => (message, Some(errors)),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (INTERNAL_MESSAGE.to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            status: "fail".to_string(),
            error: ErrorBody { message, errors },
        });

        (status, body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        if err.is_forbidden() {
            ApiError::Forbidden(err.to_string())
        } else {
            ApiError::BadRequest(err.to_string())
        }
    }
}

impl From<TeamError> for ApiError {
    fn from(err: TeamError) -> Self {
        match err {
            TeamError::Unregistered { .. } => ApiError::BadRequest(err.to_string()),
            TeamError::Storage(err) => err.into(),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Token signing failures are internal; validation failures go through [`AuthError`]
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        ApiError::InternalError(format!("Token operation failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "Not found: User not found");
    }

    #[tokio::test]
    async fn test_fail_envelope() {
        let (status, body) = body_json(ApiError::Forbidden("nope".to_string())).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], "fail");
        assert_eq!(body["error"]["message"], "nope");
        assert!(body["error"]["errors"].is_null());
    }

    #[tokio::test]
    async fn test_internal_error_is_masked() {
        let err: ApiError = StorageError::Connection("redis://secret-host down".to_string()).into();
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_validation_envelope() {
        let err = ApiError::Validation {
            message: "Title must be 3 to 25 characters".to_string(),
            errors: vec![ValidationErrorDetail {
                field: "title".to_string(),
                message: "Title must be 3 to 25 characters".to_string(),
            }],
        };
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Title must be 3 to 25 characters");
        assert_eq!(body["error"]["errors"][0]["field"], "title");
    }

    #[test]
    fn test_authz_mapping() {
        assert_eq!(ApiError::from(AuthzError::NotOwner).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(AuthzError::NotTeamMember).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(AuthzError::OwnerRemoval).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_team_mapping() {
        assert_eq!(
            ApiError::from(TeamError::Unregistered { count: 1 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TeamError::Storage(StorageError::Command("x".to_string()))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_mapping() {
        let err = ApiError::from(AuthError::MissingToken);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Unauthorized: Access denied, Token required");
    }
}
