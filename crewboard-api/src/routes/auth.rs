/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/auth/signup` - Register and receive a token cookie
/// - `POST /api/v1/auth/signin` - Log in and receive a token cookie
/// - `GET  /api/v1/auth/logout` - Clear the token cookie
///
/// The token is returned both in the body and as an `HttpOnly`,
/// `SameSite=Strict` cookie named `token` that lives as long as the token.

use crate::{
    app::AppState,
    config::AuthConfig,
    error::{ApiError, ApiResult},
    extract::{Payload, ValidJson},
    response::ApiResponse,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Duration;
use crewboard_shared::{
    auth::{jwt, middleware::TOKEN_COOKIE, password},
    models::user::{NewUser, User},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email/password";

/// Signup request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(
        required(message = "It must be an alphabet of between 2-15 characters long"),
        length(min = 2, max = 15, message = "It must be an alphabet of between 2-15 characters long")
    )]
    pub first_name: Option<String>,

    #[validate(
        required(message = "It must be an alphabet of between 2-15 characters long"),
        length(min = 2, max = 15, message = "It must be an alphabet of between 2-15 characters long")
    )]
    pub last_name: Option<String>,

    #[validate(
        required(message = "A valid email address is required"),
        email(message = "A valid email address is required")
    )]
    pub email: Option<String>,

    #[validate(
        required(message = "A password of at least 6 characters is required"),
        length(min = 6, message = "A password of at least 6 characters is required")
    )]
    pub password: Option<String>,
}

impl Payload for SignupRequest {
    const FIELDS: &'static [&'static str] = &["first_name", "last_name", "email", "password"];
}

/// Signin request
///
/// Missing fields are reported as bad credentials, not as a validation error.
#[derive(Debug, Deserialize, Validate)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Payload for SigninRequest {
    const FIELDS: &'static [&'static str] = &[];
}

/// Profile plus the issued token
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: User,

    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Cookie carrying a fresh token
pub fn token_cookie(config: &AuthConfig, token: &str) -> Cookie<'static> {
    build_cookie(config, token.to_string(), config.token_ttl_secs)
}

/// Cookie that clears the token
pub fn cleared_cookie(config: &AuthConfig) -> Cookie<'static> {
    build_cookie(config, String::new(), 0)
}

fn build_cookie(config: &AuthConfig, value: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, value))
        .path("/")
        .secure(config.cookie_secure)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

fn issue_token(state: &AppState, user: &User) -> ApiResult<String> {
    let claims = jwt::Claims::with_expiration(
        user.id,
        user.email.clone(),
        Duration::seconds(state.config.auth.token_ttl_secs),
    );
    Ok(jwt::create_token(&claims, state.jwt_secret())?)
}

fn with_cookie(
    state: &AppState,
    jar: CookieJar,
    status: StatusCode,
    user: User,
) -> ApiResult<impl IntoResponse> {
    let token = issue_token(state, &user)?;
    let cookie = token_cookie(&state.config.auth, &token);

    Ok((
        status,
        jar.add(cookie),
        ApiResponse::success(AuthResponse { user, token }),
    ))
}

/// Registers a user
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `409 Conflict`: Email already registered
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(req): ValidJson<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let taken = || ApiError::Conflict("A user with your email already exists".to_string());
    let email = req.email.unwrap_or_default();

    if state.users.fetch_by_email(&email).await?.is_some() {
        return Err(taken());
    }

    let password_hash = password::hash_password(&req.password.unwrap_or_default())?;

    let user = state
        .users
        .create(NewUser {
            first_name: req.first_name.unwrap_or_default(),
            last_name: req.last_name.unwrap_or_default(),
            email,
            password_hash,
        })
        .await?
        .ok_or_else(taken)?;

    tracing::info!(user_id = %user.id, "User signed up");
    with_cookie(&state, jar, StatusCode::CREATED, user)
}

/// Logs a user in
///
/// # Errors
///
/// - `401 Unauthorized`: Missing fields, unknown email or wrong password
pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(req): ValidJson<SigninRequest>,
) -> ApiResult<impl IntoResponse> {
    let invalid = || ApiError::Unauthorized(INVALID_CREDENTIALS.to_string());

    let (email, password) = match (req.email, req.password) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
            (email, password)
        }
        _ => return Err(invalid()),
    };

    let (credential, user) = state
        .users
        .fetch_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&password, &credential.password_hash)? {
        tracing::debug!(user_id = %user.id, "Signin rejected");
        return Err(invalid());
    }

    tracing::info!(user_id = %user.id, "User signed in");
    with_cookie(&state, jar, StatusCode::OK, user)
}

/// Clears the token cookie
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(cleared_cookie(&state.config.auth)),
        ApiResponse::success(MessageResponse {
            message: "You have been successfully logged out".to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME_MESSAGE: &str = "It must be an alphabet of between 2-15 characters long";
    const EMAIL_MESSAGE: &str = "A valid email address is required";
    const PASSWORD_MESSAGE: &str = "A password of at least 6 characters is required";

    fn auth_config(secure: bool) -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-key-at-least-32-bytes-long".to_string(),
            token_ttl_secs: 7200,
            cookie_secure: secure,
        }
    }

    #[test]
    fn test_token_cookie() {
        let cookie = token_cookie(&auth_config(false), "abc");

        assert_eq!(cookie.name(), TOKEN_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(7200)));
        assert_eq!(cookie.secure(), Some(false));

        assert_eq!(token_cookie(&auth_config(true), "abc").secure(), Some(true));
    }

    #[test]
    fn test_cleared_cookie() {
        let cookie = cleared_cookie(&auth_config(false));

        assert_eq!(cookie.name(), TOKEN_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        assert_eq!(cookie.http_only(), Some(true));
        assert!(cookie.to_string().contains("Max-Age=0"));
    }

    #[test]
    fn test_signup_validation_order() {
        let req = SignupRequest {
            first_name: Some("A".to_string()),
            last_name: None,
            email: Some("not-an-email".to_string()),
            password: Some("123".to_string()),
        };
        let errors = req.validate().unwrap_err();

        match crate::extract::violations(&errors, SignupRequest::FIELDS) {
            ApiError::Validation { message, errors } => {
                assert_eq!(message, NAME_MESSAGE);
                assert_eq!(errors.len(), 4);
                assert_eq!(errors[2].message, EMAIL_MESSAGE);
                assert_eq!(errors[3].message, PASSWORD_MESSAGE);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
