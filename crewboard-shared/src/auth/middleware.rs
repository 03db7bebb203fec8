/// Request authentication
///
/// Pulls the access token out of a request's headers, validates it and turns
/// the claims into an [`AuthContext`]. The API's authenticate layer calls
/// [`authenticate`] and inserts the context into the request extensions for
/// the guards and handlers behind it.
///
/// # Token lookup order
///
/// 1. `token` cookie
/// 2. `Authorization` header (`Bearer <token>` or the bare token)
/// 3. `x-access-token` header
/// 4. `token` header
///
/// # Example
///
/// ```
/// use axum::http::{header, HeaderMap, HeaderValue};
/// use crewboard_shared::auth::jwt::{create_token, Claims};
/// use crewboard_shared::auth::middleware::authenticate;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "your-secret-key-at-least-32-bytes";
/// let user_id = Uuid::new_v4();
/// let token = create_token(&Claims::new(user_id, "ada@example.com"), secret)?;
///
/// let mut headers = HeaderMap::new();
/// headers.insert(header::COOKIE, HeaderValue::from_str(&format!("token={}", token))?);
///
/// let auth = authenticate(&headers, secret)?;
/// assert_eq!(auth.user_id, user_id);
/// # Ok(())
/// # }
/// ```

use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_token, Claims, JwtError};

/// Name of the cookie and fallback header carrying the token
pub const TOKEN_COOKIE: &str = "token";

/// Authenticated identity attached to a request
///
/// Handlers extract it with `Extension<AuthContext>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Email the token was issued for
    pub email: String,
}

impl AuthContext {
    /// Creates auth context from validated claims
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
        }
    }
}

/// Authentication failures (all 401)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No token anywhere in the request
    #[error("Access denied, Token required")]
    MissingToken,

    /// Bad signature, issuer or format
    #[error("Invalid Token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::Expired,
            _ => AuthError::InvalidToken,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Non-empty `token` cookie across every `Cookie` header
fn cookie_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(TOKEN_COOKIE)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Finds the raw token in the request, following the lookup order
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = cookie_token(headers) {
        return Some(token);
    }

    if let Some(value) = header_str(headers, header::AUTHORIZATION.as_str()) {
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    header_str(headers, "x-access-token")
        .or_else(|| header_str(headers, TOKEN_COOKIE))
        .map(String::from)
}

/// Extracts and validates the request's token
///
/// # Errors
///
/// - `AuthError::MissingToken` if no token was sent
/// - `AuthError::Expired` if the token is past its expiry
/// - `AuthError::InvalidToken` for any other validation failure
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let token = extract_token(headers).ok_or(AuthError::MissingToken)?;
    let claims = validate_token(&token, secret)?;
    Ok(AuthContext::from_claims(claims))
}
