/// Authenticate layer
///
/// Validates the request's access token (cookie or header) and inserts the
/// resulting [`AuthContext`] into the request extensions. Requests without a
/// valid token stop here with a 401.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use crewboard_shared::auth::middleware::authenticate as authenticate_headers;

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate_headers(request.headers(), state.jwt_secret()).map_err(|err| {
        tracing::debug!(reason = %err, path = %request.uri().path(), "Authentication failed");
        err
    })?;

    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}
