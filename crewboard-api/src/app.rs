/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use crewboard_api::{app::AppState, config::Config};
/// use crewboard_shared::store::RedisStore;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let store = RedisStore::new(config.redis.clone()).await?;
/// let state = AppState::new(Arc::new(store), config);
/// let app = crewboard_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{auth::authenticate, project},
    routes,
};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, put},
    Router,
};
use crewboard_shared::{
    models::{project::ProjectRepository, user::UserDirectory},
    store::KeyValueStore,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Backing key-value store
    pub store: Arc<dyn KeyValueStore>,

    /// User records and credentials
    pub users: UserDirectory,

    /// Projects and their teams
    pub projects: ProjectRepository,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state over a store
    pub fn new(store: Arc<dyn KeyValueStore>, config: Config) -> Self {
        let users = UserDirectory::new(store.clone());
        let projects = ProjectRepository::new(store.clone(), users.clone());

        Self {
            store,
            users,
            projects,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.auth.jwt_secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                              # Health check (public)
/// └── /api/v1/
///     ├── /auth/                           # Public
///     │   ├── POST /signup
///     │   ├── POST /signin
///     │   └── GET  /logout
///     ├── /project/                        # Authenticated
///     │   ├── POST  /
///     │   ├── GET   /
///     │   ├── GET   /:id                   # load project, team member
///     │   ├── PUT   /:id                   # load project, owner
///     │   ├── DELETE /:id                  # load project, owner
///     │   ├── PATCH /:id/team              # load project, owner
///     │   └── PATCH /:id/team/:member_id   # load project, owner
///     └── /user/                           # Authenticated
///         ├── GET /
///         └── GET /team/projects
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. CORS (tower-http CorsLayer)
/// 2. Logging (tower-http TraceLayer)
/// 3. Authentication (protected routes only)
/// 4. Project loading, then the owner or team-member check
pub fn build_router(state: AppState) -> Router {
    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes (public, no auth required)
    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/signin", post(routes::auth::signin))
        .route("/logout", get(routes::auth::logout));

    // Routes addressing one project: existence first, then the role check
    let single_project_routes = Router::new()
        .route(
            "/:id",
            get(routes::projects::get_project)
                .route_layer(from_fn(project::require_member))
                .merge(
                    put(routes::projects::update_project)
                        .merge(delete(routes::projects::delete_project))
                        .route_layer(from_fn(project::require_owner)),
                ),
        )
        .route(
            "/:id/team",
            patch(routes::projects::add_team_members).route_layer(from_fn(project::require_owner)),
        )
        .route(
            "/:id/team/:member_id",
            patch(routes::projects::remove_team_member)
                .route_layer(from_fn(project::require_owner)),
        )
        .route_layer(from_fn_with_state(state.clone(), project::load_project));

    let project_routes = Router::new()
        .route(
            "/",
            post(routes::projects::create_project).get(routes::projects::list_projects),
        )
        .merge(single_project_routes);

    let user_routes = Router::new()
        .route("/", get(routes::users::current_user))
        .route("/team/projects", get(routes::users::team_projects));

    let protected_routes = Router::new()
        .nest("/project", project_routes)
        .nest("/user", user_routes)
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    let cors = cors_layer(&state.config.api.cors_origins);

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", v1_routes)
        .fallback(route_not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Permissive CORS for `*`, otherwise the listed origins with credentials
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-access-token"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
