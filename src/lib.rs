use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderMap, HeaderName, header},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod repository;
pub mod slug;

// Route groups segregated by access tier (public, authenticated, admin).
pub mod routes;
use auth::{AuthUser, MaybeUser};
use error::AppError;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use identity::{GoogleIdentityProvider, IdentityState, MockIdentityProvider};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// Browser requests to the gated area are sent here.
pub const SIGN_IN_PATH: &str = "/auth/signin";

/// ApiDoc
///
/// OpenAPI document for every handler and schema, served at
/// `/api-docs/openapi.json` and browsable through Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::signup, handlers::auth::signin, handlers::auth::google_signin,
        handlers::auth::signout, handlers::auth::me,
        handlers::posts::list_posts, handlers::posts::get_post, handlers::posts::get_post_by_slug,
        handlers::posts::create_post, handlers::posts::update_post, handlers::posts::delete_post,
        handlers::posts::like_post,
        handlers::comments::list_comments, handlers::comments::create_comment,
        handlers::comments::like_comment, handlers::comments::delete_comment,
        handlers::hero_posts::list_hero_posts, handlers::hero_posts::get_hero_post,
        handlers::hero_posts::create_hero_post, handlers::hero_posts::update_hero_post,
        handlers::hero_posts::delete_hero_post,
        handlers::users::list_users, handlers::users::update_user_role, handlers::users::delete_user,
        handlers::admin::get_stats,
    ),
    components(
        schemas(
            models::Role, models::PostStatus, models::Orientation,
            models::BlogPost, models::HeroPost, models::PostListItem, models::PostPage,
            models::PostView, models::CommentView, models::AuthorView, models::LikeState,
            models::UserProfile, models::UserSummary, models::AuthResponse, models::DashboardStats,
            models::SignUpRequest, models::SignInRequest, models::GoogleSignInRequest,
            models::CreatePostRequest, models::UpdatePostRequest, models::CreateCommentRequest,
            models::CreateHeroPostRequest, models::UpdateHeroPostRequest,
            models::UpdateUserRoleRequest,
        )
    ),
    tags(
        (name = "chapter-portal", description = "Chapter website CMS API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration, cloned into
/// every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// OAuth token verification; `None` when Google sign-in is not configured.
    pub identity: Option<IdentityState>,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets the auth extractors pull only what they need from the state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards the authenticated group: the `AuthUser` extractor rejects the
/// request with 401 before any handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// staff_gate
///
/// Authorization gate in front of the admin area. Staff pass through.
/// Browsers (Accept: text/html) are redirected to the sign-in page with 303;
/// API clients get 401 without a session and 403 with a non-staff one.
async fn staff_gate(viewer: MaybeUser, request: Request, next: Next) -> Response {
    match viewer.0 {
        Some(user) if user.role.is_staff() => next.run(request).await,
        _ if wants_html(request.headers()) => Redirect::to(SIGN_IN_PATH).into_response(),
        None => AppError::Unauthorized("Unauthorized".to_string()).into_response(),
        Some(user) => {
            tracing::warn!(user_id = %user.id, role = user.role.as_str(), "staff gate refused");
            AppError::Forbidden("Forbidden".to_string()).into_response()
        }
    }
}

/// create_router
///
/// Assembles the routing tree, scoped guards, documentation and the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API routes, each tier with its guard.
    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), staff_gate)),
        );

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .with_state(state);

    // 3. Observability and correlation layers.
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying method, uri and the request id, so every log
/// line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
