use crate::{AppState, handlers::admin};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Nested under `/api/admin` and wrapped in the staff gate, which turns away
/// everyone but ADMIN and SUPER_ADMIN before a handler runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Post, user, comment, like and announcement counters.
        .route("/stats", get(admin::get_stats))
}
