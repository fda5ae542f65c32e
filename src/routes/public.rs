use crate::{
    AppState,
    handlers::{auth, comments, hero_posts, posts},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Visibility rules (published posts,
/// active announcements) are applied by the handlers, which widen them for
/// staff when a session is present.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // --- Auth ---
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/auth/google", post(auth::google_signin))
        .route("/auth/signout", post(auth::signout))
        // --- Blog ---
        // GET /posts?category=&status=&search=&page=&pageSize=
        .route("/posts", get(posts::list_posts))
        .route("/posts/by-slug/{slug}", get(posts::get_post_by_slug))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}/comments", get(comments::list_comments))
        // --- Homepage announcements ---
        .route("/hero-posts", get(hero_posts::list_hero_posts))
        .route("/hero-posts/{id}", get(hero_posts::get_hero_post))
}
