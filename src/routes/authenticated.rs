use crate::{
    AppState,
    handlers::{auth, comments, hero_posts, posts, users},
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the authentication middleware, so handlers
/// always receive a resolved `AuthUser`. Finer rules live in the handlers:
/// - posts and hero posts: staff, and post edits need ownership unless SUPER_ADMIN
/// - comments: author or staff may delete
/// - users: SUPER_ADMIN only
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/auth/me", get(auth::me))
        // --- Blog authoring ---
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{id}",
            put(posts::update_post).delete(posts::delete_post),
        )
        .route("/posts/{id}/like", post(posts::like_post))
        // --- Comments ---
        .route("/posts/{id}/comments", post(comments::create_comment))
        .route("/comments/{id}", delete(comments::delete_comment))
        .route("/comments/{id}/like", post(comments::like_comment))
        // --- Homepage announcements ---
        .route("/hero-posts", post(hero_posts::create_hero_post))
        .route(
            "/hero-posts/{id}",
            put(hero_posts::update_hero_post).delete(hero_posts::delete_hero_post),
        )
        // --- User management ---
        .route("/users", get(users::list_users))
        .route(
            "/users/{id}",
            put(users::update_user_role).delete(users::delete_user),
        )
}
