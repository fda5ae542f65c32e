use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, MaybeUser},
    error::{AppError, Result},
    models::{CreateHeroPostRequest, HeroPost, HeroPostChanges, NewHeroPost, UpdateHeroPostRequest},
};

use super::{non_blank, nullable_text};

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct HeroFilter {
    /// `true` restricts staff to the active announcements, as the homepage shows them.
    pub public: Option<String>,
}

fn not_found() -> AppError {
    AppError::NotFound("Hero post not found".to_string())
}

/// list_hero_posts
///
/// [Public Route] Homepage announcements, newest first. Staff see inactive
/// ones too unless `public=true`.
#[utoipa::path(
    get,
    path = "/api/hero-posts",
    params(HeroFilter),
    responses((status = 200, description = "Announcements", body = [HeroPost]))
)]
pub async fn list_hero_posts(
    viewer: MaybeUser,
    State(state): State<AppState>,
    Query(filter): Query<HeroFilter>,
) -> Result<Json<Vec<HeroPost>>> {
    let public = filter.public.as_deref() == Some("true");
    let posts = state
        .repo
        .list_hero_posts(public || !viewer.is_staff())
        .await?;
    Ok(Json(posts))
}

/// get_hero_post
///
/// [Public Route] Inactive announcements are hidden from non-staff.
#[utoipa::path(
    get,
    path = "/api/hero-posts/{id}",
    params(("id" = Uuid, Path, description = "Hero post ID")),
    responses(
        (status = 200, description = "Found", body = HeroPost),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_hero_post(
    viewer: MaybeUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HeroPost>> {
    match state.repo.get_hero_post(id).await? {
        Some(post) if post.is_active || viewer.is_staff() => Ok(Json(post)),
        _ => Err(not_found()),
    }
}

/// create_hero_post
///
/// [Staff Route] Active and LANDSCAPE unless stated otherwise.
#[utoipa::path(
    post,
    path = "/api/hero-posts",
    request_body = CreateHeroPostRequest,
    responses(
        (status = 201, description = "Created", body = HeroPost),
        (status = 400, description = "Title is required"),
        (status = 403, description = "Not staff")
    )
)]
pub async fn create_hero_post(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateHeroPostRequest>,
) -> Result<(StatusCode, Json<HeroPost>)> {
    user.require_staff()?;

    let title = non_blank(payload.title)
        .ok_or_else(|| AppError::BadRequest("Title is required".to_string()))?;

    let post = state
        .repo
        .create_hero_post(NewHeroPost {
            title,
            content: non_blank(payload.content),
            image: non_blank(payload.image),
            is_active: payload.is_active.unwrap_or(true),
            orientation: payload.orientation.unwrap_or_default(),
        })
        .await?;

    tracing::info!(hero_post_id = %post.id, actor = %user.id, "hero post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_hero_post
///
/// [Staff Route] Partial update; `content` and `image` accept `null` to clear.
#[utoipa::path(
    put,
    path = "/api/hero-posts/{id}",
    params(("id" = Uuid, Path, description = "Hero post ID")),
    request_body = UpdateHeroPostRequest,
    responses(
        (status = 200, description = "Updated", body = HeroPost),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_hero_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateHeroPostRequest>,
) -> Result<Json<HeroPost>> {
    user.require_staff()?;

    let changes = HeroPostChanges {
        title: non_blank(payload.title),
        content: nullable_text(payload.content),
        image: nullable_text(payload.image),
        is_active: payload.is_active,
        orientation: payload.orientation,
    };

    let post = state
        .repo
        .update_hero_post(id, changes)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(hero_post_id = %id, actor = %user.id, "hero post updated");
    Ok(Json(post))
}

#[utoipa::path(
    delete,
    path = "/api/hero-posts/{id}",
    params(("id" = Uuid, Path, description = "Hero post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_hero_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    user.require_staff()?;

    if !state.repo.delete_hero_post(id).await? {
        return Err(not_found());
    }

    tracing::info!(hero_post_id = %id, actor = %user.id, "hero post deleted");
    Ok(StatusCode::NO_CONTENT)
}
