use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, MaybeUser},
    error::{AppError, Result},
    models::{
        AuthorView, BlogPost, CreatePostRequest, LikeState, LikeTarget, NewPost, PostChanges,
        PostListItem, PostPage, PostQuery, PostStatus, PostView, UpdatePostRequest,
    },
    repository::RepositoryState,
    slug,
};

use super::{comments::load_comment_tree, non_blank, nullable_text};

const DEFAULT_PAGE_SIZE: i64 = 9;
const MAX_PAGE_SIZE: i64 = 100;

// --- Filter Structs ---

/// PostFilter
///
/// Query parameters of the post listing. Numbers are parsed leniently: a
/// malformed value falls back to the default.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PostFilter {
    /// Exact category; `all` disables the filter.
    pub category: Option<String>,
    /// Staff only: DRAFT, PUBLISHED, ARCHIVED or `all`.
    pub status: Option<String>,
    /// Case-insensitive match on title, content, excerpt and category.
    pub search: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PostFilter {
    /// Normalises the raw parameters. Non-staff always get PUBLISHED posts.
    pub fn into_query(self, staff: bool) -> Result<PostQuery> {
        let status = match non_blank(self.status) {
            Some(raw) if staff => {
                if raw.eq_ignore_ascii_case("all") {
                    None
                } else {
                    let status = raw
                        .parse::<PostStatus>()
                        .map_err(|_| AppError::BadRequest("Invalid status".to_string()))?;
                    Some(status)
                }
            }
            _ => Some(PostStatus::Published),
        };

        let category = non_blank(self.category).filter(|c| !c.eq_ignore_ascii_case("all"));

        let page = self
            .page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1);
        let page_size = self
            .page_size
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        Ok(PostQuery {
            status,
            category,
            search: non_blank(self.search),
            page,
            page_size,
        })
    }
}

/// resolve_slug
///
/// Derives the slug for `title`. When another post already owns it, a
/// millisecond timestamp is appended. `current` is the post being edited,
/// which may keep its own slug.
pub(crate) async fn resolve_slug(
    repo: &RepositoryState,
    title: &str,
    current: Option<Uuid>,
) -> Result<String> {
    let base = slug::slugify(title);
    match repo.get_post_by_slug(&base).await? {
        Some(owner) if Some(owner.id) != current => Ok(slug::disambiguate(
            &base,
            Utc::now().timestamp_millis(),
        )),
        _ => Ok(base),
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Post not found".to_string())
}

/// Ownership rule for edits and deletes: staff may touch their own posts,
/// SUPER_ADMIN may touch any.
fn ensure_can_modify(user: &AuthUser, post: &BlogPost) -> Result<()> {
    user.require_staff()?;
    if post.author_id != user.id && !user.role.is_super_admin() {
        return Err(AppError::Forbidden(
            "You can only modify your own posts".to_string(),
        ));
    }
    Ok(())
}

// --- Handlers ---

/// list_posts
///
/// [Public Route] Paginated listing, newest publication first.
#[utoipa::path(
    get,
    path = "/api/posts",
    params(PostFilter),
    responses(
        (status = 200, description = "One page of posts", body = PostPage),
        (status = 400, description = "Invalid status filter")
    )
)]
pub async fn list_posts(
    viewer: MaybeUser,
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<PostPage>> {
    let query = filter.into_query(viewer.is_staff())?;
    let (page, page_size) = (query.page, query.page_size);

    let (total, rows) = state.repo.list_posts(query).await?;

    Ok(Json(PostPage {
        items: rows.into_iter().map(PostListItem::from).collect(),
        total,
        page,
        page_size,
        total_pages: (total + page_size - 1) / page_size,
    }))
}

/// get_post
///
/// [Public Route] A single post by id. Unpublished posts are only visible to
/// staff; everyone else gets 404.
#[utoipa::path(
    get,
    path = "/api/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = BlogPost),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_post(
    viewer: MaybeUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BlogPost>> {
    match state.repo.get_post(id).await? {
        Some(post) if post.status == PostStatus::Published || viewer.is_staff() => Ok(Json(post)),
        _ => Err(not_found()),
    }
}

/// get_post_by_slug
///
/// [Public Route] Article page payload: the published post with its author,
/// like state for the viewer and the full comment tree.
#[utoipa::path(
    get,
    path = "/api/posts/by-slug/{slug}",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Found", body = PostView),
        (status = 404, description = "Not found or not published")
    )
)]
pub async fn get_post_by_slug(
    viewer: MaybeUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PostView>> {
    let post = state
        .repo
        .get_post_by_slug(&slug)
        .await?
        .filter(|p| p.status == PostStatus::Published)
        .ok_or_else(not_found)?;

    let avatar = state
        .repo
        .get_user(post.author_id)
        .await?
        .and_then(|author| author.avatar);
    let like = state.repo.post_like_state(post.id, viewer.id()).await?;
    let comments = load_comment_tree(&state.repo, post.id, viewer.id()).await?;

    Ok(Json(PostView {
        id: post.id,
        title: post.title,
        slug: post.slug,
        excerpt: post.excerpt,
        content: post.content,
        category: post.category,
        featured_image: post.featured_image,
        status: post.status,
        published_at: post.published_at,
        created_at: post.created_at,
        author: AuthorView {
            id: post.author_id,
            name: post.author_name,
            avatar,
        },
        likes_count: like.likes_count,
        liked_by_user: like.liked,
        comments,
    }))
}

/// create_post
///
/// [Staff Route] Creates a post authored by the caller.
#[utoipa::path(
    post,
    path = "/api/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = BlogPost),
        (status = 400, description = "Missing required fields"),
        (status = 403, description = "Not staff")
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<BlogPost>)> {
    user.require_staff()?;

    let (Some(title), Some(content), Some(category)) = (
        non_blank(payload.title),
        non_blank(payload.content),
        non_blank(payload.category),
    ) else {
        return Err(AppError::BadRequest("Missing required fields".to_string()));
    };

    let status = payload.status.unwrap_or_default();
    let slug = resolve_slug(&state.repo, &title, None).await?;

    let post = state
        .repo
        .create_post(NewPost {
            title,
            slug,
            excerpt: non_blank(payload.excerpt),
            content,
            category,
            status,
            featured_image: non_blank(payload.featured_image),
            author_id: user.id,
            published_at: (status == PostStatus::Published).then(Utc::now),
        })
        .await?;

    tracing::info!(post_id = %post.id, slug = %post.slug, author_id = %user.id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Staff Route] Partial update. A changed title regenerates the slug; the
/// first transition to PUBLISHED stamps `publishedAt`, which is never moved
/// afterwards.
#[utoipa::path(
    put,
    path = "/api/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = BlogPost),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<BlogPost>> {
    user.require_staff()?;
    let existing = state.repo.get_post(id).await?.ok_or_else(not_found)?;
    ensure_can_modify(&user, &existing)?;

    let mut changes = PostChanges {
        excerpt: nullable_text(payload.excerpt),
        content: non_blank(payload.content),
        category: non_blank(payload.category),
        status: payload.status,
        featured_image: nullable_text(payload.featured_image),
        ..PostChanges::default()
    };

    if let Some(title) = non_blank(payload.title).filter(|t| *t != existing.title) {
        changes.slug = Some(resolve_slug(&state.repo, &title, Some(id)).await?);
        changes.title = Some(title);
    }

    if changes.status == Some(PostStatus::Published) && existing.published_at.is_none() {
        changes.published_at = Some(Utc::now());
    }

    let post = state
        .repo
        .update_post(id, changes)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(post_id = %id, actor = %user.id, "post updated");
    Ok(Json(post))
}

/// delete_post
///
/// [Staff Route] Removes a post with its comments and likes.
#[utoipa::path(
    delete,
    path = "/api/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    user.require_staff()?;
    let existing = state.repo.get_post(id).await?.ok_or_else(not_found)?;
    ensure_can_modify(&user, &existing)?;

    if !state.repo.delete_post(id).await? {
        return Err(not_found());
    }

    tracing::info!(post_id = %id, actor = %user.id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// like_post
///
/// [Authenticated Route] Toggles the caller's like on a visible post.
#[utoipa::path(
    post,
    path = "/api/posts/{id}/like",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "New like state", body = LikeState),
        (status = 404, description = "Not found")
    )
)]
pub async fn like_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LikeState>> {
    match state.repo.get_post(id).await? {
        Some(post) if post.status == PostStatus::Published || user.role.is_staff() => {}
        _ => return Err(not_found()),
    }

    let like = state.repo.toggle_like(user.id, LikeTarget::Post(id)).await?;
    Ok(Json(like))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(status: Option<&str>, page: Option<&str>, page_size: Option<&str>) -> PostFilter {
        PostFilter {
            status: status.map(str::to_string),
            page: page.map(str::to_string),
            page_size: page_size.map(str::to_string),
            ..PostFilter::default()
        }
    }

    #[test]
    fn public_listing_is_pinned_to_published() {
        let query = filter(Some("DRAFT"), None, None).into_query(false).unwrap();
        assert_eq!(query.status, Some(PostStatus::Published));
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn staff_can_list_every_status() {
        let all = filter(Some("all"), None, None).into_query(true).unwrap();
        assert_eq!(all.status, None);

        let drafts = filter(Some("draft"), None, None).into_query(true).unwrap();
        assert_eq!(drafts.status, Some(PostStatus::Draft));

        assert!(filter(Some("pending"), None, None).into_query(true).is_err());
    }

    #[test]
    fn paging_is_clamped() {
        let query = filter(None, Some("0"), Some("1000")).into_query(false).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, MAX_PAGE_SIZE);

        let query = filter(None, Some("abc"), Some("-4")).into_query(false).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 1);
    }

    #[test]
    fn huge_page_does_not_overflow() {
        let query = filter(None, Some("9223372036854775807"), Some("100"))
            .into_query(false)
            .unwrap();
        assert_eq!(query.page, i64::MAX);
        assert_eq!(query.offset(), i64::MAX);
    }

    #[test]
    fn category_all_is_ignored() {
        let query = PostFilter {
            category: Some("All".into()),
            ..PostFilter::default()
        }
        .into_query(false)
        .unwrap();
        assert_eq!(query.category, None);
    }
}
