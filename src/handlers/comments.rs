use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, MaybeUser},
    error::{AppError, Result},
    models::{
        AuthorView, CommentRow, CommentView, CreateCommentRequest, LikeState, LikeTarget,
        NewComment, PostStatus,
    },
    repository::RepositoryState,
};

use super::non_blank;

fn to_view(row: CommentRow, liked: &HashSet<Uuid>) -> CommentView {
    CommentView {
        id: row.id,
        parent_id: row.parent_id,
        content: row.content,
        created_at: row.created_at,
        author: AuthorView {
            id: row.author_id,
            name: row.author_name,
            avatar: row.author_avatar,
        },
        likes_count: row.likes_count,
        liked_by_user: liked.contains(&row.id),
        replies: Vec::new(),
    }
}

/// build_comment_tree
///
/// Groups replies under their top-level parent, keeping the input order (oldest
/// first) at both levels. A reply whose parent is not a top-level comment of
/// the set is surfaced at top level instead of being dropped.
pub fn build_comment_tree(rows: Vec<CommentRow>, liked: &HashSet<Uuid>) -> Vec<CommentView> {
    let top_level: HashSet<Uuid> = rows
        .iter()
        .filter(|r| r.parent_id.is_none())
        .map(|r| r.id)
        .collect();

    let mut roots: Vec<CommentView> = Vec::new();
    let mut replies: Vec<CommentView> = Vec::new();
    for row in rows {
        match row.parent_id {
            Some(parent) if top_level.contains(&parent) => replies.push(to_view(row, liked)),
            _ => roots.push(to_view(row, liked)),
        }
    }

    let index: HashMap<Uuid, usize> = roots.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
    for reply in replies {
        if let Some(&i) = reply.parent_id.and_then(|p| index.get(&p)) {
            roots[i].replies.push(reply);
        }
    }

    roots
}

/// Loads and assembles the comment tree of a post for `viewer`.
pub(crate) async fn load_comment_tree(
    repo: &RepositoryState,
    post_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<Vec<CommentView>> {
    let rows = repo.list_comments(post_id).await?;
    let liked = match viewer {
        Some(user_id) => repo.liked_comment_ids(user_id, post_id).await?,
        None => HashSet::new(),
    };
    Ok(build_comment_tree(rows, &liked))
}

/// Drafts and archived posts only exist for staff.
async fn ensure_visible_post(state: &AppState, post_id: Uuid, staff: bool) -> Result<()> {
    match state.repo.get_post(post_id).await? {
        Some(post) if post.status == PostStatus::Published || staff => Ok(()),
        _ => Err(AppError::NotFound("Post not found".to_string())),
    }
}

/// list_comments
///
/// [Public Route] The comment tree of a post, personalised with `likedByUser`.
#[utoipa::path(
    get,
    path = "/api/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Comment tree", body = [CommentView]),
        (status = 404, description = "Post not found")
    )
)]
pub async fn list_comments(
    viewer: MaybeUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Vec<CommentView>>> {
    ensure_visible_post(&state, post_id, viewer.is_staff()).await?;
    let tree = load_comment_tree(&state.repo, post_id, viewer.id()).await?;
    Ok(Json(tree))
}

/// create_comment
///
/// [Authenticated Route] Adds a comment, or a reply when `parentId` names a
/// top-level comment of the same post.
#[utoipa::path(
    post,
    path = "/api/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentView),
        (status = 400, description = "Empty content or invalid parent"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn create_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>)> {
    let content = non_blank(payload.content)
        .ok_or_else(|| AppError::BadRequest("Comment content is required".to_string()))?;

    ensure_visible_post(&state, post_id, user.role.is_staff()).await?;

    if let Some(parent_id) = payload.parent_id {
        // One level of nesting: the parent must itself be top-level.
        let valid = state
            .repo
            .get_comment(parent_id)
            .await?
            .is_some_and(|parent| parent.post_id == post_id && parent.parent_id.is_none());
        if !valid {
            return Err(AppError::BadRequest("Invalid parent comment".to_string()));
        }
    }

    let row = state
        .repo
        .create_comment(NewComment {
            post_id,
            parent_id: payload.parent_id,
            author_id: user.id,
            content,
        })
        .await?;

    tracing::info!(comment_id = %row.id, %post_id, author_id = %user.id, "comment created");
    Ok((StatusCode::CREATED, Json(to_view(row, &HashSet::new()))))
}

/// like_comment
///
/// [Authenticated Route] Toggles the caller's like on a comment.
#[utoipa::path(
    post,
    path = "/api/comments/{id}/like",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "New like state", body = LikeState),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn like_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<LikeState>> {
    if state.repo.get_comment(comment_id).await?.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }
    let like = state
        .repo
        .toggle_like(user.id, LikeTarget::Comment(comment_id))
        .await?;
    Ok(Json(like))
}

/// delete_comment
///
/// [Authenticated Route] Authors delete their own comments; staff delete any.
/// Replies and likes go with it.
#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> Result<StatusCode> {
    let comment = state
        .repo
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if comment.author_id != user.id && !user.role.is_staff() {
        return Err(AppError::Forbidden(
            "You can only delete your own comments".to_string(),
        ));
    }

    if !state.repo.delete_comment(comment_id).await? {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }

    tracing::info!(%comment_id, actor = %user.id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: u128, parent: Option<u128>) -> CommentRow {
        CommentRow {
            id: Uuid::from_u128(id),
            parent_id: parent.map(Uuid::from_u128),
            content: format!("comment {id}"),
            ..CommentRow::default()
        }
    }

    #[test]
    fn replies_nest_under_their_parent_in_order() {
        let rows = vec![row(1, None), row(2, None), row(3, Some(1)), row(4, Some(1))];
        let liked = HashSet::from([Uuid::from_u128(4)]);

        let tree = build_comment_tree(rows, &liked);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, Uuid::from_u128(1));
        let reply_ids: Vec<Uuid> = tree[0].replies.iter().map(|r| r.id).collect();
        assert_eq!(reply_ids, vec![Uuid::from_u128(3), Uuid::from_u128(4)]);
        assert!(tree[0].replies[1].liked_by_user);
        assert!(!tree[0].replies[0].liked_by_user);
        assert!(tree[1].replies.is_empty());
    }

    #[test]
    fn orphan_replies_surface_at_top_level() {
        // 3 replies to a comment that is not in the set; 4 replies to a reply.
        let rows = vec![row(1, None), row(2, Some(1)), row(3, Some(99)), row(4, Some(2))];

        let tree = build_comment_tree(rows, &HashSet::new());

        let top: Vec<Uuid> = tree.iter().map(|c| c.id).collect();
        assert_eq!(
            top,
            vec![Uuid::from_u128(1), Uuid::from_u128(3), Uuid::from_u128(4)]
        );
        assert_eq!(tree[0].replies.len(), 1);
    }
}
