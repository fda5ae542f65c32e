use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    models::{Role, UpdateUserRoleRequest, UserProfile, UserQuery, UserSummary},
};

use super::non_blank;

/// UserFilter
///
/// Query parameters of the user table. `role` is case-insensitive and `all`
/// disables it; `search` matches name or email.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct UserFilter {
    pub role: Option<String>,
    pub search: Option<String>,
}

impl UserFilter {
    pub fn into_query(self) -> Result<UserQuery> {
        let role = match non_blank(self.role) {
            Some(raw) if !raw.eq_ignore_ascii_case("all") => Some(
                raw.parse::<Role>()
                    .map_err(|_| AppError::BadRequest("Invalid role".to_string()))?,
            ),
            _ => None,
        };

        Ok(UserQuery {
            role,
            search: non_blank(self.search),
        })
    }
}

/// list_users
///
/// [Super Admin Route] Every account, newest first, with its post count.
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserFilter),
    responses(
        (status = 200, description = "Users", body = [UserSummary]),
        (status = 403, description = "Not a super admin")
    )
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<UserSummary>>> {
    user.require_super_admin()?;
    let users = state.repo.list_users(filter.into_query()?).await?;
    Ok(Json(users))
}

/// update_user_role
///
/// [Super Admin Route] Promotes to ADMIN or demotes to MEMBER. SUPER_ADMIN and
/// GUEST cannot be granted here, and nobody changes their own role.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRoleRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Invalid role or own account"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_user_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRoleRequest>,
) -> Result<Json<UserProfile>> {
    user.require_super_admin()?;

    // Exact wire values only; the lenient parse is for query-string filters.
    let role = match payload.role.as_str() {
        "ADMIN" => Role::Admin,
        "MEMBER" => Role::Member,
        _ => return Err(AppError::BadRequest("Invalid role".to_string())),
    };

    if id == user.id {
        return Err(AppError::BadRequest(
            "You cannot change your own role".to_string(),
        ));
    }

    let updated = state
        .repo
        .set_user_role(id, role)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %id, role = role.as_str(), actor = %user.id, "role changed");
    Ok(Json(UserProfile::from(updated)))
}

/// delete_user
///
/// [Super Admin Route] Removes an account with its posts, comments and likes.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Own account"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    user.require_super_admin()?;

    if id == user.id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    if !state.repo.delete_user(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %id, actor = %user.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
