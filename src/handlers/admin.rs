use axum::{Json, extract::State};

use crate::{AppState, auth::AuthUser, error::Result, models::DashboardStats};

/// get_stats
///
/// [Admin Route] Counters for the dashboard header. Repeats the staff check
/// of the gate in front of `/api/admin`.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Stats", body = DashboardStats),
        (status = 401, description = "No session"),
        (status = 403, description = "Not staff")
    )
)]
pub async fn get_stats(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>> {
    user.require_staff()?;
    Ok(Json(state.repo.get_stats().await?))
}
