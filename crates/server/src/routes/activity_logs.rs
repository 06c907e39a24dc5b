//! Admin activity-log listing.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use zagros_core::UserId;

use crate::auth::RequireAdmin;
use crate::error::Result;
use crate::models::{ActivityFilter, Pagination};
use crate::state::AppState;

/// Build the activity-logs subrouter.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    user_id: Option<i64>,
    action: Option<String>,
    entity: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

/// `GET /api/activity-logs` - admin audit trail.
async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let filter = ActivityFilter {
        user_id: query.user_id.map(UserId::new),
        action: query.action,
        entity: query.entity,
        date_from: query
            .date_from
            .as_deref()
            .map(|d| super::orders::parse_date(d, false))
            .transpose()?,
        date_to: query
            .date_to
            .as_deref()
            .map(|d| super::orders::parse_date(d, true))
            .transpose()?,
    };

    let page = state
        .activity()
        .list(
            &filter,
            Pagination::clamped(query.page.unwrap_or(1), query.limit.unwrap_or(50)),
        )
        .await
        .map_err(crate::error::AppError::Database)?;

    Ok(Json(page))
}
