//! Admin financial report handlers.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use crate::auth::RequireAdmin;
use crate::error::Result;
use crate::services::{FinancialQuery, GroupBy, ReportPeriod};
use crate::state::AppState;

/// Build the reports subrouter.
pub fn routes() -> Router<AppState> {
    Router::new().route("/financial", get(financial))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialReportQuery {
    period: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    group_by: Option<String>,
}

/// `GET /api/reports/financial` - admin financial breakdown.
async fn financial(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<FinancialReportQuery>,
) -> Result<impl IntoResponse> {
    let parse = |raw: &str, end: bool| super::orders::parse_date(raw, end);

    let financial_query = FinancialQuery {
        period: query
            .period
            .as_deref()
            .map_or_else(ReportPeriod::default, ReportPeriod::from_query),
        start_date: query
            .start_date
            .as_deref()
            .map(|d| parse(d, false))
            .transpose()?,
        end_date: query
            .end_date
            .as_deref()
            .map(|d| parse(d, true))
            .transpose()?,
        group_by: query
            .group_by
            .as_deref()
            .map_or_else(GroupBy::default, GroupBy::from_query),
    };

    let report = state.reports().financial_report(&financial_query).await?;
    Ok(Json(report))
}
