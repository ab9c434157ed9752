use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

use pixelrelay_core::kpi::{compute_kpis, KpiQuery};

use crate::{error::AppError, state::AppState};

/// `GET /api/kpis?from=&to=&pageId=` — period-over-period landing KPIs.
///
/// Missing or malformed parameters answer 400; a failed store read answers
/// 500 and is logged with the period and collection it came from.
#[tracing::instrument(skip(state))]
pub async fn get_kpis(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KpiQuery>,
) -> Result<impl IntoResponse, AppError> {
    let db = state.db.as_ref();
    let report = compute_kpis(db, db, &query).await?;
    Ok(Json(report))
}
