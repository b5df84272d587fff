//! Prometheus scrape endpoint

use axum::{extract::State, http::header, response::IntoResponse};

use crate::api::{error::ApiResult, state::ApiState};

/// GET /metrics
pub async fn exposition(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let body = state.metrics.encode()?;
    Ok((
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        body,
    ))
}
