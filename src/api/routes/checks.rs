//! Audit log endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{ChecksResponse, OutputsResponse},
};
use crate::{ActionOutput, Output};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct OutputsQuery {
    /// Max results (default: 50, at most 1000)
    limit: Option<usize>,
}

/// GET /api/v1/checks
pub async fn list_checks(State(state): State<ApiState>) -> ApiResult<Json<ChecksResponse>> {
    let checks = state.store.list_check_names().await?;
    Ok(Json(ChecksResponse {
        count: checks.len(),
        checks,
    }))
}

/// GET /api/v1/checks/:name/outputs
///
/// Outputs are returned oldest first.
pub async fn list_outputs(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<OutputsQuery>,
) -> ApiResult<Json<OutputsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ApiError::InvalidRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    let outputs = state.store.list_check_outputs(&name, limit).await?;
    Ok(Json(OutputsResponse {
        check: name,
        count: outputs.len(),
        outputs,
    }))
}

/// GET /api/v1/checks/:name/outputs/:key
pub async fn get_output(
    State(state): State<ApiState>,
    Path((name, key)): Path<(String, String)>,
) -> ApiResult<Json<Output>> {
    state
        .store
        .get_check(&name, &key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no output {key} for check {name}")))
}

/// GET /api/v1/actions/:key
pub async fn get_action(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> ApiResult<Json<ActionOutput>> {
    state
        .store
        .get_action(&key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no action output {key}")))
}
