// src/handlers/exams.rs

use axum::{
    Json,
    body::Bytes,
    extract::Query,
    response::IntoResponse,
};
use serde_json::Value;
use validator::Validate;

use crate::{
    config::MAX_EXAM_ROWS_PER_REQUEST,
    error::AppError,
    ingest::exam_rows::normalize_exam_rows,
    models::exam::{ExamImportQuery, ExamTreeRequest, ExamTreeResponse, OwnScorePolicy},
    services::exam_tree::{build_tree, summarize},
    utils::lenient_json::{extract_json, unwrap_collection},
};

/// Builds the question-part tree of an exam result, with aggregated marks
/// and the overall percentage.
#[utoipa::path(
    post,
    path = "/api/exams/results/tree",
    tag = "exams",
    request_body = ExamTreeRequest,
    responses(
        (status = 200, description = "Aggregated result tree", body = ExamTreeResponse),
        (status = 400, description = "Invalid rows")
    ),
    security(("bearer" = []))
)]
pub async fn build_results_tree(
    Json(payload): Json<ExamTreeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    respond_with_tree(&payload.rows, payload.own_score_policy)
}

/// Same as `build_results_tree`, from the results backend's raw response body.
#[utoipa::path(
    post,
    path = "/api/exams/results/tree/import",
    tag = "exams",
    params(ExamImportQuery),
    request_body(content = String, content_type = "text/plain", description = "Raw upstream response body"),
    responses(
        (status = 200, description = "Aggregated result tree", body = ExamTreeResponse),
        (status = 400, description = "No result rows found in the body")
    ),
    security(("bearer" = []))
)]
pub async fn import_results_tree(
    Query(query): Query<ExamImportQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let body = String::from_utf8_lossy(&body);
    let rows = unwrap_collection(extract_json(&body)?)?;
    if rows.len() as u64 > MAX_EXAM_ROWS_PER_REQUEST {
        return Err(AppError::BadRequest("Too many result rows in one request.".to_string()));
    }

    respond_with_tree(&rows, query.own_score_policy.unwrap_or_default())
}

fn respond_with_tree(
    raw: &[Value],
    policy: OwnScorePolicy,
) -> Result<Json<ExamTreeResponse>, AppError> {
    let rows = normalize_exam_rows(raw)?;
    let parts = build_tree(&rows, policy);
    let summary = summarize(&parts);

    tracing::debug!(rows = rows.len(), roots = parts.len(), "Built exam result tree");

    Ok(Json(ExamTreeResponse { parts, summary }))
}
