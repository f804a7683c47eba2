// src/handlers/access.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{FixedOffset, NaiveDateTime};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::classes::validate_class_id,
    ingest::payments::normalize_payments,
    models::payment::{AccessQuery, AccessStatus, EvaluateAccessRequest},
    state::AppState,
    utils::{
        dates::{parse_portal_datetime, portal_now},
        jwt::Claims,
    },
};

/// Evaluates class access from a tracking config and payment history supplied inline.
///
/// Payment objects are normalized first; records with unreadable dates are skipped.
#[utoipa::path(
    post,
    path = "/api/access/evaluate",
    tag = "access",
    request_body = EvaluateAccessRequest,
    responses(
        (status = 200, description = "Computed access status", body = AccessStatus),
        (status = 400, description = "Invalid payload or evaluation time"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn evaluate_access(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateAccessRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let offset = state.config.portal_offset;
    let now = resolve_instant(payload.now.as_deref(), offset)?;
    let payments = normalize_payments(&payload.payments, offset)?;

    let status = state.calculator().evaluate(&payload.tracking, &payments, now);

    Ok(Json(status))
}

/// Evaluates the calling student's access to a class from the cached
/// class settings and payment history.
#[utoipa::path(
    get,
    path = "/api/classes/{class_id}/access",
    tag = "access",
    params(
        ("class_id" = String, Path, description = "Class identifier"),
        AccessQuery
    ),
    responses(
        (status = 200, description = "Computed access status", body = AccessStatus),
        (status = 400, description = "Invalid class id or evaluation time"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Class settings or payment history not loaded")
    ),
    security(("bearer" = []))
)]
pub async fn class_access(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(class_id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> Result<impl IntoResponse, AppError> {
    validate_class_id(&class_id)?;
    let now = resolve_instant(query.at.as_deref(), state.config.portal_offset)?;

    let tracking = state.cache.tracking(&class_id).ok_or_else(|| {
        AppError::NotFound(format!("Payment settings for class '{}' are not loaded", class_id))
    })?;

    // A class without tracking never needs the history.
    let payments = if tracking.enabled {
        state.cache.payments(&claims.sub, &class_id).ok_or_else(|| {
            AppError::NotFound(format!("Payment history for class '{}' is not loaded", class_id))
        })?
    } else {
        Vec::new()
    };

    let status = state.calculator().evaluate(&tracking, &payments, now);
    tracing::info!(
        student = %claims.sub,
        class = %class_id,
        can_access = status.can_access,
        "Class access evaluated"
    );

    Ok(Json(status))
}

fn resolve_instant(raw: Option<&str>, offset: FixedOffset) -> Result<NaiveDateTime, AppError> {
    match raw {
        None => Ok(portal_now(offset)),
        Some(s) => parse_portal_datetime(s, offset)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid date/time '{}'", s))),
    }
}
