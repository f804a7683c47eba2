// src/handlers/classes.rs

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    cache::EnrollmentCache,
    config::{Config, MAX_PAYMENTS_PER_REQUEST},
    error::AppError,
    ingest::payments::normalize_payments,
    models::payment::{PaymentHistoryRequest, PaymentHistoryResponse, PaymentTrackingConfig},
    utils::{
        jwt::Claims,
        lenient_json::{extract_json, unwrap_collection},
    },
};

const MAX_CLASS_ID_LEN: usize = 64;

/// Class ids are short slugs or numeric ids from the classes backend.
pub fn validate_class_id(class_id: &str) -> Result<(), AppError> {
    let valid = !class_id.is_empty()
        && class_id.len() <= MAX_CLASS_ID_LEN
        && class_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Invalid class id '{}'", class_id)))
    }
}

/// Stores a class's payment tracking settings.
/// Admin only.
#[utoipa::path(
    put,
    path = "/api/admin/classes/{class_id}/tracking",
    tag = "classes",
    params(("class_id" = String, Path, description = "Class identifier")),
    request_body = PaymentTrackingConfig,
    responses(
        (status = 200, description = "Settings stored", body = PaymentTrackingConfig),
        (status = 400, description = "Invalid settings"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = []))
)]
pub async fn put_tracking(
    State(cache): State<EnrollmentCache>,
    Path(class_id): Path<String>,
    Json(payload): Json<PaymentTrackingConfig>,
) -> Result<impl IntoResponse, AppError> {
    validate_class_id(&class_id)?;
    payload.validate()?;

    cache.put_tracking(&class_id, payload);
    tracing::info!(
        class = %class_id,
        enabled = payload.enabled,
        free_days = payload.free_days,
        "Payment tracking settings updated"
    );

    Ok(Json(payload))
}

/// Reads a class's cached payment tracking settings.
#[utoipa::path(
    get,
    path = "/api/classes/{class_id}/tracking",
    tag = "classes",
    params(("class_id" = String, Path, description = "Class identifier")),
    responses(
        (status = 200, description = "Cached settings", body = PaymentTrackingConfig),
        (status = 404, description = "Settings not loaded")
    ),
    security(("bearer" = []))
)]
pub async fn get_tracking(
    State(cache): State<EnrollmentCache>,
    Path(class_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    validate_class_id(&class_id)?;

    let tracking = cache.tracking(&class_id).ok_or_else(|| {
        AppError::NotFound(format!("Payment settings for class '{}' are not loaded", class_id))
    })?;

    Ok(Json(tracking))
}

/// Replaces the calling student's cached payment history for a class.
#[utoipa::path(
    put,
    path = "/api/classes/{class_id}/payments",
    tag = "classes",
    params(("class_id" = String, Path, description = "Class identifier")),
    request_body = PaymentHistoryRequest,
    responses(
        (status = 200, description = "History stored", body = PaymentHistoryResponse),
        (status = 400, description = "Invalid payload")
    ),
    security(("bearer" = []))
)]
pub async fn put_payments(
    State(cache): State<EnrollmentCache>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(class_id): Path<String>,
    Json(payload): Json<PaymentHistoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_class_id(&class_id)?;
    payload.validate()?;

    store_history(&cache, &config, &claims, class_id, &payload.payments)
}

/// Same as `put_payments`, but takes the payments backend's response body
/// verbatim, tolerating PHP diagnostics and other noise around the JSON.
#[utoipa::path(
    post,
    path = "/api/classes/{class_id}/payments/import",
    tag = "classes",
    params(("class_id" = String, Path, description = "Class identifier")),
    request_body(content = String, content_type = "text/plain", description = "Raw upstream response body"),
    responses(
        (status = 200, description = "History stored", body = PaymentHistoryResponse),
        (status = 400, description = "No payment list found in the body")
    ),
    security(("bearer" = []))
)]
pub async fn import_payments(
    State(cache): State<EnrollmentCache>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(class_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    validate_class_id(&class_id)?;

    let body = String::from_utf8_lossy(&body);
    let payments = unwrap_collection(extract_json(&body)?)?;
    if payments.len() as u64 > MAX_PAYMENTS_PER_REQUEST {
        return Err(AppError::BadRequest("Too many payments in one request.".to_string()));
    }

    store_history(&cache, &config, &claims, class_id, &payments)
}

fn store_history(
    cache: &EnrollmentCache,
    config: &Config,
    claims: &Claims,
    class_id: String,
    raw: &[Value],
) -> Result<Json<PaymentHistoryResponse>, AppError> {
    let records = normalize_payments(raw, config.portal_offset)?;
    let skipped = raw.len() - records.len();
    let stored = records.len();

    cache.put_payments(&claims.sub, &class_id, records);
    tracing::info!(
        student = %claims.sub,
        class = %class_id,
        stored,
        skipped,
        "Payment history cached"
    );

    Ok(Json(PaymentHistoryResponse { class_id, stored }))
}

/// Domain event: the student finished a payment for this class.
/// Drops their cached history so the next access check uses fresh data.
#[utoipa::path(
    post,
    path = "/api/classes/{class_id}/payment-completed",
    tag = "classes",
    params(("class_id" = String, Path, description = "Class identifier")),
    responses(
        (status = 204, description = "Cached history invalidated"),
        (status = 400, description = "Invalid class id")
    ),
    security(("bearer" = []))
)]
pub async fn payment_completed(
    State(cache): State<EnrollmentCache>,
    Extension(claims): Extension<Claims>,
    Path(class_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    validate_class_id(&class_id)?;

    let dropped = cache.invalidate(&claims.sub, &class_id);
    tracing::info!(student = %claims.sub, class = %class_id, dropped, "Payment completed, cache invalidated");

    Ok(StatusCode::NO_CONTENT)
}

/// Drops a class's settings and all cached histories for it.
/// Admin only.
#[utoipa::path(
    delete,
    path = "/api/admin/classes/{class_id}/cache",
    tag = "classes",
    params(("class_id" = String, Path, description = "Class identifier")),
    responses((status = 200, description = "Number of cache entries removed")),
    security(("bearer" = []))
)]
pub async fn invalidate_class(
    State(cache): State<EnrollmentCache>,
    Path(class_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    validate_class_id(&class_id)?;

    let removed = cache.invalidate_class(&class_id);
    tracing::info!(class = %class_id, removed, "Class cache invalidated");

    Ok(Json(json!({ "removed": removed })))
}

/// Empties the whole cache.
/// Admin only.
#[utoipa::path(
    delete,
    path = "/api/admin/cache",
    tag = "classes",
    responses((status = 200, description = "Number of cache entries removed")),
    security(("bearer" = []))
)]
pub async fn refresh_cache(State(cache): State<EnrollmentCache>) -> impl IntoResponse {
    let removed = cache.refresh();
    Json(json!({ "removed": removed }))
}
