// src/docs.rs

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    handlers::{access, classes, exams, health},
    models::{
        exam::{ExamPartNode, ExamSummary, ExamTreeRequest, ExamTreeResponse, OwnScorePolicy},
        payment::{
            AccessState, AccessStatus, EvaluateAccessRequest, PaymentHistoryRequest,
            PaymentHistoryResponse, PaymentRecord, PaymentStatus, PaymentTrackingConfig,
        },
    },
};

/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Class Portal API",
        description = "Class access and exam result services for the student portal."
    ),
    paths(
        health::health,
        access::evaluate_access,
        access::class_access,
        classes::put_tracking,
        classes::get_tracking,
        classes::put_payments,
        classes::import_payments,
        classes::payment_completed,
        classes::invalidate_class,
        classes::refresh_cache,
        exams::build_results_tree,
        exams::import_results_tree,
    ),
    components(schemas(
        AccessState,
        AccessStatus,
        EvaluateAccessRequest,
        PaymentHistoryRequest,
        PaymentHistoryResponse,
        PaymentRecord,
        PaymentStatus,
        PaymentTrackingConfig,
        ExamPartNode,
        ExamSummary,
        ExamTreeRequest,
        ExamTreeResponse,
        OwnScorePolicy,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "access", description = "Payment-based class access"),
        (name = "classes", description = "Class settings and cached payment histories"),
        (name = "exams", description = "Exam result aggregation"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
