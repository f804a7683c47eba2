// src/models/exam.rs

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// One flat row of an exam result, after field-name normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExamResultRow {
    pub part_id: Option<String>,
    /// `None` marks a top-level question.
    pub parent_part_id: Option<String>,
    /// Display name for the parent, used when the parent has no row of its own.
    pub parent_label: Option<String>,
    pub label: Option<String>,
    pub max_marks: Option<f64>,
    pub score_awarded: f64,
    pub display_order: Option<f64>,
}

/// A question part with its aggregated marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExamPartNode {
    pub id: String,
    pub label: String,
    pub max_marks: Option<f64>,
    pub score: f64,
    pub order: f64,
    #[schema(no_recursion)]
    pub children: Vec<ExamPartNode>,
}

/// How a part that has both its own score and sub-parts is scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum OwnScorePolicy {
    /// The sub-parts' sum replaces the part's own score.
    #[default]
    ChildrenWin,
    /// The part's own score is added to the sub-parts' sum.
    IncludeOwn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExamSummary {
    pub total_score: f64,
    pub total_max_marks: Option<f64>,
    /// Present only when the total max marks is positive.
    pub percentage: Option<f64>,
}

/// DTO for building a result tree from raw rows.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExamTreeRequest {
    #[validate(length(max = 5000, message = "Too many result rows in one request."))]
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<serde_json::Value>,

    #[serde(default)]
    pub own_score_policy: OwnScorePolicy,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExamTreeResponse {
    pub parts: Vec<ExamPartNode>,
    pub summary: ExamSummary,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExamImportQuery {
    /// Defaults to `children-win`.
    pub own_score_policy: Option<OwnScorePolicy>,
}
