// src/ingest/exam_rows.rs

use serde_json::Value;

use super::{IngestError, as_id, as_number, as_text, field};
use crate::models::exam::ExamResultRow;

const PART_ID_KEYS: &[&str] = &["part_id", "question_part_id", "partId", "questionPartId", "id"];
const PARENT_ID_KEYS: &[&str] = &["parent_part_id", "parent_id", "parentPartId", "parentId"];
const PARENT_LABEL_KEYS: &[&str] = &["parent_label", "parentLabel", "parent_part_label"];
const LABEL_KEYS: &[&str] = &["label", "part_label", "partLabel", "name"];
const MAX_MARKS_KEYS: &[&str] = &["max_marks", "maxMarks", "max_mark"];
const SCORE_KEYS: &[&str] = &["score_awarded", "scoreAwarded", "score", "marks"];
const ORDER_KEYS: &[&str] = &["display_order", "displayOrder", "order"];

/// Maps raw result rows onto [`ExamResultRow`]s.
///
/// Unreadable numbers are treated as absent (score falls back to `0`).
/// A parent id of `0` is how some backends spell "no parent". Labels are kept
/// as raw text; the tree sanitizes them when it emits nodes.
pub fn normalize_exam_rows(raw: &[Value]) -> Result<Vec<ExamResultRow>, IngestError> {
    raw.iter()
        .enumerate()
        .map(|(index, value)| {
            let obj = value.as_object().ok_or(IngestError::NotAnObject { index })?;

            let score_awarded = match field(obj, SCORE_KEYS) {
                Some(v) => as_number(v).unwrap_or_else(|| {
                    tracing::warn!(index, raw_score = ?v, "Unreadable score on exam row, using 0");
                    0.0
                }),
                None => 0.0,
            };

            Ok(ExamResultRow {
                part_id: field(obj, PART_ID_KEYS).and_then(as_id),
                parent_part_id: field(obj, PARENT_ID_KEYS)
                    .and_then(as_id)
                    .filter(|id| id != "0"),
                parent_label: field(obj, PARENT_LABEL_KEYS).and_then(as_text),
                label: field(obj, LABEL_KEYS).and_then(as_text),
                max_marks: field(obj, MAX_MARKS_KEYS).and_then(as_number),
                score_awarded,
                display_order: field(obj, ORDER_KEYS).and_then(as_number),
            })
        })
        .collect()
}
