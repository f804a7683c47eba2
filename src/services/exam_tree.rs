// src/services/exam_tree.rs

use std::collections::{HashMap, VecDeque};

use crate::{
    config::MAX_EXAM_PART_DEPTH,
    models::exam::{ExamPartNode, ExamResultRow, ExamSummary, OwnScorePolicy},
    utils::html::clean_label,
};

/// Working state for one part while rows are being folded together.
#[derive(Debug)]
struct DraftPart {
    key: String,
    label: Option<String>,
    parent_key: Option<String>,
    max_marks: Option<f64>,
    raw_score: f64,
    order: f64,
}

/// Rebuilds the question hierarchy of an exam from flat result rows and
/// aggregates scores and max marks bottom-up.
///
/// Rows sharing a key are the same part: their scores add up. Parents that
/// only appear as a reference get a placeholder node. Returned roots and
/// every children list are ordered by `(order, label)`, compared on the raw
/// label text; labels are sanitized only on the way out.
pub fn build_tree(rows: &[ExamResultRow], policy: OwnScorePolicy) -> Vec<ExamPartNode> {
    if rows.is_empty() {
        return Vec::new();
    }

    let mut drafts: Vec<DraftPart> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let key = node_key(row);
        let score = finite_or_zero(row.score_awarded);
        let max_marks = row.max_marks.filter(|m| !m.is_nan());
        let label = row.label.clone().filter(|l| !l.trim().is_empty());

        match index.get(&key) {
            Some(&i) => {
                let part = &mut drafts[i];
                part.raw_score += score;
                if part.max_marks.is_none() {
                    part.max_marks = max_marks;
                }
                if part.parent_key.is_none() {
                    part.parent_key = row.parent_part_id.clone();
                }
                if part.label.is_none() {
                    part.label = label;
                }
            }
            None => {
                index.insert(key.clone(), drafts.len());
                drafts.push(DraftPart {
                    key,
                    label,
                    parent_key: row.parent_part_id.clone(),
                    max_marks,
                    raw_score: score,
                    order: row.display_order.filter(|o| o.is_finite()).unwrap_or(0.0),
                });
            }
        }
    }

    // First explicit label given for each parent id.
    let mut parent_labels: HashMap<&str, &str> = HashMap::new();
    for row in rows {
        if let (Some(parent), Some(label)) = (row.parent_part_id.as_deref(), row.parent_label.as_deref()) {
            if !label.trim().is_empty() {
                parent_labels.entry(parent).or_insert(label);
            }
        }
    }

    let known = drafts.len();
    for i in 0..known {
        let Some(parent) = drafts[i].parent_key.clone() else {
            continue;
        };
        if index.contains_key(&parent) {
            continue;
        }
        let label = parent_labels
            .get(parent.as_str())
            .map(|l| l.to_string())
            .unwrap_or_else(|| format!("Q {}", parent));
        index.insert(parent.clone(), drafts.len());
        drafts.push(DraftPart {
            key: parent,
            label: Some(label),
            parent_key: None,
            max_marks: None,
            raw_score: 0.0,
            order: 0.0,
        });
    }

    let mut parents: Vec<Option<usize>> = drafts
        .iter()
        .map(|d| d.parent_key.as_ref().and_then(|k| index.get(k).copied()))
        .collect();
    break_cycles(&mut parents, &drafts);
    limit_depth(&mut parents, &drafts);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); drafts.len()];
    let mut roots = Vec::new();
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }

    sort_parts(&mut roots, &drafts);
    for kids in &mut children {
        sort_parts(kids, &drafts);
    }

    aggregate(&roots, &drafts, &children, policy)
}

/// Totals over the root parts, with the percentage only when there is something to divide by.
pub fn summarize(parts: &[ExamPartNode]) -> ExamSummary {
    let total_score: f64 = parts.iter().map(|p| p.score).sum();

    let defined: Vec<f64> = parts.iter().filter_map(|p| p.max_marks).collect();
    let total_max_marks = (!defined.is_empty()).then(|| defined.iter().sum::<f64>());

    let percentage = total_max_marks
        .filter(|max| *max > 0.0)
        .map(|max| total_score / max * 100.0);

    ExamSummary {
        total_score,
        total_max_marks,
        percentage,
    }
}

fn node_key(row: &ExamResultRow) -> String {
    match row.part_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!(
            "auto:{}|{}|{}",
            row.label.as_deref().unwrap_or(""),
            row.max_marks.map(|m| m.to_string()).unwrap_or_default(),
            row.display_order.map(|o| o.to_string()).unwrap_or_default(),
        ),
    }
}

/// Detaches the first node (in row order) of every parent cycle so that it becomes a root.
fn break_cycles(parents: &mut [Option<usize>], drafts: &[DraftPart]) {
    let n = parents.len();
    for i in 0..n {
        let mut cursor = parents[i];
        let mut steps = 0;
        while let Some(current) = cursor {
            if current == i {
                tracing::warn!(part = %drafts[i].key, "Exam part is its own ancestor, treating it as a root");
                parents[i] = None;
                break;
            }
            steps += 1;
            if steps > n {
                break;
            }
            cursor = parents[current];
        }
    }
}

/// Re-roots every part that would sit `MAX_EXAM_PART_DEPTH` levels below its root,
/// keeping the tree shallow enough to walk and serialize recursively.
fn limit_depth(parents: &mut [Option<usize>], drafts: &[DraftPart]) {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); parents.len()];
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(i),
            None => queue.push_back((i, 0)),
        }
    }

    while let Some((idx, depth)) = queue.pop_front() {
        for &child in &children[idx] {
            if depth + 1 >= MAX_EXAM_PART_DEPTH {
                tracing::warn!(part = %drafts[child].key, depth = depth + 1, "Exam part nested too deep, treating it as a root");
                parents[child] = None;
                queue.push_back((child, 0));
            } else {
                queue.push_back((child, depth + 1));
            }
        }
    }
}

/// Builds the output nodes bottom-up in post-order, without recursion.
/// `children` must already be sorted.
fn aggregate(
    roots: &[usize],
    drafts: &[DraftPart],
    children: &[Vec<usize>],
    policy: OwnScorePolicy,
) -> Vec<ExamPartNode> {
    let mut built: Vec<Option<ExamPartNode>> = (0..drafts.len()).map(|_| None).collect();
    let mut stack: Vec<(usize, bool)> = roots.iter().map(|&r| (r, false)).collect();

    while let Some((idx, expanded)) = stack.pop() {
        if !expanded {
            stack.push((idx, true));
            stack.extend(children[idx].iter().map(|&c| (c, false)));
            continue;
        }
        let kids: Vec<ExamPartNode> = children[idx].iter().filter_map(|&c| built[c].take()).collect();
        built[idx] = Some(finish_part(&drafts[idx], kids, policy));
    }

    roots.iter().filter_map(|&r| built[r].take()).collect()
}

fn finish_part(draft: &DraftPart, kids: Vec<ExamPartNode>, policy: OwnScorePolicy) -> ExamPartNode {
    let (score, max_marks) = if kids.is_empty() {
        (draft.raw_score, draft.max_marks)
    } else {
        let children_score: f64 = kids.iter().map(|k| k.score).sum();
        let score = match policy {
            OwnScorePolicy::ChildrenWin => children_score,
            OwnScorePolicy::IncludeOwn => children_score + draft.raw_score,
        };
        // Summing Options yields None as soon as one child has no max marks.
        let children_max: Option<f64> = kids.iter().map(|k| k.max_marks).sum();
        (score, children_max.or(draft.max_marks))
    };

    let label = Some(clean_label(display_label(draft)))
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| clean_label(&draft.key));

    ExamPartNode {
        id: draft.key.clone(),
        label,
        max_marks,
        score,
        order: draft.order,
        children: kids,
    }
}

fn display_label(draft: &DraftPart) -> &str {
    draft.label.as_deref().unwrap_or(&draft.key)
}

/// Orders by `order`, then label alphabetically ignoring case, then the exact label.
fn sort_parts(parts: &mut [usize], drafts: &[DraftPart]) {
    parts.sort_by(|&a, &b| {
        let (a, b) = (&drafts[a], &drafts[b]);
        let (la, lb) = (display_label(a), display_label(b));
        a.order
            .total_cmp(&b.order)
            .then_with(|| {
                la.chars()
                    .flat_map(char::to_lowercase)
                    .cmp(lb.chars().flat_map(char::to_lowercase))
            })
            .then_with(|| la.cmp(lb))
    });
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
