use std::collections::HashSet;

use crate::error::GradeError;
use crate::models::{ClassSummary, Component, GradeRecord, Status};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;
pub const APPROVAL_THRESHOLD: f64 = 7.0;
pub const RECOVERY_THRESHOLD: f64 = 5.0;

/// Sets one component on a copy of `record` and recomputes the derived
/// fields. `record` itself is never touched; on error nothing is produced.
pub fn apply_component_update(
    record: &GradeRecord,
    component: Component,
    value: Option<f64>,
) -> Result<GradeRecord, GradeError> {
    if let Some(score) = value {
        validate_score(component, score)?;
    }

    let mut updated = record.clone();
    updated.set_component(component, value);
    updated.refresh_derived();
    Ok(updated)
}

pub fn validate_score(component: Component, value: f64) -> Result<(), GradeError> {
    // NaN fails both comparisons, so it lands here too.
    if (MIN_SCORE..=MAX_SCORE).contains(&value) {
        Ok(())
    } else {
        Err(GradeError::OutOfRange { component, value })
    }
}

/// Arithmetic mean of the four components, defined only once all four are.
pub fn final_grade_of(
    np1: Option<f64>,
    np2: Option<f64>,
    ava: Option<f64>,
    pim: Option<f64>,
) -> Option<f64> {
    Some((np1? + np2? + ava? + pim?) / 4.0)
}

pub fn classify(final_grade: Option<f64>) -> Status {
    match final_grade {
        None => Status::InProgress,
        Some(grade) if grade >= APPROVAL_THRESHOLD => Status::Approved,
        Some(grade) if grade >= RECOVERY_THRESHOLD => Status::Recovery,
        Some(_) => Status::Failed,
    }
}

pub fn summarize(records: &[GradeRecord]) -> ClassSummary {
    let graded: Vec<f64> = records.iter().filter_map(|r| r.final_grade()).collect();
    let total_students = records
        .iter()
        .map(|r| r.student_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    let approved_count = records
        .iter()
        .filter(|r| r.status() == Status::Approved)
        .count();

    let average = if graded.is_empty() {
        0.0
    } else {
        graded.iter().sum::<f64>() / graded.len() as f64
    };
    let highest = graded.iter().copied().reduce(f64::max);
    let lowest = graded.iter().copied().reduce(f64::min);
    let approval_rate = if graded.is_empty() {
        0
    } else {
        (approved_count as f64 / graded.len() as f64 * 100.0).round() as u32
    };

    ClassSummary {
        average,
        highest,
        lowest,
        total_students,
        approved_count,
        approval_rate,
    }
}

/// One-decimal rendering of a grade, `-` when unset. Ties round away from
/// zero (6.25 shows as 6.3), matching how the dashboard has always shown them.
pub fn display_grade(grade: Option<f64>) -> String {
    match grade {
        Some(value) => format!("{:.1}", (value * 10.0).round() / 10.0),
        None => "-".to_string(),
    }
}

/// Turns text typed into a score field into an update value. Blank text
/// clears the component; it never means zero.
pub fn parse_score_input(component: Component, text: &str) -> Result<Option<f64>, GradeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: f64 = trimmed
        .replace(',', ".")
        .parse()
        .map_err(|_| GradeError::InvalidScore(text.to_string()))?;
    validate_score(component, value)?;
    Ok(Some(value))
}
