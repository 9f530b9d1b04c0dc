use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::grading::{self, display_grade};
use crate::models::{GradeRecord, Status};

pub fn count_by_status(records: &[GradeRecord]) -> Vec<(Status, usize)> {
    Status::ALL
        .into_iter()
        .map(|status| {
            let count = records.iter().filter(|r| r.status() == status).count();
            (status, count)
        })
        .collect()
}

pub fn build_report(
    scope: Option<&str>,
    generated_at: DateTime<Utc>,
    records: &[GradeRecord],
) -> String {
    let summary = grading::summarize(records);
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all classes");

    let _ = writeln!(output, "# Class Grade Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        scope_label,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    if summary.highest.is_none() {
        let _ = writeln!(output, "No final grades recorded yet.");
    } else {
        let _ = writeln!(output, "- Average: {}", display_grade(Some(summary.average)));
        let _ = writeln!(output, "- Highest: {}", display_grade(summary.highest));
        let _ = writeln!(output, "- Lowest: {}", display_grade(summary.lowest));
    }
    let _ = writeln!(output, "- Students: {}", summary.total_students);
    let _ = writeln!(
        output,
        "- Approved: {} ({}% of graded records)",
        summary.approved_count, summary.approval_rate
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");
    for (status, count) in count_by_status(records) {
        let _ = writeln!(output, "- {}: {}", status.label(), count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Roster");

    if records.is_empty() {
        let _ = writeln!(output, "No grade records for this scope.");
        return output;
    }

    let _ = writeln!(
        output,
        "| Student | Class | Semester | NP1 | NP2 | AVA | PIM | Final | Status |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
    for record in records {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            record.student_id,
            record.class_id,
            record.semester,
            display_grade(record.np1),
            display_grade(record.np2),
            display_grade(record.ava),
            display_grade(record.pim),
            display_grade(record.final_grade()),
            record.status().label()
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report(Some("turma_a"), generated_at(), &[]);
        assert!(report.contains("Generated for turma_a on 2024-06-30 12:00 UTC"));
        assert!(report.contains("No final grades recorded yet."));
        assert!(report.contains("- Approved: 0 (0% of graded records)"));
        assert!(report.contains("No grade records for this scope."));
        assert!(!report.contains("- Average"));
    }

    #[test]
    fn report_lists_roster_and_mix() {
        let records = vec![
            GradeRecord::from_components(
                "aluno001",
                "turma_a",
                "2024.1",
                [Some(8.0), Some(6.0), Some(7.0), Some(9.0)],
            ),
            GradeRecord::from_components(
                "aluno002",
                "turma_a",
                "2024.1",
                [Some(5.0), None, None, None],
            ),
        ];

        let report = build_report(None, generated_at(), &records);
        assert!(report.contains("Generated for all classes"));
        assert!(report.contains("- Average: 7.5"));
        assert!(report.contains("- Aprovado: 1"));
        assert!(report.contains("- Em Andamento: 1"));
        assert!(report.contains("- Reprovado: 0"));
        assert!(report.contains(
            "| aluno001 | turma_a | 2024.1 | 8.0 | 6.0 | 7.0 | 9.0 | 7.5 | Aprovado |"
        ));
        assert!(report.contains("| aluno002 | turma_a | 2024.1 | 5.0 | - | - | - | - | Em Andamento |"));
    }

    #[test]
    fn average_line_rounds_ties_up() {
        let records = vec![
            GradeRecord::from_components(
                "aluno001",
                "turma_a",
                "2024.1",
                [Some(8.0), Some(6.0), Some(7.0), Some(4.0)],
            ),
            GradeRecord::from_components(
                "aluno002",
                "turma_a",
                "2024.1",
                [Some(8.0), Some(6.0), Some(7.0), Some(4.0)],
            ),
        ];

        let report = build_report(None, generated_at(), &records);
        assert!(report.contains("- Average: 6.3"), "{report}");
        assert!(report.contains("| 6.3 | Recuperação |"), "{report}");
    }

    #[test]
    fn status_counts_follow_fixed_order() {
        let counts = count_by_status(&[]);
        let order: Vec<Status> = counts.iter().map(|(status, _)| *status).collect();
        assert_eq!(order, Status::ALL.to_vec());
        assert!(counts.iter().all(|(_, count)| *count == 0));
    }
}
