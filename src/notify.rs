use crate::grading::display_grade;
use crate::models::{GradeNotification, GradeUpdate, StoredNotification};

pub const GRADE_KIND: &str = "grade";

/// Notification sent to the student whose component was just graded.
pub fn grade_notification(update: &GradeUpdate) -> GradeNotification {
    let name = update.grade_type.friendly_name();
    let (title, message) = match update.value {
        Some(value) => (
            format!("Nova nota lançada: {name}"),
            format!(
                "Sua nota em {name} foi lançada: {}. \
                 Acesse a página de notas para ver mais detalhes.",
                display_grade(Some(value))
            ),
        ),
        None => (
            format!("Nota removida: {name}"),
            format!("Sua nota em {name} foi removida."),
        ),
    };

    GradeNotification {
        user_id: update.student_id.clone(),
        title,
        message,
        kind: GRADE_KIND.to_string(),
    }
}

/// One line per notification for terminal listings; unread ones are starred.
pub fn render_line(notification: &StoredNotification) -> String {
    let marker = if notification.read { " " } else { "*" };
    format!(
        "{} {} [{}] {}: {} ({})",
        marker,
        notification.created_at.format("%Y-%m-%d %H:%M"),
        notification.kind,
        notification.title,
        notification.message,
        notification.id
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::models::Component;

    fn update(value: Option<f64>) -> GradeUpdate {
        GradeUpdate {
            student_id: "aluno002".to_string(),
            class_id: "turma_a".to_string(),
            semester: "2024.1".to_string(),
            grade_type: Component::Pim,
            value,
        }
    }

    #[test]
    fn announces_new_score() {
        let notification = grade_notification(&update(Some(8.5)));
        assert_eq!(notification.user_id, "aluno002");
        assert_eq!(notification.kind, "grade");
        assert_eq!(notification.title, "Nova nota lançada: PIM (Projeto Integrado)");
        assert_eq!(
            notification.message,
            "Sua nota em PIM (Projeto Integrado) foi lançada: 8.5. \
             Acesse a página de notas para ver mais detalhes."
        );
    }

    #[test]
    fn announces_cleared_score() {
        let notification = grade_notification(&update(None));
        assert_eq!(notification.title, "Nota removida: PIM (Projeto Integrado)");
        assert!(notification.message.ends_with("foi removida."));
    }

    #[test]
    fn announced_score_rounds_ties_up() {
        let notification = grade_notification(&update(Some(6.25)));
        assert!(notification.message.contains("foi lançada: 6.3."));
    }

    #[test]
    fn listing_marks_unread() {
        let mut stored = StoredNotification {
            id: Uuid::nil(),
            user_id: "aluno002".to_string(),
            title: "Nova nota lançada: AVA (Atividades Virtuais)".to_string(),
            message: "Sua nota em AVA (Atividades Virtuais) foi lançada: 9.0.".to_string(),
            kind: GRADE_KIND.to_string(),
            read: false,
            created_at: Utc.with_ymd_and_hms(2024, 3, 4, 10, 30, 0).unwrap(),
        };

        let line = render_line(&stored);
        assert!(line.starts_with("* 2024-03-04 10:30 [grade] Nova nota lançada"));
        assert!(line.ends_with("(00000000-0000-0000-0000-000000000000)"));

        stored.read = true;
        assert!(render_line(&stored).starts_with("  2024-03-04"));
    }
}
