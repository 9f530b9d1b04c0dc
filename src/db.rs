use std::path::Path;

use anyhow::{bail, Context};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::grading;
use crate::models::{Component, GradeRecord, GradeUpdate, StoredNotification};
use crate::notify;

const RECORD_COLUMNS: &str = "student_id, class_id, semester, np1, np2, ava, pim";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let enrollments = [
        ("aluno001", "turma_a", "2024.1"),
        ("aluno002", "turma_a", "2024.1"),
        ("aluno003", "turma_b", "2024.1"),
    ];

    for (student_id, class_id, semester) in enrollments {
        let record = GradeRecord::enrolled(student_id, class_id, semester);
        sqlx::query(
            r#"
            INSERT INTO academic_grades.grade_records
            (student_id, class_id, semester, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (student_id, class_id, semester) DO NOTHING
            "#,
        )
        .bind(&record.student_id)
        .bind(&record.class_id)
        .bind(&record.semester)
        .bind(record.status().as_str())
        .execute(pool)
        .await?;
    }

    info!(count = enrollments.len(), "seeded enrollments");
    Ok(())
}

fn record_from_row(row: &PgRow) -> anyhow::Result<GradeRecord> {
    let mut scores = [None; 4];
    for (slot, component) in scores.iter_mut().zip(Component::ALL) {
        *slot = row.try_get::<Option<f64>, _>(component.as_str())?;
    }

    Ok(GradeRecord::from_components(
        row.try_get::<String, _>("student_id")?,
        row.try_get::<String, _>("class_id")?,
        row.try_get::<String, _>("semester")?,
        scores,
    ))
}

pub async fn fetch_grades(
    pool: &PgPool,
    class_id: Option<&str>,
    semester: Option<&str>,
) -> anyhow::Result<Vec<GradeRecord>> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {RECORD_COLUMNS} FROM academic_grades.grade_records WHERE TRUE"
    ));

    if let Some(value) = class_id {
        query.push(" AND class_id = ").push_bind(value);
    }
    if let Some(value) = semester {
        query.push(" AND semester = ").push_bind(value);
    }
    query.push(" ORDER BY student_id, class_id, semester");

    let rows = query.build().fetch_all(pool).await?;
    let records = rows
        .iter()
        .map(record_from_row)
        .collect::<anyhow::Result<Vec<_>>>()?;

    debug!(count = records.len(), ?class_id, ?semester, "fetched grade records");
    Ok(records)
}

async fn load_for_update(
    tx: &mut Transaction<'_, Postgres>,
    update: &GradeUpdate,
) -> anyhow::Result<GradeRecord> {
    let row = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM academic_grades.grade_records \
         WHERE student_id = $1 AND class_id = $2 AND semester = $3 \
         FOR UPDATE"
    ))
    .bind(&update.student_id)
    .bind(&update.class_id)
    .bind(&update.semester)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => record_from_row(&row),
        None => {
            warn!(
                student_id = %update.student_id,
                class_id = %update.class_id,
                semester = %update.semester,
                "no grade record for this class and semester; enrolling student on first grade"
            );
            Ok(GradeRecord::enrolled(
                update.student_id.clone(),
                update.class_id.clone(),
                update.semester.clone(),
            ))
        }
    }
}

async fn store_record(
    tx: &mut Transaction<'_, Postgres>,
    record: &GradeRecord,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO academic_grades.grade_records
        (student_id, class_id, semester, np1, np2, ava, pim, final_grade, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (student_id, class_id, semester) DO UPDATE
        SET np1 = EXCLUDED.np1,
            np2 = EXCLUDED.np2,
            ava = EXCLUDED.ava,
            pim = EXCLUDED.pim,
            final_grade = EXCLUDED.final_grade,
            status = EXCLUDED.status,
            updated_at = now()
        "#,
    )
    .bind(&record.student_id)
    .bind(&record.class_id)
    .bind(&record.semester)
    .bind(record.np1)
    .bind(record.np2)
    .bind(record.ava)
    .bind(record.pim)
    .bind(record.final_grade())
    .bind(record.status().as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn store_notification(
    tx: &mut Transaction<'_, Postgres>,
    update: &GradeUpdate,
) -> anyhow::Result<()> {
    let notification = notify::grade_notification(update);
    sqlx::query(
        r#"
        INSERT INTO academic_grades.notifications
        (id, user_id, title, message, kind)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&notification.user_id)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.kind)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn apply_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    update: &GradeUpdate,
) -> anyhow::Result<GradeRecord> {
    let current = load_for_update(tx, update).await?;
    let updated = grading::apply_component_update(&current, update.grade_type, update.value)
        .with_context(|| format!("rejected update for {}", update.student_id))?;

    store_record(tx, &updated).await?;
    store_notification(tx, update).await?;
    Ok(updated)
}

/// Applies one component update and persists the result together with the
/// student's notification. A rejected update leaves the database untouched.
pub async fn apply_update(pool: &PgPool, update: &GradeUpdate) -> anyhow::Result<GradeRecord> {
    let mut tx = pool.begin().await?;
    let updated = apply_in_tx(&mut tx, update).await?;
    tx.commit().await?;

    info!(
        student_id = %updated.student_id,
        component = %update.grade_type,
        status = updated.status().as_str(),
        "grade updated"
    );
    Ok(updated)
}

fn notifications_query(unread_only: bool) -> String {
    let mut sql = String::from(
        "SELECT id, user_id, title, message, kind, read, created_at \
         FROM academic_grades.notifications WHERE user_id = $1",
    );
    if unread_only {
        sql.push_str(" AND NOT read");
    }
    sql.push_str(" ORDER BY created_at DESC, id");
    sql
}

/// A student's notifications, newest first.
pub async fn fetch_notifications(
    pool: &PgPool,
    user_id: &str,
    unread_only: bool,
) -> anyhow::Result<Vec<StoredNotification>> {
    let rows = sqlx::query(&notifications_query(unread_only))
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    let mut notifications = Vec::with_capacity(rows.len());
    for row in rows {
        notifications.push(StoredNotification {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            kind: row.try_get("kind")?,
            read: row.try_get("read")?,
            created_at: row.try_get("created_at")?,
        });
    }

    debug!(count = notifications.len(), user_id, unread_only, "fetched notifications");
    Ok(notifications)
}

/// Marks one of the student's notifications as read. Fails when no such
/// notification belongs to `user_id`.
pub async fn mark_read(pool: &PgPool, id: Uuid, user_id: &str) -> anyhow::Result<()> {
    let result = sqlx::query(
        "UPDATE academic_grades.notifications SET read = TRUE WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        bail!("notification {id} not found for {user_id}");
    }
    info!(%id, user_id, "notification marked as read");
    Ok(())
}

/// Parses and validates every row of a grade CSV without touching the
/// database. Columns: `student_id,class_id,semester,grade_type,value`.
pub fn read_updates(csv_path: &Path) -> anyhow::Result<Vec<GradeUpdate>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_id: String,
        class_id: String,
        semester: String,
        grade_type: String,
        value: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut updates = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("line {line}: malformed row"))?;
        let grade_type: Component = row
            .grade_type
            .parse()
            .with_context(|| format!("line {line}"))?;
        let value = grading::parse_score_input(grade_type, row.value.as_deref().unwrap_or(""))
            .with_context(|| format!("line {line}"))?;

        updates.push(GradeUpdate {
            student_id: row.student_id,
            class_id: row.class_id,
            semester: row.semester,
            grade_type,
            value,
        });
    }

    Ok(updates)
}

/// Imports a grade CSV in file order inside a single transaction.
pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let updates = read_updates(csv_path)?;

    let mut tx = pool.begin().await?;
    for update in &updates {
        apply_in_tx(&mut tx, update).await?;
    }
    tx.commit().await?;

    info!(count = updates.len(), path = %csv_path.display(), "imported grade updates");
    Ok(updates.len())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn notification_listing_is_newest_first() {
        let all = notifications_query(false);
        assert!(all.contains("WHERE user_id = $1"));
        assert!(!all.contains("NOT read"));
        assert!(all.ends_with("ORDER BY created_at DESC, id"));

        let unread = notifications_query(true);
        assert!(unread.contains("WHERE user_id = $1 AND NOT read ORDER BY"));
    }

    #[test]
    fn reads_updates_in_file_order() {
        let file = csv_file(
            "student_id,class_id,semester,grade_type,value\n\
             aluno001,turma_a,2024.1,np1,8.5\n\
             aluno001,turma_a,2024.1,PIM,\n\
             aluno002,turma_a,2024.1,ava,\"7,25\"\n",
        );

        let updates = read_updates(file.path()).unwrap();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].grade_type, Component::Np1);
        assert_eq!(updates[0].value, Some(8.5));
        assert_eq!(updates[1].grade_type, Component::Pim);
        assert_eq!(updates[1].value, None);
        assert_eq!(updates[2].student_id, "aluno002");
        assert_eq!(updates[2].value, Some(7.25));
    }

    #[test]
    fn rejects_out_of_range_row_with_line_number() {
        let file = csv_file(
            "student_id,class_id,semester,grade_type,value\n\
             aluno001,turma_a,2024.1,np1,8\n\
             aluno001,turma_a,2024.1,np2,12\n",
        );

        let err = read_updates(file.path()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("line 3"), "{message}");
        assert!(message.contains("between 0 and 10"), "{message}");
    }

    #[test]
    fn rejects_unknown_component() {
        let file = csv_file(
            "student_id,class_id,semester,grade_type,value\n\
             aluno001,turma_a,2024.1,np3,8\n",
        );

        let message = format!("{:#}", read_updates(file.path()).unwrap_err());
        assert!(message.contains("unknown grade component"), "{message}");
    }

    #[test]
    fn rejects_non_numeric_value() {
        let file = csv_file(
            "student_id,class_id,semester,grade_type,value\n\
             aluno001,turma_a,2024.1,ava,dez\n",
        );

        let message = format!("{:#}", read_updates(file.path()).unwrap_err());
        assert!(message.contains("not a numeric score"), "{message}");
    }
}
