use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::calculator::History;
use crate::models::{AttendanceRecord, Status, Student};
use crate::roster::{self, AppState};

pub const STUDENTS_KEY: &str = "attendance-students";
pub const HISTORY_KEY: &str = "calculation-history";

pub async fn connect(path: &Path) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open {}", path.display()))
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn get_value(pool: &SqlitePool, key: &str) -> anyhow::Result<Option<String>> {
    let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to read {key}"))?;

    Ok(row.map(|row| row.get("value")))
}

async fn put_value(pool: &SqlitePool, key: &str, value: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO kv_store (key, value, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (key) DO UPDATE
        SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .execute(pool)
    .await
    .with_context(|| format!("failed to write {key}"))?;

    Ok(())
}

/// Loads the roster. A missing roster is replaced by the sample roster (and
/// saved); an unreadable one falls back to the sample roster without saving.
pub async fn load_students(pool: &SqlitePool) -> Vec<Student> {
    match get_value(pool, STUDENTS_KEY).await {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(students) => students,
            Err(err) => {
                log::warn!("stored roster is unreadable, using sample roster: {err}");
                seed_students()
            }
        },
        Ok(None) => {
            let students = seed_students();
            if let Err(err) = save_students(pool, &students).await {
                log::error!("failed to save sample roster: {err:#}");
            }
            students
        }
        Err(err) => {
            log::warn!("could not load roster, using sample roster: {err:#}");
            seed_students()
        }
    }
}

pub async fn save_students(pool: &SqlitePool, students: &[Student]) -> anyhow::Result<()> {
    let json = serde_json::to_string(students)?;
    put_value(pool, STUDENTS_KEY, &json).await
}

pub async fn load_history(pool: &SqlitePool) -> History {
    match get_value(pool, HISTORY_KEY).await {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|err| {
            log::warn!("stored calculation history is unreadable, starting empty: {err}");
            History::new()
        }),
        Ok(None) => History::new(),
        Err(err) => {
            log::warn!("could not load calculation history: {err:#}");
            History::new()
        }
    }
}

pub async fn save_history(pool: &SqlitePool, history: &History) -> anyhow::Result<()> {
    let json = serde_json::to_string(history)?;
    put_value(pool, HISTORY_KEY, &json).await
}

pub async fn load_state(pool: &SqlitePool) -> AppState {
    let students = load_students(pool).await;
    let history = load_history(pool).await;
    AppState::new(students, history)
}

/// Writes both collections. Failures are logged and the in-memory state is
/// left as is; there is no retry.
pub async fn persist(pool: &SqlitePool, state: &AppState) {
    if let Err(err) = save_students(pool, &state.students).await {
        log::error!("error saving roster: {err:#}");
    }
    if let Err(err) = save_history(pool, &state.history).await {
        log::error!("error saving calculation history: {err:#}");
    }
}

pub async fn seed(pool: &SqlitePool) -> anyhow::Result<()> {
    save_students(pool, &seed_students()).await
}

pub fn seed_students() -> Vec<Student> {
    use Status::{Absent as A, Late as L, Present as P};

    let roster = [
        ("1", "Alice Johnson", "STU001", "10A", [P, P, A, P, L, P, P, P, A, P]),
        ("2", "Bob Smith", "STU002", "10A", [P, A, A, P, A, A, P, A, P, A]),
        ("3", "Carol Davis", "STU003", "10B", [P, P, P, P, P, L, P, P, P, P]),
        ("4", "David Wilson", "STU004", "10B", [L, P, A, A, A, A, A, P, A, A]),
    ];

    roster
        .into_iter()
        .map(|(id, name, external_id, class_name, statuses)| Student {
            id: id.to_string(),
            name: name.to_string(),
            external_id: external_id.to_string(),
            class_name: class_name.to_string(),
            records: statuses
                .into_iter()
                .zip(1..)
                .filter_map(|(status, day)| {
                    NaiveDate::from_ymd_opt(2025, 9, day).map(|date| AttendanceRecord { date, status })
                })
                .collect(),
        })
        .collect()
}

pub fn import_csv(state: &mut AppState, csv_path: &Path) -> anyhow::Result<usize> {
    let reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    import_records(state, reader)
}

/// Merges `name,student_id,class,date,status` rows into the roster. A row
/// for a known student ID also refreshes that student's name and class.
/// Returns the number of records written.
pub fn import_records<R: std::io::Read>(
    state: &mut AppState,
    mut reader: csv::Reader<R>,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        student_id: String,
        class: String,
        date: NaiveDate,
        status: String,
    }

    let mut written = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = result.with_context(|| format!("invalid row on line {line}"))?;
        let fields = roster::validate_fields(&row.name, &row.student_id, &row.class)
            .with_context(|| format!("invalid student on line {line}"))?;
        let status: Status = row
            .status
            .parse()
            .with_context(|| format!("invalid status on line {line}"))?;

        let position = match state
            .students
            .iter()
            .position(|s| s.external_id == fields.external_id)
        {
            Some(position) => {
                let student = &mut state.students[position];
                student.name = fields.name;
                student.class_name = fields.class_name;
                position
            }
            None => {
                state.students.push(Student {
                    id: Uuid::new_v4().to_string(),
                    name: fields.name,
                    external_id: fields.external_id,
                    class_name: fields.class_name,
                    records: Vec::new(),
                });
                state.students.len() - 1
            }
        };

        roster::upsert_record(&mut state.students[position], row.date, status);
        written += 1;
    }

    Ok(written)
}
