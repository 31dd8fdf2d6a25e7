use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use tracing::info;
use uuid::Uuid;

use adaptive_quiz::config::Policy;
use adaptive_quiz::models::{AnswerEvent, Performance};
use adaptive_quiz::selector::RecentHistory;
use adaptive_quiz::tracker;

const INSERT_ANSWER_SQL: &str = r#"
    INSERT INTO adaptive_quiz.answers
    (id, session_id, topic, subtopic, concept, is_correct, answered_at, source_key)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (session_id, source_key) DO NOTHING
"#;

/// Snapshot and recency window for one learner session.
#[derive(Debug, Clone, Default)]
pub struct StoredSession {
    pub performance: Performance,
    pub history: RecentHistory,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn load_session(pool: &PgPool, session_id: Uuid) -> anyhow::Result<Option<StoredSession>> {
    let row = sqlx::query(
        "SELECT performance, history FROM adaptive_quiz.sessions WHERE id = $1",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| session_from_row(&row)).transpose()
}

/// Loads a session that must already exist.
pub async fn require_session(pool: &PgPool, session_id: Uuid) -> anyhow::Result<StoredSession> {
    let stored = load_session(pool, session_id).await?;
    expect_session(session_id, stored)
}

fn expect_session(session_id: Uuid, stored: Option<StoredSession>) -> anyhow::Result<StoredSession> {
    stored.with_context(|| {
        format!("no session {session_id}; record an answer or import a log first")
    })
}

/// Creates the session row if needed and locks it until the surrounding
/// transaction ends, so turns on one session apply one at a time.
pub async fn lock_session(conn: &mut PgConnection, session_id: Uuid) -> anyhow::Result<StoredSession> {
    let empty = StoredSession::default();
    sqlx::query(
        r#"
        INSERT INTO adaptive_quiz.sessions (id, performance, history)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(session_id)
    .bind(Json(&empty.performance))
    .bind(Json(&empty.history))
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(
        "SELECT performance, history FROM adaptive_quiz.sessions WHERE id = $1 FOR UPDATE",
    )
    .bind(session_id)
    .fetch_one(&mut *conn)
    .await?;

    session_from_row(&row)
}

fn session_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<StoredSession> {
    let performance: Json<Performance> = row
        .try_get("performance")
        .context("stored performance snapshot is malformed")?;
    let history: Json<RecentHistory> = row
        .try_get("history")
        .context("stored history is malformed")?;

    Ok(StoredSession {
        performance: performance.0,
        history: history.0,
    })
}

pub async fn save_session(
    conn: &mut PgConnection,
    session_id: Uuid,
    session: &StoredSession,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO adaptive_quiz.sessions (id, performance, history, updated_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (id) DO UPDATE
        SET performance = EXCLUDED.performance,
            history = EXCLUDED.history,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(session_id)
    .bind(Json(&session.performance))
    .bind(Json(&session.history))
    .execute(&mut *conn)
    .await?;

    info!(
        session = %session_id,
        answered = session.performance.total_questions_answered,
        "session saved"
    );
    Ok(())
}

/// Appends an answer to the session log. Returns false when this session
/// already recorded the `source_key`.
pub async fn insert_answer(
    conn: &mut PgConnection,
    session_id: Uuid,
    answer: &AnswerEvent,
) -> anyhow::Result<bool> {
    let answered_at = answer.answered_at.unwrap_or_else(Utc::now);
    let source_key = answer
        .source_key
        .clone()
        .unwrap_or_else(|| format!("answer-{}", Uuid::new_v4()));

    let result = sqlx::query(INSERT_ANSWER_SQL)
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(&answer.topic)
        .bind(&answer.subtopic)
        .bind(&answer.concept)
        .bind(answer.is_correct)
        .bind(answered_at)
        .bind(source_key)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn fetch_answers(conn: &mut PgConnection, session_id: Uuid) -> anyhow::Result<Vec<AnswerEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT topic, subtopic, concept, is_correct, answered_at, source_key
        FROM adaptive_quiz.answers
        WHERE session_id = $1
        ORDER BY answered_at, source_key
        "#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut answers = Vec::new();

    for row in rows {
        let answered_at: DateTime<Utc> = row.get("answered_at");
        answers.push(AnswerEvent {
            topic: row.get("topic"),
            subtopic: row.get("subtopic"),
            concept: row.get("concept"),
            is_correct: row.get("is_correct"),
            answered_at: Some(answered_at),
            source_key: row.get("source_key"),
        });
    }

    Ok(answers)
}

pub async fn import_csv(
    conn: &mut PgConnection,
    session_id: Uuid,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let answers = tracker::read_answer_log(csv_path)
        .with_context(|| format!("failed to read answer log {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for answer in answers.iter() {
        if insert_answer(conn, session_id, answer).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

/// Rebuilds the session snapshot from its answer log. History is reset.
pub async fn rebuild_session(
    conn: &mut PgConnection,
    session_id: Uuid,
    policy: &Policy,
) -> anyhow::Result<StoredSession> {
    let answers = fetch_answers(conn, session_id).await?;
    let session = StoredSession {
        performance: tracker::replay(&answers, policy),
        history: RecentHistory::new(),
    };
    save_session(conn, session_id, &session).await?;
    info!(session = %session_id, replayed = answers.len(), "session rebuilt from answer log");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_dedupe_is_scoped_to_session() {
        assert!(INSERT_ANSWER_SQL.contains("ON CONFLICT (session_id, source_key) DO NOTHING"));

        let migration = include_str!("../migrations/0002_session_scoped_answers.sql");
        assert!(migration.contains("DROP CONSTRAINT IF EXISTS answers_source_key_key"));
        assert!(migration.contains("UNIQUE (session_id, source_key)"));
    }

    #[test]
    fn missing_session_is_an_error() {
        let id = Uuid::new_v4();
        let err = expect_session(id, None).unwrap_err();
        assert!(err.to_string().contains(&id.to_string()));

        let stored = expect_session(id, Some(StoredSession::default())).unwrap();
        assert_eq!(stored.performance.total_questions_answered, 0);
    }
}
