use quiz_core::model::{Attempt, AttemptId, QuizId};

use super::SqliteRepository;
use super::mapping::{conn, map_attempt_row, selections_to_json};
use crate::repository::{AttemptRepository, AttemptSink, StorageError};

#[async_trait::async_trait]
impl AttemptSink for SqliteRepository {
    async fn record_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let selections = selections_to_json(attempt.selections())?;

        sqlx::query(
            r"
                INSERT INTO attempts (
                    id, quiz_id, started_at, completed_at, score, passed,
                    correct_count, total_questions, time_spent_seconds, reason, selections
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(attempt.id().to_string())
        .bind(attempt.quiz_id().as_str())
        .bind(attempt.started_at())
        .bind(attempt.completed_at())
        .bind(i64::from(attempt.score()))
        .bind(i64::from(attempt.passed()))
        .bind(i64::from(attempt.correct_count()))
        .bind(i64::from(attempt.total_questions()))
        .bind(i64::from(attempt.time_spent_seconds()))
        .bind(attempt.reason().as_str())
        .bind(selections)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => conn(other),
        })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, quiz_id, started_at, completed_at, score, passed,
                    correct_count, total_questions, time_spent_seconds, reason, selections
                FROM attempts
                WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_attempt_row).transpose()
    }

    async fn list_attempts(
        &self,
        quiz_id: &QuizId,
        limit: u32,
    ) -> Result<Vec<Attempt>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, quiz_id, started_at, completed_at, score, passed,
                    correct_count, total_questions, time_spent_seconds, reason, selections
                FROM attempts
                WHERE quiz_id = ?1
                ORDER BY completed_at DESC, rowid DESC
                LIMIT ?2
            ",
        )
        .bind(quiz_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }
}
