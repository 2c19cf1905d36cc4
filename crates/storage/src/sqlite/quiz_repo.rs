use chrono::Utc;
use quiz_core::model::{QuizDefinition, QuizId};

use super::SqliteRepository;
use super::mapping::{conn, definition_to_json, map_quiz_row};
use crate::repository::{QuizListing, QuizRepository, StorageError};

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn upsert_quiz(&self, quiz: &QuizDefinition) -> Result<(), StorageError> {
        let definition = definition_to_json(quiz)?;

        sqlx::query(
            r"
                INSERT INTO quizzes (id, title, definition, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    definition = excluded.definition,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(quiz.id.as_str())
        .bind(&quiz.title)
        .bind(definition)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_quiz(&self, id: &QuizId) -> Result<Option<QuizDefinition>, StorageError> {
        let row = sqlx::query("SELECT definition FROM quizzes WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_quiz_row).transpose()
    }

    async fn list_quizzes(&self, limit: u32) -> Result<Vec<QuizListing>, StorageError> {
        let rows = sqlx::query("SELECT definition FROM quizzes ORDER BY id ASC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(QuizListing::from_quiz(&map_quiz_row(&row)?));
        }
        Ok(out)
    }
}
