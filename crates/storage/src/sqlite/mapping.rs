use quiz_core::model::{
    Attempt, AttemptId, AttemptParts, QuizDefinition, QuizId, Selections, SubmitReason,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn attempt_id_from_str(raw: &str) -> Result<AttemptId, StorageError> {
    raw.parse::<AttemptId>().map_err(ser)
}

pub(crate) fn definition_to_json(quiz: &QuizDefinition) -> Result<String, StorageError> {
    serde_json::to_string(quiz).map_err(ser)
}

pub(crate) fn map_quiz_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuizDefinition, StorageError> {
    let raw: String = row.try_get("definition").map_err(ser)?;
    serde_json::from_str(&raw).map_err(ser)
}

pub(crate) fn selections_to_json(selections: &Selections) -> Result<String, StorageError> {
    serde_json::to_string(selections).map_err(ser)
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<Attempt, StorageError> {
    let id = attempt_id_from_str(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let quiz_id = QuizId::new(row.try_get::<String, _>("quiz_id").map_err(ser)?);
    let started_at = row.try_get("started_at").map_err(ser)?;
    let completed_at = row.try_get("completed_at").map_err(ser)?;
    let score = u8_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?;
    let passed = row.try_get::<i64, _>("passed").map_err(ser)? != 0;
    let correct_count = u32_from_i64(
        "correct_count",
        row.try_get::<i64, _>("correct_count").map_err(ser)?,
    )?;
    let total_questions = u32_from_i64(
        "total_questions",
        row.try_get::<i64, _>("total_questions").map_err(ser)?,
    )?;
    let time_spent_seconds = u32_from_i64(
        "time_spent_seconds",
        row.try_get::<i64, _>("time_spent_seconds").map_err(ser)?,
    )?;
    let reason = SubmitReason::parse(&row.try_get::<String, _>("reason").map_err(ser)?)
        .map_err(ser)?;
    let selections: Selections =
        serde_json::from_str(&row.try_get::<String, _>("selections").map_err(ser)?)
            .map_err(ser)?;

    Attempt::from_persisted(AttemptParts {
        id,
        quiz_id,
        started_at,
        completed_at,
        score,
        passed,
        correct_count,
        total_questions,
        time_spent_seconds,
        reason,
        selections,
    })
    .map_err(ser)
}
