use chrono::Duration;
use quiz_core::QuizSession;
use quiz_core::model::{
    AnswerOption, OptionId, Question, QuestionId, QuestionKind, QuizDefinition, QuizId,
    SubmitReason,
};
use quiz_core::time::fixed_now;
use storage::repository::{AttemptRepository, AttemptSink, QuizRepository, StorageError};
use storage::sqlite::SqliteRepository;

fn build_quiz(id: &str) -> QuizDefinition {
    QuizDefinition::new(
        id,
        "Networking",
        1,
        50,
        vec![
            Question::new(
                "q1",
                "Default VPC CIDR?",
                QuestionKind::Single,
                vec![
                    AnswerOption::new("a", "10.0.0.0/16"),
                    AnswerOption::new("b", "172.31.0.0/16"),
                ],
                ["b"],
            )
            .with_explanation("The default VPC uses 172.31.0.0/16."),
            Question::new(
                "q2",
                "Stateful?",
                QuestionKind::Multiple,
                vec![
                    AnswerOption::new("x", "Security group"),
                    AnswerOption::new("y", "NACL"),
                ],
                ["x"],
            ),
        ],
    )
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrips_quiz_definition() {
    let repo = connect("memdb_quiz_roundtrip").await;
    let quiz = build_quiz("vpc");
    repo.upsert_quiz(&quiz).await.unwrap();

    let fetched = repo.get_quiz(&quiz.id).await.unwrap().expect("quiz");
    assert_eq!(fetched, quiz);

    let mut renamed = quiz.clone();
    renamed.title = "VPC Networking".into();
    repo.upsert_quiz(&renamed).await.unwrap();
    let listed = repo.list_quizzes(10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "VPC Networking");
    assert_eq!(listed[0].question_count, 2);

    assert!(repo.get_quiz(&QuizId::new("nope")).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_roundtrips_attempts_with_selections() {
    let repo = connect("memdb_attempts").await;
    let quiz = build_quiz("vpc");

    let mut session = QuizSession::start(quiz.clone(), fixed_now()).unwrap();
    session.select_option(&QuestionId::new("q1"), &OptionId::new("b"));
    session.select_option(&QuestionId::new("q2"), &OptionId::new("y"));
    for _ in 0..15 {
        session.tick(fixed_now());
    }
    let first = session.submit(fixed_now() + Duration::seconds(15)).attempt;
    repo.record_attempt(&first).await.unwrap();

    let mut retake = session.restart(fixed_now() + Duration::minutes(5));
    for _ in 0..60 {
        retake.tick(fixed_now() + Duration::minutes(6));
    }
    let second = retake.attempt().cloned().expect("timed out");
    repo.record_attempt(&second).await.unwrap();

    let fetched = repo.get_attempt(first.id()).await.unwrap().expect("attempt");
    assert_eq!(fetched, first);
    assert_eq!(fetched.score(), 50);
    assert!(fetched.passed());
    assert_eq!(fetched.time_spent_seconds(), 15);
    assert!(
        fetched
            .selections()
            .contains(&QuestionId::new("q2"), &OptionId::new("y"))
    );

    let listed = repo.list_attempts(&quiz.id, 10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id(), second.id());
    assert_eq!(listed[0].reason(), SubmitReason::Timeout);
    assert_eq!(listed[0].time_spent_seconds(), 60);
}

#[tokio::test]
async fn sqlite_rejects_duplicate_attempt() {
    let repo = connect("memdb_attempt_conflict").await;
    let mut session = QuizSession::start(build_quiz("vpc"), fixed_now()).unwrap();
    let attempt = session.submit(fixed_now()).attempt;

    repo.record_attempt(&attempt).await.unwrap();
    let err = repo.record_attempt(&attempt).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}
