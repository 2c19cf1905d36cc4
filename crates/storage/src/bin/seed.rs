use std::fmt;
use std::path::PathBuf;

use quiz_core::model::{AnswerOption, Difficulty, Question, QuestionKind, QuizDefinition};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    files: Vec<PathBuf>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug)]
struct QuizFileError {
    path: PathBuf,
    reason: String,
}

impl fmt::Display for QuizFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

impl std::error::Error for QuizFileError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut files = Vec::new();

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--file" => {
                    let value = require_value(&mut args, "--file")?;
                    files.push(PathBuf::from(value));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, files })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --file <quiz.json>        Quiz definition to import (repeatable)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Without --file, two sample quizzes are seeded.");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL");
}

fn load_quiz_file(path: &PathBuf) -> Result<QuizDefinition, QuizFileError> {
    let raw = std::fs::read_to_string(path).map_err(|e| QuizFileError {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| QuizFileError {
        path: path.clone(),
        reason: e.to_string(),
    })
}

fn sample_quizzes() -> Vec<QuizDefinition> {
    let mut iam = QuizDefinition::new(
        "aws-iam-fundamentals",
        "AWS IAM Fundamentals",
        10,
        70,
        vec![
            Question::new(
                "iam-1",
                "Which IAM entity is best suited for granting permissions to an EC2 instance?",
                QuestionKind::Single,
                vec![
                    AnswerOption::new("a", "IAM user with access keys"),
                    AnswerOption::new("b", "IAM role with an instance profile"),
                    AnswerOption::new("c", "IAM group"),
                    AnswerOption::new("d", "Root account credentials"),
                ],
                ["b"],
            )
            .with_difficulty(Difficulty::Beginner)
            .with_explanation(
                "Roles provide temporary credentials delivered through the instance profile.",
            ),
            Question::new(
                "iam-2",
                "Which elements can appear in an IAM policy statement?",
                QuestionKind::Multiple,
                vec![
                    AnswerOption::new("a", "Effect"),
                    AnswerOption::new("b", "Action"),
                    AnswerOption::new("c", "Region"),
                    AnswerOption::new("d", "Resource"),
                ],
                ["a", "b", "d"],
            )
            .with_explanation("Effect, Action and Resource are statement elements; Region is not."),
        ],
    );
    iam.module_id = Some("aws-security".into());

    let mut s3 = QuizDefinition::new(
        "aws-s3-storage",
        "Amazon S3 Storage Classes",
        5,
        60,
        vec![
            Question::new(
                "s3-1",
                "Which storage class suits data accessed once a quarter with millisecond retrieval?",
                QuestionKind::Single,
                vec![
                    AnswerOption::new("a", "S3 Standard"),
                    AnswerOption::new("b", "S3 Glacier Deep Archive"),
                    AnswerOption::new("c", "S3 Glacier Instant Retrieval"),
                ],
                ["c"],
            )
            .with_difficulty(Difficulty::Advanced)
            .with_explanation(
                "Glacier Instant Retrieval keeps millisecond access at archive pricing.",
            ),
            Question::new(
                "s3-2",
                "S3 Standard is designed for eleven nines of durability.",
                QuestionKind::Single,
                vec![AnswerOption::new("t", "True"), AnswerOption::new("f", "False")],
                ["t"],
            )
            .with_difficulty(Difficulty::Beginner),
        ],
    );
    s3.module_id = Some("aws-storage".into());

    vec![iam, s3]
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let quizzes = if args.files.is_empty() {
        sample_quizzes()
    } else {
        args.files
            .iter()
            .map(load_quiz_file)
            .collect::<Result<Vec<_>, _>>()?
    };

    // Reject broken content before anything is written.
    for quiz in &quizzes {
        quiz.validate()?;
    }

    let storage = Storage::sqlite(&args.db_url).await?;
    for quiz in &quizzes {
        storage.quizzes.upsert_quiz(quiz).await?;
    }

    println!(
        "Seeded {} quiz(zes) into {}: {}",
        quizzes.len(),
        args.db_url,
        quizzes
            .iter()
            .map(|q| q.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
