use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quiz_core::model::{QuizDefinition, QuizId};
use quiz_core::time::format_countdown;
use services::{AttemptHistoryService, Clock, HttpAttemptSink, QuizCatalogService, QuizLoopService};
use storage::repository::Storage;
use tracing_subscriber::EnvFilter;

mod terminal;

const DEFAULT_LIMIT: u32 = 20;
const DEFAULT_DB_URL: &str = "sqlite://dev.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidQuizId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidLimit { raw: String },
    MissingQuizId,
    MissingFile,
    ConflictingSource,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidQuizId { raw } => write!(f, "invalid --quiz-id value: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::MissingQuizId => write!(f, "--quiz-id (or QUIZ_ID) is required"),
            ArgsError::MissingFile => write!(f, "--file is required"),
            ArgsError::ConflictingSource => write!(f, "use either --quiz-id or --file, not both"),
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    Import,
    History,
    List,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "import" => Some(Self::Import),
            "history" => Some(Self::History),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    quiz_id: Option<QuizId>,
    file: Option<PathBuf>,
    shuffle: bool,
    limit: u32,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut quiz_id = std::env::var("QUIZ_ID")
            .ok()
            .and_then(|value| value.parse::<QuizId>().ok());
        let mut explicit_quiz_id = false;
        let mut file = None;
        let mut shuffle = false;
        let mut limit = DEFAULT_LIMIT;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--quiz-id" => {
                    let value = require_value(args, "--quiz-id")?;
                    let parsed = value
                        .parse::<QuizId>()
                        .map_err(|_| ArgsError::InvalidQuizId { raw: value.clone() })?;
                    quiz_id = Some(parsed);
                    explicit_quiz_id = true;
                }
                "--file" => {
                    file = Some(PathBuf::from(require_value(args, "--file")?));
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    limit = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ArgsError::InvalidLimit { raw: value })?;
                }
                "--shuffle" => shuffle = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if explicit_quiz_id && file.is_some() {
            return Err(ArgsError::ConflictingSource);
        }

        Ok(Self {
            db_url,
            quiz_id,
            file,
            shuffle,
            limit,
        })
    }

    fn check(&self, command: Command) -> Result<(), ArgsError> {
        match command {
            Command::Take if self.file.is_none() && self.quiz_id.is_none() => {
                Err(ArgsError::MissingQuizId)
            }
            Command::Import if self.file.is_none() => Err(ArgsError::MissingFile),
            Command::History if self.quiz_id.is_none() => Err(ArgsError::MissingQuizId),
            _ => Ok(()),
        }
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- take    (--quiz-id <id> | --file <quiz.json>) [--shuffle]");
    eprintln!("  cargo run -p app -- import  --file <quiz.json>");
    eprintln!("  cargo run -p app -- history --quiz-id <id> [--limit <n>]");
    eprintln!("  cargo run -p app -- list    [--limit <n>]");
    eprintln!();
    eprintln!("Common options:");
    eprintln!("  --db <sqlite_url>   (default: {DEFAULT_DB_URL})");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_ID, QUIZ_PROGRESS_URL, QUIZ_PROGRESS_TOKEN, RUST_LOG");
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn load_quiz_file(path: &Path) -> Result<QuizDefinition, QuizFileError> {
    let raw = std::fs::read_to_string(path).map_err(|e| QuizFileError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| QuizFileError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Without a subcommand, take a quiz.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Take,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Take,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter)
        .and_then(|args| args.check(cmd).map(|()| args))
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;

    // Open + migrate SQLite at startup; services only see repository traits.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    tracing::debug!(db_url = %parsed.db_url, command = ?cmd, "storage ready");

    match cmd {
        Command::Take => take(&storage, parsed).await,
        Command::Import => import(&storage, parsed).await,
        Command::History => history(&storage, parsed).await,
        Command::List => list(&storage, parsed.limit).await,
    }
}

async fn take(storage: &Storage, args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let loop_service = QuizLoopService::from_storage(Clock::system(), storage)
        .with_shuffle_questions(args.shuffle);

    let service = match (args.file, args.quiz_id) {
        (Some(path), _) => loop_service.start_definition(load_quiz_file(&path)?)?,
        (None, Some(quiz_id)) => loop_service.start(&quiz_id).await?,
        (None, None) => return Err(ArgsError::MissingQuizId.into()),
    };

    let quiz = service.session().quiz();
    println!("{}", quiz.title);
    if let Some(description) = &quiz.description {
        println!("{description}");
    }
    println!(
        "{} questions, {} to finish, {}% to pass",
        quiz.question_count(),
        format_countdown(quiz.time_limit_seconds()),
        quiz.passing_score
    );

    let sync = HttpAttemptSink::from_env();
    terminal::drive(service, &sync).await?;
    Ok(())
}

async fn import(storage: &Storage, args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let path = args.file.ok_or(ArgsError::MissingFile)?;
    let catalog = QuizCatalogService::new(Arc::clone(&storage.quizzes));
    let quiz = catalog.import(load_quiz_file(&path)?).await?;
    println!(
        "imported {} ({} questions)",
        quiz.id,
        quiz.question_count()
    );
    Ok(())
}

async fn history(storage: &Storage, args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let quiz_id = args.quiz_id.ok_or(ArgsError::MissingQuizId)?;
    let history = AttemptHistoryService::new(Arc::clone(&storage.attempts));

    let stats = history.stats(&quiz_id).await?;
    if stats.attempts == 0 {
        println!("no attempts for {quiz_id}");
        return Ok(());
    }
    println!(
        "{quiz_id}: {} attempts, {} passed, best {}%, latest {}%, average {}%",
        stats.attempts,
        stats.passed,
        stats.best_score.unwrap_or(0),
        stats.latest_score.unwrap_or(0),
        stats.average_score.unwrap_or(0),
    );

    for item in history.list_recent(&quiz_id, args.limit).await? {
        println!(
            "  {}  {:>3}%  {}/{}  {}  {:<6}  {}",
            item.completed_at.format("%Y-%m-%d %H:%M"),
            item.score,
            item.correct,
            item.total,
            format_countdown(item.time_spent_seconds),
            item.reason.as_str(),
            if item.passed { "pass" } else { "fail" },
        );
    }
    Ok(())
}

async fn list(storage: &Storage, limit: u32) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = QuizCatalogService::new(Arc::clone(&storage.quizzes));
    let listings = catalog.list(limit).await?;
    if listings.is_empty() {
        println!("no quizzes; import one with `app import --file <quiz.json>`");
    }
    for listing in listings {
        println!(
            "  {:<28} {:>3} questions  {:>3} min  pass {:>3}%  {}",
            listing.id.as_str(),
            listing.question_count,
            listing.time_limit_minutes,
            listing.passing_score,
            listing.title,
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_db_url_is_already_normalized() {
        assert_eq!(normalize_sqlite_url(DEFAULT_DB_URL.into()), DEFAULT_DB_URL);
    }

    #[test]
    fn bare_paths_become_sqlite_urls() {
        let url = normalize_sqlite_url("quiz.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("/quiz.db"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
