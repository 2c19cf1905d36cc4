//! Interactive terminal loop for taking a quiz.
//!
//! The loop owns the one-second interval and feeds it to the session as
//! ticks; stdin lines are parsed into commands. Both sources are polled with
//! `tokio::select!`, so a session only ever sees one event at a time.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{self, MissedTickBehavior};

use quiz_core::TickOutcome;
use quiz_core::engine::Review;
use quiz_core::grading::OptionMark;
use quiz_core::model::{Attempt, OptionId, QuestionKind, SubmitReason};
use quiz_core::time::format_countdown;
use services::{HttpAttemptSink, QuizSessionService, SessionError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Next,
    Previous,
    /// Zero-based; typed one-based.
    GoTo(usize),
    Select(OptionId),
    Show,
    Submit,
    Review,
    Save,
    Retake,
    Help,
    Exit,
}

impl Input {
    /// Parse one stdin line. Returns `None` for anything unrecognised.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let command = parts.next()?;
        let arg = parts.next();
        if parts.next().is_some() {
            return None;
        }

        match (command, arg) {
            ("n" | "next", None) => Some(Self::Next),
            ("p" | "prev", None) => Some(Self::Previous),
            ("g" | "go", Some(k)) => {
                let k: usize = k.parse().ok()?;
                k.checked_sub(1).map(Self::GoTo)
            }
            ("s" | "select", Some(id)) => Some(Self::Select(OptionId::new(id))),
            ("show", None) => Some(Self::Show),
            ("submit", None) => Some(Self::Submit),
            ("review", None) => Some(Self::Review),
            ("save", None) => Some(Self::Save),
            ("retake", None) => Some(Self::Retake),
            ("help" | "?", None) => Some(Self::Help),
            ("exit" | "quit" | "q", None) => Some(Self::Exit),
            _ => None,
        }
    }
}

enum Flow {
    Continue,
    Restarted,
    Exit,
}

/// Run a session until the user exits or stdin closes.
///
/// # Errors
///
/// Returns an error if stdin cannot be read.
pub async fn drive(
    mut service: QuizSessionService,
    sync: &HttpAttemptSink,
) -> Result<(), std::io::Error> {
    let mut ticker = time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    render_question(&service);

    loop {
        tokio::select! {
            _ = ticker.tick() => match service.tick().await {
                Ok(TickOutcome::Running { remaining_seconds }) => announce(remaining_seconds),
                Ok(TickOutcome::TimedOut(attempt)) => {
                    println!();
                    println!("Time is up; the quiz was submitted automatically.");
                    finish(&service, &attempt, sync).await;
                }
                Ok(TickOutcome::Idle) => {}
                Err(err) => report_unrecorded(&service, &err),
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let Some(input) = Input::parse(&line) else {
                    println!("unrecognised command: {}  (type `help`)", line.trim());
                    continue;
                };
                match handle(&mut service, input, sync).await {
                    Flow::Continue => {}
                    Flow::Restarted => ticker.reset(),
                    Flow::Exit => break,
                }
            }
        }
    }

    if service.session().is_submitted() && !service.is_recorded() {
        tracing::warn!("exiting with an attempt that was never recorded");
    }
    Ok(())
}

async fn handle(service: &mut QuizSessionService, input: Input, sync: &HttpAttemptSink) -> Flow {
    match input {
        Input::Next => navigate(service, QuizSessionService::next),
        Input::Previous => navigate(service, QuizSessionService::previous),
        Input::GoTo(index) => navigate(service, |s| s.go_to(index)),
        Input::Select(option_id) => {
            let question_id = service.session().current_question().id.clone();
            if service.select_option(&question_id, &option_id) {
                render_question(service);
            } else {
                println!("ignored: cannot select `{option_id}` here");
            }
        }
        Input::Show => render_question(service),
        Input::Submit => match service.submit().await {
            Ok(submission) if submission.is_new => {
                finish(service, &submission.attempt, sync).await;
            }
            Ok(_) => println!("already submitted; type `review` or `retake`"),
            Err(err) => report_unrecorded(service, &err),
        },
        Input::Review => match service.review() {
            Some(review) => print_review(review),
            None => println!("review is available after submitting"),
        },
        Input::Save => match save(service, sync).await {
            Ok((attempt, true)) => println!("attempt {} recorded", attempt.id()),
            Ok((attempt, false)) => println!("attempt {} was already recorded", attempt.id()),
            Err(err) => println!("could not record attempt: {err}"),
        },
        Input::Retake => {
            if !service.session().is_submitted() {
                println!("finish this attempt before retaking");
                return Flow::Continue;
            }
            *service = service.restart();
            println!("Retake started.");
            render_question(service);
            return Flow::Restarted;
        }
        Input::Help => print_help(),
        Input::Exit => return Flow::Exit,
    }
    Flow::Continue
}

fn navigate(service: &mut QuizSessionService, step: impl FnOnce(&mut QuizSessionService) -> bool) {
    if step(service) {
        render_question(service);
    } else {
        println!("ignored: no such question");
    }
}

async fn finish(service: &QuizSessionService, attempt: &Attempt, sync: &HttpAttemptSink) {
    print_result(attempt, service.session().quiz().passing_score);
    if let Some(review) = service.review() {
        print_review(review);
    }
    sync_progress(attempt, sync).await;
}

/// Retry a failed hand-off. The flag is `true` when this call recorded the
/// attempt, in which case it is also synced.
async fn save(
    service: &mut QuizSessionService,
    sync: &HttpAttemptSink,
) -> Result<(Attempt, bool), SessionError> {
    let newly_recorded = !service.is_recorded();
    let attempt = service.finalize().await?;
    if newly_recorded {
        sync_progress(&attempt, sync).await;
    }
    Ok((attempt, newly_recorded))
}

async fn sync_progress(attempt: &Attempt, sync: &HttpAttemptSink) {
    if !sync.enabled() {
        return;
    }
    if let Err(err) = sync.post(attempt).await {
        tracing::warn!(attempt_id = %attempt.id(), error = %err, "progress sync failed");
    }
}

fn report_unrecorded(service: &QuizSessionService, err: &SessionError) {
    println!("could not record attempt: {err}");
    if let Some(attempt) = service.session().attempt() {
        print_result(attempt, service.session().quiz().passing_score);
    }
    println!("type `save` to retry");
}

// ─── RENDERING ─────────────────────────────────────────────────────────────────

fn announce(remaining_seconds: u32) {
    if remaining_seconds % 60 == 0 || remaining_seconds == 30 || remaining_seconds <= 10 {
        println!("time left: {}", format_countdown(remaining_seconds));
    }
}

fn render_question(service: &QuizSessionService) {
    let session = service.session();
    let progress = session.progress();
    let question = session.current_question();
    let selected = session.selections().get(&question.id);

    println!();
    println!(
        "Question {}/{} [{}]  answered {}/{}  time left {}",
        progress.current_index + 1,
        progress.total,
        question.kind.as_str(),
        progress.answered,
        progress.total,
        format_countdown(progress.remaining_seconds),
    );
    println!("{}", question.prompt);
    for option in &question.options {
        let picked = selected.contains(&option.id);
        let marker = match (question.kind, picked) {
            (QuestionKind::Single, true) => "(*)",
            (QuestionKind::Single, false) => "( )",
            (QuestionKind::Multiple, true) => "[x]",
            (QuestionKind::Multiple, false) => "[ ]",
        };
        println!("  {marker} {}) {}", option.id, option.text);
    }
}

fn print_result(attempt: &Attempt, passing_score: u8) {
    let verdict = if attempt.passed() { "PASSED" } else { "FAILED" };
    let how = match attempt.reason() {
        SubmitReason::Manual => "submitted",
        SubmitReason::Timeout => "timed out",
    };
    println!();
    println!(
        "{verdict}: {}% ({}/{} correct, passing score {passing_score}%)",
        attempt.score(),
        attempt.correct_count(),
        attempt.total_questions(),
    );
    println!(
        "{how} after {}",
        format_countdown(attempt.time_spent_seconds())
    );
}

fn print_review(review: Review<'_>) {
    println!();
    println!("Review:");
    for entry in review {
        let status = if entry.is_correct { "correct" } else { "incorrect" };
        println!("{}. {} [{status}]", entry.index + 1, entry.question.prompt);
        for option in &entry.options {
            let mark = match option.mark {
                OptionMark::Correct => "+",
                OptionMark::Missed => "!",
                OptionMark::Wrong => "x",
                OptionMark::Unmarked => " ",
            };
            println!("   {mark} {}) {}", option.option.id, option.option.text);
        }
        if !entry.explanation.is_empty() {
            println!("   {}", entry.explanation);
        }
    }
    println!("legend: + chosen and correct, ! correct but missed, x chosen but wrong");
}

fn print_help() {
    println!("Commands:");
    println!("  n | p             next / previous question");
    println!("  g <k>             go to question k (1-based)");
    println!("  s <option-id>     select an option on the current question");
    println!("  show              show the current question");
    println!("  submit            submit the quiz");
    println!("  review            review a submitted quiz");
    println!("  save              retry recording a submitted attempt");
    println!("  retake            start over after submitting");
    println!("  exit              leave (an unsubmitted quiz is discarded)");
}
