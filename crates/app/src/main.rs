use std::fmt;
use std::io::{self, BufRead, Write as _};

use drill_core::model::{SessionConfig, SessionMode, StudentIdentity, TableSelection};
use drill_core::revisit::QuestionOrigin;
use drill_core::stats::{Submission, SubmissionOutcome};
use drill_services::{AppServices, Clock, SessionLoopService, SessionService};

const USAGE: &str = "\
usage: drill --name NAME --class CODE --tables \"2 3 4\" [options]

options:
  --mode fixed|timed    how the session ends (default: fixed)
  --target N            questions in fixed mode (default: 20)
  --seconds N           countdown in timed mode (default: 60)
  --db URL              sqlite url for the results log (default: in-memory)
  --export              print the results log as CSV and exit
  --clear               wipe the results log and exit
";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidMode { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => {
                write!(f, "invalid {flag} value: {raw}")
            }
            ArgsError::InvalidMode { raw } => {
                write!(f, "invalid --mode value: {raw} (expected fixed or timed)")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeArg {
    Fixed,
    Timed,
}

#[derive(Debug)]
struct Args {
    name: String,
    class: String,
    tables: Vec<u32>,
    mode: ModeArg,
    target: u32,
    seconds: u64,
    db: Option<String>,
    export: bool,
    clear: bool,
    help: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            name: String::new(),
            class: String::new(),
            tables: Vec::new(),
            mode: ModeArg::Fixed,
            target: 20,
            seconds: 60,
            db: None,
            export: false,
            clear: false,
            help: false,
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, ArgsError> {
    let mut parsed = Args::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--name" => parsed.name = require_value(&mut args, "--name")?,
            "--class" => parsed.class = require_value(&mut args, "--class")?,
            "--tables" => {
                let raw = require_value(&mut args, "--tables")?;
                parsed.tables = raw
                    .split_whitespace()
                    .map(|part| {
                        part.parse::<u32>().map_err(|_| ArgsError::InvalidNumber {
                            flag: "--tables",
                            raw: part.to_owned(),
                        })
                    })
                    .collect::<Result<_, _>>()?;
            }
            "--mode" => {
                let raw = require_value(&mut args, "--mode")?;
                parsed.mode = match raw.as_str() {
                    "fixed" => ModeArg::Fixed,
                    "timed" => ModeArg::Timed,
                    _ => return Err(ArgsError::InvalidMode { raw }),
                };
            }
            "--target" => {
                let raw = require_value(&mut args, "--target")?;
                parsed.target = raw.parse().map_err(|_| ArgsError::InvalidNumber {
                    flag: "--target",
                    raw,
                })?;
            }
            "--seconds" => {
                let raw = require_value(&mut args, "--seconds")?;
                parsed.seconds = raw.parse().map_err(|_| ArgsError::InvalidNumber {
                    flag: "--seconds",
                    raw,
                })?;
            }
            "--db" => parsed.db = Some(require_value(&mut args, "--db")?),
            "--export" => parsed.export = true,
            "--clear" => parsed.clear = true,
            "--help" | "-h" => parsed.help = true,
            other => return Err(ArgsError::UnknownArg(other.to_owned())),
        }
    }

    Ok(parsed)
}

fn feedback_line(
    outcome: SubmissionOutcome,
    submission: Submission,
    origin: QuestionOrigin,
) -> String {
    match outcome {
        SubmissionOutcome::Correct => {
            if origin == QuestionOrigin::Revisit {
                "Correct - you got it this time!".to_owned()
            } else {
                "Correct!".to_owned()
            }
        }
        SubmissionOutcome::Incorrect { tries_remaining } => {
            if submission.is_valid() {
                format!("Not quite, try again ({tries_remaining} tries left).")
            } else {
                format!("Please type a number ({tries_remaining} tries left).")
            }
        }
        SubmissionOutcome::Revealed { answer } => {
            format!("The answer is {answer}. Moving on.")
        }
    }
}

async fn run_session(
    loop_svc: &SessionLoopService,
    clock: Clock,
    mut session: SessionService,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stdout = io::stdout();

    println!("Type an answer, or 'finish' to stop early.\n");

    while !session.is_finished() {
        loop_svc.tick(&mut session).await?;
        let Some(question) = session.current_question() else {
            break;
        };

        if let Some(remaining) = session.remaining_ms(clock.now()) {
            print!("[{}s] {} = ", remaining / 1_000, question.fact);
        } else {
            print!(
                "[{}/{}] {} = ",
                session.stats().completed + 1,
                session.config().mode().questions_target(),
                question.fact
            );
        }
        stdout.flush()?;

        let Some(line) = lines.next().transpose()? else {
            loop_svc.finish_session(&mut session).await?;
            break;
        };
        if line.trim() == "finish" {
            loop_svc.finish_session(&mut session).await?;
            break;
        }

        let result = loop_svc.submit_answer(&mut session, &line).await?;
        println!(
            "{}",
            feedback_line(
                result.feedback.outcome,
                result.feedback.submission,
                result.feedback.origin
            )
        );
    }

    loop_svc.finish_session(&mut session).await?;
    let record = session.build_record()?;
    println!("\nSession over for {} ({}).", record.name(), record.class_code());
    println!(
        "Answered {} questions in {} tries: {} correct ({}% accuracy).",
        record.completed(),
        record.attempts(),
        record.correct(),
        record.accuracy()
    );
    if let (Some(fastest), Some(slowest)) = (record.fastest_ms(), record.slowest_ms()) {
        println!("Fastest answer {fastest} ms, slowest {slowest} ms.");
    }
    println!("Pace: {:.1} questions per minute.", record.q_per_min());

    let misses = session.miss_records();
    if !misses.is_empty() {
        println!("\nFacts to practise:");
        for miss in misses {
            println!(
                "  {} = {} (missed {} times)",
                miss.fact,
                miss.fact.answer(),
                miss.miss_count
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let args = parse_args(std::env::args().skip(1)).map_err(|err| {
        eprintln!("{err}\n\n{USAGE}");
        err
    })?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    let clock = Clock::default_clock();
    let services = match &args.db {
        Some(url) => AppServices::new_sqlite(url, clock).await?,
        None => AppServices::new_in_memory(clock),
    };

    if args.clear {
        services.export().clear().await?;
        println!("Results log cleared.");
        return Ok(());
    }
    if args.export {
        println!("{}", services.export().export_csv().await?);
        return Ok(());
    }

    // Sign-in gate: bad identity or table selection stops here, before any
    // session state exists.
    let identity = StudentIdentity::new(args.name, args.class)?;
    let tables = TableSelection::new(args.tables.iter().copied())?;
    let mode = match args.mode {
        ModeArg::Fixed => SessionMode::Fixed {
            target: args.target,
        },
        ModeArg::Timed => SessionMode::Timed {
            duration_ms: args.seconds.saturating_mul(1_000),
        },
    };
    let config = SessionConfig::new(identity, mode, tables)?;

    let loop_svc = services.session_loop();
    let session = loop_svc.start_session(config);
    log::info!("session started: mode={}", session.config().mode().label());

    run_session(&loop_svc, clock, session).await
}
