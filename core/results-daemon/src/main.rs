//! wave-results: command-line front end for WAVE result handling.
//!
//! Wires the SQLite result store, the JSON session registry and the
//! `wptreport` renderer into a [`ResultsEngine`]. Each invocation holds
//! `{root}/results.lock` for its whole run, so overlapping invocations apply
//! their check, store and write-back steps one after another.
//!
//! ## Subcommands
//!
//! - `session`: register a session and its declared tests
//! - `load`: import archives left by earlier runs
//! - `submit`: record one raw harness result for a session
//! - `compare`: build a comparison report across sessions
//! - `results`: print a session's stored results grouped by API

mod config;
mod db;
mod file_lock;
mod renderer;
mod session_store;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use results_core::{
    LoadOutcome, RecordOutcome, ResultsEngine, Session, SessionRegistry, SessionStatus,
    StorageConfig,
};

use db::SqliteResultStore;
use file_lock::FileLock;
use renderer::WptReportRenderer;
use session_store::FileSessionRegistry;

#[derive(Parser)]
#[command(name = "wave-results")]
#[command(about = "WAVE test result archiving and reporting")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.wave/results.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new session with its declared tests
    Session {
        #[arg(long)]
        token: String,

        #[arg(long)]
        user_agent: String,

        /// Declared test path (repeatable)
        #[arg(long = "test")]
        tests: Vec<String>,

        /// File with one declared test path per line
        #[arg(long, value_name = "FILE")]
        tests_file: Option<PathBuf>,

        /// Test path filter the session was started with
        #[arg(long)]
        path: Option<String>,

        /// Test type (repeatable), e.g. `automatic`
        #[arg(long = "type")]
        types: Vec<String>,
    },

    /// Import result archives found under the results directory
    Load,

    /// Record a raw harness result (JSON file, `-` for stdin)
    Submit {
        #[arg(long)]
        token: String,

        #[arg(long, value_name = "FILE")]
        result: PathBuf,

        /// Test path; defaults to the result's own `test` field
        #[arg(long)]
        test: Option<String>,
    },

    /// Generate a comparison report and print its path relative to the results directory
    Compare {
        #[arg(long)]
        api: String,

        #[arg(long = "token", required = true)]
        tokens: Vec<String>,

        /// Session whose results filter the report
        #[arg(long)]
        reference: Option<String>,
    },

    /// Print stored results grouped by API as JSON
    Results {
        #[arg(long)]
        token: String,

        #[arg(long)]
        api: Option<String>,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "wave-results failed");
        std::process::exit(1);
    }
}

fn init_logging() {
    let debug_enabled = env::var("WAVE_RESULTS_DEBUG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct Service {
    engine: ResultsEngine,
    registry: Arc<FileSessionRegistry>,
    _lock: FileLock,
}

fn run(cli: Cli) -> Result<(), String> {
    let Service {
        engine, registry, ..
    } = open_service(cli.config)?;

    match cli.command {
        Commands::Session {
            token,
            user_agent,
            mut tests,
            tests_file,
            path,
            types,
        } => {
            if let Some(file) = tests_file {
                tests.extend(read_test_list(&file)?);
            }
            let mut session = Session::new(token, user_agent)
                .with_tests(tests)
                .with_status(SessionStatus::Running);
            session.path = path;
            session.types = types;
            register_session(registry.as_ref(), session)?;
        }
        Commands::Load => {
            let summary = engine.load_results()?;
            for (token, outcome) in &summary.entries {
                match outcome {
                    LoadOutcome::Imported { apis, results } => {
                        println!("{token}\timported\t{apis} apis\t{results} results")
                    }
                    LoadOutcome::Skipped(reason) => println!("{token}\tskipped\t{reason:?}"),
                    LoadOutcome::Failed(error) => println!("{token}\tfailed\t{error}"),
                }
            }
            info!(
                imported = summary.imported(),
                skipped = summary.skipped(),
                failed = summary.failed(),
                "Result archives loaded"
            );
        }
        Commands::Submit {
            token,
            result,
            test,
        } => {
            let payload = read_payload(&result)?;
            let test = match test {
                Some(test) => test,
                None => payload
                    .get("test")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| "Result has no `test` field; pass --test".to_string())?,
            };
            let outcome = engine.record_result(&token, &test, payload)?;
            println!("{}", describe_outcome(&outcome));
        }
        Commands::Compare {
            api,
            tokens,
            reference,
        } => {
            let report = engine.generate_comparison_report(&tokens, &api, reference.as_deref())?;
            println!("{report}");
        }
        Commands::Results { token, api } => {
            let mut results = engine.results(&token)?;
            if let Some(api) = api {
                results.retain(|name, _| *name == api);
            }
            let json = serde_json::to_string_pretty(&results)
                .map_err(|e| format!("Failed to serialize results: {}", e))?;
            println!("{json}");
        }
    }

    Ok(())
}

fn open_service(config_path: Option<PathBuf>) -> Result<Service, String> {
    let base = StorageConfig::default();
    let config = config::load_config(config_path, &base)?;
    let storage = config.storage(&base);

    let lock = acquire_run_lock(&storage.root().join("results.lock"))?;
    let store = SqliteResultStore::new(config.database_path(&storage))?;
    let registry = Arc::new(FileSessionRegistry::load(&config.sessions_path(&storage))?);
    let renderer = WptReportRenderer::new(
        config.renderer.program.clone(),
        config.renderer.extra_args.clone(),
    );

    let engine = ResultsEngine::new(
        storage,
        registry.clone(),
        Arc::new(store),
        Arc::new(renderer),
    );
    Ok(Service {
        engine,
        registry,
        _lock: lock,
    })
}

fn acquire_run_lock(path: &Path) -> Result<FileLock, String> {
    if let Some(lock) = FileLock::try_acquire(path)? {
        return Ok(lock);
    }
    info!(path = %path.display(), "Waiting for another wave-results process");
    FileLock::acquire(path)
}

fn register_session(registry: &dyn SessionRegistry, session: Session) -> Result<(), String> {
    if session.tests.is_empty() {
        return Err(format!("Session {} declares no tests", session.token));
    }
    if registry.get_session(&session.token)?.is_some() {
        return Err(format!("Session {} already exists", session.token));
    }
    debug!(token = %session.token, tests = session.tests.len(), "Registering session");
    let token = session.token.clone();
    registry.add_session(session)?;
    info!(token = %token, "Session registered");
    Ok(())
}

fn read_test_list(path: &Path) -> Result<Vec<String>, String> {
    let content =
        fs_err::read_to_string(path).map_err(|e| format!("Failed to read test list: {}", e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn read_payload(path: &Path) -> Result<Value, String> {
    let content = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)
            .map_err(|e| format!("Failed to read result from stdin: {}", e))?;
        buffer
    } else {
        fs_err::read_to_string(path).map_err(|e| format!("Failed to read result: {}", e))?
    };
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse result JSON: {}", e))
}

fn describe_outcome(outcome: &RecordOutcome) -> String {
    match outcome {
        RecordOutcome::UnknownSession => "ignored: unknown session".to_string(),
        RecordOutcome::UnknownTest => "ignored: test not part of session".to_string(),
        RecordOutcome::Duplicate => "ignored: test already complete".to_string(),
        RecordOutcome::Recorded { api } => format!("recorded ({api} still running)"),
        RecordOutcome::ApiCompleted { api, bundle } => {
            format!("recorded; {api} complete, bundle at {}", bundle.display())
        }
    }
}
