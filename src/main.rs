use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tablesync::aws::auth::{self, Credentials};
use tablesync::aws::client::DynamoDbClient;
use tablesync::aws::http::format_remote_error;
use tablesync::config::Config;
use tablesync::controller::{Controller, ControllerSettings, TableOutcome};
use tablesync::manifest;
use tablesync::reconcile::{ControlSignal, PassDecision, ReconcileError, Reconciler};
use tablesync::report::ConditionLog;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Converge DynamoDB tables on declarative manifests
#[derive(Parser, Debug)]
#[command(name = "tablesync", version = tablesync::VERSION, about, long_about = None)]
struct Args {
    /// Table manifest (YAML or JSON); may be repeated
    #[arg(short, long = "manifest", required = true)]
    manifests: Vec<PathBuf>,

    /// AWS region to use
    #[arg(short, long)]
    region: Option<String>,

    /// Endpoint override, e.g. http://localhost:8000 for DynamoDB Local
    #[arg(long)]
    endpoint: Option<String>,

    /// Shared credentials profile
    #[arg(short, long)]
    profile: Option<String>,

    /// Run a single pass per table and exit
    #[arg(long)]
    once: bool,

    /// Print the planned action per table without submitting it
    #[arg(long)]
    dry_run: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    // RUST_LOG refines the level per target when set
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(tracing_level.as_str().to_lowercase()));

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(log_file.is_none())
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("tablesync {} started with log level: {:?}", tablesync::VERSION, level);
    if let Some(path) = log_file {
        tracing::info!("Log file: {:?}", path);
    }

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level, args.log_file.as_ref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:?}");
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = Config::load();
    let profile = config.effective_profile(args.profile.as_deref());
    let region = config.effective_region(args.region.as_deref(), &profile);
    if !auth::validate_region(&region) {
        anyhow::bail!("Invalid region '{}'", region);
    }
    let endpoint = config.effective_endpoint(args.endpoint.as_deref());

    let tables = manifest::load_manifests(&args.manifests)?;
    if tables.is_empty() {
        anyhow::bail!("No tables declared in the given manifests");
    }

    tracing::info!("Using region: {}, profile: {}", region, profile);

    let credentials = Credentials::resolve(Some(&profile))?;
    let settings = config.reconcile_settings();
    let client = DynamoDbClient::new(
        &region,
        endpoint.as_deref(),
        credentials,
        settings.request_timeout,
    )?;

    let controller = Controller::new(
        Reconciler::new(client, settings),
        Arc::new(ConditionLog::default()),
        ControllerSettings::from_config(&config),
    );

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    if args.dry_run {
        return Ok(print_plan(controller.plan_only(&tables, &cancel).await));
    }

    if args.once {
        let results = controller.run_once(&tables, &cancel).await;
        let mut code = ExitCode::SUCCESS;
        for (table, signal) in results {
            println!("{}: {}", table, signal);
            if let ControlSignal::Fatal { cause } = &signal {
                print_hint(cause);
                code = ExitCode::FAILURE;
            }
        }
        return Ok(code);
    }

    let outcomes = controller.run(tables, cancel).await;
    let mut code = ExitCode::SUCCESS;
    for (table, outcome) in outcomes {
        match &outcome {
            TableOutcome::GaveUp(cause) => {
                eprintln!("{}: gave up: {}", table, cause);
                print_hint(cause);
            }
            TableOutcome::Panicked(reason) => eprintln!("{}: crashed: {}", table, reason),
            TableOutcome::Cancelled => {}
        }
        if outcome.is_failure() {
            code = ExitCode::FAILURE;
        }
    }
    Ok(code)
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            cancel.cancel();
        }
    });
}

fn print_plan(decisions: Vec<(String, Result<PassDecision, ControlSignal>)>) -> ExitCode {
    let mut code = ExitCode::SUCCESS;
    for (table, decision) in decisions {
        match decision {
            Ok(PassDecision::Converged) => println!("{}: in sync", table),
            Ok(PassDecision::CreateTable) => println!("{}: would create table", table),
            Ok(PassDecision::Submit(intent)) => println!("{}: would submit {}", table, intent),
            Ok(PassDecision::Wait { reason }) => println!("{}: waiting, {}", table, reason),
            Ok(PassDecision::Settled { reason }) => println!("{}: terminal, {}", table, reason),
            Err(signal) => {
                println!("{}: {}", table, signal);
                if let ControlSignal::Fatal { cause } = &signal {
                    print_hint(cause);
                    code = ExitCode::FAILURE;
                }
            }
        }
    }
    code
}

fn print_hint(cause: &ReconcileError) {
    if let ReconcileError::Remote { source, .. } = cause {
        eprintln!("  hint: {}", format_remote_error(source));
    }
}
