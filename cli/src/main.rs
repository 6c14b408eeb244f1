//! CLI entrypoint for council
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use council_application::{
    BucketStore, DiscussionCoordinator, DiscussionObserver, NoProgress, ProcessTasksUseCase,
    RateLimitedCapability, RateLimiter, TaskStore,
};
use council_domain::config::validation::has_errors;
use council_domain::{
    ContributionPolicy, NewTask, Query, Roster, SessionId, Severity, SpecialistId, Task, TaskId,
    TaskStatus,
};
use council_infrastructure::{
    ConfigLoader, FileConfig, JsonlConversationLogger, RoutingCapability, SqliteBucketStore,
    SqliteTaskStore,
};
use council_presentation::{
    Cli, Command, ConsoleFormatter, OutputFormat, ProgressReporter, QuestionArgs, SimpleProgress,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

type Coordinator = DiscussionCoordinator<RateLimitedCapability<RoutingCapability>>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?
    };

    let _log_guard = init_logging(cli.verbose, &config)?;

    info!("Starting council");

    if !matches!(cli.command, Command::Config) {
        check_config(&config)?;
    }

    let database = cli
        .database
        .clone()
        .unwrap_or_else(|| config.storage.database_path());

    match &cli.command {
        Command::Ask { question, output } => {
            let observer: Arc<dyn DiscussionObserver> = if cli.quiet {
                Arc::new(NoProgress)
            } else {
                Arc::new(ProgressReporter::new())
            };
            let (coordinator, store, roster) = build_coordinator(&config, &database, observer)?;
            let task = new_task(question, &roster)?;
            let id = store.create(task).await?;
            info!("Created task {}", id);

            coordinator.run(id).await?;

            let task = store.get(id).await?;
            print_task(&task, *output);
            if task.status == TaskStatus::Failed {
                bail!("Discussion failed");
            }
        }

        Command::Submit { question } => {
            let store = open_task_store(&database)?;
            let (roster, _) = config.roster();
            let roster = roster.context("Roster configuration is invalid")?;
            let id = store.create(new_task(question, &roster)?).await?;
            println!("{}", id);
        }

        Command::Worker { session, drain } => {
            let observer: Arc<dyn DiscussionObserver> = if cli.quiet {
                Arc::new(NoProgress)
            } else {
                Arc::new(SimpleProgress)
            };
            let (coordinator, store, _) = build_coordinator(&config, &database, observer)?;
            let session = SessionId::new(
                session
                    .clone()
                    .unwrap_or_else(|| config.worker.session.clone()),
            );
            let worker = ProcessTasksUseCase::new(Arc::new(coordinator), store, session.clone())
                .with_params(config.worker.to_params());

            let cancel = CancellationToken::new();
            let signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, finishing current task");
                    signal.cancel();
                }
            });

            info!("Worker serving session {}", session);
            let report = worker.run(cancel, *drain).await;
            println!(
                "Processed {} task(s): {} completed, {} failed, {} errors",
                report.processed(),
                report.completed,
                report.failed,
                report.errors
            );
        }

        Command::Status {
            task_id,
            since,
            follow,
            output,
        } => {
            let store = open_task_store(&database)?;
            let id: TaskId = task_id.parse()?;
            let poll = Duration::from_millis(config.discussion.poll_interval_ms.max(100));
            let mut since = since.unwrap_or(0);
            loop {
                let task = store.get(id).await?;
                if task.status.is_terminal() {
                    print_task(&task, *output);
                    break;
                }
                print!("{}", ConsoleFormatter::format_progress(&task, since));
                if !follow {
                    break;
                }
                since = task.log_version();
                tokio::time::sleep(poll).await;
            }
        }

        Command::List { session } => {
            let store = open_task_store(&database)?;
            let tasks = store.list(&SessionId::new(session.clone())).await?;
            print!("{}", ConsoleFormatter::format_task_list(&tasks));
        }

        Command::Limits => {
            let store = SqliteBucketStore::open(&database)
                .with_context(|| format!("Failed to open {}", database.display()))?;
            let buckets = store.list()?;
            print!("{}", ConsoleFormatter::format_buckets(&buckets, Utc::now()));
        }

        Command::Health => {
            let routing = RoutingCapability::from_config(&config.providers)?;
            let results = routing.health().await;
            print!("{}", ConsoleFormatter::format_health(&results));
            if results.iter().any(|(_, healthy)| !healthy) {
                bail!("Some providers are unreachable");
            }
        }

        Command::Config => show_config(cli.config.as_deref(), &config)?,
    }

    Ok(())
}

/// Console layer on stderr, plus a daily rolling file when `[logging] directory` is set.
///
/// `RUST_LOG` overrides the verbosity flags.
fn init_logging(verbose: u8, config: &FileConfig) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let (file, guard) = match config.logging.directory_path() {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(&dir, &config.logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    Ok(guard)
}

/// Log warnings and refuse to start on errors.
fn check_config(config: &FileConfig) -> Result<()> {
    let issues = config.validate();
    for issue in issues.iter().filter(|i| i.severity == Severity::Warning) {
        warn!("{}", issue.message);
    }
    if has_errors(&issues) {
        let messages: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .map(|i| i.message.as_str())
            .collect();
        bail!(
            "Invalid configuration:\n  {}\nRun `council config` for details",
            messages.join("\n  ")
        );
    }
    Ok(())
}

fn show_config(config_path: Option<&Path>, config: &FileConfig) -> Result<()> {
    let sources = ConfigLoader::describe_sources(config_path);
    let issues = config.validate();
    print!("{}", ConsoleFormatter::format_config_report(&sources, &issues));
    if has_errors(&issues) {
        bail!("Configuration has errors");
    }
    Ok(())
}

fn open_task_store(database: &Path) -> Result<Arc<dyn TaskStore>> {
    let store = SqliteTaskStore::open(database)
        .with_context(|| format!("Failed to open {}", database.display()))?;
    Ok(Arc::new(store))
}

/// Wire providers, limiter, stores and coordinator together.
fn build_coordinator(
    config: &FileConfig,
    database: &Path,
    observer: Arc<dyn DiscussionObserver>,
) -> Result<(Coordinator, Arc<dyn TaskStore>, Roster)> {
    let (roster, _) = config.roster();
    let roster = roster.context("Roster configuration is invalid")?;

    let bucket_store = SqliteBucketStore::open(database)
        .with_context(|| format!("Failed to open {}", database.display()))?;
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.to_params(),
        Arc::new(bucket_store),
    ));

    let routing = RoutingCapability::from_config(&config.providers)?;
    let capability = Arc::new(RateLimitedCapability::new(routing, limiter));

    let store = open_task_store(database)?;

    let mut coordinator = DiscussionCoordinator::new(capability, store.clone(), roster.clone())
        .with_policy(ContributionPolicy::new(config.policy.clone()))
        .with_params(config.discussion.to_params())
        .with_observer(observer);

    let (synthesizer, _) = config.synthesizer.parse_endpoint();
    if let Some(endpoint) = synthesizer {
        coordinator = coordinator.with_synthesizer(endpoint);
    }

    if let Some(path) = config.logging.conversation_log_path() {
        let logger = JsonlConversationLogger::open(&path)
            .with_context(|| format!("Failed to open conversation log {}", path.display()))?;
        info!("Writing conversation log to {}", path.display());
        coordinator = coordinator.with_conversation_logger(Arc::new(logger));
    }

    Ok((coordinator, store, roster))
}

/// Build a task from CLI arguments. No `-s` means the whole roster.
fn new_task(args: &QuestionArgs, roster: &Roster) -> Result<NewTask> {
    let mut query = Query::try_new(args.question.clone())?;
    if let Some(context) = &args.context {
        query = query.with_context(context.clone());
    }

    let assigned = if args.specialists.is_empty() {
        roster.ids()
    } else {
        args.specialists
            .iter()
            .map(|s| SpecialistId::try_new(s.as_str()))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(NewTask::new(
        SessionId::new(args.session.clone()),
        args.creator.clone(),
        query,
        assigned,
    )?)
}

fn print_task(task: &Task, format: OutputFormat) {
    let output = match format {
        OutputFormat::Full => ConsoleFormatter::format(task),
        OutputFormat::Synthesis => ConsoleFormatter::format_synthesis_only(task),
        OutputFormat::Json => ConsoleFormatter::format_json(task),
    };
    println!("{}", output);
}
