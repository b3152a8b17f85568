use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use devteam::attachment::{Attachment, AttachmentSet};
use devteam::backend::Backend;
use devteam::backend::openrouter::OpenRouterBackend;
use devteam::banner::{BannerInfo, credits_line, print_banner, print_run_summary};
use devteam::config::Settings;
use devteam::consts::LOG_ENV_VAR;
use devteam::dispatch::sequencer::{Task, TaskQueue, TaskSequencer, is_complete};
use devteam::dispatch::{DispatchContext, DispatchRequest, Dispatcher, ResponseKind};
use devteam::events::EventBus;
use devteam::progress::Progress;
use devteam::sink::{ResultStore, default_export_name, task_results_name};
use devteam::team::{Mode, TeamId};
use devteam::usage::UsageTracker;

#[derive(Parser)]
#[command(name = "devteam", version, about = "One prompt, many models at once.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Which and how many models each team calls
    #[arg(short, long, value_enum, default_value_t = Mode::Eco, global = true)]
    mode: Mode,

    /// Chat-completion API root (overrides OPENROUTER_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Per-task deadline in seconds for task sequences
    #[arg(long, global = true)]
    deadline: Option<u64>,

    /// Per-model call timeout in seconds (default: none)
    #[arg(long, global = true)]
    call_timeout: Option<u64>,

    /// Disable the stagger delays between calls and tasks
    #[arg(long, default_value_t = false, global = true)]
    no_stagger: bool,

    /// Skip the banner and progress line
    #[arg(short, long, default_value_t = false, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Send one prompt to one team
    Send {
        /// Team number (1-4)
        #[arg(short, long, default_value = "1")]
        team: TeamId,

        /// Files to attach
        #[arg(short, long)]
        attach: Vec<PathBuf>,

        /// Write the response as markdown to this file
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// The prompt
        prompt: Vec<String>,
    },
    /// Run queued tasks one after another
    Tasks {
        /// JSON file: [{"team": 1, "prompt": "...", "attach": ["path"]}]
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Inline task as TEAM:PROMPT (repeatable)
        #[arg(long = "task")]
        tasks: Vec<String>,

        /// Files attached to every inline task
        #[arg(short, long)]
        attach: Vec<PathBuf>,

        /// Also write the results as markdown to this file
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Directory for the automatic TaskResults export
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Show account credit usage
    Credits,
    /// Verify the API key and connectivity
    Check,
}

#[derive(Deserialize)]
struct TaskSpec {
    team: TeamId,
    prompt: String,
    #[serde(default)]
    attach: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(url) = &cli.base_url {
        settings.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(secs) = cli.deadline {
        settings.timings.task_deadline = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.call_timeout {
        settings.timings.call_timeout = Some(Duration::from_secs(secs));
    }
    if cli.no_stagger {
        settings.timings.intra_stagger = Duration::ZERO;
        settings.timings.inter_stagger = Duration::ZERO;
    }
    settings.report_credential();

    let backend: Arc<dyn Backend> = Arc::new(OpenRouterBackend::new(&settings)?);
    let usage = Arc::new(UsageTracker::new());
    let events = Arc::new(EventBus::default());
    let ctx = DispatchContext::new()
        .with_events(Arc::clone(&events))
        .with_usage(Arc::clone(&usage));

    match cli.command {
        Command::Credits => {
            if !usage.refresh(backend.as_ref()).await {
                bail!("could not fetch credits");
            }
            println!("credits: {}", credits_line(Some(usage.snapshot())));
            Ok(())
        }
        Command::Check => {
            if backend.check().await {
                println!("✓ API connection successful - ready to process requests");
                Ok(())
            } else {
                bail!("API connection failed - check your API key")
            }
        }
        Command::Send {
            team,
            attach,
            export,
            prompt,
        } => {
            usage.refresh(backend.as_ref()).await;
            if !cli.quiet {
                print_banner(&BannerInfo {
                    mode: cli.mode,
                    teams: &[team],
                    auth_status: auth_status(&settings),
                    base_url: &settings.base_url,
                    credits: Some(usage.snapshot()),
                });
            }

            let attachments = load_attachments(&attach).await;
            let request = DispatchRequest::new(prompt.join(" "), team, cli.mode)
                .with_attachments(attachments);
            let dispatcher = Dispatcher::new(backend, &settings);

            cancel_on_ctrl_c(ctx.clone(), None);
            let progress = (!cli.quiet).then(|| Progress::start(&events, "dispatching"));
            let result = dispatcher.dispatch(&ctx, &request).await;
            if let Some(progress) = progress {
                progress.stop().await;
            }

            let response = result.context("dispatch failed")?;
            let mut store = ResultStore::new();
            store.push(response);
            print!("{}", store.to_markdown());

            if let Some(path) = export {
                let path = if path.is_dir() {
                    path.join(default_export_name(store.responses()))
                } else {
                    path
                };
                let written = store.export(&path)?;
                println!("exported to {}", written.display());
            }
            Ok(())
        }
        Command::Tasks {
            file,
            tasks,
            attach,
            export,
            out_dir,
        } => {
            let queue = build_queue(file.as_deref(), &tasks, &attach).await?;
            if queue.is_empty() {
                bail!("no tasks given; use --file or --task TEAM:PROMPT");
            }

            usage.refresh(backend.as_ref()).await;
            if !cli.quiet {
                print_banner(&BannerInfo {
                    mode: cli.mode,
                    teams: &queue.teams(),
                    auth_status: auth_status(&settings),
                    base_url: &settings.base_url,
                    credits: Some(usage.snapshot()),
                });
            }

            let mut queue = queue;
            let tasks = queue.take();
            let task_count = tasks.len();
            let stop = CancellationToken::new();
            cancel_on_ctrl_c(ctx.clone(), Some(stop.clone()));

            let sequencer = TaskSequencer::new(Dispatcher::new(backend, &settings));
            let progress = (!cli.quiet).then(|| Progress::start(&events, "running tasks"));
            let result = sequencer.run_sequence(&ctx, tasks, cli.mode, &stop).await;
            if let Some(progress) = progress {
                progress.stop().await;
            }
            // Nothing ran, so there is nothing to print or export.
            let responses = result.context("task run refused")?;

            let timed_out = responses
                .iter()
                .filter(|r| r.kind == ResponseKind::TimedOut)
                .count();
            let failed = responses
                .iter()
                .filter(|r| r.kind == ResponseKind::Failed)
                .count();
            let complete = is_complete(task_count, &responses);

            let mut store = ResultStore::new();
            store.extend(responses);
            print!("{}", store.to_markdown());

            if let Some(path) = export {
                let written = store.export(&path)?;
                println!("exported to {}", written.display());
            }
            if complete {
                let path = out_dir.join(task_results_name(chrono::Utc::now()));
                let written = store.export(&path)?;
                println!("exported to {}", written.display());
                store.clear();
            } else {
                eprintln!(
                    "sequence stopped after {} of {} tasks; skipping auto-export",
                    store.len(),
                    task_count
                );
            }

            print_run_summary(task_count, timed_out, failed, usage.snapshot());
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn auth_status(settings: &Settings) -> &'static str {
    if settings.api_key.is_some() {
        "API key ✓"
    } else {
        "not configured"
    }
}

/// Ctrl+C cancels every in-flight call and stops any sequence. Fire and forget.
fn cancel_on_ctrl_c(ctx: DispatchContext, stop: Option<CancellationToken>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupted, cancelling requests");
            if let Some(stop) = stop {
                stop.cancel();
            }
            ctx.cancel_all();
        }
    });
}

async fn load_attachments(paths: &[PathBuf]) -> Vec<Attachment> {
    let mut set = AttachmentSet::new();
    for path in paths {
        if let Err(e) = set.load_path(path).await {
            tracing::warn!(path = %path.display(), error = %e, "attachment skipped");
        }
    }
    set.snapshot()
}

async fn build_queue(
    file: Option<&Path>,
    inline: &[String],
    attach: &[PathBuf],
) -> anyhow::Result<TaskQueue> {
    let mut queue = TaskQueue::new();

    if let Some(file) = file {
        let raw = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("failed to read {}", file.display()))?;
        let specs: Vec<TaskSpec> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid task file {}", file.display()))?;
        for spec in specs {
            let attachments = load_attachments(&spec.attach).await;
            queue.push(Task::new(spec.team, spec.prompt).with_attachments(attachments))?;
        }
    }

    if !inline.is_empty() {
        let shared = load_attachments(attach).await;
        for entry in inline {
            let (team, prompt) = entry
                .split_once(':')
                .with_context(|| format!("task {entry:?} is not TEAM:PROMPT"))?;
            let team: TeamId = team.parse().map_err(anyhow::Error::msg)?;
            queue.push(Task::new(team, prompt.trim()).with_attachments(shared.clone()))?;
        }
    }

    Ok(queue)
}
