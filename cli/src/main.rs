#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

mod config;
mod render;
mod shell;
mod store;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::{
    Core, Event, EventLevel, InjectionSummary, SettingsOutcome, StatusView, TestEvent, ViewModel,
    DEFAULT_API_BASE,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::render::render;
use crate::shell::{Shell, Stop};
use crate::store::FileStore;

#[derive(Debug, Parser)]
#[command(name = "opsai")]
#[command(about = "Terminal dashboard for the OpsAI incident backend")]
struct Args {
    /// Default API base, used when no override is saved.
    #[arg(long, env = "OPSAI_API_URL", default_value = DEFAULT_API_BASE)]
    api_url: String,
    /// Directory holding settings.json.
    #[arg(long, env = "OPSAI_STATE_DIR")]
    state_dir: Option<PathBuf>,
    /// Debug logging unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll incidents and redraw on every change.
    Watch {
        #[arg(long, default_value_t = 10_000)]
        interval_ms: u64,
        /// Stop after this many poll ticks.
        #[arg(long)]
        ticks: Option<u32>,
    },
    /// Check /health, warm the backend up, then load incidents.
    Wake,
    /// Load incidents once (with one retry if the backend is asleep).
    Fetch,
    /// Show or change the saved API base.
    Api {
        #[command(subcommand)]
        action: ApiAction,
    },
    /// Post a single event to /api/v1/events.
    Send {
        #[arg(long)]
        service: String,
        #[arg(long, default_value = "ERROR")]
        level: EventLevel,
        #[arg(long)]
        message: String,
    },
    /// Post a burst of ERROR events for one service.
    Simulate {
        #[arg(long)]
        service: String,
        #[arg(long)]
        message: String,
        #[arg(long, default_value_t = 5)]
        count: u32,
    },
}

#[derive(Debug, Subcommand)]
enum ApiAction {
    Show,
    Set { url: String },
    Reset,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let state_dir = config::resolve_state_dir(args.state_dir)?;
    let store = FileStore::open(&state_dir)
        .with_context(|| format!("opening settings in {}", state_dir.display()))?;

    let live = matches!(args.command, Command::Watch { .. });
    let mut shell = Shell::new(Core::new(), store, live)?;
    shell.dispatch(Event::AppStarted {
        default_api_base: args.api_url,
    })?;

    match args.command {
        Command::Watch { interval_ms, ticks } => {
            shell.dispatch(Event::StartPolling { interval_ms })?;
            let stop = shell.run(ticks).await?;
            info!(?stop, "watch finished");

            if let Some(handle) = shell.view().polling {
                shell.dispatch(Event::StopPolling { handle })?;
            }
            shell.dispatch(Event::ViewDetached)?;
            Ok(status_code(&shell.view()))
        }
        Command::Wake => {
            shell.dispatch(Event::WakeUpRequested)?;
            finish(&mut shell).await
        }
        Command::Fetch => {
            shell.dispatch(Event::RefreshRequested)?;
            finish(&mut shell).await
        }
        Command::Api { action } => {
            match action {
                ApiAction::Show => {}
                ApiAction::Set { url } => shell.dispatch(Event::SetApiBase { url })?,
                ApiAction::Reset => shell.dispatch(Event::ClearApiBase)?,
            }
            let view = shell.view();
            print_api(&view);
            Ok(api_code(&view))
        }
        Command::Send {
            service,
            level,
            message,
        } => {
            shell.dispatch(Event::SendTestEvent(TestEvent::new(service, level, message)))?;
            shell.run(None).await?;
            Ok(injection_outcome(&shell.view()))
        }
        Command::Simulate {
            service,
            message,
            count,
        } => {
            shell.dispatch(Event::SimulateIncident {
                service,
                message,
                count,
            })?;
            shell.run(None).await?;
            Ok(injection_outcome(&shell.view()))
        }
    }
}

async fn finish(shell: &mut Shell) -> Result<ExitCode> {
    if shell.run(None).await? == Stop::Interrupted {
        return Ok(ExitCode::FAILURE);
    }
    let view = shell.view();
    println!("{}", render(&view));
    Ok(status_code(&view))
}

fn status_code(view: &ViewModel) -> ExitCode {
    match view.status {
        StatusView::Error { .. } => ExitCode::FAILURE,
        StatusView::Loading | StatusView::Ready => ExitCode::SUCCESS,
    }
}

fn print_api(view: &ViewModel) {
    println!("api base   {}", view.api_base);
    println!("default    {}", view.default_api_base);
    println!("override   {}", if view.api_base_overridden { "yes" } else { "no" });
    println!("docs       {}", view.docs_url);
    if view.localhost_warning {
        println!("warning: API base points at localhost; a deployed backend will not be reached");
    }
    if let Some(notice) = &view.notice {
        println!("{notice}");
    }
}

fn api_code(view: &ViewModel) -> ExitCode {
    exit_code(!settings_failed(view))
}

fn settings_failed(view: &ViewModel) -> bool {
    view.settings_outcome.is_some_and(SettingsOutcome::is_failure)
}

fn injection_outcome(view: &ViewModel) -> ExitCode {
    println!("{}", view.notice.as_deref().unwrap_or("no response"));
    exit_code(injection_succeeded(view))
}

/// True only when a batch finished and every event in it was accepted.
fn injection_succeeded(view: &ViewModel) -> bool {
    view.last_injection
        .as_ref()
        .is_some_and(InjectionSummary::succeeded)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
