//! desksort - sort files into bucket folders from the command line.
//!
//! Usage:
//!   desksort move <SOURCES>... --to <DIR>   Move items into a bucket folder
//!   desksort trash <PATHS>...               Send items to the trash
//!   desksort clean-backups                  Remove empty backup sessions
//!   desksort --help                         Show help

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Report, Result};
use tokio::sync::oneshot;
use tracing::{Instrument, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use desksort_core::{
    BatchResult, DeleteResult, ItemStatus, MoveOptions, MoveRequest, OverwriteChoice, Settings,
};
use desksort_ops::{
    DeleteEngine, DispatchLoop, Dispatcher, LoggingShell, MoveEngine, OverwritePrompt,
    RecycleConfirm, ShellNotifier, UndoLedger, UndoOutcome, platform_trash, prune_empty_sessions,
};

#[derive(Parser)]
#[command(
    name = "desksort",
    version,
    about = "Sort files into bucket folders",
    long_about = "desksort moves files and folders into bucket folders, asking before \
                  anything is overwritten and keeping replaced files so a move can be \
                  undone. Items can also be sent to the platform trash."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Move files and folders into a target folder
    Move {
        /// Items to move
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Target folder (created if missing)
        #[arg(short, long = "to")]
        to: PathBuf,

        /// Resolve every name conflict the same way instead of asking
        #[arg(short, long)]
        overwrite: Option<OverwriteArg>,

        /// Undo the batch right after it completes
        #[arg(long)]
        undo: bool,
    },

    /// Send files and folders to the trash
    Trash {
        /// Items to trash
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove empty backup sessions
    CleanBackups,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OverwriteArg {
    Replace,
    Skip,
}

impl From<OverwriteArg> for OverwriteChoice {
    fn from(arg: OverwriteArg) -> Self {
        match arg {
            OverwriteArg::Replace => OverwriteChoice::Replace,
            OverwriteArg::Skip => OverwriteChoice::Skip,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let (settings, warnings) = Settings::from_env();
    init_tracing(&settings);
    for warning in &warnings {
        warn!("{warning}");
    }

    let (dispatcher, ui) = Dispatcher::channel();
    let notifier = Arc::new(ShellNotifier::new(Arc::new(LoggingShell), settings.notify_mode));

    match cli.command {
        Command::Move {
            sources,
            to,
            overwrite,
            undo,
        } => {
            let options = match overwrite {
                Some(choice) => MoveOptions::with_overwrite(choice.into()),
                None => MoveOptions::default(),
            };
            let request = MoveRequest::new(sources, to).with_options(options);
            run_move(&settings, dispatcher, ui, notifier, request, undo).await?;
        }
        Command::Trash { paths, yes } => {
            run_trash(&settings, dispatcher, ui, notifier, paths, yes).await?;
        }
        Command::CleanBackups => {
            let root = settings.backups_root();
            let removed = prune_empty_sessions(&root, &[]);
            println!("Removed {removed} empty backup sessions from {}", root.display());
        }
    }

    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_directive()));

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Prompts on the terminal. Runs on the interactive thread.
struct TerminalPrompt;

impl TerminalPrompt {
    fn ask(question: &str) -> Option<String> {
        tokio::task::block_in_place(|| {
            eprint!("{question} ");
            io::stderr().flush().ok()?;
            let mut answer = String::new();
            match io::stdin().lock().read_line(&mut answer) {
                Ok(0) | Err(_) => None,
                Ok(_) => Some(answer.trim().to_lowercase()),
            }
        })
    }
}

impl OverwritePrompt for TerminalPrompt {
    fn prompt_overwrite(&self, dest: &Path) -> Option<OverwriteChoice> {
        loop {
            let answer = Self::ask(&format!(
                "{} already exists. [r]eplace, [s]kip or [c]ancel?",
                dest.display()
            ))?;
            match answer.as_str() {
                "r" | "replace" => return Some(OverwriteChoice::Replace),
                "s" | "skip" => return Some(OverwriteChoice::Skip),
                "c" | "cancel" => return None,
                _ => continue,
            }
        }
    }
}

impl RecycleConfirm for TerminalPrompt {
    fn confirm_recycle(&self, count: usize) -> bool {
        let noun = if count == 1 { "item" } else { "items" };
        matches!(
            Self::ask(&format!("Move {count} {noun} to the trash? [y/N]")).as_deref(),
            Some("y" | "yes")
        )
    }
}

async fn run_move(
    settings: &Settings,
    dispatcher: Dispatcher,
    mut ui: DispatchLoop,
    notifier: Arc<ShellNotifier>,
    request: MoveRequest,
    undo: bool,
) -> Result<()> {
    let engine = MoveEngine::new(settings, dispatcher.clone(), Arc::new(TerminalPrompt), notifier);
    let ledger = Arc::new(UndoLedger::new(dispatcher));
    let span = info_span!("session", id = %engine.session());

    async {
        let (tx, rx) = oneshot::channel();
        let sink = Arc::clone(&ledger);
        engine.move_many(request, move |result, actions| {
            sink.push_batch(actions);
            let _ = tx.send(result);
        });

        let result = ui
            .run_until(rx)
            .await
            .context("Move engine stopped before reporting")?;
        print_batch(&result);

        if undo && ledger.can_undo() {
            let (tx, rx) = oneshot::channel();
            ledger.undo_last(move |outcome| {
                let _ = tx.send(outcome);
            });
            let outcome = ui
                .run_until(rx)
                .await
                .context("Undo stopped before reporting")?;
            print_undo(outcome);
        }

        engine.shutdown().await;
        ledger.shutdown().await;
        info!("Session finished");
        Ok::<_, Report>(())
    }
    .instrument(span)
    .await
}

async fn run_trash(
    settings: &Settings,
    dispatcher: Dispatcher,
    mut ui: DispatchLoop,
    notifier: Arc<ShellNotifier>,
    paths: Vec<PathBuf>,
    yes: bool,
) -> Result<()> {
    if !yes
        && settings.needs_recycle_confirmation(paths.len())
        && !TerminalPrompt.confirm_recycle(paths.len())
    {
        println!("Nothing moved to the trash");
        return Ok(());
    }

    let engine = DeleteEngine::new(platform_trash(), notifier, dispatcher);

    let (tx, rx) = oneshot::channel();
    engine.delete_many(paths, move |results| {
        let _ = tx.send(results);
    });
    let results = ui
        .run_until(rx)
        .await
        .context("Delete engine stopped before reporting")?;
    print_deleted(&results);

    engine.shutdown().await;
    Ok(())
}

fn print_batch(result: &BatchResult) {
    if let Some(error) = &result.error {
        println!("Move failed: {error}");
        return;
    }

    for item in &result.items {
        let dest = item
            .dest
            .as_deref()
            .map(|d| d.display().to_string())
            .unwrap_or_default();
        match item.status {
            ItemStatus::Ok => println!("  moved      {} -> {dest}", item.src.display()),
            ItemStatus::Skipped => println!("  skipped    {}", item.src.display()),
            ItemStatus::Cancelled => println!("  cancelled  {}", item.src.display()),
            ItemStatus::Error => println!(
                "  failed     {}: {}",
                item.src.display(),
                item.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    println!();
    println!("{}", result.summary_line());
}

fn print_undo(outcome: UndoOutcome) {
    if outcome.failed == 0 {
        println!("Undid {} actions", outcome.succeeded);
    } else {
        println!(
            "Undid {} actions, {} could not be undone",
            outcome.succeeded, outcome.failed
        );
    }
}

fn print_deleted(results: &[DeleteResult]) {
    for result in results {
        match &result.error {
            None => println!("  trashed  {}", result.path.display()),
            Some(error) => println!("  failed   {}: {error}", result.path.display()),
        }
    }

    let trashed = results.iter().filter(|r| r.is_ok()).count();
    println!();
    println!("Moved {trashed} of {} items to the trash", results.len());
}
