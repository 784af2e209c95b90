//! Top-level CLI definition and run wiring.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use colored::{Colorize, control};
use serde::Serialize;
use thiserror::Error;

use linksweep::core::config::Config;
use linksweep::logger::events::{Event, EventEmitter, EventSink, Severity};
use linksweep::logger::jsonl::JsonlSink;
use linksweep::scanner::classifier::Classification;
use linksweep::scanner::deletion::{Confirm, ExitStatus, RunMode, RunOutcome};
use linksweep::scanner::session;

/// Finds symlinks in a media library whose targets vanished from a debrid mount.
///
/// Exit codes: 0 nothing broken, 1 fatal error, 2 broken links kept,
/// 3 broken links deleted.
#[derive(Debug, Parser)]
#[command(
    name = "linksweep",
    author,
    version,
    about = "Broken symlink auditor for debrid-backed media libraries",
    long_about = None
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Delete broken links (asks once unless --yes is given).
    #[arg(long)]
    execute: bool,
    /// Skip the confirmation prompt. Has no effect without --execute.
    #[arg(short = 'y', long)]
    yes: bool,
    /// Force JSON output mode.
    #[arg(long)]
    json: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Also list healthy links and mount details.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Only warnings, errors and the final result.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    /// Directory for the per-run JSONL log (overrides config).
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
    /// Do not write a per-run JSONL log file.
    #[arg(long)]
    no_log_file: bool,
}

impl Cli {
    fn mode(&self) -> RunMode {
        RunMode::from_flags(self.execute, self.yes)
    }

    fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration or usage.
    #[error("{0}")]
    User(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Every CLI-level failure means the scan did not complete.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) | Self::Json(_) | Self::Io(_) => ExitStatus::Fatal.code(),
        }
    }
}

/// Load config, wire the sinks, run one audit. Returns the process exit code.
pub fn run(cli: &Cli) -> Result<i32, CliError> {
    let output = output_mode(cli);
    if cli.no_color || !io::stdout().is_terminal() {
        control::set_override(false);
    }

    let mode = cli.mode();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            // No sinks exist yet; JSON consumers still get the failure record.
            if output == OutputMode::Json {
                write_json_line(&Event::RunFailed {
                    code: err.code().to_string(),
                    message: err.to_string(),
                    path: err.path().map(std::path::Path::to_path_buf),
                })?;
                write_json_line(&Event::RunCompleted {
                    outcome: RunOutcome::fatal(mode),
                })?;
            }
            return Err(CliError::User(err.to_string()));
        }
    };
    if let Some(dir) = &cli.log_dir {
        config.logging.dir.clone_from(dir);
    }

    let presenter = ConsolePresenter::new(output, cli.verbosity());
    let mut emitter = EventEmitter::new().with_sink(presenter);
    if config.logging.json && !cli.no_log_file {
        emitter.add_sink(Box::new(JsonlSink::for_run(
            &config.logging.dir,
            Local::now(),
        )));
    }

    let mut confirm = StdinConfirm;
    let outcome = session::run(&config, mode, &emitter, &mut confirm);
    Ok(outcome.exit_code)
}

// ---------------------------------------------------------------------------
// Confirmation prompt
// ---------------------------------------------------------------------------

/// Asks on stderr, reads one line from stdin. EOF or a read error declines.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, count: usize) -> bool {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "Delete {count} broken symlink(s)? [y/N] ");
        let _ = stderr.flush();

        let mut input = String::new();
        match io::stdin().lock().read_line(&mut input) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&input),
        }
    }
}

fn is_affirmative(input: &str) -> bool {
    matches!(
        input.trim().to_lowercase().as_str(),
        "y" | "yes" | "o" | "oui"
    )
}

// ---------------------------------------------------------------------------
// Console presenter
// ---------------------------------------------------------------------------

/// Renders run events on the terminal, as text or as JSON lines.
struct ConsolePresenter {
    output: OutputMode,
    verbosity: Verbosity,
}

impl ConsolePresenter {
    const fn new(output: OutputMode, verbosity: Verbosity) -> Self {
        Self { output, verbosity }
    }

    fn is_visible(&self, event: &Event) -> bool {
        match self.verbosity {
            Verbosity::Quiet => {
                event.severity() >= Severity::Warning
                    || matches!(event, Event::RunCompleted { .. })
            }
            Verbosity::Normal => !matches!(
                event,
                Event::EntryClassified {
                    classification: Classification::Healthy,
                    ..
                } | Event::MountChecked { mounted: true, .. }
            ),
            Verbosity::Verbose => true,
        }
    }

    fn render_human(&self, event: &Event) {
        match event {
            Event::RunStarted {
                mode,
                media_dir,
                roots,
                instances,
                config_hash,
            } => {
                println!(
                    "{} {} of {} ({} instance(s), {} root(s))",
                    "linksweep".bold(),
                    mode.label(),
                    media_dir.display(),
                    instances,
                    roots.len()
                );
                if self.verbosity == Verbosity::Verbose
                    && let Some(hash) = config_hash
                {
                    println!("  config hash: {hash}");
                }
            }
            Event::MountChecked {
                instance,
                category,
                mount_path,
                mounted,
            } => {
                let label = instance_label(instance, category.as_deref());
                if *mounted {
                    println!("  mount {label}: {} ok", mount_path.display());
                } else {
                    eprintln!(
                        "{} mount {label}: {} is not an active mountpoint",
                        "warning:".yellow().bold(),
                        mount_path.display()
                    );
                }
            }
            Event::ScanStarted { root } => println!("Scanning {}", root.display()),
            Event::RootSkipped { root, reason } => eprintln!(
                "{} skipped {}: {reason}",
                "warning:".yellow().bold(),
                root.display()
            ),
            Event::EntryClassified {
                path,
                target,
                classification,
            } => {
                let target = target
                    .as_ref()
                    .map(|t| format!(" -> {}", t.display()))
                    .unwrap_or_default();
                match classification {
                    Classification::Healthy => {
                        println!("  {}  {}{target}", "ok".green(), path.display());
                    }
                    Classification::BrokenKnownMount { instance, category } => println!(
                        "  {} [{}] {}{target}",
                        "BROKEN".red().bold(),
                        instance_label(instance, category.as_deref()),
                        path.display()
                    ),
                    Classification::BrokenUnknownTarget => println!(
                        "  {} [unknown mount] {}{target}",
                        "BROKEN".red().bold(),
                        path.display()
                    ),
                    Classification::ResolutionError { error } => println!(
                        "  {} {}: {error}",
                        "UNRESOLVED".yellow().bold(),
                        path.display()
                    ),
                }
            }
            Event::ScanCompleted {
                summary,
                duration_ms,
            } => {
                println!(
                    "\nScanned {} symlink(s) in {:.1}s",
                    summary.total_symlinks,
                    Duration::from_millis(*duration_ms).as_secs_f64()
                );
                println!("  healthy:               {}", summary.healthy);
                println!("  broken (known mount):  {}", summary.broken_known_mount);
                println!("  broken (unknown):      {}", summary.broken_unknown_target);
                println!("  unresolved:            {}", summary.resolution_errors);
                if summary.unreadable_dirs > 0 {
                    println!("  unreadable dirs:       {}", summary.unreadable_dirs);
                }
                for (instance, count) in &summary.broken_by_instance {
                    println!("    {instance}: {count}");
                }
                for (category, count) in &summary.broken_by_category {
                    println!("    category {category}: {count}");
                }
            }
            Event::ConfirmationRequested { count, .. } => {
                println!("\n{count} broken symlink(s) selected for deletion.");
            }
            Event::ConfirmationResult { accepted } => {
                if !accepted {
                    println!("Declined; nothing deleted.");
                }
            }
            Event::ItemDeleted { path } => println!("  removed {}", path.display()),
            Event::ItemDeleteFailed { path, error } => eprintln!(
                "{} could not remove {}: {error}",
                "warning:".yellow().bold(),
                path.display()
            ),
            Event::RunCompleted { outcome } => render_outcome(outcome),
            Event::RunFailed { code, message, .. } => {
                eprintln!("{} [{code}] {message}", "error:".red().bold());
            }
        }
    }
}

fn instance_label(instance: &str, category: Option<&str>) -> String {
    match category {
        Some(category) => format!("{instance}/{category}"),
        None => instance.to_string(),
    }
}

fn render_outcome(outcome: &RunOutcome) {
    if outcome.exit_code == ExitStatus::Fatal.code() {
        println!("Run failed (exit {}).", outcome.exit_code);
        return;
    }
    if outcome.items_considered == 0 {
        println!("No broken symlinks.");
        return;
    }
    if outcome.mode.is_dry_run() {
        println!(
            "Dry run: {} broken symlink(s) left in place. Re-run with --execute to delete.",
            outcome.items_considered
        );
        return;
    }
    println!(
        "Deleted {} of {} broken symlink(s), {} skipped.",
        outcome.items_deleted, outcome.items_considered, outcome.items_skipped
    );
}

impl EventSink for ConsolePresenter {
    fn handle(&self, event: &Event) {
        if !self.is_visible(event) {
            return;
        }
        match self.output {
            OutputMode::Human => self.render_human(event),
            OutputMode::Json => {
                if let Err(err) = write_json_line(event) {
                    eprintln!("linksweep: {err}");
                }
                if let Event::RunFailed { message, .. } = event {
                    eprintln!("linksweep: {message}");
                }
            }
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

fn write_json_line<T: Serialize>(payload: &T) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("LINKSWEEP_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(
    json_flag: bool,
    env_mode: Option<&str>,
    stdout_is_tty: bool,
) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
