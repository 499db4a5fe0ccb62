mod chain;
mod checksum;
mod cli;
mod dir_list;
mod generation;
mod generation_file;
mod hashing;
mod history;
mod ignore_spec;
mod output;
mod reducer;
mod seal;
mod session;

use cli::{Cli, Command, WalkArgs};
use generation::{HashAction, PathRecord, ROOT_PATH};
use history::HistoryForest;
use seal::seal_tree;
use std::fmt as stdfmt;
use std::io::{IsTerminal, stderr};
use std::path::Path;
use std::process::ExitCode;
use tracing::{Event, Level, Subscriber, error, info, warn};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

struct SealExitCode;

impl SealExitCode {
    /// Exit code used for fatal errors (I/O errors, invalid arguments,
    /// damaged history, refused commits).
    fn any_error() -> ExitCode {
        ExitCode::from(255)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Change working directory if -C was specified
    if let Some(directory) = cli.directory
        && let Err(e) = std::env::set_current_dir(&directory)
    {
        error!(
            "Failed to change directory to {}: {}",
            directory.display(),
            e
        );
        return SealExitCode::any_error();
    }

    let result: anyhow::Result<ExitCode> = match cli.command {
        Command::Seal { walk, dry_run } => handle_seal(&walk, dry_run),
        Command::Verify { walk } => handle_verify(&walk),
        Command::Show { path } => handle_show(&path),
    };

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err}");
            SealExitCode::any_error()
        }
    }
}

fn handle_seal(walk: &WalkArgs, dry_run: bool) -> anyhow::Result<ExitCode> {
    let result = seal_tree(Path::new("."), &walk.to_options(dry_run))?;

    if walk.all {
        output::print_outcomes(&result.report);
    }
    output::print_failures(&result.report);

    if result.committed {
        for generation in &result.generations {
            info!(
                "Sealed generation {} of scope {}",
                generation.number, generation.scope
            );
        }
    } else {
        info!("DRY RUN - no files were modified");
    }

    Ok(match result.report.worst_category() {
        None => ExitCode::SUCCESS,
        Some(category) => {
            warn!(
                "Sealed with {} failure(s): {}",
                result.report.failures.len(),
                output::failure_summary(&result.report)
            );
            ExitCode::from(category.exit_code())
        }
    })
}

fn handle_verify(walk: &WalkArgs) -> anyhow::Result<ExitCode> {
    let result = seal_tree(Path::new("."), &walk.to_options(true))?;

    if walk.all {
        output::print_outcomes(&result.report);
    }

    if result.report.is_clean() {
        info!(
            "Verification successful: {} hash(es) checked ({} verified), no failures",
            result.report.outcomes.len(),
            result.report.count(HashAction::Verified)
        );
        return Ok(ExitCode::SUCCESS);
    }

    output::print_failures(&result.report);

    error!(
        "Verification failed: {} failure(s) detected ({})",
        result.report.failures.len(),
        output::failure_summary(&result.report)
    );
    let code = result
        .report
        .worst_category()
        .map_or(1, |category| category.exit_code());
    Ok(ExitCode::from(code))
}

fn handle_show(path: &str) -> anyhow::Result<ExitCode> {
    let root = Path::new(".").canonicalize()?;
    let forest = HistoryForest::load(&root)?;
    let path = normalize_path(path);

    // A nested scope root is shown from its own history.
    let (id, relative) = match forest.scope_at(&path) {
        Some(id) => (id, ROOT_PATH.to_string()),
        None => forest.resolve_owner(&path),
    };
    let history = forest.history(id);
    let records: Vec<(u32, &PathRecord)> = history.records_for(&relative).collect();
    if records.is_empty() {
        anyhow::bail!("No generation records {}", path);
    }

    output::print_path_history(&path, &records);
    output::print_latest_directory_hashes(&history.directory_hash_entries_for(&relative));
    Ok(ExitCode::SUCCESS)
}

/// Turns a user-supplied relative path into the posix form used in
/// generations.
fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    if parts.is_empty() {
        ROOT_PATH.to_string()
    } else {
        parts.join("/")
    }
}

fn init_tracing(verbose: u8) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}


impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                _ => {}
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
