mod help_text;

use crate::hashing::HashFormat;
use crate::seal::{NestedScopePolicy, SealOptions};
use crate::session::BenchmarkPolicy;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Seal trees of files into a multi-generation integrity ledger
#[derive(Parser, Debug)]
#[command(name = "treeseal", version, about, long_about = help_text::ROOT_LONG_ABOUT)]
pub struct Cli {
    /// Change to DIRECTORY before doing anything
    #[arg(short = 'C', value_name = "DIRECTORY", global = true)]
    pub directory: Option<PathBuf>,

    /// Increase logging verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Hash the tree and append a new generation
    #[command(long_about = help_text::SEAL_LONG_ABOUT)]
    Seal {
        #[command(flatten)]
        walk: WalkArgs,

        /// Preview outcomes without writing a generation
        #[arg(long)]
        dry_run: bool,
    },

    /// Hash the tree and report, without writing anything
    #[command(long_about = help_text::VERIFY_LONG_ABOUT)]
    Verify {
        #[command(flatten)]
        walk: WalkArgs,
    },

    /// Print the recorded history of one path
    #[command(long_about = help_text::SHOW_LONG_ABOUT)]
    Show {
        /// Path to show, relative to the current directory
        #[arg(value_name = "PATH")]
        path: String,
    },
}

#[derive(Args, Debug)]
pub struct WalkArgs {
    /// Hash format to compute (sha256, blake3, xxh3, cid); repeatable
    #[arg(long = "format", value_name = "NAME", default_value = "sha256")]
    pub formats: Vec<HashFormat>,

    /// Record directories without content and structure hashes
    #[arg(long)]
    pub no_directory_hashes: bool,

    /// Previously recorded format to re-hash when no requested format was recorded
    #[arg(long, value_enum, default_value_t = BenchmarkArg::Priority)]
    pub benchmark: BenchmarkArg,

    /// Walk nested scopes and seal them too, instead of reusing their last root hash
    #[arg(long)]
    pub reseal_nested: bool,

    /// Ignore pattern in gitignore syntax; repeatable
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// File with one ignore pattern per line
    #[arg(long, value_name = "FILE")]
    pub ignore_file: Option<PathBuf>,

    /// Number of hashing threads (default: available parallelism)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Print every outcome, not only failures
    #[arg(short, long)]
    pub all: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BenchmarkArg {
    Priority,
    Original,
}

impl WalkArgs {
    pub fn to_options(&self, dry_run: bool) -> SealOptions {
        let mut formats = self.formats.clone();
        formats.sort();
        formats.dedup();

        SealOptions {
            formats,
            directory_hashes: !self.no_directory_hashes,
            benchmark: match self.benchmark {
                BenchmarkArg::Priority => BenchmarkPolicy::Priority,
                BenchmarkArg::Original => BenchmarkPolicy::Original,
            },
            nested: if self.reseal_nested {
                NestedScopePolicy::Reseal
            } else {
                NestedScopePolicy::Reuse
            },
            ignore_patterns: self.ignore_patterns.clone(),
            ignore_file: self.ignore_file.clone(),
            jobs: self.jobs.unwrap_or_else(|| {
                std::thread::available_parallelism().map_or(1, |n| n.get())
            }),
            dry_run,
        }
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
