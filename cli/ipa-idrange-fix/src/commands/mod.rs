//! CLI commands.

mod analyze;
mod fix;
mod searches;

use std::path::PathBuf;

use anyhow::Result;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use idrange_engine::PlanOptions;

use crate::config::{Config, Overrides};
use crate::output::OutputFormat;

/// ipa-idrange-fix - analyze and repair FreeIPA ID ranges.
#[derive(Debug, Parser)]
#[command(name = "ipa-idrange-fix")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// More diagnostics on stderr (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to the platform config directory).
    #[arg(long, global = true, env = "IDRANGE_CONFIG")]
    config: Option<PathBuf>,

    /// Gap left after the highest RID in use when proposing RID bases.
    #[arg(long = "ridoffset", global = true, env = "IDRANGE_RID_OFFSET")]
    rid_offset: Option<u64>,

    /// Largest gap between IDs that still puts them in one range.
    #[arg(long = "rangegap", global = true, env = "IDRANGE_RANGE_GAP")]
    range_gap: Option<u64>,

    /// Smallest span of IDs that gets its own range.
    #[arg(long = "minrange", global = true, env = "IDRANGE_MIN_RANGE")]
    min_range_size: Option<u64>,

    /// Include IDs below 1000 in range proposals.
    #[arg(
        long = "allowunder1000",
        global = true,
        env = "IDRANGE_ALLOW_UNDER_1000",
        value_parser = FalseyValueParser::new()
    )]
    allow_under_1000: bool,

    /// Use exact ID bounds for new ranges instead of rounded ones.
    #[arg(
        long = "norounding",
        global = true,
        env = "IDRANGE_NO_ROUNDING",
        value_parser = FalseyValueParser::new()
    )]
    no_rounding: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show ranges, check them and print the proposed changes.
    Analyze(analyze::AnalyzeCommand),

    /// Print the ldapsearch commands that list out-of-range users and groups.
    Searches(searches::SearchesCommand),

    /// Analyze, then apply the proposed changes.
    Fix(fix::FixCommand),
}

/// Where to read the dumps from.
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Range dump (`ipa idrange-find --all --raw` or LDIF). Read from
    /// stdin when omitted.
    #[arg(long)]
    ranges: Option<PathBuf>,

    /// LDIF of out-of-range users and groups, as produced by `searches`.
    #[arg(long)]
    outofrange: Option<PathBuf>,

    /// Directory suffix, when the range dump carries no DNs.
    #[arg(long)]
    suffix: Option<String>,
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            rid_offset: self.rid_offset,
            range_gap: self.range_gap,
            min_range_size: self.min_range_size,
            allow_under_1000: self.allow_under_1000,
            no_rounding: self.no_rounding,
            ldap_uri: match &self.command {
                Commands::Fix(cmd) => cmd.ldap_uri().map(str::to_string),
                _ => None,
            },
        }
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?.merge(&self.overrides());

        let ctx = CommandContext {
            options: config.plan_options(),
            config,
            format: self.format,
        };

        match self.command {
            Commands::Analyze(cmd) => cmd.run(ctx).await,
            Commands::Searches(cmd) => cmd.run(ctx).await,
            Commands::Fix(cmd) => cmd.run(ctx).await,
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub options: PlanOptions,
    pub format: OutputFormat,
}
