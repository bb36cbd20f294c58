//! Error handling and display for the CLI.

use std::path::PathBuf;

use colored::Colorize;
use idrange_engine::EngineError;
use idrange_ldif::FormatError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("No range data: pass --ranges FILE or pipe `ipa idrange-find --all --raw` into the tool")]
    NoRangeInput,

    #[error("Malformed input in {source_name}: {source}")]
    Format {
        source_name: String,
        #[source]
        source: FormatError,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Could not determine the directory suffix")]
    NoSuffix,

    #[error("Cannot ask for confirmation while reading ranges from stdin")]
    ConfirmationUnavailable,

    #[error("{failed} of {total} changes failed")]
    ApplyFailed { failed: usize, total: usize },

    #[error("Failed to open {path:?} for writing: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn format(source_name: impl Into<String>, source: FormatError) -> Self {
        Self::Format {
            source_name: source_name.into(),
            source,
        }
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    // Check for specific error types and provide hints
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::NoRangeInput => {
                eprintln!(
                    "\n{}",
                    "Hint: ipa idrange-find --all --raw > ranges.txt".yellow()
                );
            }
            CliError::Engine(EngineError::RangesOverlap { .. }) => {
                eprintln!(
                    "\n{}",
                    "Hint: Fix the overlapping ranges manually, then run the tool again.".yellow()
                );
            }
            CliError::NoSuffix => {
                eprintln!(
                    "\n{}",
                    "Hint: Pass --suffix dc=example,dc=com or use a dump that includes DNs."
                        .yellow()
                );
            }
            CliError::ConfirmationUnavailable => {
                eprintln!(
                    "\n{}",
                    "Hint: Use --ranges FILE, or --unattended to skip the prompt.".yellow()
                );
            }
            CliError::ApplyFailed { .. } => {
                eprintln!(
                    "\n{}",
                    "Hint: Changes are not retried. Review the failures above and rerun analyze."
                        .yellow()
                );
            }
            _ => {}
        }
    }
}
