//! Fix command: analyze, confirm, then write the changes back.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

use crate::error::CliError;
use crate::input::RangeSource;
use crate::output::{print_failure, print_header, print_info, print_json, print_success, OutputFormat};
use crate::sink::{apply_all, ApplyReport, LdapModifySink, LdifFileSink, WriteBackSink};

use super::analyze::{analyze, print_report, AnalysisReport};
use super::{CommandContext, InputArgs};

/// Fix command.
#[derive(Debug, Args)]
pub struct FixCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Write the changes to an LDIF file instead of running ldapmodify.
    #[arg(long, value_name = "FILE")]
    ldif: Option<PathBuf>,

    /// LDAP server for ldapmodify (defaults to ldap.conf).
    #[arg(long, value_name = "URI", env = "IDRANGE_LDAP_URI")]
    ldap_uri: Option<String>,

    /// Apply without asking for confirmation.
    #[arg(long)]
    unattended: bool,
}

#[derive(Serialize)]
struct FixReport<'a> {
    analysis: AnalysisReport<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    apply: Option<ApplyReport>,
}

impl FixCommand {
    pub fn ldap_uri(&self) -> Option<&str> {
        self.ldap_uri.as_deref()
    }

    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let analysis = analyze(&ctx, &self.input)?;
        if ctx.format == OutputFormat::Table {
            print_report(&analysis)?;
        }

        let changes = analysis.changes()?;
        if changes.is_empty() {
            match ctx.format {
                OutputFormat::Table => print_success("No changes to apply"),
                OutputFormat::Json => print_json(&FixReport {
                    analysis: AnalysisReport::new(&analysis)?,
                    apply: None,
                }),
            }
            return Ok(());
        }

        if !self.unattended {
            if analysis.inputs.range_source == RangeSource::Stdin {
                return Err(CliError::ConfirmationUnavailable.into());
            }
            if !confirm(BufReader::new(tokio::io::stdin()), changes.len()).await? {
                print_info("Not proceeding.");
                return Ok(());
            }
        }

        let (sink, ldif_path) = match &self.ldif {
            Some(path) => {
                let sink = LdifFileSink::create(path)
                    .await
                    .map_err(|source| CliError::Output {
                        path: path.clone(),
                        source,
                    })?;
                let ldif_path = sink.path().to_path_buf();
                (Box::new(sink) as Box<dyn WriteBackSink>, Some(ldif_path))
            }
            None => (
                Box::new(LdapModifySink::new(ctx.config.ldap_uri.clone())) as Box<dyn WriteBackSink>,
                None,
            ),
        };
        info!(sink = %sink.describe(), changes = changes.len(), "applying changes");

        let report = apply_all(sink.as_ref(), &changes).await;

        match ctx.format {
            OutputFormat::Table => {
                print_header(&format!("Applying changes via {}", sink.describe()));
                for item in &report.items {
                    match &item.error {
                        None => print_success(&item.change),
                        Some(error) => print_failure(&format!("{}: {error}", item.change)),
                    }
                }
                if let Some(path) = &ldif_path {
                    if report.all_succeeded() {
                        print_info(&format!(
                            "Apply the file with: ldapmodify -Q -Y EXTERNAL -f {}",
                            path.display()
                        ));
                    }
                }
            }
            OutputFormat::Json => print_json(&FixReport {
                analysis: AnalysisReport::new(&analysis)?,
                apply: Some(report.clone()),
            }),
        }

        if !report.all_succeeded() {
            return Err(CliError::ApplyFailed {
                failed: report.failed(),
                total: report.total(),
            }
            .into());
        }
        Ok(())
    }
}

/// Asks on stderr and reads the answer from `input`. Only `yes` proceeds.
async fn confirm<R: AsyncBufRead + Unpin>(mut input: R, count: usize) -> Result<bool> {
    eprint!("Apply {count} changes? Type 'yes' to continue: ");
    std::io::stderr().flush().context("Failed to write prompt")?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .await
        .context("Failed to read confirmation")?;

    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_yes_confirms() {
        assert!(confirm(&b"yes\n"[..], 2).await.unwrap());
        assert!(confirm(&b"  YES \n"[..], 2).await.unwrap());
        assert!(!confirm(&b"no\n"[..], 2).await.unwrap());
        assert!(!confirm(&b"y\n"[..], 2).await.unwrap());
        assert!(!confirm(&b""[..], 2).await.unwrap());
    }
}
