//! Analyze command: read, check, plan and report.

use anyhow::Result;
use clap::Args;
use idrange_engine::{plan, IdRange, IdentityKind, Plan};
use idrange_ldif::{idrange_add_command, ldapsearch_command, ChangeRecord, OUTOFRANGE_FILE};
use serde::Serialize;

use crate::error::CliError;
use crate::input::{self, Inputs};
use crate::output::{
    identity_rows, print_failure, print_header, print_info, print_json, print_success,
    print_table, print_warning, range_rows, OutputFormat, RangeRow,
};

use super::{CommandContext, InputArgs};

/// Analyze command.
#[derive(Debug, Args)]
pub struct AnalyzeCommand {
    #[command(flatten)]
    input: InputArgs,
}

impl AnalyzeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let analysis = analyze(&ctx, &self.input)?;
        match ctx.format {
            OutputFormat::Table => print_report(&analysis)?,
            OutputFormat::Json => print_json(&AnalysisReport::new(&analysis)?),
        }
        Ok(())
    }
}

/// Inputs together with the plan computed from them.
pub struct Analysis {
    pub inputs: Inputs,
    pub plan: Plan,
}

impl Analysis {
    /// Directory writes that carry out the plan: RID bases first, then new
    /// ranges.
    pub fn changes(&self) -> Result<Vec<ChangeRecord>, CliError> {
        let suffix = self.inputs.suffix.as_deref();
        let mut changes = Vec::new();

        for updated in &self.plan.rid_updates {
            let Some(before) = self.inputs.ranges.iter().find(|r| r.name == updated.name) else {
                continue;
            };
            changes.extend(ChangeRecord::rid_bases(
                before,
                updated,
                suffix.unwrap_or_default(),
            ));
        }

        if !self.plan.new_ranges.is_empty() {
            let suffix = suffix.ok_or(CliError::NoSuffix)?;
            changes.extend(
                self.plan
                    .new_ranges
                    .iter()
                    .map(|range| ChangeRecord::new_range(range, suffix)),
            );
        }
        Ok(changes)
    }
}

/// Reads the inputs and runs the allocation pass.
pub fn analyze(ctx: &CommandContext, args: &InputArgs) -> Result<Analysis> {
    let inputs = input::load(
        args.ranges.as_deref(),
        args.outofrange.as_deref(),
        args.suffix.as_deref(),
    )?;
    let orphans = inputs.identities.clone().unwrap_or_default();
    let plan = plan(inputs.ranges.clone(), orphans, &ctx.options).map_err(CliError::from)?;
    Ok(Analysis { inputs, plan })
}

/// The ldapsearch commands for users and groups outside local ranges.
pub fn search_commands(ranges: &[IdRange], suffix: Option<&str>) -> Result<Vec<String>, CliError> {
    let suffix = suffix.ok_or(CliError::NoSuffix)?;
    Ok([IdentityKind::User, IdentityKind::Group]
        .into_iter()
        .filter_map(|kind| ldapsearch_command(ranges, kind, suffix))
        .collect())
}

fn sorted(ranges: &[IdRange]) -> Vec<&IdRange> {
    let mut sorted: Vec<&IdRange> = ranges.iter().collect();
    sorted.sort_by_key(|range| range.first_id());
    sorted
}

/// Machine-readable analysis.
#[derive(Debug, Serialize)]
pub struct AnalysisReport<'a> {
    ranges: Vec<RangeRow>,
    plan: &'a Plan,
    ranges_after: Vec<RangeRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    searches: Vec<String>,
    changes: Vec<String>,
}

impl<'a> AnalysisReport<'a> {
    pub fn new(analysis: &'a Analysis) -> Result<Self, CliError> {
        let searches = if analysis.inputs.identities.is_none() {
            search_commands(&analysis.inputs.ranges, analysis.inputs.suffix.as_deref())?
        } else {
            Vec::new()
        };
        Ok(Self {
            ranges: range_rows(sorted(&analysis.inputs.ranges)),
            plan: &analysis.plan,
            ranges_after: range_rows(analysis.plan.registry.ranges()),
            searches,
            changes: analysis.changes()?.iter().map(ChangeRecord::to_ldif).collect(),
        })
    }
}

/// Human-readable analysis.
pub fn print_report(analysis: &Analysis) -> Result<(), CliError> {
    let plan = &analysis.plan;

    print_header("ID ranges");
    print_table(&range_rows(sorted(&analysis.inputs.ranges)));
    print_success("ID ranges do not overlap");

    print_header("RID bases");
    if plan.rid_updates.is_empty() && plan.rid_conflicts.is_empty() {
        print_info("All ID ranges have base RIDs set, RID adjustments are not needed.");
    }
    for updated in &plan.rid_updates {
        print_info(&format!(
            "{}: proposed base RID {}, secondary base RID {}",
            updated.name,
            display(updated.base_rid),
            display(updated.secondary_base_rid),
        ));
    }
    for report in &plan.rid_conflicts {
        print_failure(&format!("{}: {}", report.range, report.conflict));
    }

    print_header("IDs outside of ranges");
    match &analysis.inputs.identities {
        None => {
            print_info(&format!(
                "No out of range data given. Run these searches, then pass --outofrange {OUTOFRANGE_FILE}:"
            ));
            for command in search_commands(&analysis.inputs.ranges, analysis.inputs.suffix.as_deref())? {
                println!("{command}");
            }
        }
        Some(identities) if identities.is_empty() => {
            print_success("No IDs outside of ranges");
        }
        Some(_) => print_orphan_results(plan),
    }

    let changes = analysis.changes()?;
    if !changes.is_empty() {
        print_header("Proposed changes");
        for range in &plan.new_ranges {
            print_info(&idrange_add_command(range));
        }
        for change in &changes {
            println!("{}", change.ldapmodify_command());
        }

        print_header("ID ranges after changes");
        print_table(&range_rows(plan.registry.ranges()));
    } else if !plan.needs_attention() {
        print_success("Nothing to fix");
    }
    Ok(())
}

fn print_orphan_results(plan: &Plan) {
    if !plan.under_1000.is_empty() {
        print_warning(&format!(
            "{} IDs under 1000 are excluded from range proposals, use --allowunder1000 to include them:",
            plan.under_1000.len()
        ));
        print_table(&identity_rows(&plan.under_1000));
    }

    if !plan.outliers.is_empty() {
        print_warning(&format!(
            "{} IDs are too far from others to get a range, move them into an existing range manually \
             or tune --rangegap and --minrange:",
            plan.outliers.len()
        ));
        print_table(&identity_rows(&plan.outliers));
    }

    for failed in &plan.failed_proposals {
        print_failure(&format!(
            "no range for {} IDs from {} to {}: {}",
            failed.cluster.len(),
            failed.cluster.first().identifier(),
            failed.cluster.last().identifier(),
            failed.failure
        ));
    }

    for range in &plan.new_ranges {
        print_success(&format!(
            "proposed range {} for IDs {} to {}",
            range.name,
            range.first_id(),
            range.last_id()
        ));
    }
}

fn display(value: Option<u64>) -> String {
    value.map_or_else(|| "unset".to_string(), |v| v.to_string())
}
