//! Searches command.

use anyhow::Result;
use clap::Args;

use crate::input;
use crate::output::{print_info, print_json, OutputFormat};

use super::analyze::search_commands;
use super::{CommandContext, InputArgs};

/// Searches command.
#[derive(Debug, Args)]
pub struct SearchesCommand {
    #[command(flatten)]
    input: InputArgs,
}

impl SearchesCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let inputs = input::load(self.input.ranges.as_deref(), None, self.input.suffix.as_deref())?;
        let commands = search_commands(&inputs.ranges, inputs.suffix.as_deref())?;

        match ctx.format {
            OutputFormat::Table => {
                if commands.is_empty() {
                    print_info("No ipa-local ranges found, nothing to search around.");
                }
                for command in &commands {
                    println!("{command}");
                }
            }
            OutputFormat::Json => print_json(&commands),
        }
        Ok(())
    }
}
