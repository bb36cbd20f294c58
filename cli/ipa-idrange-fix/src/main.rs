//! ipa-idrange-fix - analyze and repair FreeIPA ID ranges
//!
//! Reads range and out-of-range identity dumps, fills in missing RID bases,
//! proposes ranges for orphaned IDs and writes the result back as LDIF or
//! through `ldapmodify`.

use anyhow::Result;
use clap::Parser;

mod commands;
mod config;
mod error;
mod input;
mod logging;
mod output;
mod sink;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbosity());

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
