use clap::{Parser, Subcommand};

use self::{retention::RetentionArg, unique_hits::UniqueHitsArg};

mod retention;
mod unique_hits;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Compute the retention matrix of a bucketed search response
    Retention(#[clap(flatten)] RetentionArg),
    /// Report distinct actor counts per query
    UniqueHits(#[clap(flatten)] UniqueHitsArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Retention(arg) => retention::run(&arg)?,
        Mode::UniqueHits(arg) => unique_hits::run(&arg)?,
    }
    Ok(())
}
