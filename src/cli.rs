use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::commands::explore::ExploreOptions;
use crate::commands::propose::ProposeOptions;
use crate::commands::report::ReportOptions;

#[derive(Debug, Parser)]
#[command(
    name = "worklog-lens",
    version,
    about = "Cumulative hours and topic breakdowns for time-tracking exports"
)]
pub struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render the cumulative and topic views for a date range.
    Report(ReportArgs),
    /// Print proposed categories, one per line.
    Propose(ProposeArgs),
    /// Read view commands from stdin and re-render after each one.
    Explore(ExploreArgs),
    /// Show resolved paths, config and credential state.
    Status,
}

#[derive(Debug, Args)]
struct RangeArgs {
    /// First day to include (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD).
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Debug, Args)]
struct ReportArgs {
    file: PathBuf,
    #[command(flatten)]
    range: RangeArgs,
    /// Number of categories to propose.
    #[arg(long)]
    topics: Option<usize>,
    /// Edited category list, one per line; replaces the proposal.
    #[arg(long)]
    categories_file: Option<PathBuf>,
    /// Skip topic classification entirely.
    #[arg(long)]
    no_classify: bool,
    /// Also write the view data as JSON to this path.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ProposeArgs {
    file: PathBuf,
    #[command(flatten)]
    range: RangeArgs,
    #[arg(long)]
    topics: Option<usize>,
}

#[derive(Debug, Args)]
struct ExploreArgs {
    file: PathBuf,
    #[arg(long)]
    no_classify: bool,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for line in &report.details {
        println!("{line}");
    }
    for issue in &report.issues {
        println!("issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Report(args) => commands::report::run(&ReportOptions {
            file: args.file,
            start: args.range.start,
            end: args.range.end,
            topics: args.topics,
            categories_file: args.categories_file,
            no_classify: args.no_classify,
            json: cli.json,
            out: args.out,
        })?,
        Command::Propose(args) => commands::propose::run(&ProposeOptions {
            file: args.file,
            start: args.range.start,
            end: args.range.end,
            topics: args.topics,
        })?,
        Command::Explore(args) => commands::explore::run(&ExploreOptions {
            file: args.file,
            no_classify: args.no_classify,
        })?,
        Command::Status => commands::status::run()?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
