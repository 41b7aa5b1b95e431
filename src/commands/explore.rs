use anyhow::Result;
use chrono::NaiveDate;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::commands::{CommandReport, open_session};
use crate::lens::filter::DateRange;
use crate::lens::render::render_text;
use crate::lens::session::{Session, ViewRequest};
use crate::oracle::ClassificationOracle;

const HELP: &str = "commands:
  range START END     filter to YYYY-MM-DD .. YYYY-MM-DD (inclusive)
  range all           reset to the export's full span
  topics N            number of proposed categories
  categories A | B    use your own category list
  categories          go back to the proposed categories
  reset               back to the full span and proposed categories
  show                render the current view
  json                print the current view as JSON
  quit                leave";

#[derive(Debug, Clone)]
pub struct ExploreOptions {
    pub file: PathBuf,
    pub no_classify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExploreCommand {
    Range(Option<DateRange>),
    Topics(usize),
    Categories(Option<String>),
    Reset,
    Show,
    Json,
    Help,
    Quit,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|err| format!("bad date `{raw}`: {err}"))
}

fn parse_command(line: &str) -> Result<Option<ExploreCommand>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "range" if rest.eq_ignore_ascii_case("all") => ExploreCommand::Range(None),
        "range" => {
            let parts = rest.split_whitespace().collect::<Vec<_>>();
            let [start, end] = parts.as_slice() else {
                return Err("usage: range START END".to_string());
            };
            ExploreCommand::Range(Some(DateRange::new(parse_date(start)?, parse_date(end)?)))
        }
        "topics" => ExploreCommand::Topics(
            rest.parse::<usize>()
                .map_err(|_| "usage: topics N".to_string())?,
        ),
        "categories" if rest.is_empty() => ExploreCommand::Categories(None),
        "categories" => ExploreCommand::Categories(Some(
            rest.split('|')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n"),
        )),
        "reset" => ExploreCommand::Reset,
        "show" => ExploreCommand::Show,
        "json" => ExploreCommand::Json,
        "help" | "?" => ExploreCommand::Help,
        "quit" | "exit" | "q" => ExploreCommand::Quit,
        other => return Err(format!("unknown command `{other}` (try `help`)")),
    };
    Ok(Some(command))
}

/// Drive a session from line commands. Every accepted command re-renders the view.
pub fn drive<O, R, W>(session: &mut Session<O>, input: R, mut output: W) -> Result<usize>
where
    O: ClassificationOracle,
    R: BufRead,
    W: Write,
{
    let tz = session.config().timezone()?;
    let mut request = ViewRequest::default();
    let mut handled = 0usize;

    for line in input.lines() {
        let line = line?;
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                writeln!(output, "{msg}")?;
                continue;
            }
        };
        handled += 1;

        let as_json = command == ExploreCommand::Json;
        let mut candidate = request.clone();
        match command {
            ExploreCommand::Quit => break,
            ExploreCommand::Help => {
                writeln!(output, "{HELP}")?;
                continue;
            }
            ExploreCommand::Range(range) => candidate.range = range,
            ExploreCommand::Topics(count) => candidate.topic_count = Some(count),
            ExploreCommand::Categories(text) => candidate.category_text = text,
            ExploreCommand::Reset => candidate = ViewRequest::default(),
            ExploreCommand::Show | ExploreCommand::Json => {}
        }

        let lens = match session.run(&candidate) {
            Ok(lens) => lens,
            Err(err) => {
                writeln!(output, "rejected: {err:#}")?;
                continue;
            }
        };
        request = candidate;
        if as_json {
            writeln!(output, "{}", serde_json::to_string_pretty(&lens)?)?;
        } else {
            write!(output, "{}", render_text(&lens, tz))?;
        }
        output.flush()?;
    }
    Ok(handled)
}

pub fn run(opts: &ExploreOptions) -> Result<CommandReport> {
    let mut session = open_session(&opts.file, !opts.no_classify)?;
    let mut report = CommandReport::new("explore");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let handled = drive(&mut session, stdin.lock(), stdout.lock())?;

    report.detail(format!("explore.commands={handled}"));
    if let Some(stats) = session.cache_stats() {
        report.detail(format!(
            "oracle.cache_hits={} oracle.calls={}",
            stats.hits, stats.misses
        ));
    }
    Ok(report)
}
