use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgGroup, Parser};

use covgate::cli::{self, FormatArg, GateOptions, Style};
use covgate::diff::{DiffSource, FileDiff, GitDiff, StdinDiff};
use covgate::gate::Policy;

/// covgate: fail a build when the lines it changes are under-tested.
#[derive(Parser)]
#[command(name = "covgate", version, about)]
#[command(group(ArgGroup::new("report").required(true).multiple(true).args(["path", "summary_path"])))]
struct Cli {
    /// Coverage report: gcovr text table, gcovr JSON, LCOV or Cobertura XML.
    #[arg(long)]
    path: Option<PathBuf>,

    /// Line-level gcovr JSON report. Preferred by the aggregate policy.
    #[arg(long, alias = "summary_path")]
    summary_path: Option<PathBuf>,

    /// Minimum coverage percentage required to pass.
    #[arg(long, default_value_t = 80.0)]
    threshold: f64,

    /// How the threshold is applied.
    #[arg(long, value_enum, default_value_t = Policy::Aggregate)]
    policy: Policy,

    /// Override format detection.
    #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
    format: FormatArg,

    /// Read the unified diff from this file ("-" for stdin) instead of
    /// running git.
    #[arg(long)]
    diff_file: Option<PathBuf>,

    /// Base revision for `git diff`.
    #[arg(long, default_value = "HEAD^1")]
    base: String,

    /// Head revision for `git diff`.
    #[arg(long, default_value = "HEAD")]
    head: String,

    /// Only consider changes under this directory, relative to which the
    /// coverage paths are recorded.
    #[arg(long)]
    subtree: Option<String>,

    /// Prefix to prepend to diff paths for matching against coverage paths.
    #[arg(long)]
    path_prefix: Option<String>,

    /// Leading root to strip from coverage report paths.
    #[arg(long)]
    source_root: Option<String>,

    /// Output style.
    #[arg(long, value_enum, default_value_t = Style::Text)]
    style: Style,

    /// Commit SHA used to link uncovered lines in markdown output.
    #[arg(long)]
    sha: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let opts = GateOptions {
        path: cli.path,
        summary_path: cli.summary_path,
        threshold: cli.threshold,
        policy: cli.policy,
        format: cli.format,
        subtree: cli.subtree,
        path_prefix: cli.path_prefix,
        source_root: cli.source_root,
        style: cli.style,
        sha: cli.sha,
    };
    opts.validate()?;

    let source: Box<dyn DiffSource> = match cli.diff_file {
        Some(ref path) if path.as_os_str() == "-" => Box::new(StdinDiff),
        Some(path) => Box::new(FileDiff { path }),
        None => Box::new(GitDiff {
            base: cli.base,
            head: cli.head,
            pathspec: opts.subtree.clone(),
        }),
    };
    let diff_text = source.fetch_diff()?;

    let outcome = cli::cmd_gate(&diff_text, &opts)?;

    for skipped in &outcome.skipped {
        eprintln!(
            "Warning: skipping diff line {}: {}",
            skipped.line, skipped.reason
        );
    }
    print!("{}", outcome.output);

    Ok(outcome.passed)
}
