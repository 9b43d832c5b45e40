//! Command-line interface for treeprint

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;

mod output;

pub use output::Output;

use crate::analysis::PdfAnalyzer;
use crate::config::TreeprintConfig;
use crate::pipeline::{CancelToken, JobSource, Pipeline, PipelineReport};
use crate::storage::Destination;

/// Exit status of a run abandoned by a second interrupt (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "treeprint",
    version = env!("CARGO_PKG_VERSION"),
    about = "Fingerprint the object trees of a batch of documents",
    long_about = "Analyzes every file under INPUT concurrently, hashes the structure of its \
                  object tree, extracts embedded scripts and binaries, and records one row \
                  per file in a text file, on stdout, or in a SQLite database."
)]
pub struct Cli {
    /// File, directory, or glob expression to analyze
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output: a file path, `stdout`/`console`/`-`, or `db`/`database`
    #[arg(short, long, value_name = "OUT")]
    pub out: Option<String>,

    /// Print debugging messages
    #[arg(short, long)]
    pub debug: bool,

    /// Print informational messages
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress progress bars and status output
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of analysis workers (default: cores minus reserved cores)
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Walk directories recursively
    #[arg(long)]
    pub recursive: bool,

    /// Only take directory entries whose name matches this glob
    #[arg(long, value_name = "GLOB")]
    pub pattern: Option<String>,

    /// Print fingerprint counts after the run
    #[arg(long)]
    pub summary: bool,

    /// Use custom configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        setup_logging(self.debug, self.verbose, self.quiet);
        let output = Output::new(self.verbose || self.debug, self.quiet);

        let mut config = TreeprintConfig::load_with_custom_config(self.config.as_deref())
            .context("Failed to load configuration")?;
        self.apply_overrides(&mut config);

        // Input problems are fatal before any worker starts
        let source = JobSource::new(&config.source)?;
        let candidates = source.discover(&self.input)?;

        let (destination, fallback_warning) =
            Destination::parse(self.out.as_deref(), &config.storage, Local::now());
        if let Some(warning) = fallback_warning {
            output.warning(&warning);
        }
        let target = destination.describe();
        let sink = destination.into_sink(&config.storage);

        let show_progress = !self.quiet && console::Term::stderr().is_term();
        let pipeline = Pipeline::new(PdfAnalyzer, &config.pipeline)
            .with_max_file_size_mb(config.source.max_file_size_mb)
            .with_progress(show_progress);

        output.info(&format!(
            "{} workers analyzing {} candidates from {}",
            pipeline.workers(),
            candidates.len(),
            self.input.display()
        ));

        let cancel = pipeline.cancel_token();
        let ctrl_c = tokio::spawn(async move {
            if watch_interrupts(cancel, tokio::signal::ctrl_c).await {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        });

        let outcome = tokio::task::spawn_blocking(move || pipeline.run(candidates, sink))
            .await
            .context("Pipeline task failed")?;
        ctrl_c.abort();

        let report = outcome.with_context(|| format!("Failed to store results in {target}"))?;
        print_report(&output, &report, &target);

        if self.summary {
            eprint!("{}", report.tally.render());
        }

        if report.cancelled {
            bail!(
                "Run cancelled after storing {} of {} jobs",
                report.stored,
                report.accepted
            );
        }
        Ok(())
    }

    /// Flags take precedence over every configuration layer
    fn apply_overrides(&self, config: &mut TreeprintConfig) {
        if let Some(workers) = self.workers {
            config.pipeline.max_workers = workers;
        }
        if self.recursive {
            config.source.recursive = true;
        }
        if let Some(pattern) = &self.pattern {
            config.source.pattern = pattern.clone();
        }
    }
}

/// Raise `cancel` on the first interrupt. Returns true once a second interrupt asks
/// to quit without draining.
async fn watch_interrupts<I, F>(cancel: CancelToken, mut interrupt: I) -> bool
where
    I: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    cancel.raise();
    tracing::warn!("Interrupted; storing queued results (Ctrl-C again to quit now)");

    interrupt().await.is_ok()
}

fn print_report(output: &Output, report: &PipelineReport, target: &str) {
    if report.accepted == 0 {
        output.warning("No valid input files; nothing to do");
    }

    output.section_header("Run summary");
    output.table_row("Candidates", &report.candidates.to_string());
    output.table_row("Accepted", &report.accepted.to_string());
    output.table_row("Rejected", &report.rejected.to_string());
    output.table_row("Analysis failures", &report.failed.to_string());
    output.table_row("Stored", &format!("{} -> {target}", report.stored));
    output.table_row("Workers", &report.workers.to_string());
    output.table_row("Elapsed", &format!("{:.2}s", report.elapsed.as_secs_f64()));
    output.verbose_step(
        "🔚",
        &format!(
            "Sentinels consumed: {} by workers, {} by stasher",
            report.worker_sentinels, report.stasher_sentinels
        ),
    );

    if !report.cancelled {
        output.success("Output complete");
    }
}

/// `-v` info, `-d` debug, both trace. `RUST_LOG` wins when set.
fn setup_logging(debug: bool, verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match (debug, verbose) {
            (false, false) => tracing_subscriber::EnvFilter::new("warn"),
            (false, true) => tracing_subscriber::EnvFilter::new("info,sqlx=warn,globset=warn"),
            (true, false) => tracing_subscriber::EnvFilter::new("debug,sqlx=warn,globset=warn"),
            (true, true) => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // try_init: a second initialisation (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_quit() {
        let cancel = CancelToken::new();
        assert!(watch_interrupts(cancel.clone(), || async { Ok(()) }).await);
        assert!(cancel.is_raised());
    }

    #[tokio::test]
    async fn test_single_interrupt_only_cancels() {
        let cancel = CancelToken::new();
        let mut signals = vec![Err(std::io::Error::other("handler removed")), Ok(())];
        let force_quit = watch_interrupts(cancel.clone(), || {
            let signal = signals.pop().unwrap();
            async move { signal }
        })
        .await;

        assert!(!force_quit);
        assert!(cancel.is_raised());
    }

    #[tokio::test]
    async fn test_no_handler_leaves_run_alone() {
        let cancel = CancelToken::new();
        let force_quit = watch_interrupts(cancel.clone(), || async {
            Err(std::io::Error::other("no signal support"))
        })
        .await;

        assert!(!force_quit);
        assert!(!cancel.is_raised());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "treeprint",
            "samples",
            "-w",
            "3",
            "--recursive",
            "--pattern",
            "*.pdf",
            "-o",
            "db",
        ]);
        let mut config = TreeprintConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.pipeline.max_workers, 3);
        assert!(config.source.recursive);
        assert_eq!(config.source.pattern, "*.pdf");
        assert_eq!(cli.out.as_deref(), Some("db"));
    }
}
