//! CLI binary for xopp2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use xopp2pdf::{
    convert_batch, BatchOutput, BatchProgressCallback, ConversionConfig, ProgressCallback,
    RepairOutcome,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback ────────────────────────────────────────────────────

struct InFlight {
    name: String,
    started: Instant,
    summary: Option<String>,
}

/// Prints one `[i/N]` line per document, above an optional indicatif bar.
struct CliProgressCallback {
    /// Bottom-anchored bar; `None` with `--no-progress` or `--json`.
    bar: Option<ProgressBar>,
    /// Report relink decisions instead of conversions.
    dry_run: bool,
    /// Per-document name, start time and latest relink summary.
    in_flight: Mutex<HashMap<usize, InFlight>>,
}

impl CliProgressCallback {
    fn new(show_bar: bool, dry_run: bool) -> Arc<Self> {
        let bar = show_bar.then(|| {
            let bar = ProgressBar::new(0);
            let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_style(spinner_style);
            bar.set_prefix("Scanning");
            bar.set_message("Looking for documents…");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });

        Arc::new(Self {
            bar,
            dry_run,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    fn println(&self, line: String) {
        match self.bar {
            Some(ref bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }

    fn inc(&self) {
        if let Some(ref bar) = self.bar {
            bar.inc(1);
        }
    }

    /// Name, formatted elapsed time and relink summary recorded for `index`.
    fn finish(&self, index: usize) -> (String, String, Option<String>) {
        let (name, elapsed, summary) = self
            .in_flight
            .lock()
            .unwrap()
            .remove(&index)
            .map(|f| (f.name, f.started.elapsed().as_millis(), f.summary))
            .unwrap_or_default();
        (
            name,
            dim(&format!("{:.1}s", elapsed as f64 / 1000.0)),
            summary,
        )
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        if let Some(ref bar) = self.bar {
            let style = ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} documents  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_length(total as u64);
            bar.set_style(style);
            bar.set_prefix(if self.dry_run { "Checking" } else { "Converting" });
            bar.reset_eta();
        }
        self.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total} valid files…"))
        ));
    }

    fn on_document_start(&self, index: usize, _total: usize, document: &Path) {
        let name = display_name(document);
        if let Some(ref bar) = self.bar {
            bar.set_message(name.clone());
        }
        self.in_flight.lock().unwrap().insert(
            index,
            InFlight {
                name,
                started: Instant::now(),
                summary: None,
            },
        );
    }

    fn on_document_repaired(&self, index: usize, total: usize, outcome: &RepairOutcome) {
        if self.dry_run {
            let (name, elapsed, _) = self.finish(index);
            let mark = if matches!(outcome, RepairOutcome::WouldRewrite { .. }) {
                cyan("↻")
            } else {
                dim("·")
            };
            self.println(format!(
                "  {mark} [{index}/{total}] {}  {}  {elapsed}",
                bold(&format!("\"{name}\"")),
                outcome.describe()
            ));
            self.inc();
            return;
        }
        if let Some(entry) = self.in_flight.lock().unwrap().get_mut(&index) {
            entry.summary = Some(outcome.describe());
        }
    }

    fn on_document_complete(&self, index: usize, total: usize, output: &Path) {
        let (name, elapsed, summary) = self.finish(index);
        let summary = summary.map(|s| format!("  {}", dim(&s))).unwrap_or_default();
        self.println(format!(
            "  {} [{index}/{total}] {}  → {}{summary}  {elapsed}",
            green("✓"),
            bold(&format!("\"{name}\"")),
            output.display(),
        ));
        self.inc();
    }

    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let (name, elapsed, _) = self.finish(index);

        // First line only; renderer stderr can be long.
        let first = error.lines().next().unwrap_or(error);
        let msg = if first.chars().count() > 100 {
            let cut: String = first.chars().take(99).collect();
            format!("{cut}\u{2026}")
        } else {
            first.to_string()
        };

        self.println(format!(
            "  {} [{index}/{total}] {}  {}  {elapsed}",
            red("✗"),
            bold(&format!("\"{name}\"")),
            red(&msg),
        ));
        self.inc();
    }

    fn on_batch_complete(&self, _total: usize, _success_count: usize) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Relink and export every notebook under the current directory into ./output
  xopp2pdf

  # A specific tree, exported elsewhere
  xopp2pdf ~/uni/term2 -o ~/exports/term2

  # See which references would be relinked, change nothing
  xopp2pdf --dry-run

  # Export only, leave references alone
  xopp2pdf --skip-repair

  # Fail the shell pipeline if any notebook failed
  xopp2pdf --strict

  # Machine-readable report
  xopp2pdf --json > report.json

  # A different renderer command line
  xopp2pdf --renderer /opt/xournalpp/bin/xournalpp \
           --renderer-arg=--create-pdf={output} --renderer-arg={input}

HOW RELINKING WORKS:
  Each notebook's PDF background is stored as an absolute path. When that
  path is stale, every file with the same name under the root is a
  candidate; the one whose parent folders match the old path's parent
  folders for the longest run (innermost first) wins, first found on ties.
  Notebooks whose background name exists nowhere are left untouched.

ENVIRONMENT VARIABLES:
  XOPP2PDF_ROOT, XOPP2PDF_OUTPUT_DIR, XOPP2PDF_RENDERER, XOPP2PDF_TIMEOUT, …
                   every flag has an XOPP2PDF_* counterpart (see --help)
  RUST_LOG         Override the log filter (e.g. RUST_LOG=xopp2pdf=debug)
"#;

/// Relink Xournal++ notebooks to their moved PDF backgrounds and export them to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "xopp2pdf",
    version,
    about = "Relink Xournal++ notebooks to moved PDF backgrounds and export them to PDF",
    long_about = "Walks a directory tree for Xournal++ notebooks (.xopp), repoints each \
notebook's PDF background at the best-matching file that still exists under the tree, then \
exports every notebook to PDF with xournalpp, mirroring the folder layout under an output \
directory.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory to search for notebooks and candidate files.
    #[arg(env = "XOPP2PDF_ROOT", default_value = ".")]
    root: PathBuf,

    /// Directory the exported PDFs are written to.
    #[arg(short, long, env = "XOPP2PDF_OUTPUT_DIR", default_value = "./output")]
    output_dir: PathBuf,

    /// Renderer executable.
    #[arg(long, env = "XOPP2PDF_RENDERER", default_value = "xournalpp")]
    renderer: String,

    /// Renderer argument; repeat for each. `{output}` and `{input}` are substituted.
    #[arg(
        long = "renderer-arg",
        value_name = "ARG",
        env = "XOPP2PDF_RENDERER_ARGS",
        value_delimiter = ' ',
        allow_hyphen_values = true,
        long_help = "Renderer argument template, one value per flag. Default: -p {output} {input}.\n\
          From the environment, arguments are separated by spaces."
    )]
    renderer_args: Vec<String>,

    /// Kill the renderer after this many seconds per notebook.
    #[arg(long, env = "XOPP2PDF_TIMEOUT", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Extension of the notebooks to process.
    #[arg(long, env = "XOPP2PDF_EXTENSION", default_value = "xopp")]
    extension: String,

    /// Notebooks whose name ends with this are skipped.
    #[arg(long, env = "XOPP2PDF_AUTOSAVE_SUFFIX", default_value = ".autosave.xopp")]
    autosave_suffix: String,

    /// Extension of the embedded reference to relink.
    #[arg(long, env = "XOPP2PDF_REFERENCE_EXTENSION", default_value = "pdf")]
    reference_extension: String,

    /// Extension appended to the notebook name for the export.
    #[arg(long, env = "XOPP2PDF_OUTPUT_EXTENSION", default_value = "pdf")]
    output_extension: String,

    /// Report what would be relinked; write nothing, export nothing.
    #[arg(short = 'n', long, env = "XOPP2PDF_DRY_RUN")]
    dry_run: bool,

    /// Export notebooks as they are, without relinking.
    #[arg(long, env = "XOPP2PDF_SKIP_REPAIR", conflicts_with = "dry_run")]
    skip_repair: bool,

    /// Exit with status 1 when any notebook failed.
    #[arg(long, env = "XOPP2PDF_STRICT")]
    strict: bool,

    /// Print the full batch report as JSON on stdout.
    #[arg(long, env = "XOPP2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "XOPP2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "XOPP2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "XOPP2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar and status lines carry the per-document feedback, so
    // INFO logs stay off while the bar is up.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if cli.quiet {
        None
    } else {
        let cb = CliProgressCallback::new(show_progress, cli.dry_run);
        Some(cb as Arc<dyn BatchProgressCallback>)
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = convert_batch(&config)
        .await
        .with_context(|| format!("Cannot process '{}'", cli.root.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
        println!("{json}");
    }

    if !cli.quiet {
        print_summary(&output, cli.dry_run);
    }

    if cli.strict {
        output.into_result().context("Strict mode")?;
    }

    Ok(())
}

fn print_summary(output: &BatchOutput, dry_run: bool) {
    let stats = &output.stats;

    if dry_run {
        let would = output
            .documents
            .iter()
            .filter(|d| matches!(d.repair, Some(RepairOutcome::WouldRewrite { .. })))
            .count();
        eprintln!(
            "{} {} of {} notebooks would be relinked  {}",
            cyan("◆"),
            bold(&would.to_string()),
            stats.total_documents,
            dim(&format!("({} files indexed)", stats.indexed_files)),
        );
    } else if stats.failed == 0 {
        eprintln!(
            "{} {} notebooks exported, {} relinked  {}",
            green("✔"),
            bold(&stats.converted.to_string()),
            stats.relinked,
            dim(&format!("{}ms", stats.total_duration_ms)),
        );
    } else {
        eprintln!(
            "{} {}/{} notebooks exported  ({} failed)",
            if stats.failed == stats.total_documents {
                red("✘")
            } else {
                cyan("⚠")
            },
            bold(&stats.converted.to_string()),
            stats.total_documents,
            red(&stats.failed.to_string()),
        );
    }

    for failure in output.failures() {
        if let Some(ref e) = failure.error {
            eprintln!("   {} {}", red("✗"), failure.document.display());
            for line in e.to_string().lines().filter(|l| !l.trim().is_empty()) {
                eprintln!("     {}", dim(line));
            }
        }
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .root(&cli.root)
        .output_dir(&cli.output_dir)
        .renderer(&cli.renderer)
        .renderer_timeout_secs(cli.timeout)
        .document_extension(&cli.extension)
        .autosave_suffix(&cli.autosave_suffix)
        .reference_extension(&cli.reference_extension)
        .output_extension(&cli.output_extension)
        .dry_run(cli.dry_run)
        .skip_repair(cli.skip_repair);

    let args: Vec<&String> = cli.renderer_args.iter().filter(|a| !a.is_empty()).collect();
    if !args.is_empty() {
        builder = builder.renderer_args(args.into_iter().cloned());
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
