//! CLI binary for office2md.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use office2md::{
    ConversionConfig, ConversionProgressCallback, FileTask, ProcessingCoordinator, WatchService,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a progress bar for batches, per-file log
/// lines for everything. Per-file success lines are kept terse in batch
/// mode — the aggregate tally at the end is the report that matters.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::hidden();
        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_files} files…"))
        ));
    }

    fn on_file_start(&self, input: &Path) {
        self.bar.set_message(
            input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
    }

    fn on_file_complete(&self, input: &Path, output: &Path) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            input.file_name().unwrap_or_default().to_string_lossy(),
            dim(&format!("→ {}", output.display())),
        ));
        self.bar.inc(1);
    }

    fn on_file_skipped(&self, input: &Path, reason: &str) {
        self.bar.println(format!(
            "  {} {}  {}",
            dim("·"),
            input.file_name().unwrap_or_default().to_string_lossy(),
            dim(reason),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, input: &Path, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 120 {
            format!("{}\u{2026}", &error[..119])
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            input.file_name().unwrap_or_default().to_string_lossy(),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} files processed successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {} processed, {} failed",
                cyan("⚠"),
                bold(&succeeded.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one document (skips if kb/report.md is up to date)
  office2md convert docs/report.docx

  # Force re-conversion even when up to date
  office2md convert docs/report.docx --force

  # Convert a whole folder recursively
  office2md folder docs/

  # Watch a project and convert on change
  office2md watch .

  # Alongside-source output instead of a kb/ subdirectory
  office2md convert report.pdf --no-organize

  # Custom subdirectory and split threshold
  office2md folder docs/ --subdir knowledge --split-threshold 50000

OUTPUT LAYOUT:
  <dir>/kb/<name>.md                   converted document
  <dir>/kb/images/<name>/<image>       extracted images
  <dir>/kb/<name>_part<N>.md           parts, when split
  <dir>/kb/<name>_index.md             index of parts

CONVERTER DISCOVERY:
  1. --converter <CMD> (or OFFICE2MD_CONVERTER)
  2. embedded binary: <install>/bin/<os>/office2md-cli
  3. office2md-cli on PATH

  A *.py converter is run through python and receives the extract-images
  flag as an extra positional argument.
"#;

/// Convert office documents to Markdown, on demand or on change.
#[derive(Parser, Debug)]
#[command(
    name = "office2md",
    version,
    about = "Convert office documents (docx/xlsx/pptx/pdf) to Markdown",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output subdirectory name.
    #[arg(long, env = "OFFICE2MD_SUBDIR", default_value = "kb", global = true)]
    subdir: String,

    /// Write output alongside sources instead of into the subdirectory.
    #[arg(long, global = true)]
    no_organize: bool,

    /// Never overwrite an existing output file, even when stale.
    #[arg(long, global = true)]
    no_overwrite: bool,

    /// Also copy recognised text files (md, json, yaml, …) into the output tree.
    #[arg(long, global = true)]
    copy_text: bool,

    /// Disable external image extraction.
    #[arg(long, global = true)]
    no_images: bool,

    /// Minimum width/height in pixels for extracted images.
    #[arg(long, env = "OFFICE2MD_IMAGE_MIN_SIZE", default_value_t = 100, global = true)]
    image_min_size: u32,

    /// Disable splitting of oversized output.
    #[arg(long, global = true)]
    no_split: bool,

    /// Byte threshold above which output is split at header boundaries.
    #[arg(long, env = "OFFICE2MD_SPLIT_THRESHOLD", default_value_t = 100_000, global = true)]
    split_threshold: usize,

    /// Comma-separated convertible extensions (e.g. "docx,pdf,odt").
    #[arg(long, env = "OFFICE2MD_EXTENSIONS", global = true)]
    extensions: Option<String>,

    /// Converter command tried before the embedded binary.
    #[arg(long, env = "OFFICE2MD_CONVERTER", global = true)]
    converter: Option<PathBuf>,

    /// Image extractor script.
    #[arg(long, env = "OFFICE2MD_EXTRACTOR", global = true)]
    extractor: Option<PathBuf>,

    /// Subprocess timeout in seconds (default: 120 on Windows, 180 elsewhere).
    #[arg(long, env = "OFFICE2MD_TIMEOUT", global = true)]
    timeout: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a single document.
    Convert {
        /// Document to convert.
        file: PathBuf,
        /// Convert even when the output is up to date.
        #[arg(short, long)]
        force: bool,
    },
    /// Convert every processable file under a folder, recursively.
    Folder {
        /// Folder to scan.
        dir: PathBuf,
    },
    /// Watch a folder and convert documents as they change.
    Watch {
        /// Folder to watch.
        dir: PathBuf,
        /// Settle delay in milliseconds before processing an event.
        #[arg(long, default_value_t = 1000)]
        settle_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<Arc<dyn ConversionProgressCallback>> = if cli.quiet {
        None
    } else {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    };

    let config = build_config(&cli, progress)?;
    let coordinator = Arc::new(match install_root() {
        Some(root) => ProcessingCoordinator::with_install_root(root),
        None => ProcessingCoordinator::new(),
    });

    match cli.command {
        Commands::Convert { ref file, force } => {
            let mut task = FileTask::new(file);
            if force {
                task = task.forced();
            }
            let result = coordinator.process_file(&config, &task).await;
            if result.success {
                if !cli.quiet {
                    eprintln!(
                        "{} {}",
                        green("✔"),
                        bold(
                            &result
                                .output_path
                                .as_deref()
                                .unwrap_or(file.as_path())
                                .display()
                                .to_string()
                        ),
                    );
                }
                Ok(())
            } else {
                anyhow::bail!(
                    "failed to convert {}: {}",
                    file.display(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        Commands::Folder { ref dir } => {
            let summary = coordinator.convert_folder(&config, dir).await;
            if summary.results.is_empty() && !cli.quiet {
                eprintln!("No processable files found in {}", dir.display());
            }
            if summary.failed > 0 {
                anyhow::bail!("{} file(s) failed to convert", summary.failed);
            }
            Ok(())
        }

        Commands::Watch { ref dir, settle_ms } => {
            let service = WatchService::start_with_settle(
                dir,
                config,
                Arc::clone(&coordinator),
                Duration::from_millis(settle_ms),
            )
            .context("failed to start watch service")?
            .context("auto-convert is disabled")?;

            if !cli.quiet {
                eprintln!(
                    "{} watching {} — press Ctrl-C to stop",
                    cyan("◆"),
                    bold(&dir.display().to_string())
                );
            }
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            service.stop();
            Ok(())
        }
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<Arc<dyn ConversionProgressCallback>>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .subdirectory_name(cli.subdir.as_str())
        .organize_in_subdirectory(!cli.no_organize)
        .overwrite_existing(!cli.no_overwrite)
        .copy_text_files(cli.copy_text)
        .extract_images(!cli.no_images)
        .image_min_size(cli.image_min_size)
        .splitting_enabled(!cli.no_split)
        .splitting_threshold(cli.split_threshold);

    if let Some(ref exts) = cli.extensions {
        builder = builder.convertible_extensions(exts.split(',').map(str::trim));
    }
    if let Some(ref converter) = cli.converter {
        builder = builder.converter_command(converter);
    }
    if let Some(ref extractor) = cli.extractor {
        builder = builder.extractor_command(extractor);
    }
    if let Some(timeout) = cli.timeout {
        builder = builder.subprocess_timeout_secs(timeout);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Directory the binary was installed into, used to locate the embedded
/// converter under `bin/<os>/`.
fn install_root() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()?
        .parent()
        .map(Path::to_path_buf)
}
