//! Orchestration: gate, check, convert, post-process, write, report.
//!
//! ## State machine per task
//!
//! ```text
//! Received ──▶ Gated ──▶ Skipped (internal path / ignored extension)
//!                │
//!                ├──▶ StalenessChecked ──▶ SkippedUpToDate
//!                │
//!                └──▶ Invoking ──▶ PostProcessing ──▶ Written ──▶ Success
//!                        │
//!                        └────────────────────────────────────▶ Failure
//! ```
//!
//! Every failure local to one file is folded into that file's
//! [`ConversionResult`]; nothing escapes `process_file` as an `Err`. Batches
//! process strictly sequentially — one subprocess at a time bounds peak
//! memory, and sequential filesystem writes need no locking.

use crate::config::ConversionConfig;
use crate::error::Office2MdError;
use crate::invoker::{CommandConverter, DocumentConverter};
use crate::paths::{self, FileClass};
use crate::pipeline::images::{self, CommandExtractor, ImageExtractor};
use crate::pipeline::split::{self, SplitOutcome};
use crate::project;
use crate::staleness;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One unit of work: a file plus how it should be treated.
///
/// Created per file-event or per command invocation, consumed once. Batch
/// mode is an explicit field so it travels with the task rather than living
/// in shared mutable state.
#[derive(Debug, Clone)]
pub struct FileTask {
    /// Absolute path of the source file.
    pub input_path: PathBuf,
    /// Bypass the staleness check.
    pub force_convert: bool,
    /// Part of a folder batch; consumers use this to suppress per-file
    /// notifications.
    pub batch_mode: bool,
}

impl FileTask {
    /// A plain watch-event or single-command task.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            force_convert: false,
            batch_mode: false,
        }
    }

    /// Same task with the staleness check bypassed.
    pub fn forced(mut self) -> Self {
        self.force_convert = true;
        self
    }

    /// Same task flagged as part of a batch.
    pub fn in_batch(mut self) -> Self {
        self.batch_mode = true;
        self
    }
}

/// Outcome of one task. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl ConversionResult {
    fn ok(output_path: PathBuf) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            error: None,
        }
    }

    /// A skip is a success: the pipeline did the right thing by not acting.
    fn skipped(path: PathBuf) -> Self {
        Self::ok(path)
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate outcome of a folder conversion.
#[derive(Debug)]
pub struct BatchSummary {
    pub results: Vec<ConversionResult>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Drives the per-file pipeline and folder batches.
///
/// Holds only the install root used for converter/extractor discovery; all
/// behavioural knobs arrive as an immutable [`ConversionConfig`] snapshot
/// with each call.
pub struct ProcessingCoordinator {
    install_root: Option<PathBuf>,
}

impl Default for ProcessingCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingCoordinator {
    pub fn new() -> Self {
        Self { install_root: None }
    }

    /// Use `root` as the base for locating the embedded converter binary
    /// and extractor script (`<root>/bin/<os>/…`).
    pub fn with_install_root(root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: Some(root.into()),
        }
    }

    fn resolve_converter(&self, config: &ConversionConfig) -> Arc<dyn DocumentConverter> {
        match config.converter {
            Some(ref converter) => Arc::clone(converter),
            None => Arc::new(CommandConverter::discover(
                config,
                self.install_root.as_deref(),
            )),
        }
    }

    fn resolve_extractor(&self, config: &ConversionConfig) -> Option<Arc<dyn ImageExtractor>> {
        match config.extractor {
            Some(ref extractor) => Some(Arc::clone(extractor)),
            None => CommandExtractor::discover(config, self.install_root.as_deref())
                .map(|e| Arc::new(e) as Arc<dyn ImageExtractor>),
        }
    }

    /// Process a file: convert, copy, or skip, based on classification.
    ///
    /// The internal-path gate runs first — before any read, stat, or
    /// classification — so generated output can never become input.
    pub async fn process_file(
        &self,
        config: &ConversionConfig,
        task: &FileTask,
    ) -> ConversionResult {
        let input = &task.input_path;

        if paths::is_internal_path(input, &config.subdirectory_name) {
            debug!(path = %input.display(), "loop prevention: ignoring file in output directory");
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_skipped(input, "inside output directory");
            }
            return ConversionResult::skipped(input.clone());
        }

        match paths::classify(input, config) {
            FileClass::Convert => self.convert_file(config, task).await,
            FileClass::Copy => self.copy_file(config, task).await,
            FileClass::Ignore => {
                debug!(path = %input.display(), "skipping: extension not processed");
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_skipped(input, "extension not processed");
                }
                ConversionResult::skipped(input.clone())
            }
        }
    }

    /// Convert a single file to Markdown.
    ///
    /// Honors `force_convert`; otherwise skips when the output is up to
    /// date. Never returns an `Err` — failures become a failed
    /// [`ConversionResult`].
    pub async fn convert_file(
        &self,
        config: &ConversionConfig,
        task: &FileTask,
    ) -> ConversionResult {
        let input = &task.input_path;
        match self.convert_file_inner(config, task).await {
            Ok(result) => result,
            Err(e) => {
                warn!(path = %input.display(), error = %e, "conversion failed");
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_error(input, &e.to_string());
                }
                ConversionResult::failed(e.to_string())
            }
        }
    }

    async fn convert_file_inner(
        &self,
        config: &ConversionConfig,
        task: &FileTask,
    ) -> Result<ConversionResult, Office2MdError> {
        let input = &task.input_path;
        let start = Instant::now();

        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(Office2MdError::NotFound {
                path: input.clone(),
            });
        }

        let output_path = paths::output_path_for(input, config);

        if !staleness::needs_regeneration(
            input,
            &output_path,
            config.overwrite_existing,
            task.force_convert,
        )
        .await?
        {
            debug!(path = %input.display(), "skipping conversion: output is up to date");
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_skipped(input, "output is up to date");
            }
            return Ok(ConversionResult::skipped(output_path));
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(input);
        }

        // ── Invoke the converter ─────────────────────────────────────────
        let converter = self.resolve_converter(config);
        let markdown = converter.convert(input).await?;

        // ── Post-process: images, then splitting ─────────────────────────
        let extractor = self.resolve_extractor(config);
        let markdown = images::process(input, &markdown, config, extractor.as_deref()).await;

        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base_name = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        // The written path reported back: the output file itself, or the
        // index when the document was split.
        let mut written_path = output_path.clone();

        if config.splitting_enabled && markdown.len() > config.splitting_threshold {
            match split::split_if_needed(
                &markdown,
                config.splitting_threshold,
                &file_name,
                &base_name,
            ) {
                SplitOutcome::Single(content) => {
                    write_atomic(&output_path, &content).await?;
                }
                SplitOutcome::Split { parts, index } => {
                    let dir = output_path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from("."));
                    let total = parts.len();
                    for part in parts {
                        let part_path = dir.join(split::part_file_name(&base_name, part.index));
                        write_atomic(&part_path, &part.content).await?;
                    }
                    let index_path = dir.join(split::index_file_name(&base_name));
                    write_atomic(&index_path, &index).await?;
                    info!(
                        path = %input.display(),
                        parts = total,
                        "document split into parts"
                    );
                    written_path = index_path;
                }
            }
        } else {
            write_atomic(&output_path, &markdown).await?;
        }

        info!(
            path = %input.display(),
            output = %written_path.display(),
            duration_ms = start.elapsed().as_millis() as u64,
            "converted"
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_complete(input, &written_path);
        }

        Ok(ConversionResult::ok(written_path))
    }

    /// Copy a text file into the output tree verbatim.
    pub async fn copy_file(&self, config: &ConversionConfig, task: &FileTask) -> ConversionResult {
        let input = &task.input_path;
        match self.copy_file_inner(config, task).await {
            Ok(result) => result,
            Err(e) => {
                warn!(path = %input.display(), error = %e, "copy failed");
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_error(input, &e.to_string());
                }
                ConversionResult::failed(e.to_string())
            }
        }
    }

    async fn copy_file_inner(
        &self,
        config: &ConversionConfig,
        task: &FileTask,
    ) -> Result<ConversionResult, Office2MdError> {
        let input = &task.input_path;

        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(Office2MdError::NotFound {
                path: input.clone(),
            });
        }

        let output_path = paths::output_path_for(input, config);

        if !staleness::needs_regeneration(
            input,
            &output_path,
            config.overwrite_existing,
            task.force_convert,
        )
        .await?
        {
            debug!(path = %input.display(), "skipping copy: output is up to date");
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_skipped(input, "output is up to date");
            }
            return Ok(ConversionResult::skipped(output_path));
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(input);
        }

        // Text files only; invalid UTF-8 is a failed task, not a silent
        // binary copy.
        let content = tokio::fs::read_to_string(input)
            .await
            .map_err(|source| Office2MdError::ReadFailed {
                path: input.clone(),
                source,
            })?;
        write_atomic(&output_path, &content).await?;

        info!(path = %input.display(), output = %output_path.display(), "copied");
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_complete(input, &output_path);
        }

        Ok(ConversionResult::ok(output_path))
    }

    /// Convert every processable file under `folder`, sequentially.
    ///
    /// The output subdirectory is pruned from the walk and every candidate
    /// is still gated through the internal-path check — both checks are
    /// cheap, and belt-and-braces here is what keeps generated output from
    /// ever being re-read. Per-file failures never abort the batch.
    pub async fn convert_folder(
        &self,
        config: &ConversionConfig,
        folder: &Path,
    ) -> BatchSummary {
        let files = collect_processable_files(folder, config).await;
        info!(
            folder = %folder.display(),
            files = files.len(),
            "starting folder conversion"
        );

        if let Some(ref cb) = config.progress_callback {
            cb.on_batch_start(files.len());
        }

        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let task = FileTask::new(file).in_batch();
            results.push(self.process_file(config, &task).await);
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;

        if let Some(ref cb) = config.progress_callback {
            cb.on_batch_complete(succeeded, failed);
        }
        info!(succeeded, failed, "folder conversion complete");

        BatchSummary {
            results,
            succeeded,
            failed,
        }
    }

    /// Clean up after a deleted source file.
    ///
    /// Removes the would-be output, the per-document images directory, and
    /// the legacy assets directory. All deletions are best-effort: the
    /// source is already gone, so failures are logged and dropped.
    pub async fn handle_file_deleted(&self, config: &ConversionConfig, input: &Path) {
        if paths::is_internal_path(input, &config.subdirectory_name) {
            return;
        }

        let output_path = paths::output_path_for(input, config);
        if tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            match tokio::fs::remove_file(&output_path).await {
                Ok(()) => info!(path = %output_path.display(), "deleted output for removed source"),
                Err(e) => warn!(path = %output_path.display(), error = %e, "could not delete output"),
            }
        }

        // Current convention first, then the legacy one; projects converted
        // by older versions can carry either.
        for dir in [
            paths::images_dir_for(input, config),
            paths::legacy_assets_dir_for(input, config),
        ] {
            if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
                match tokio::fs::remove_dir_all(&dir).await {
                    Ok(()) => info!(dir = %dir.display(), "deleted asset directory"),
                    Err(e) => warn!(dir = %dir.display(), error = %e, "could not delete asset directory"),
                }
            }
        }
    }
}

/// Atomic write: temp file in the target directory, then rename.
///
/// The parent directory is created on demand (idempotent), which is where
/// the on-demand output-subdirectory creation happens.
async fn write_atomic(path: &Path, content: &str) -> Result<(), Office2MdError> {
    let wrap = |source: std::io::Error| Office2MdError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(wrap)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, content).await.map_err(wrap)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(wrap)
}

/// Recursively collect files in the convertible-or-copyable universe,
/// pruning the output subdirectory and the tool's own config files.
async fn collect_processable_files(folder: &Path, config: &ConversionConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![folder.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            warn!(dir = %dir.display(), "could not read directory during scan");
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if file_type.is_dir() {
                let name = entry.file_name();
                if name.to_string_lossy() == config.subdirectory_name {
                    continue; // never descend into generated output
                }
                pending.push(path);
            } else if file_type.is_file() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name == project::CONFIG_FILE_NAME || name == project::EXAMPLE_CONFIG_FILE_NAME {
                    continue;
                }
                if paths::is_internal_path(&path, &config.subdirectory_name) {
                    continue;
                }
                if paths::in_processing_universe(&path, config) {
                    files.push(path);
                }
            }
        }
    }

    // Deterministic order regardless of directory iteration order.
    files.sort();
    files
}
