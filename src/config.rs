//! Configuration types for document-to-Markdown processing.
//!
//! All behaviour is controlled through [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. The coordinator treats a config as an
//! immutable snapshot for the duration of one task: clone it once per task
//! and nothing can change underneath a running conversion.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::Office2MdError;
use crate::invoker::DocumentConverter;
use crate::pipeline::images::ImageExtractor;
use crate::progress::ConversionProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration snapshot for document processing.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use office2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .subdirectory_name("kb")
///     .copy_text_files(true)
///     .splitting_threshold(50_000)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Process files automatically when the watch service sees them change.
    /// Default: true.
    ///
    /// Only consulted when constructing a [`crate::watch::WatchService`];
    /// explicit convert commands ignore it.
    pub auto_convert: bool,

    /// Regenerate output when the source is newer than the output. Default: true.
    ///
    /// When false, an output file is written once and never touched again,
    /// regardless of source changes — useful when converted files are edited
    /// by hand downstream.
    pub overwrite_existing: bool,

    /// Run the external image extractor for image-bearing formats. Default: true.
    pub extract_images: bool,

    /// Extensions (with leading dot, lower-case) that are converted to
    /// Markdown. Default: `.docx`, `.xlsx`, `.pptx`, `.pdf`.
    pub convertible_extensions: Vec<String>,

    /// Place output under `<inputDir>/<subdirectory_name>/` instead of
    /// alongside the source. Default: true.
    pub organize_in_subdirectory: bool,

    /// Name of the generated-output subdirectory. Default: `kb`.
    ///
    /// This name is also the loop-prevention marker: any path containing it
    /// as an exact segment is internal and never processed as input.
    pub subdirectory_name: String,

    /// Copy recognised text files (Markdown, JSON, YAML, …) into the output
    /// tree. Default: false — copying is opt-in.
    pub copy_text_files: bool,

    /// Name of the extracted-image root inside the Markdown directory.
    /// Default: `images`.
    pub image_output_folder: String,

    /// Minimum width/height in pixels for an extracted image; smaller ones
    /// (bullets, logos, spacer GIFs) are filtered by the extractor.
    /// Default: 100.
    pub image_min_size: u32,

    /// Split oversized Markdown output into linked part-files. Default: true.
    pub splitting_enabled: bool,

    /// Byte threshold above which output is split at header boundaries.
    /// Default: 100 000.
    ///
    /// Sections are atomic, so a single section larger than the threshold
    /// still lands in one part — accepted limitation, see
    /// [`crate::pipeline::split`].
    pub splitting_threshold: usize,

    /// Wall-clock timeout per converter/extractor attempt, in seconds.
    ///
    /// Platform-dependent default: 120 s on Windows, 180 s elsewhere —
    /// process startup on Windows is slower and a hung converter there is
    /// more common, so it gets a shorter leash.
    pub subprocess_timeout_secs: u64,

    /// Explicit converter command, tried before the embedded binary and
    /// PATH lookup. If None, discovery starts at the embedded binary.
    pub converter_command: Option<PathBuf>,

    /// Explicit image-extractor script path. If None, discovery looks next
    /// to the embedded converter binary.
    pub extractor_command: Option<PathBuf>,

    /// Pre-constructed converter. Takes precedence over command discovery.
    /// Useful in tests or when the caller needs custom middleware.
    pub converter: Option<Arc<dyn DocumentConverter>>,

    /// Pre-constructed image extractor. Same precedence rule as `converter`.
    pub extractor: Option<Arc<dyn ImageExtractor>>,

    /// Progress callback for per-file and per-batch events.
    pub progress_callback: Option<Arc<dyn ConversionProgressCallback>>,
}

fn default_timeout_secs() -> u64 {
    if cfg!(windows) {
        120
    } else {
        180
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            auto_convert: true,
            overwrite_existing: true,
            extract_images: true,
            convertible_extensions: vec![
                ".docx".to_string(),
                ".xlsx".to_string(),
                ".pptx".to_string(),
                ".pdf".to_string(),
            ],
            organize_in_subdirectory: true,
            subdirectory_name: "kb".to_string(),
            copy_text_files: false,
            image_output_folder: "images".to_string(),
            image_min_size: 100,
            splitting_enabled: true,
            splitting_threshold: 100_000,
            subprocess_timeout_secs: default_timeout_secs(),
            converter_command: None,
            extractor_command: None,
            converter: None,
            extractor: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("auto_convert", &self.auto_convert)
            .field("overwrite_existing", &self.overwrite_existing)
            .field("extract_images", &self.extract_images)
            .field("convertible_extensions", &self.convertible_extensions)
            .field("organize_in_subdirectory", &self.organize_in_subdirectory)
            .field("subdirectory_name", &self.subdirectory_name)
            .field("copy_text_files", &self.copy_text_files)
            .field("image_output_folder", &self.image_output_folder)
            .field("image_min_size", &self.image_min_size)
            .field("splitting_enabled", &self.splitting_enabled)
            .field("splitting_threshold", &self.splitting_threshold)
            .field("subprocess_timeout_secs", &self.subprocess_timeout_secs)
            .field("converter_command", &self.converter_command)
            .field("extractor_command", &self.extractor_command)
            .field("converter", &self.converter.as_ref().map(|_| "<dyn DocumentConverter>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn ImageExtractor>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when `ext` (with leading dot, any case) is in the convertible set.
    pub fn is_convertible_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.convertible_extensions.iter().any(|e| e == &ext)
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn auto_convert(mut self, v: bool) -> Self {
        self.config.auto_convert = v;
        self
    }

    pub fn overwrite_existing(mut self, v: bool) -> Self {
        self.config.overwrite_existing = v;
        self
    }

    pub fn extract_images(mut self, v: bool) -> Self {
        self.config.extract_images = v;
        self
    }

    /// Replace the convertible-extension set. Entries are lower-cased and a
    /// leading dot is added when missing.
    pub fn convertible_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.convertible_extensions = exts
            .into_iter()
            .map(|e| {
                let e = e.into().to_ascii_lowercase();
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{e}")
                }
            })
            .collect();
        self
    }

    pub fn organize_in_subdirectory(mut self, v: bool) -> Self {
        self.config.organize_in_subdirectory = v;
        self
    }

    pub fn subdirectory_name(mut self, name: impl Into<String>) -> Self {
        self.config.subdirectory_name = name.into();
        self
    }

    pub fn copy_text_files(mut self, v: bool) -> Self {
        self.config.copy_text_files = v;
        self
    }

    pub fn image_output_folder(mut self, name: impl Into<String>) -> Self {
        self.config.image_output_folder = name.into();
        self
    }

    pub fn image_min_size(mut self, px: u32) -> Self {
        self.config.image_min_size = px;
        self
    }

    pub fn splitting_enabled(mut self, v: bool) -> Self {
        self.config.splitting_enabled = v;
        self
    }

    pub fn splitting_threshold(mut self, bytes: usize) -> Self {
        self.config.splitting_threshold = bytes;
        self
    }

    pub fn subprocess_timeout_secs(mut self, secs: u64) -> Self {
        self.config.subprocess_timeout_secs = secs.max(1);
        self
    }

    pub fn converter_command(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.converter_command = Some(cmd.into());
        self
    }

    pub fn extractor_command(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.extractor_command = Some(cmd.into());
        self
    }

    pub fn converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn ImageExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ConversionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Office2MdError> {
        let c = &self.config;
        if c.convertible_extensions.is_empty() {
            return Err(Office2MdError::InvalidConfig(
                "Convertible extensions must be a non-empty list".into(),
            ));
        }
        for ext in &c.convertible_extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(Office2MdError::InvalidConfig(format!(
                    "Invalid extension '{ext}': extensions must start with a dot"
                )));
            }
        }
        if c.subdirectory_name.is_empty()
            || c.subdirectory_name.contains('/')
            || c.subdirectory_name.contains('\\')
        {
            return Err(Office2MdError::InvalidConfig(format!(
                "Subdirectory name '{}' must be a single path segment",
                c.subdirectory_name
            )));
        }
        if c.splitting_enabled && c.splitting_threshold == 0 {
            return Err(Office2MdError::InvalidConfig(
                "Splitting threshold must be > 0 when splitting is enabled".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ConversionConfig::builder().build().unwrap();
        assert!(config.organize_in_subdirectory);
        assert_eq!(config.subdirectory_name, "kb");
        assert!(config.is_convertible_extension(".pdf"));
        assert!(config.is_convertible_extension(".DOCX"));
        assert!(!config.is_convertible_extension(".txt"));
    }

    #[test]
    fn extension_normalisation() {
        let config = ConversionConfig::builder()
            .convertible_extensions(["ODT", ".Pdf"])
            .build()
            .unwrap();
        assert!(config.is_convertible_extension(".odt"));
        assert!(config.is_convertible_extension(".pdf"));
    }

    #[test]
    fn rejects_empty_extension_list() {
        let result = ConversionConfig::builder()
            .convertible_extensions(Vec::<String>::new())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_multi_segment_subdir() {
        let result = ConversionConfig::builder()
            .subdirectory_name("a/b")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_split_threshold() {
        let result = ConversionConfig::builder()
            .splitting_enabled(true)
            .splitting_threshold(0)
            .build();
        assert!(result.is_err());
    }
}
