//! Image handling: optional external extraction plus reference rewriting.
//!
//! Two responsibilities, deliberately one-way coupled:
//!
//! * **Extraction** is a second opaque subprocess boundary (like the
//!   converter). It receives a target directory, a minimum pixel-size filter
//!   and a mode, and reports back as a single JSON object on stdout. It is
//!   best-effort by contract: any failure degrades to reference rewriting
//!   only and must never fail the overall conversion.
//!
//! * **Rewriting** normalises every Markdown image reference to the
//!   canonical `<imagesRoot>/<documentBaseName>/<file>` form, relative to
//!   the Markdown directory. Rewriting an already-canonical reference is a
//!   no-op, so running the pass twice is safe — including over extractor
//!   output that already inlined images at their document positions.
//!
//! The per-document asset directory is created lazily, only when at least
//! one image reference exists in the content.

use crate::config::ConversionConfig;
use crate::error::Office2MdError;
use crate::paths;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Formats the extractor understands; everything else goes straight to
/// reference rewriting.
pub const IMAGE_BEARING_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".pptx", ".xlsx"];

/// Name of the bundled extractor script.
pub const EXTRACTOR_SCRIPT: &str = "image_extractor.py";

/// Parameters for one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Source document.
    pub input: PathBuf,
    /// Directory the extractor writes image files into.
    pub output_dir: PathBuf,
    /// Directory the Markdown output lives in; image references are
    /// relative to it.
    pub markdown_dir: PathBuf,
    /// Minimum width/height in pixels; smaller images are filtered out.
    pub min_size_px: u32,
}

/// One image the extractor wrote.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedImage {
    /// Path relative to the Markdown directory.
    pub relative_path: String,
    /// Source page, for paginated formats.
    #[serde(default)]
    pub page: Option<u32>,
    /// Source slide, for presentations.
    #[serde(default)]
    pub slide: Option<u32>,
}

/// The extractor's stdout JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionReport {
    pub success: bool,
    #[serde(default)]
    pub images: Vec<ExtractedImage>,
    /// Full Markdown with images inlined at their original document
    /// positions. When present, it supersedes the converter's output.
    #[serde(default)]
    pub markdown_content: Option<String>,
}

/// Opaque boundary: extract images from a document into a directory.
#[async_trait]
pub trait ImageExtractor: Send + Sync {
    async fn extract(&self, req: &ExtractionRequest) -> Result<ExtractionReport, Office2MdError>;
}

/// Production extractor: runs the bundled Python script.
///
/// Protocol: `python "<script>" "<input>" "<outputDir>" "<markdownDir>"
/// full_content <minSizePx>`, one JSON object on stdout.
pub struct CommandExtractor {
    script: PathBuf,
    timeout_secs: u64,
}

impl CommandExtractor {
    /// Locate the extractor script: the configured path, else the bundled
    /// copy under `<install_root>/bin/<os>/`. None when neither exists —
    /// the pipeline then degrades to reference rewriting.
    pub fn discover(config: &ConversionConfig, install_root: Option<&Path>) -> Option<Self> {
        let script = match config.extractor_command {
            Some(ref cmd) => cmd.clone(),
            None => install_root?
                .join("bin")
                .join(std::env::consts::OS)
                .join(EXTRACTOR_SCRIPT),
        };
        if !script.exists() {
            debug!(script = %script.display(), "image extractor not found");
            return None;
        }
        Some(Self {
            script,
            timeout_secs: config.subprocess_timeout_secs,
        })
    }
}

#[async_trait]
impl ImageExtractor for CommandExtractor {
    async fn extract(&self, req: &ExtractionRequest) -> Result<ExtractionReport, Office2MdError> {
        let python = if cfg!(windows) { "python" } else { "python3" };
        let mut cmd = tokio::process::Command::new(python);
        cmd.arg(&self.script)
            .arg(&req.input)
            .arg(&req.output_dir)
            .arg(&req.markdown_dir)
            .arg("full_content")
            .arg(req.min_size_px.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| Office2MdError::ExtractionFailed {
                path: req.input.clone(),
                reason: format!("timed out after {}s", self.timeout_secs),
            })?
            .map_err(|e| Office2MdError::ExtractionFailed {
                path: req.input.clone(),
                reason: format!("failed to spawn extractor: {e}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if stdout.is_empty() && !stderr.trim().is_empty() {
            return Err(Office2MdError::ExtractionFailed {
                path: req.input.clone(),
                reason: format!("extractor error: {}", stderr.trim()),
            });
        }

        serde_json::from_str(&stdout).map_err(|e| Office2MdError::ExtractionFailed {
            path: req.input.clone(),
            reason: format!("invalid extractor JSON: {e}"),
        })
    }
}

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap());

/// File-name component of an image path, tolerating either separator.
fn image_file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Rewrite every image reference not already under the canonical
/// `<images_root>/<base_name>/` prefix. Returns the rewritten content and
/// whether any reference was present at all.
pub fn rewrite_references(markdown: &str, images_root: &str, base_name: &str) -> (String, bool) {
    let prefix = format!("{images_root}/{base_name}/");
    let mut any = false;
    let rewritten = RE_IMAGE.replace_all(markdown, |caps: &regex::Captures<'_>| {
        any = true;
        let alt = &caps[1];
        let path = &caps[2];
        if path.starts_with(&prefix) {
            caps[0].to_string()
        } else {
            format!("![{alt}]({prefix}{})", image_file_name(path))
        }
    });
    (rewritten.into_owned(), any)
}

/// Run the image stage over converter output.
///
/// Extraction runs only when enabled and the input is an image-bearing
/// format; its failure is logged and swallowed. Reference rewriting always
/// runs last, including over extractor-supplied content.
pub async fn process(
    input: &Path,
    markdown: &str,
    config: &ConversionConfig,
    extractor: Option<&dyn ImageExtractor>,
) -> String {
    let base_name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let extraction_applies = config.extract_images
        && paths::extension_of(input)
            .map(|e| IMAGE_BEARING_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or(false);

    let mut content = markdown.to_string();

    if extraction_applies {
        if let Some(extractor) = extractor {
            let req = ExtractionRequest {
                input: input.to_path_buf(),
                output_dir: paths::markdown_dir_for(input, config)
                    .join(&config.image_output_folder),
                markdown_dir: paths::markdown_dir_for(input, config),
                min_size_px: config.image_min_size,
            };
            match extractor.extract(&req).await {
                Ok(report) if report.success => {
                    debug!(
                        input = %input.display(),
                        images = report.images.len(),
                        "image extraction succeeded"
                    );
                    if let Some(full) = report.markdown_content {
                        content = full;
                    }
                }
                Ok(_) => {
                    warn!(input = %input.display(), "extractor reported failure; continuing without extraction");
                }
                Err(e) => {
                    warn!(input = %input.display(), error = %e, "image extraction failed; continuing without extraction");
                }
            }
        }
    }

    let (rewritten, has_references) =
        rewrite_references(&content, &config.image_output_folder, &base_name);

    if has_references {
        let images_dir = paths::images_dir_for(input, config);
        if let Err(e) = tokio::fs::create_dir_all(&images_dir).await {
            warn!(dir = %images_dir.display(), error = %e, "could not create images directory");
        }
    }

    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn rewrites_bare_reference() {
        let (out, any) = rewrite_references("before ![x](img1.png) after", "images", "notes");
        assert!(any);
        assert_eq!(out, "before ![x](images/notes/img1.png) after");
    }

    #[test]
    fn rewrite_is_idempotent() {
        let canonical = "![x](images/notes/img1.png)";
        let (once, _) = rewrite_references(canonical, "images", "notes");
        assert_eq!(once, canonical);
        let (twice, _) = rewrite_references(&once, "images", "notes");
        assert_eq!(twice, canonical);
    }

    #[test]
    fn rewrites_foreign_directory_reference() {
        let (out, _) = rewrite_references("![a](media/extracted/fig2.jpg)", "images", "report");
        assert_eq!(out, "![a](images/report/fig2.jpg)");
    }

    #[test]
    fn rewrites_windows_style_path() {
        let (out, _) = rewrite_references(r"![a](media\fig2.jpg)", "images", "report");
        assert_eq!(out, "![a](images/report/fig2.jpg)");
    }

    #[test]
    fn no_references_reports_none() {
        let (out, any) = rewrite_references("plain text, no images", "images", "doc");
        assert!(!any);
        assert_eq!(out, "plain text, no images");
    }

    #[test]
    fn preserves_empty_alt_text() {
        let (out, _) = rewrite_references("![](shot.png)", "images", "doc");
        assert_eq!(out, "![](images/doc/shot.png)");
    }

    struct FakeExtractor {
        report: Result<ExtractionReport, String>,
        seen: Mutex<Vec<ExtractionRequest>>,
    }

    #[async_trait]
    impl ImageExtractor for FakeExtractor {
        async fn extract(
            &self,
            req: &ExtractionRequest,
        ) -> Result<ExtractionReport, Office2MdError> {
            self.seen.lock().unwrap().push(req.clone());
            self.report
                .clone()
                .map_err(|reason| Office2MdError::ExtractionFailed {
                    path: req.input.clone(),
                    reason,
                })
        }
    }

    fn config_in(dir: &Path) -> (ConversionConfig, PathBuf) {
        let config = ConversionConfig::default();
        let input = dir.join("notes.pdf");
        (config, input)
    }

    #[tokio::test]
    async fn extraction_content_is_preferred_then_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let (config, input) = config_in(dir.path());
        let extractor = FakeExtractor {
            report: Ok(ExtractionReport {
                success: true,
                images: vec![],
                markdown_content: Some("# Doc\n![fig](page1/fig.png)\n".into()),
            }),
            seen: Mutex::new(vec![]),
        };

        let out = process(&input, "# Doc original\n", &config, Some(&extractor)).await;
        assert_eq!(out, "# Doc\n![fig](images/notes/fig.png)\n");
        assert!(dir.path().join("kb/images/notes").is_dir());

        let seen = extractor.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].markdown_dir, dir.path().join("kb"));
        assert_eq!(seen[0].output_dir, dir.path().join("kb/images"));
    }

    #[tokio::test]
    async fn extraction_failure_degrades_to_rewriting() {
        let dir = tempfile::tempdir().unwrap();
        let (config, input) = config_in(dir.path());
        let extractor = FakeExtractor {
            report: Err("no backend".into()),
            seen: Mutex::new(vec![]),
        };

        let out = process(&input, "![x](img1.png)", &config, Some(&extractor)).await;
        assert_eq!(out, "![x](images/notes/img1.png)");
    }

    #[tokio::test]
    async fn non_image_bearing_format_skips_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConversionConfig::default();
        let input = dir.path().join("notes.csv");
        let extractor = FakeExtractor {
            report: Ok(ExtractionReport {
                success: true,
                images: vec![],
                markdown_content: Some("should not be used".into()),
            }),
            seen: Mutex::new(vec![]),
        };

        let out = process(&input, "no images here", &config, Some(&extractor)).await;
        assert_eq!(out, "no images here");
        assert!(extractor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn images_dir_is_not_created_without_references() {
        let dir = tempfile::tempdir().unwrap();
        let (config, input) = config_in(dir.path());

        let out = process(&input, "plain text", &config, None).await;
        assert_eq!(out, "plain text");
        assert!(!dir.path().join("kb/images").exists());
    }

    #[tokio::test]
    async fn extraction_disabled_still_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .extract_images(false)
            .build()
            .unwrap();
        let input = dir.path().join("notes.pdf");
        let extractor = FakeExtractor {
            report: Ok(ExtractionReport {
                success: true,
                images: vec![],
                markdown_content: Some("ignored".into()),
            }),
            seen: Mutex::new(vec![]),
        };

        let out = process(&input, "![x](a.png)", &config, Some(&extractor)).await;
        assert_eq!(out, "![x](images/notes/a.png)");
        assert!(extractor.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn report_json_shape() {
        let json = r##"{"success": true,
                       "images": [{"relative_path": "images/doc/p1.png", "page": 1}],
                       "markdown_content": "# hi"}"##;
        let report: ExtractionReport = serde_json::from_str(json).unwrap();
        assert!(report.success);
        assert_eq!(report.images.len(), 1);
        assert_eq!(report.images[0].page, Some(1));
        assert_eq!(report.images[0].slide, None);
        assert_eq!(report.markdown_content.as_deref(), Some("# hi"));
    }

    #[test]
    fn report_json_minimal() {
        let report: ExtractionReport = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!report.success);
        assert!(report.images.is_empty());
        assert!(report.markdown_content.is_none());
    }
}
