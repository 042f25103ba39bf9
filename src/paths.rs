//! Path policy: output locations, extension classification, and the
//! internal-path check that prevents conversion loops.
//!
//! ## Loop prevention
//!
//! The watch service sees every write the coordinator makes. Without a gate,
//! writing `kb/report.md` would trigger an event for `kb/report.md`, which
//! would be "converted" again, forever. [`is_internal_path`] is that gate:
//! any path containing the output subdirectory name as an exact segment is
//! internal and must never be read, converted, or deleted as a source. It is
//! checked before any other decision touches the path.
//!
//! The check compares whole segments, not substrings, so a sibling directory
//! named `kb2` is not mistaken for `kb`. Both separator styles are split on,
//! because watcher events can carry either depending on platform.
//!
//! ## Independence of the two checks
//!
//! Classification is extension-only and path filtering is segment-only. A
//! subdirectory named `pdf` does not make `.pdf` files internal, and a file
//! named `kb.docx` is not filtered. Both checks are required; neither
//! subsumes the other.

use crate::config::ConversionConfig;
use std::path::{Path, PathBuf};

/// Text-based extensions eligible for verbatim copying into the output tree.
///
/// These are formats any editor or downstream tool reads natively; they are
/// copied (when enabled) rather than run through the converter. The list also
/// bounds the extension universe the watcher and folder scans consider.
pub const COPYABLE_EXTENSIONS: &[&str] = &[
    ".md", ".markdown", ".mdown", ".mkd", ".mkdn",
    ".txt", ".text",
    ".json", ".jsonc",
    ".xml", ".html", ".htm",
    ".csv", ".tsv",
    ".log",
    ".yaml", ".yml",
    ".toml", ".ini", ".cfg", ".conf",
    ".sql",
];

/// How a file should be handled, decided purely by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// Run through the external converter, output `<base>.md`.
    Convert,
    /// Copy verbatim into the output tree.
    Copy,
    /// Leave alone.
    Ignore,
}

/// Lower-cased extension of `path`, with leading dot (e.g. `.docx`).
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
}

/// True iff `path` contains `subdir_name` as an exact path segment.
///
/// This is the sole loop-prevention mechanism; see the module docs.
pub fn is_internal_path(path: &Path, subdir_name: &str) -> bool {
    if subdir_name.is_empty() {
        return false;
    }
    path.to_string_lossy()
        .split(['/', '\\'])
        .any(|segment| segment == subdir_name)
}

/// True when `ext` is one of the copyable text formats.
pub fn is_copyable_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    COPYABLE_EXTENSIONS.contains(&ext.as_str())
}

/// Classify a path as convert / copy / ignore.
///
/// Extension lookup is case-insensitive. Files outside the convertible set
/// are copy candidates only when copying is enabled in the configuration.
pub fn classify(path: &Path, config: &ConversionConfig) -> FileClass {
    let Some(ext) = extension_of(path) else {
        return FileClass::Ignore;
    };
    if config.is_convertible_extension(&ext) {
        FileClass::Convert
    } else if config.copy_text_files && is_copyable_extension(&ext) {
        FileClass::Copy
    } else {
        FileClass::Ignore
    }
}

/// True when the file's extension is in the convertible-or-copyable universe
/// that folder scans and the watcher consider at all.
pub fn in_processing_universe(path: &Path, config: &ConversionConfig) -> bool {
    match extension_of(path) {
        Some(ext) => config.is_convertible_extension(&ext) || is_copyable_extension(&ext),
        None => false,
    }
}

/// The directory Markdown output lands in for a given input file.
pub fn markdown_dir_for(input: &Path, config: &ConversionConfig) -> PathBuf {
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    if config.organize_in_subdirectory {
        dir.join(&config.subdirectory_name)
    } else {
        dir.to_path_buf()
    }
}

/// Compute the output path for `input`.
///
/// Pure function of the path and the configuration snapshot: convertible
/// inputs map to `<base>.md`; copy-classified inputs keep their name inside
/// the subdirectory, or get a `_copy` suffix alongside the source so the
/// copy never overwrites the original.
pub fn output_path_for(input: &Path, config: &ConversionConfig) -> PathBuf {
    let dir = markdown_dir_for(input, config);
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let convertible = extension_of(input)
        .map(|e| config.is_convertible_extension(&e))
        .unwrap_or(false);

    if convertible {
        dir.join(format!("{stem}.md"))
    } else if config.organize_in_subdirectory {
        dir.join(input.file_name().map(|n| n.to_os_string()).unwrap_or_default())
    } else {
        let ext = input
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        dir.join(format!("{stem}_copy{ext}"))
    }
}

/// Per-document extracted-image directory, current naming convention:
/// `<markdownDir>/<imagesRoot>/<baseName>`.
pub fn images_dir_for(input: &Path, config: &ConversionConfig) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    markdown_dir_for(input, config)
        .join(&config.image_output_folder)
        .join(stem)
}

/// Per-document asset directory under the legacy naming convention
/// (`<base>_assets`). Only ever read for cleanup; never written.
pub fn legacy_assets_dir_for(input: &Path, config: &ConversionConfig) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    markdown_dir_for(input, config).join(format!("{stem}_assets"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConversionConfig {
        ConversionConfig::default()
    }

    #[test]
    fn internal_path_matches_exact_segment() {
        assert!(is_internal_path(Path::new("/proj/kb/report.md"), "kb"));
        assert!(is_internal_path(Path::new("C:\\proj\\kb\\report.md"), "kb"));
        assert!(is_internal_path(Path::new("kb/nested/deep.md"), "kb"));
    }

    #[test]
    fn internal_path_rejects_substring_lookalikes() {
        assert!(!is_internal_path(Path::new("/proj/kb2/report.docx"), "kb"));
        assert!(!is_internal_path(Path::new("/proj/mykb/report.docx"), "kb"));
        assert!(!is_internal_path(Path::new("/proj/kb.docx"), "kb"));
    }

    #[test]
    fn internal_path_is_case_sensitive() {
        assert!(!is_internal_path(Path::new("/proj/KB/report.md"), "kb"));
    }

    #[test]
    fn classify_by_extension() {
        let mut c = config();
        assert_eq!(classify(Path::new("a/report.docx"), &c), FileClass::Convert);
        assert_eq!(classify(Path::new("a/Report.PDF"), &c), FileClass::Convert);
        assert_eq!(classify(Path::new("a/notes.txt"), &c), FileClass::Ignore);
        c.copy_text_files = true;
        assert_eq!(classify(Path::new("a/notes.txt"), &c), FileClass::Copy);
        assert_eq!(classify(Path::new("a/tool.exe"), &c), FileClass::Ignore);
        assert_eq!(classify(Path::new("a/Makefile"), &c), FileClass::Ignore);
    }

    #[test]
    fn classification_ignores_subdirectory_name() {
        // A subdirectory called "pdf" must not interact with .pdf
        // classification; the checks are independent.
        let c = ConversionConfig::builder()
            .subdirectory_name("pdf")
            .build()
            .unwrap();
        assert_eq!(classify(Path::new("a/report.pdf"), &c), FileClass::Convert);
        assert!(is_internal_path(Path::new("a/pdf/report.md"), "pdf"));
        assert!(!is_internal_path(Path::new("a/report.pdf"), "pdf"));
    }

    #[test]
    fn output_path_organized_convert() {
        let c = config();
        assert_eq!(
            output_path_for(Path::new("/proj/docs/report.docx"), &c),
            PathBuf::from("/proj/docs/kb/report.md")
        );
    }

    #[test]
    fn output_path_organized_copy_keeps_name() {
        let c = config();
        assert_eq!(
            output_path_for(Path::new("/proj/docs/notes.txt"), &c),
            PathBuf::from("/proj/docs/kb/notes.txt")
        );
    }

    #[test]
    fn output_path_flat_convert() {
        let c = ConversionConfig::builder()
            .organize_in_subdirectory(false)
            .build()
            .unwrap();
        assert_eq!(
            output_path_for(Path::new("/proj/report.pdf"), &c),
            PathBuf::from("/proj/report.md")
        );
    }

    #[test]
    fn output_path_flat_copy_gets_suffix() {
        // Without a subdirectory a verbatim copy would overwrite its own
        // source; the _copy suffix disambiguates.
        let c = ConversionConfig::builder()
            .organize_in_subdirectory(false)
            .build()
            .unwrap();
        assert_eq!(
            output_path_for(Path::new("/proj/notes.txt"), &c),
            PathBuf::from("/proj/notes_copy.txt")
        );
    }

    #[test]
    fn output_path_is_deterministic() {
        let c = config();
        let p = Path::new("/proj/docs/report.docx");
        assert_eq!(output_path_for(p, &c), output_path_for(p, &c));
    }

    #[test]
    fn distinct_convertible_inputs_do_not_collide() {
        let c = config();
        let a = output_path_for(Path::new("/proj/a.docx"), &c);
        let b = output_path_for(Path::new("/proj/b.pdf"), &c);
        assert_ne!(a, b);
    }

    #[test]
    fn images_and_legacy_dirs() {
        let c = config();
        assert_eq!(
            images_dir_for(Path::new("/proj/notes.pdf"), &c),
            PathBuf::from("/proj/kb/images/notes")
        );
        assert_eq!(
            legacy_assets_dir_for(Path::new("/proj/notes.pdf"), &c),
            PathBuf::from("/proj/kb/notes_assets")
        );
    }

    #[test]
    fn processing_universe() {
        let c = config();
        assert!(in_processing_universe(Path::new("a.docx"), &c));
        assert!(in_processing_universe(Path::new("a.yaml"), &c));
        assert!(!in_processing_universe(Path::new("a.exe"), &c));
        assert!(!in_processing_universe(Path::new("README"), &c));
    }
}
