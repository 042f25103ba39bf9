//! Per-project configuration file.
//!
//! A project opts into automatic conversion through a small JSON marker file
//! at its root. Absent or unreadable files fall back to defaults — a corrupt
//! config must never stop the tool from loading, it just loses its
//! customisations. Fields missing from the file keep their defaults, so old
//! config files survive new fields.
//!
//! These filenames are excluded from folder scans: the tool's own config is
//! never a conversion input.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Project config file name.
pub const CONFIG_FILE_NAME: &str = ".office2md.json";

/// Shipped example file, also excluded from scans.
pub const EXAMPLE_CONFIG_FILE_NAME: &str = ".office2md.example.json";

fn default_subdirectory() -> String {
    "kb".to_string()
}

fn default_extensions() -> Vec<String> {
    vec![
        ".docx".to_string(),
        ".xlsx".to_string(),
        ".pptx".to_string(),
        ".pdf".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

/// Contents of `.office2md.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Whether conversion is enabled for this project at all.
    #[serde(default)]
    pub enabled: bool,

    /// Whether the watch service should convert automatically.
    #[serde(default = "default_true")]
    pub auto_convert: bool,

    /// Output subdirectory name.
    #[serde(default = "default_subdirectory")]
    pub markdown_subdirectory_name: String,

    /// Convertible extensions.
    #[serde(default = "default_extensions")]
    pub supported_extensions: Vec<String>,

    /// ISO-8601 timestamp of the last activation. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activated: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_convert: true,
            markdown_subdirectory_name: default_subdirectory(),
            supported_extensions: default_extensions(),
            last_activated: None,
        }
    }
}

impl ProjectConfig {
    /// Path of the config file inside `root`.
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE_NAME)
    }

    /// Load the project config, falling back to defaults when the file is
    /// absent or unparseable.
    pub async fn load(root: &Path) -> Self {
        let path = Self::path_in(root);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid project config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist the config as pretty-printed JSON.
    pub async fn save(&self, root: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(Self::path_in(root), content).await
    }

    /// True when conversion is active for `root`: either the config file
    /// says so, or an output subdirectory already exists from earlier use.
    pub async fn is_enabled(root: &Path) -> bool {
        let path = Self::path_in(root);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Self::load(root).await.enabled;
        }
        root.join(default_subdirectory()).is_dir()
    }

    /// True when the top level of `root` contains at least one convertible
    /// file.
    pub async fn has_convertible_files(root: &Path) -> bool {
        let Ok(mut entries) = tokio::fs::read_dir(root).await else {
            return false;
        };
        let extensions = default_extensions();
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Some(ext) = crate::paths::extension_of(&entry.path()) {
                if extensions.contains(&ext) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(dir.path()).await;
        assert_eq!(config, ProjectConfig::default());
        assert!(!config.enabled);
        assert!(config.auto_convert);
    }

    #[tokio::test]
    async fn load_merges_defaults_over_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            ProjectConfig::path_in(dir.path()),
            r#"{"enabled": true}"#,
        )
        .await
        .unwrap();

        let config = ProjectConfig::load(dir.path()).await;
        assert!(config.enabled);
        assert_eq!(config.markdown_subdirectory_name, "kb");
        assert!(config.supported_extensions.contains(&".pdf".to_string()));
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(ProjectConfig::path_in(dir.path()), "{not json")
            .await
            .unwrap();
        assert_eq!(ProjectConfig::load(dir.path()).await, ProjectConfig::default());
    }

    #[tokio::test]
    async fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::default();
        config.enabled = true;
        config.markdown_subdirectory_name = "notes".into();
        config.last_activated = Some("2024-06-01T12:00:00Z".into());
        config.save(dir.path()).await.unwrap();

        let loaded = ProjectConfig::load(dir.path()).await;
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn existing_kb_folder_counts_as_enabled() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!ProjectConfig::is_enabled(dir.path()).await);
        tokio::fs::create_dir(dir.path().join("kb")).await.unwrap();
        assert!(ProjectConfig::is_enabled(dir.path()).await);
    }

    #[tokio::test]
    async fn detects_convertible_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!ProjectConfig::has_convertible_files(dir.path()).await);
        tokio::fs::write(dir.path().join("report.docx"), b"x")
            .await
            .unwrap();
        assert!(ProjectConfig::has_convertible_files(dir.path()).await);
    }
}
