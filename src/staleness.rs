//! Staleness check: decide whether an output file needs (re)generation.
//!
//! The decision ladder, in order:
//!
//! 1. `force` — the user asked explicitly; always regenerate.
//! 2. Missing output — always regenerate.
//! 3. Overwrite disabled — once generated, never touched again, regardless
//!    of source changes.
//! 4. Otherwise regenerate iff the input's mtime is strictly later than the
//!    output's.
//!
//! Metadata read failures propagate as [`Office2MdError::Metadata`] so the
//! caller records a failed task rather than silently skipping a file whose
//! timestamps could not be compared.

use crate::error::Office2MdError;
use std::path::Path;

/// Returns true when `output` must be (re)generated from `input`.
pub async fn needs_regeneration(
    input: &Path,
    output: &Path,
    overwrite_allowed: bool,
    force: bool,
) -> Result<bool, Office2MdError> {
    if force {
        return Ok(true);
    }

    match tokio::fs::try_exists(output).await {
        Ok(false) => return Ok(true),
        Ok(true) => {}
        Err(source) => {
            return Err(Office2MdError::Metadata {
                path: output.to_path_buf(),
                source,
            })
        }
    }

    if !overwrite_allowed {
        return Ok(false);
    }

    let input_mtime = mtime_of(input).await?;
    let output_mtime = mtime_of(output).await?;
    Ok(input_mtime > output_mtime)
}

async fn mtime_of(path: &Path) -> Result<std::time::SystemTime, Office2MdError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|source| Office2MdError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
    meta.modified().map_err(|source| Office2MdError::Metadata {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};

    fn touch(path: &Path, age: Duration) {
        fs::write(path, b"x").unwrap();
        let t = SystemTime::now() - age;
        let f = fs::File::options().write(true).open(path).unwrap();
        f.set_modified(t).unwrap();
    }

    #[tokio::test]
    async fn force_always_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.docx");
        let output = dir.path().join("out.md");
        touch(&input, Duration::from_secs(100));
        touch(&output, Duration::from_secs(0));
        // Output is newer; only force makes this true.
        assert!(needs_regeneration(&input, &output, true, true).await.unwrap());
        assert!(!needs_regeneration(&input, &output, true, false).await.unwrap());
    }

    #[tokio::test]
    async fn missing_output_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.docx");
        touch(&input, Duration::from_secs(0));
        let output = dir.path().join("missing.md");
        assert!(needs_regeneration(&input, &output, false, false).await.unwrap());
    }

    #[tokio::test]
    async fn overwrite_disabled_never_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.docx");
        let output = dir.path().join("out.md");
        touch(&input, Duration::from_secs(0));
        touch(&output, Duration::from_secs(100));
        // Input is newer but overwrite is off.
        assert!(!needs_regeneration(&input, &output, false, false).await.unwrap());
    }

    #[tokio::test]
    async fn newer_input_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.docx");
        let output = dir.path().join("out.md");
        touch(&input, Duration::from_secs(0));
        touch(&output, Duration::from_secs(100));
        assert!(needs_regeneration(&input, &output, true, false).await.unwrap());
    }

    #[tokio::test]
    async fn missing_input_is_an_error_not_a_skip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("gone.docx");
        let output = dir.path().join("out.md");
        touch(&output, Duration::from_secs(0));
        let err = needs_regeneration(&input, &output, true, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Office2MdError::Metadata { .. }));
    }
}
