//! Watch service: feed filesystem events into the coordinator.
//!
//! A [`notify::RecommendedWatcher`] watches the project root recursively;
//! events are bridged onto a tokio channel and drained by a single task, so
//! processing stays strictly sequential no matter how fast events arrive.
//!
//! Each create/modify event waits a settle delay before processing. Editors
//! and office suites write documents in several bursts; converting a
//! half-written file produces garbage or a converter crash, and the delay
//! lets the final write land first.
//!
//! Internal paths and out-of-universe extensions are filtered here as well
//! as in the coordinator — the earlier a generated-output event dies, the
//! less work a save storm causes.

use crate::config::ConversionConfig;
use crate::coordinator::{FileTask, ProcessingCoordinator};
use crate::error::Office2MdError;
use crate::paths;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Delay between an event and processing, letting writes settle.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// A running watch session. Dropping it stops the watcher and the
/// processing task.
pub struct WatchService {
    // Held for its Drop: deregisters the OS watches.
    _watcher: RecommendedWatcher,
    task: tokio::task::JoinHandle<()>,
}

impl WatchService {
    /// Start watching `root`. Returns `None` when auto-convert is disabled
    /// in the configuration.
    pub fn start(
        root: &Path,
        config: ConversionConfig,
        coordinator: Arc<ProcessingCoordinator>,
    ) -> Result<Option<Self>, Office2MdError> {
        Self::start_with_settle(root, config, coordinator, DEFAULT_SETTLE_DELAY)
    }

    /// [`Self::start`] with an explicit settle delay (shortened in tests).
    pub fn start_with_settle(
        root: &Path,
        config: ConversionConfig,
        coordinator: Arc<ProcessingCoordinator>,
        settle: Duration,
    ) -> Result<Option<Self>, Office2MdError> {
        if !config.auto_convert {
            debug!("auto-convert disabled; not starting watch service");
            return Ok(None);
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                // Send fails only when the receiver task is gone, i.e. the
                // service was dropped; nothing to do then.
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => warn!(error = %e, "watch error"),
            }
        })
        .map_err(|e| Office2MdError::Internal(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| Office2MdError::Internal(format!("failed to watch {}: {e}", root.display())))?;

        info!(root = %root.display(), "watch service started");

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handle_event(&coordinator, &config, event, settle).await;
            }
        });

        Ok(Some(Self {
            _watcher: watcher,
            task,
        }))
    }

    /// Stop watching and processing.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for WatchService {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle_event(
    coordinator: &ProcessingCoordinator,
    config: &ConversionConfig,
    event: Event,
    settle: Duration,
) {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    if !relevant {
        return;
    }

    for path in event.paths {
        if paths::is_internal_path(&path, &config.subdirectory_name) {
            debug!(path = %path.display(), "ignoring event in output directory");
            continue;
        }

        if let EventKind::Remove(_) = event.kind {
            if paths::in_processing_universe(&path, config) {
                coordinator.handle_file_deleted(config, &path).await;
            }
            continue;
        }

        if !paths::in_processing_universe(&path, config) {
            continue;
        }

        // Let the writing application finish before we read.
        tokio::time::sleep(settle).await;

        debug!(path = %path.display(), kind = ?event.kind, "processing watch event");
        let task = FileTask::new(&path);
        let result = coordinator.process_file(config, &task).await;
        if !result.success {
            warn!(
                path = %path.display(),
                error = result.error.as_deref().unwrap_or("unknown"),
                "watch-triggered processing failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::DocumentConverter;
    use async_trait::async_trait;

    struct StaticConverter;

    #[async_trait]
    impl DocumentConverter for StaticConverter {
        async fn convert(&self, _input: &Path) -> Result<String, Office2MdError> {
            Ok("# watched\n".to_string())
        }
    }

    fn test_config() -> ConversionConfig {
        ConversionConfig::builder()
            .converter(Arc::new(StaticConverter))
            .extract_images(false)
            .build()
            .unwrap()
    }

    #[test]
    fn disabled_auto_convert_yields_no_service() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let dir = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .auto_convert(false)
            .build()
            .unwrap();
        let service = WatchService::start(
            dir.path(),
            config,
            Arc::new(ProcessingCoordinator::new()),
        )
        .unwrap();
        assert!(service.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn created_document_is_converted() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let service = WatchService::start_with_settle(
            dir.path(),
            config,
            Arc::new(ProcessingCoordinator::new()),
            Duration::from_millis(50),
        )
        .unwrap()
        .expect("service should start");

        tokio::fs::write(dir.path().join("report.docx"), b"fake-docx")
            .await
            .unwrap();

        let output = dir.path().join("kb/report.md");
        let mut found = false;
        for _ in 0..100 {
            if output.exists() {
                found = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        service.stop();
        assert!(found, "expected {} to appear", output.display());
        assert_eq!(
            tokio::fs::read_to_string(&output).await.unwrap(),
            "# watched\n"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn output_writes_do_not_loop() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let service = WatchService::start_with_settle(
            dir.path(),
            config,
            Arc::new(ProcessingCoordinator::new()),
            Duration::from_millis(50),
        )
        .unwrap()
        .unwrap();

        // A file appearing inside kb/ must never be treated as input, even
        // though .md is in the copyable universe.
        tokio::fs::create_dir_all(dir.path().join("kb")).await.unwrap();
        tokio::fs::write(dir.path().join("kb/report.md"), b"# generated\n")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        service.stop();

        // No nested kb/, no _copy artefacts.
        assert!(!dir.path().join("kb/kb").exists());
        assert!(!dir.path().join("kb/report_copy.md").exists());
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("kb/report.md"))
                .await
                .unwrap(),
            "# generated\n"
        );
    }
}
