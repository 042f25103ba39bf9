//! # office2md
//!
//! Watch a project's file tree and convert office documents
//! (docx/xlsx/pptx/pdf and configurable others) to Markdown, placing output
//! in a designated subdirectory — without ever reprocessing its own output.
//!
//! ## Why this crate?
//!
//! Knowledge-base tooling wants Markdown, but the documents people actually
//! write live in office formats. Converting by hand goes stale the moment a
//! document changes. This crate wires a filesystem watcher to an external
//! converter process and keeps a `kb/` mirror of every document up to date,
//! with loop prevention, staleness checks, image-reference normalisation,
//! and splitting of oversized output.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file event / command
//!  │
//!  ├─ 1. Gate     internal-path check + extension classification
//!  ├─ 2. Stale?   skip when the output is already up to date
//!  ├─ 3. Convert  external converter process (stdout = Markdown)
//!  ├─ 4. Images   optional extraction + canonical reference rewriting
//!  ├─ 5. Split    oversized output → part files + index
//!  └─ 6. Write    atomic write into <dir>/kb/
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use office2md::{ConversionConfig, FileTask, ProcessingCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let coordinator = ProcessingCoordinator::new();
//!     let result = coordinator
//!         .process_file(&config, &FileTask::new("docs/report.docx"))
//!         .await;
//!     if result.success {
//!         println!("wrote {:?}", result.output_path);
//!     } else {
//!         eprintln!("failed: {:?}", result.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `office2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! office2md = { version = "0.3", default-features = false }
//! ```
//!
//! ## The converter boundary
//!
//! The crate has no knowledge of document formats. Conversion is delegated
//! to an external process that receives a file path and prints Markdown to
//! stdout; image extraction is a second, optional process printing JSON.
//! Both are modelled as injectable traits ([`DocumentConverter`],
//! [`pipeline::images::ImageExtractor`]), so the whole pipeline is testable
//! without spawning anything.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod coordinator;
pub mod error;
pub mod invoker;
pub mod paths;
pub mod pipeline;
pub mod progress;
pub mod project;
pub mod staleness;
pub mod watch;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use coordinator::{BatchSummary, ConversionResult, FileTask, ProcessingCoordinator};
pub use error::Office2MdError;
pub use invoker::{CommandConverter, DocumentConverter};
pub use paths::FileClass;
pub use progress::ConversionProgressCallback;
pub use project::ProjectConfig;
pub use watch::WatchService;
