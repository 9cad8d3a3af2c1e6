//! # medline-dl
//!
//! Bulk downloader and streaming record extractor for the MEDLINE/PubMed
//! baseline.
//!
//! ## Overview
//!
//! A run has two independent stages:
//! - **Download** - fetch the remote listing, then download every listed
//!   `*.xml.gz` file that is not already present locally, with a bounded
//!   number of concurrent transfers
//! - **Extract** - walk the local store and stream each document through a
//!   gzip decompressor and a pull parser, yielding one [`ArticleRecord`] per
//!   citation (PMID, keywords, publication types)
//!
//! Downloads are idempotent: a file that exists at its target is never
//! fetched again, and an interrupted transfer never leaves a file behind.
//!
//! ## Quick Start
//!
//! ```no_run
//! use medline_dl::{Config, Downloader, LocalStore, extract_store};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.download.concurrency_limit = 8;
//!
//!     let downloader = Downloader::with_http(&config)?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = downloader.run().await?;
//!     println!("{} downloaded, {} failed", report.downloaded.len(), report.failed.len());
//!
//!     let store = LocalStore::new(config.download.dest_dir.clone());
//!     let report = extract_store(&store, &CancellationToken::new(), |path, record| {
//!         println!("{}: {}", path.display(), record.record_id);
//!     })?;
//!     println!("{} records", report.records);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Gzip stream decompression
pub mod decompress;
/// Bounded-concurrency download coordinator
pub mod downloader;
/// Error types
pub mod error;
/// Record extraction from citation documents
pub mod extract;
/// Remote listing retrieval
pub mod listing;
/// Remote source abstraction
pub mod source;
/// Local artifact store
pub mod store;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, SourceConfig};
pub use downloader::Downloader;
pub use error::{Error, FormatError, Result};
pub use extract::{extract_records, extract_store, open_document};
pub use source::{HttpSource, RemoteSource};
pub use store::LocalStore;
pub use types::{
    ArticleRecord, DownloadFailure, DownloadReport, Downloaded, Event, ExtractionFailure,
    ExtractionReport, SkipReason, Skipped,
};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Returns when the signal was received (or the token was cancelled
/// elsewhere first).
///
/// # Example
///
/// ```no_run
/// use medline_dl::{Config, Downloader, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = Downloader::with_http(&Config::default())?;
///     tokio::spawn(cancel_on_signal(downloader.cancellation_token()));
///
///     let report = downloader.run().await?;
///     println!("{} failed", report.failed.len());
///     Ok(())
/// }
/// ```
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => return,
        _ = wait_for_signal() => {}
    }
    tracing::info!("Cancelling in-flight work");
    token.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
