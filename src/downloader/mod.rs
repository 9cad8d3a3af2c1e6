//! Download coordinator: fetch every listed file once into the local store.
//!
//! Split into focused submodules:
//! - [`plan`] - Skip rules, target paths, collision handling
//! - [`task`] - Single-file fetch with atomic placement
//!
//! A batch runs at most `concurrency_limit` downloads at a time. Each name is
//! independent: one failure never cancels the others, and every failure is
//! reported in the [`DownloadReport`] once the batch has finished.

mod plan;
mod task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use plan::CHECKSUM_SUFFIX;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DownloadConfig};
use crate::error::{Error, Result};
use crate::listing;
use crate::source::{HttpSource, RemoteSource};
use crate::store::LocalStore;
use crate::types::{DownloadFailure, DownloadReport, Downloaded, Event, SkipReason, Skipped};

use plan::{FetchJob, Planned, plan_downloads};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Result of processing one fetch job
enum Outcome {
    Downloaded(Downloaded),
    Skipped(Skipped),
    Failed(DownloadFailure),
}

/// Bounded-concurrency batch downloader (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Downloader {
    /// Download settings (destination, concurrency, inline decompression)
    config: Arc<DownloadConfig>,
    /// Where listings and files come from
    source: Arc<dyn RemoteSource>,
    /// Destination directory
    store: LocalStore,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    /// Cancels every in-flight and pending download of this downloader
    cancel_token: CancellationToken,
}

impl Downloader {
    /// Create a downloader fetching from `source`
    ///
    /// Fails with [`Error::Config`] when the configuration is invalid
    /// (e.g. a concurrency limit of zero).
    pub fn new(config: &Config, source: Arc<dyn RemoteSource>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config.download.clone()),
            source,
            store: LocalStore::new(config.download.dest_dir.clone()),
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Create a downloader fetching over HTTP(S) from `config.source.base_url`
    pub fn with_http(config: &Config) -> Result<Self> {
        let source = HttpSource::new(&config.source)?;
        Self::new(config, Arc::new(source))
    }

    /// Subscribe to download events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The local store downloads are placed in
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Use `token` for cancellation instead of a private one
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Token that cancels this downloader's work when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Cancel in-flight downloads and refuse to start new ones.
    ///
    /// Cancelled downloads leave no file behind and are reported as
    /// [`Error::Cancelled`] failures.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Fetch and split the remote listing
    pub async fn fetch_listing(&self) -> Result<Vec<String>> {
        let names = listing::fetch_listing(self.source.as_ref()).await?;
        self.emit(Event::ListingFetched {
            entries: names.len(),
        });
        Ok(names)
    }

    /// Fetch the listing, then download everything in it.
    ///
    /// With `clean_before_download` set, the destination directory is emptied
    /// first. Only a failed listing request (or an unusable destination
    /// directory) is an error; per-file failures are in the report.
    pub async fn run(&self) -> Result<DownloadReport> {
        if self.config.clean_before_download {
            self.store.clean().await?;
        }
        let names = self.fetch_listing().await?;
        self.download_all(&names).await
    }

    /// Download every name that is not already present locally.
    ///
    /// Creates the destination directory if needed. Blank names, checksum
    /// sidecars, names whose target exists, and later names colliding with an
    /// earlier target are skipped. Running the same batch twice performs no
    /// work the second time.
    pub async fn download_all(&self, names: &[String]) -> Result<DownloadReport> {
        self.store.ensure().await?;

        let mut report = DownloadReport::default();
        let mut jobs = Vec::new();
        for planned in plan_downloads(
            names,
            self.store.dir(),
            self.config.decompress_on_download,
        ) {
            match planned {
                Planned::Skip(skipped) => {
                    tracing::debug!(name = %skipped.name, reason = %skipped.reason, "Skipping listed file");
                    self.emit(Event::Skipped {
                        name: skipped.name.clone(),
                        reason: skipped.reason,
                    });
                    report.skipped.push(skipped);
                }
                Planned::Fetch(job) => jobs.push(job),
            }
        }

        tracing::info!(
            files = jobs.len(),
            concurrency = self.config.concurrency_limit,
            dest_dir = %self.store.dir().display(),
            "Starting download batch"
        );

        let outcomes: Vec<Outcome> = stream::iter(jobs)
            .map(|job| self.process(job))
            .buffer_unordered(self.config.concurrency_limit.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Downloaded(d) => report.downloaded.push(d),
                Outcome::Skipped(s) => report.skipped.push(s),
                Outcome::Failed(f) => report.failed.push(f),
            }
        }
        report.downloaded.sort_by(|a, b| a.name.cmp(&b.name));
        report.failed.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::info!(
            downloaded = report.downloaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Download batch finished"
        );
        self.emit(Event::BatchComplete {
            downloaded: report.downloaded.len(),
            skipped: report.skipped.len(),
            failed: report.failed.len(),
        });

        Ok(report)
    }

    /// Run one job: existence check, then fetch.
    async fn process(&self, job: FetchJob) -> Outcome {
        if self.cancel_token.is_cancelled() {
            return self.failed(job, Error::Cancelled);
        }

        match self.store.contains(&job.target).await {
            Ok(true) => {
                tracing::debug!(name = %job.name, target = %job.target.display(), "Already present, skipping");
                self.emit(Event::Skipped {
                    name: job.name.clone(),
                    reason: SkipReason::AlreadyPresent,
                });
                return Outcome::Skipped(Skipped {
                    name: job.name,
                    reason: SkipReason::AlreadyPresent,
                });
            }
            Ok(false) => {}
            Err(e) => return self.failed(job, e),
        }

        tracing::info!(name = %job.name, "Downloading file");
        self.emit(Event::Downloading {
            name: job.name.clone(),
        });

        match task::fetch_to_target(self.source.as_ref(), &job, &self.cancel_token).await {
            Ok(bytes) => {
                tracing::info!(
                    name = %job.name,
                    target = %job.target.display(),
                    bytes,
                    "Downloaded file"
                );
                self.emit(Event::Downloaded {
                    name: job.name.clone(),
                    target: job.target.clone(),
                    bytes,
                });
                Outcome::Downloaded(Downloaded {
                    name: job.name,
                    target: job.target,
                    bytes,
                })
            }
            Err(e) => self.failed(job, e),
        }
    }

    fn failed(&self, job: FetchJob, error: Error) -> Outcome {
        tracing::warn!(
            name = %job.name,
            location = %self.source.location(&job.name),
            kind = error.kind(),
            error = %error,
            "Download failed"
        );
        self.emit(Event::DownloadFailed {
            name: job.name.clone(),
            error: error.to_string(),
        });
        Outcome::Failed(DownloadFailure {
            name: job.name,
            target: job.target,
            error,
        })
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}
