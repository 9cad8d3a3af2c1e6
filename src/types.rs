//! Core types for medline-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// One bibliographic citation extracted from a document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Record identifier (the citation's PMID), never empty
    pub record_id: String,
    /// Keywords in document order
    pub keywords: Vec<String>,
    /// Publication types in document order
    pub publication_types: Vec<String>,
}

/// Why a listed name was not downloaded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Empty or whitespace-only listing entry
    Blank,
    /// Checksum sidecar (`*.md5`)
    ChecksumSidecar,
    /// A file already exists at the target path
    AlreadyPresent,
    /// An earlier name in the same listing maps to the same target path
    DuplicateTarget,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::Blank => "blank",
            SkipReason::ChecksumSidecar => "checksum sidecar",
            SkipReason::AlreadyPresent => "already present",
            SkipReason::DuplicateTarget => "duplicate target",
        };
        f.write_str(s)
    }
}

/// A name that was downloaded during a batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Downloaded {
    /// Remote name
    pub name: String,
    /// Local path the artifact was placed at
    pub target: PathBuf,
    /// Bytes written to the target (after decompression, if any)
    pub bytes: u64,
}

/// A name that was not downloaded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Skipped {
    /// Remote name
    pub name: String,
    /// Why it was skipped
    pub reason: SkipReason,
}

/// A name whose download failed
#[derive(Debug)]
pub struct DownloadFailure {
    /// Remote name, enough to retry just this item
    pub name: String,
    /// Local path the artifact would have been placed at
    pub target: PathBuf,
    /// What went wrong
    pub error: Error,
}

/// Outcome of one [`download_all`](crate::Downloader::download_all) batch
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Files fetched during this batch
    pub downloaded: Vec<Downloaded>,
    /// Names deliberately not fetched
    pub skipped: Vec<Skipped>,
    /// Names whose download failed
    pub failed: Vec<DownloadFailure>,
}

impl DownloadReport {
    /// True when no download failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of names skipped for `reason`
    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }
}

/// A document whose extraction failed
#[derive(Debug)]
pub struct ExtractionFailure {
    /// Path of the document
    pub path: PathBuf,
    /// Records emitted from the document before the failure
    pub records_before_failure: usize,
    /// What went wrong
    pub error: Error,
}

/// Outcome of an extraction pass over the local store
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Documents opened
    pub documents: usize,
    /// Records handed to the sink
    pub records: usize,
    /// Documents whose extraction stopped early
    pub failed: Vec<ExtractionFailure>,
}

impl ExtractionReport {
    /// True when every document was extracted completely
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Event emitted by the downloader
///
/// Delivered over a broadcast channel; see
/// [`Downloader::subscribe`](crate::Downloader::subscribe).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The listing was fetched
    ListingFetched {
        /// Number of entries, blanks included
        entries: usize,
    },

    /// A name was skipped
    Skipped {
        /// Remote name
        name: String,
        /// Why it was skipped
        reason: SkipReason,
    },

    /// A download started
    Downloading {
        /// Remote name
        name: String,
    },

    /// A download completed and the artifact is in place
    Downloaded {
        /// Remote name
        name: String,
        /// Local path
        target: PathBuf,
        /// Bytes written
        bytes: u64,
    },

    /// A download failed
    DownloadFailed {
        /// Remote name
        name: String,
        /// Error message
        error: String,
    },

    /// The whole batch finished
    BatchComplete {
        /// Files fetched
        downloaded: usize,
        /// Names skipped
        skipped: usize,
        /// Names failed
        failed: usize,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_skips_by_reason() {
        let report = DownloadReport {
            skipped: vec![
                Skipped {
                    name: String::new(),
                    reason: SkipReason::Blank,
                },
                Skipped {
                    name: "a.xml.gz.md5".into(),
                    reason: SkipReason::ChecksumSidecar,
                },
                Skipped {
                    name: "b.xml.gz.md5".into(),
                    reason: SkipReason::ChecksumSidecar,
                },
            ],
            ..Default::default()
        };

        assert!(report.is_success());
        assert_eq!(report.skipped_for(SkipReason::ChecksumSidecar), 2);
        assert_eq!(report.skipped_for(SkipReason::AlreadyPresent), 0);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::Skipped {
            name: "pubmed25n0001.xml.gz.md5".into(),
            reason: SkipReason::ChecksumSidecar,
        };

        let json = serde_json::to_value(&event).expect("serialize failed");

        assert_eq!(json["type"], "skipped");
        assert_eq!(json["reason"], "checksum_sidecar");
    }

    #[test]
    fn article_record_serializes_field_names() {
        let record = ArticleRecord {
            record_id: "12345".into(),
            keywords: vec!["alpha".into()],
            publication_types: vec!["Review".into()],
        };

        let json = serde_json::to_string(&record).expect("serialize failed");

        assert_eq!(
            json,
            r#"{"record_id":"12345","keywords":["alpha"],"publication_types":["Review"]}"#
        );
    }
}
