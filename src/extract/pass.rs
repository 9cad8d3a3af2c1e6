//! Extraction pass over every document in the local store.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::store::LocalStore;
use crate::types::{ArticleRecord, ExtractionFailure, ExtractionReport};

use super::open_document;

/// Run the extractor over every document in `store`, in file-name order.
///
/// Each record goes to `sink` together with the path of its document as soon
/// as it is parsed. A document that fails (unreadable, corrupt, malformed
/// record) is recorded in the report and the pass moves on to the next one.
/// Only failing to list the store is an error.
///
/// Cancellation is checked between records; the interrupted document is
/// reported as [`Error::Cancelled`] and no further documents are opened.
///
/// Synchronous: call it from `spawn_blocking` in async code.
pub fn extract_store<F>(
    store: &LocalStore,
    cancel_token: &CancellationToken,
    mut sink: F,
) -> Result<ExtractionReport>
where
    F: FnMut(&Path, ArticleRecord),
{
    let documents = store.documents()?;
    tracing::info!(
        dir = %store.dir().display(),
        documents = documents.len(),
        "Starting extraction pass"
    );

    let mut report = ExtractionReport::default();
    for path in documents {
        if cancel_token.is_cancelled() {
            break;
        }
        report.documents += 1;

        let (emitted, failure) = match open_document(&path) {
            Ok(records) => drain_document(&path, records, cancel_token, &mut sink),
            Err(e) => (0, Some(e)),
        };
        report.records += emitted;

        match failure {
            None => {
                tracing::debug!(path = %path.display(), records = emitted, "Extracted document");
            }
            Some(error) => {
                tracing::warn!(
                    path = %path.display(),
                    records_before_failure = emitted,
                    kind = error.kind(),
                    error = %error,
                    "Extraction failed"
                );
                let cancelled = matches!(error, Error::Cancelled);
                report.failed.push(ExtractionFailure {
                    path,
                    records_before_failure: emitted,
                    error,
                });
                if cancelled {
                    break;
                }
            }
        }
    }

    tracing::info!(
        documents = report.documents,
        records = report.records,
        failed = report.failed.len(),
        "Extraction pass finished"
    );
    Ok(report)
}

fn drain_document<F>(
    path: &Path,
    records: impl Iterator<Item = Result<ArticleRecord>>,
    cancel_token: &CancellationToken,
    sink: &mut F,
) -> (usize, Option<Error>)
where
    F: FnMut(&Path, ArticleRecord),
{
    let mut emitted = 0;
    for record in records {
        if cancel_token.is_cancelled() {
            return (emitted, Some(Error::Cancelled));
        }
        match record {
            Ok(record) => {
                sink(path, record);
                emitted += 1;
            }
            Err(e) => return (emitted, Some(e)),
        }
    }
    (emitted, None)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatError;
    use crate::test_helpers::{Citation, article_set, citation, gzip};
    use std::path::PathBuf;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn collect(store: &LocalStore) -> (ExtractionReport, Vec<(String, String)>) {
        let mut seen = Vec::new();
        let report = extract_store(store, &CancellationToken::new(), |path, record| {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            seen.push((name, record.record_id));
        })
        .unwrap();
        (report, seen)
    }

    #[test]
    fn extracts_plain_and_compressed_documents_in_name_order() {
        let temp = tempfile::tempdir().unwrap();
        write(
            temp.path(),
            "pubmed25n0002.xml.gz",
            &gzip(article_set(&[citation("3")]).as_bytes()),
        );
        write(
            temp.path(),
            "pubmed25n0001.xml",
            article_set(&[citation("1"), citation("2")]).as_bytes(),
        );
        write(temp.path(), "pubmed25n0001.xml.gz.md5", b"checksum");
        write(temp.path(), "notes.txt", b"not a document");

        let (report, seen) = collect(&LocalStore::new(temp.path()));

        assert!(report.is_success());
        assert_eq!(report.documents, 2);
        assert_eq!(report.records, 3);
        assert_eq!(
            seen,
            vec![
                ("pubmed25n0001.xml".to_string(), "1".to_string()),
                ("pubmed25n0001.xml".to_string(), "2".to_string()),
                ("pubmed25n0002.xml.gz".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn failing_document_does_not_stop_the_pass() {
        let temp = tempfile::tempdir().unwrap();
        write(
            temp.path(),
            "pubmed25n0001.xml.gz",
            &gzip(article_set(&[citation("1"), Citation::without_pmid(), citation("3")]).as_bytes()),
        );
        let corrupt = write(temp.path(), "pubmed25n0002.xml.gz", b"not gzip");
        write(
            temp.path(),
            "pubmed25n0003.xml.gz",
            &gzip(article_set(&[citation("9")]).as_bytes()),
        );

        let (report, seen) = collect(&LocalStore::new(temp.path()));

        assert_eq!(report.documents, 3);
        assert_eq!(report.records, 2);
        let ids: Vec<&str> = seen.iter().map(|(_, id)| id.as_str()).collect();
        assert_eq!(ids, vec!["1", "9"]);

        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].records_before_failure, 1);
        assert!(matches!(
            report.failed[0].error,
            Error::MalformedRecord { index: 2, .. }
        ));
        assert_eq!(report.failed[1].path, corrupt);
        assert!(matches!(
            report.failed[1].error,
            Error::Format(FormatError::Gzip { .. })
        ));
    }

    #[test]
    fn empty_store_extracts_nothing() {
        let temp = tempfile::tempdir().unwrap();

        let (report, seen) = collect(&LocalStore::new(temp.path()));

        assert_eq!(report.documents, 0);
        assert!(seen.is_empty());
    }

    #[test]
    fn missing_store_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp.path().join("missing"));

        let result = extract_store(&store, &CancellationToken::new(), |_, _| {});

        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn cancellation_stops_between_records() {
        let temp = tempfile::tempdir().unwrap();
        write(
            temp.path(),
            "pubmed25n0001.xml",
            article_set(&[citation("1"), citation("2"), citation("3")]).as_bytes(),
        );
        write(
            temp.path(),
            "pubmed25n0002.xml",
            article_set(&[citation("4")]).as_bytes(),
        );
        let token = CancellationToken::new();
        let mut seen = Vec::new();

        let report = extract_store(&LocalStore::new(temp.path()), &token, |_, record| {
            seen.push(record.record_id);
            token.cancel();
        })
        .unwrap();

        assert_eq!(seen, vec!["1"]);
        assert_eq!(report.documents, 1, "second document is never opened");
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].error, Error::Cancelled));
        assert_eq!(report.failed[0].records_before_failure, 1);
    }
}
