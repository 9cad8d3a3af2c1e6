//! Remote listing retrieval and splitting.

use crate::error::Result;
use crate::source::RemoteSource;

/// Fetch the listing from `source` and split it into names.
///
/// Fails with [`Error::Connection`](crate::Error::Connection) when the listing
/// cannot be retrieved. Not retried.
pub async fn fetch_listing(source: &dyn RemoteSource) -> Result<Vec<String>> {
    let text = source.list().await?;
    let names = split_listing(&text);
    tracing::info!(entries = names.len(), "Fetched remote listing");
    Ok(names)
}

/// Split listing text on CRLF, CR, and LF.
///
/// Order is preserved and empty entries are kept, including the trailing
/// one produced by a final line terminator.
///
/// ```
/// use medline_dl::listing::split_listing;
///
/// assert_eq!(split_listing("a\r\nb\rc\n"), vec!["a", "b", "c", ""]);
/// ```
pub fn split_listing(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(['\r', '\n']) {
        names.push(rest[..pos].to_string());
        let terminator = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + terminator..];
    }
    names.push(rest.to_string());
    names
}
