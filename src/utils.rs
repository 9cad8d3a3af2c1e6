//! Utility functions for file names and path manipulation

use std::path::{Path, PathBuf};

/// Case-insensitive (ASCII) suffix check that never splits a UTF-8 character
///
/// # Examples
///
/// ```
/// use medline_dl::utils::ends_with_ignore_case;
///
/// assert!(ends_with_ignore_case("pubmed25n0001.xml.gz.MD5", ".md5"));
/// assert!(!ends_with_ignore_case("md5", ".md5"));
/// ```
#[must_use]
pub fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    let (name, suffix) = (name.as_bytes(), suffix.as_bytes());
    name.len() >= suffix.len() && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Remove `suffix` (ASCII case-insensitive) from the end of `name`
///
/// Returns `None` when `name` does not end with `suffix`.
#[must_use]
pub fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    if !ends_with_ignore_case(name, suffix) {
        return None;
    }
    // suffix is ASCII in every caller, so the cut lands on a char boundary
    name.get(..name.len() - suffix.len())
}

/// Hidden sibling path used while a download is in flight
///
/// Files whose name starts with `.` are never treated as artifacts, so a
/// temporary file can never be mistaken for a completed one.
pub(crate) fn temp_prefix(target: &Path) -> String {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(".{name}.")
}

/// Whether a directory entry name belongs to an in-flight or abandoned download
#[must_use]
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Join a remote name onto the destination directory
///
/// Only the final path component of `name` is used, so a listing entry such
/// as `../x` cannot escape the destination directory. Returns `None` when
/// `name` has no file name component at all (e.g. `..`).
pub fn target_path(dest_dir: &Path, name: &str) -> Option<PathBuf> {
    Path::new(name).file_name().map(|leaf| dest_dir.join(leaf))
}
