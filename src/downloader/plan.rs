//! Download planning: which listed names are fetched, and where they land.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::decompress::{decompressed_name, is_compressed_name};
use crate::types::{SkipReason, Skipped};
use crate::utils::{ends_with_ignore_case, target_path};

/// File-name suffix of checksum sidecars, which are never downloaded
pub const CHECKSUM_SUFFIX: &str = ".md5";

/// One name that will be fetched unless its target already exists
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FetchJob {
    pub(crate) name: String,
    pub(crate) target: PathBuf,
    /// Decompress the body on the way to disk
    pub(crate) decompress: bool,
}

/// Planning decision for one listed name
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Planned {
    Skip(Skipped),
    Fetch(FetchJob),
}

/// Decide, in listing order, what happens to every name.
///
/// Blank names and checksum sidecars are skipped. With `decompress` set, a
/// `.gz` name targets its decompressed file name. When several names map to
/// the same target, the first one in listing order is fetched and the rest
/// are skipped as [`SkipReason::DuplicateTarget`].
pub(crate) fn plan_downloads(names: &[String], dest_dir: &Path, decompress: bool) -> Vec<Planned> {
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    names
        .iter()
        .map(|name| {
            let skip = |reason| {
                Planned::Skip(Skipped {
                    name: name.clone(),
                    reason,
                })
            };

            if name.trim().is_empty() {
                return skip(SkipReason::Blank);
            }
            if ends_with_ignore_case(name, CHECKSUM_SUFFIX) {
                return skip(SkipReason::ChecksumSidecar);
            }

            let inline = decompress && is_compressed_name(name);
            let local_name = if inline {
                decompressed_name(name).unwrap_or(name)
            } else {
                name.as_str()
            };
            let Some(target) = target_path(dest_dir, local_name) else {
                return skip(SkipReason::Blank);
            };

            if !claimed.insert(target.clone()) {
                tracing::warn!(
                    name = %name,
                    target = %target.display(),
                    "Another listed file already maps to this target, skipping"
                );
                return skip(SkipReason::DuplicateTarget);
            }

            Planned::Fetch(FetchJob {
                name: name.clone(),
                target,
                decompress: inline,
            })
        })
        .collect()
}
