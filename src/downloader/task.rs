//! Single-file download: fetch one remote name into its target path.
//!
//! The body is written to a hidden temporary file next to the target and
//! renamed onto the target only after the last byte is on disk, so an
//! interrupted download never leaves a file the next run would mistake for a
//! complete artifact.

use std::io::{Read, Write};
use std::path::Path;

use futures::StreamExt;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::io::{ReaderStream, StreamReader, SyncIoBridge};
use tokio_util::sync::CancellationToken;

use crate::decompress::decompress;
use crate::error::{Error, Result};
use crate::source::{ByteStream, RemoteSource};
use crate::utils::temp_prefix;

use super::plan::FetchJob;

/// Suffix of in-flight temporary files
const PART_SUFFIX: &str = ".part";

/// Copy buffer for the blocking (decompressing) path
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Fetch `job.name` from `source` and place it at `job.target`.
///
/// Returns the number of bytes written to the target. On error or
/// cancellation the temporary file is removed and the target is untouched.
pub(super) async fn fetch_to_target(
    source: &dyn RemoteSource,
    job: &FetchJob,
    cancel_token: &CancellationToken,
) -> Result<u64> {
    let dir = job.target.parent().unwrap_or(Path::new("."));
    let temp = tempfile::Builder::new()
        .prefix(&temp_prefix(&job.target))
        .suffix(PART_SUFFIX)
        .tempfile_in(dir)?;

    let body = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => return Err(Error::Cancelled),
        body = source.open(&job.name) => body?,
    };

    let (temp, bytes) = if job.decompress {
        write_decompressed(body, temp, cancel_token.clone()).await?
    } else {
        write_plain(body, temp, cancel_token).await?
    };

    place(temp, &job.target)?;
    Ok(bytes)
}

/// Stream the body verbatim into the temporary file.
async fn write_plain(
    mut body: ByteStream,
    temp: NamedTempFile,
    cancel_token: &CancellationToken,
) -> Result<(NamedTempFile, u64)> {
    let mut file = tokio::fs::File::from_std(temp.as_file().try_clone()?);

    let bytes = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => return Err(Error::Cancelled),
        copied = tokio::io::copy(&mut body, &mut file) => copied.map_err(Error::from_io)?,
    };
    file.flush().await?;
    file.sync_all().await?;

    Ok((temp, bytes))
}

/// Stream the body through the gzip decompressor into the temporary file.
///
/// flate2 decodes synchronously, so the copy runs on the blocking pool with
/// the async body bridged to `std::io::Read`. The body ends early once the
/// token is cancelled, so a stalled read cannot pin the blocking thread. The
/// task is always awaited so the temporary file is gone by the time an error
/// is returned.
async fn write_decompressed(
    body: ByteStream,
    temp: NamedTempFile,
    cancel_token: CancellationToken,
) -> Result<(NamedTempFile, u64)> {
    let body = ReaderStream::new(body).take_until(cancel_token.clone().cancelled_owned());
    let reader = SyncIoBridge::new(Box::pin(StreamReader::new(body)));
    let token = cancel_token.clone();

    let result = tokio::task::spawn_blocking(move || -> Result<(NamedTempFile, u64)> {
        let mut temp = temp;
        let bytes = copy_cancellable(decompress(reader), temp.as_file_mut(), &token)?;
        temp.as_file().sync_all()?;
        Ok((temp, bytes))
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(format!("decompression task failed: {}", e))))?;

    // A body cut short by cancellation looks like a truncated (or empty) stream
    if cancel_token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    result
}

fn copy_cancellable(
    mut reader: impl Read,
    writer: &mut impl Write,
    cancel_token: &CancellationToken,
) -> Result<u64> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        if cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::from_io(e)),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    writer.flush()?;
    Ok(total)
}

/// Atomically rename the finished temporary file onto `target`.
///
/// Never overwrites: if something appeared at `target` in the meantime the
/// temporary file is discarded and [`Error::TargetExists`] is returned.
fn place(temp: NamedTempFile, target: &Path) -> Result<()> {
    temp.persist_noclobber(target).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            Error::TargetExists {
                path: target.to_path_buf(),
            }
        } else {
            Error::Io(e.error)
        }
    })?;
    Ok(())
}
