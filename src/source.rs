//! Remote source abstraction and its HTTP implementation.
//!
//! The downloader never talks to the network directly: it goes through a
//! [`RemoteSource`], which lists the base location and opens one remote file
//! as a byte stream. [`HttpSource`] is the production implementation; tests
//! substitute in-memory sources.

use std::io;
use std::pin::Pin;

use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::config::SourceConfig;
use crate::error::{Error, Result};

/// Raw (possibly compressed) body of one remote file
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Abstraction over the remote file listing, enabling testability.
#[async_trait::async_trait]
pub trait RemoteSource: Send + Sync {
    /// Where `name` is fetched from, for error messages and logs
    fn location(&self, name: &str) -> String;

    /// Fetch the raw listing text of the base location
    async fn list(&self) -> Result<String>;

    /// Open the body of the remote file `name`
    async fn open(&self, name: &str) -> Result<ByteStream>;
}

/// [`RemoteSource`] over HTTP(S) using `reqwest`
///
/// The listing is a GET on the base URL and must be plain text with one name
/// per line. File URLs are the base URL with the name appended.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    /// Build a source for `config.base_url`
    ///
    /// A trailing `/` is added to the base URL when missing.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut base_url = config.base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        url::Url::parse(&base_url).map_err(|e| {
            Error::config("base_url", format!("invalid URL '{}': {}", base_url, e))
        })?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {}", e),
                key: None,
            })?;

        Ok(Self { client, base_url })
    }

    /// The normalized base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.client.get(url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out: {}", e)
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                e.to_string()
            };
            Error::connection(url, reason)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::connection(url, format!("HTTP {}", status)));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl RemoteSource for HttpSource {
    fn location(&self, name: &str) -> String {
        format!("{}{}", self.base_url, name)
    }

    async fn list(&self) -> Result<String> {
        let response = self.get(&self.base_url).await?;
        response
            .text()
            .await
            .map_err(|e| Error::connection(&self.base_url, format!("failed to read listing: {}", e)))
    }

    async fn open(&self, name: &str) -> Result<ByteStream> {
        let url = self.location(name);
        let response = self.get(&url).await?;
        let body = response.bytes_stream().map_err(io::Error::other);
        Ok(Box::pin(StreamReader::new(body)))
    }
}
