//! Shared test helpers: an in-memory remote source and document builders.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::{Error, Result};
use crate::source::{ByteStream, RemoteSource};

/// Gzip-compress `data` into a single member
pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Sorted names of every entry in `dir`, hidden ones included
pub(crate) fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// How a mock file responds to `open`
#[derive(Clone)]
enum MockBody {
    Bytes(Vec<u8>),
    /// Yields the bytes, then fails instead of reaching EOF
    Truncated(Vec<u8>),
    /// Never yields a byte
    Stalled,
    /// `open` itself fails
    Refused,
}

/// In-memory [`RemoteSource`] that records requests and in-flight downloads
#[derive(Clone)]
pub(crate) struct MockSource {
    listing: Option<String>,
    files: HashMap<String, MockBody>,
    delay: Duration,
    requested: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockSource {
    pub(crate) fn new() -> Self {
        Self {
            listing: Some(String::new()),
            files: HashMap::new(),
            delay: Duration::ZERO,
            requested: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_listing(mut self, text: &str) -> Self {
        self.listing = Some(text.to_string());
        self
    }

    pub(crate) fn with_listing_unreachable(mut self) -> Self {
        self.listing = None;
        self
    }

    pub(crate) fn with_file(mut self, name: &str, body: Vec<u8>) -> Self {
        self.files.insert(name.to_string(), MockBody::Bytes(body));
        self
    }

    pub(crate) fn with_truncated_file(mut self, name: &str, partial: Vec<u8>) -> Self {
        self.files
            .insert(name.to_string(), MockBody::Truncated(partial));
        self
    }

    pub(crate) fn with_stalled_file(mut self, name: &str) -> Self {
        self.files.insert(name.to_string(), MockBody::Stalled);
        self
    }

    pub(crate) fn with_refused_file(mut self, name: &str) -> Self {
        self.files.insert(name.to_string(), MockBody::Refused);
        self
    }

    /// Hold every `open` for `delay` before returning the body
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Names passed to `open`, in request order
    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    /// Highest number of downloads that were open at the same time
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Downloads currently open
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteSource for MockSource {
    fn location(&self, name: &str) -> String {
        format!("mock://baseline/{name}")
    }

    async fn list(&self) -> Result<String> {
        self.listing
            .clone()
            .ok_or_else(|| Error::connection("mock://baseline/", "connection refused"))
    }

    async fn open(&self, name: &str) -> Result<ByteStream> {
        self.requested.lock().unwrap().push(name.to_string());

        // Counted from the request until the body is dropped
        let guard = InFlightGuard::enter(&self.in_flight, &self.max_in_flight);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let body = match self.files.get(name) {
            Some(MockBody::Bytes(data)) => TrackedBody::new(data.clone(), false, false, guard),
            Some(MockBody::Truncated(data)) => TrackedBody::new(data.clone(), true, false, guard),
            Some(MockBody::Stalled) => TrackedBody::new(Vec::new(), false, true, guard),
            Some(MockBody::Refused) => {
                return Err(Error::connection(self.location(name), "HTTP 550"));
            }
            None => return Err(Error::connection(self.location(name), "HTTP 404")),
        };
        Ok(Box::pin(body))
    }
}

struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl InFlightGuard {
    fn enter(in_flight: &Arc<AtomicUsize>, max_in_flight: &Arc<AtomicUsize>) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self {
            in_flight: in_flight.clone(),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct TrackedBody {
    data: Vec<u8>,
    pos: usize,
    fail_at_end: bool,
    stall: bool,
    _guard: InFlightGuard,
}

impl TrackedBody {
    fn new(data: Vec<u8>, fail_at_end: bool, stall: bool, guard: InFlightGuard) -> Self {
        Self {
            data,
            pos: 0,
            fail_at_end,
            stall,
            _guard: guard,
        }
    }
}

impl AsyncRead for TrackedBody {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.stall {
            return Poll::Pending;
        }
        let remaining = &this.data[this.pos..];
        if remaining.is_empty() {
            if this.fail_at_end {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
            return Poll::Ready(Ok(()));
        }
        // Small chunks so copies take several polls
        let n = remaining.len().min(buf.remaining()).min(4096);
        buf.put_slice(&remaining[..n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// One `MedlineCitation` for [`article_set`]
#[derive(Clone, Debug, Default)]
pub(crate) struct Citation {
    pmid: Option<String>,
    keywords: Vec<String>,
    publication_types: Vec<String>,
}

pub(crate) fn citation(pmid: &str) -> Citation {
    Citation {
        pmid: Some(pmid.to_string()),
        ..Default::default()
    }
}

impl Citation {
    pub(crate) fn without_pmid() -> Self {
        Self::default()
    }

    pub(crate) fn keyword(mut self, keyword: &str) -> Self {
        self.keywords.push(keyword.to_string());
        self
    }

    pub(crate) fn publication_type(mut self, publication_type: &str) -> Self {
        self.publication_types.push(publication_type.to_string());
        self
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render a baseline-style `PubmedArticleSet` document
pub(crate) fn article_set(citations: &[Citation]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <!DOCTYPE PubmedArticleSet PUBLIC \"-//NLM//DTD PubMedArticle, 1st January 2025//EN\" \
         \"https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_250101.dtd\">\n\
         <PubmedArticleSet>\n",
    );
    for c in citations {
        xml.push_str("  <PubmedArticle>\n");
        xml.push_str("    <MedlineCitation Status=\"MEDLINE\" Owner=\"NLM\">\n");
        if let Some(pmid) = &c.pmid {
            xml.push_str(&format!("      <PMID Version=\"1\">{}</PMID>\n", escape(pmid)));
        }
        xml.push_str("      <Article PubModel=\"Print\">\n");
        xml.push_str("        <ArticleTitle>A study.</ArticleTitle>\n");
        xml.push_str("        <PublicationTypeList>\n");
        for t in &c.publication_types {
            xml.push_str(&format!(
                "          <PublicationType UI=\"D016428\">{}</PublicationType>\n",
                escape(t)
            ));
        }
        xml.push_str("        </PublicationTypeList>\n");
        xml.push_str("      </Article>\n");
        if !c.keywords.is_empty() {
            xml.push_str("      <KeywordList Owner=\"NOTNLM\">\n");
            for k in &c.keywords {
                xml.push_str(&format!(
                    "        <Keyword MajorTopicYN=\"N\">{}</Keyword>\n",
                    escape(k)
                ));
            }
            xml.push_str("      </KeywordList>\n");
        }
        xml.push_str("    </MedlineCitation>\n");
        xml.push_str("    <PubmedData><ArticleIdList><ArticleId IdType=\"pubmed\">0</ArticleId></ArticleIdList></PubmedData>\n");
        xml.push_str("  </PubmedArticle>\n");
    }
    xml.push_str("</PubmedArticleSet>\n");
    xml
}
