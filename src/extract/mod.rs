//! Streaming record extraction from MEDLINE citation documents.
//!
//! Documents are read with a pull parser, so memory use does not grow with
//! document size. Each `MedlineCitation` element directly under
//! `PubmedArticleSet/PubmedArticle` becomes one [`ArticleRecord`]:
//!
//! - `PMID` (first direct child) is the record identifier
//! - `KeywordList/Keyword` gives the keywords
//! - `Article/PublicationTypeList/PublicationType` gives the publication types
//!
//! Field text is the concatenation of all descendant text and CDATA, with
//! entities unescaped and surrounding whitespace kept.

mod pass;

pub use pass::extract_store;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::decompress::{GzipStream, decompress, is_compressed_name};
use crate::error::{Error, FormatError, Result};
use crate::types::ArticleRecord;

/// Element path of a record node
const RECORD_PATH: &[&[u8]] = &[b"PubmedArticleSet", b"PubmedArticle", b"MedlineCitation"];

/// Field paths, relative to the record node
const IDENTIFIER_PATH: &[&[u8]] = &[b"PMID"];
const KEYWORD_PATH: &[&[u8]] = &[b"KeywordList", b"Keyword"];
const PUBLICATION_TYPE_PATH: &[&[u8]] = &[b"Article", b"PublicationTypeList", b"PublicationType"];

const READ_BUFFER_SIZE: usize = 1024 * 1024; // 1MB buffer

/// A document byte stream, decompressed on the fly when needed
pub enum Document<R> {
    /// Uncompressed markup
    Plain(BufReader<R>),
    /// Gzip-compressed markup
    Gzip(BufReader<GzipStream<R>>),
}

impl<R: Read> Document<R> {
    /// Wrap `reader`, decompressing it when `is_compressed`
    pub fn new(reader: R, is_compressed: bool) -> Self {
        if is_compressed {
            Document::Gzip(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                decompress(reader),
            ))
        } else {
            Document::Plain(BufReader::with_capacity(READ_BUFFER_SIZE, reader))
        }
    }
}

impl<R: Read> Read for Document<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Document::Plain(r) => r.read(buf),
            Document::Gzip(r) => r.read(buf),
        }
    }
}

impl<R: Read> BufRead for Document<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Document::Plain(r) => r.fill_buf(),
            Document::Gzip(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Document::Plain(r) => r.consume(amt),
            Document::Gzip(r) => r.consume(amt),
        }
    }
}

/// Extract records from `reader`, decompressing first when `is_compressed`.
///
/// Nothing is read until the returned iterator is advanced.
///
/// # Examples
///
/// ```
/// use medline_dl::extract::extract_records;
///
/// let xml = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation>
///     <PMID>12345</PMID>
///     <Article><PublicationTypeList>
///         <PublicationType>Review</PublicationType>
///     </PublicationTypeList></Article>
///     <KeywordList><Keyword>alpha</Keyword><Keyword>beta</Keyword></KeywordList>
/// </MedlineCitation></PubmedArticle></PubmedArticleSet>"#;
///
/// let records: Vec<_> = extract_records(xml.as_bytes(), false)
///     .collect::<Result<_, _>>()
///     .unwrap();
///
/// assert_eq!(records[0].record_id, "12345");
/// assert_eq!(records[0].keywords, vec!["alpha", "beta"]);
/// assert_eq!(records[0].publication_types, vec!["Review"]);
/// ```
pub fn extract_records<R: Read>(reader: R, is_compressed: bool) -> Records<Document<R>> {
    Records::from_reader(Document::new(reader, is_compressed))
}

/// Open the document at `path` for extraction.
///
/// The document is treated as compressed iff its name ends with `.gz`.
pub fn open_document(path: &Path) -> Result<Records<Document<File>>> {
    let file = File::open(path)?;
    let is_compressed = path
        .file_name()
        .map(|n| is_compressed_name(&n.to_string_lossy()))
        .unwrap_or(false);
    Ok(extract_records(file, is_compressed))
}

/// Which record field a text capture feeds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Identifier,
    Keyword,
    PublicationType,
}

/// Text being collected for one field element
struct Capture {
    field: Field,
    /// Stack depth of the field element
    depth: usize,
    text: String,
}

/// Record node under construction
#[derive(Default)]
struct PartialRecord {
    record_id: Option<String>,
    keywords: Vec<String>,
    publication_types: Vec<String>,
}

/// Element stack and the record node being built
#[derive(Default)]
struct Walker {
    /// Names of the currently open elements, outermost first
    stack: Vec<Vec<u8>>,
    seen_root: bool,
    /// Record nodes opened so far (1-based index of the current one)
    index: usize,
    current: Option<PartialRecord>,
    capture: Option<Capture>,
}

impl Walker {
    /// Push an element, starting a record node or a field capture when the path matches.
    fn open(&mut self, name: &[u8], position: u64) -> Result<()> {
        if self.stack.is_empty() {
            if self.seen_root {
                return Err(markup(position, "document has more than one root element"));
            }
            self.seen_root = true;
        }
        self.stack.push(name.to_vec());

        if path_is(&self.stack, RECORD_PATH) {
            self.index += 1;
            self.current = Some(PartialRecord::default());
            return Ok(());
        }
        let Some(record) = &self.current else {
            return Ok(());
        };
        if self.capture.is_some() {
            return Ok(());
        }

        let relative = &self.stack[RECORD_PATH.len()..];
        let field = if path_is(relative, IDENTIFIER_PATH) && record.record_id.is_none() {
            Field::Identifier
        } else if path_is(relative, KEYWORD_PATH) {
            Field::Keyword
        } else if path_is(relative, PUBLICATION_TYPE_PATH) {
            Field::PublicationType
        } else {
            return Ok(());
        };
        self.capture = Some(Capture {
            field,
            depth: self.stack.len(),
            text: String::new(),
        });
        Ok(())
    }

    /// Pop the innermost element, finishing a field or a record node.
    fn close(&mut self) -> Result<Option<ArticleRecord>> {
        let depth = self.stack.len();
        self.stack.pop();

        if self.capture.as_ref().is_some_and(|c| c.depth == depth) {
            if let (Some(capture), Some(record)) = (self.capture.take(), self.current.as_mut()) {
                match capture.field {
                    Field::Identifier => record.record_id = Some(capture.text),
                    Field::Keyword => record.keywords.push(capture.text),
                    Field::PublicationType => record.publication_types.push(capture.text),
                }
            }
        }

        if depth != RECORD_PATH.len() {
            return Ok(None);
        }
        let Some(partial) = self.current.take() else {
            return Ok(None);
        };

        match partial.record_id {
            Some(id) if !id.trim().is_empty() => Ok(Some(ArticleRecord {
                record_id: id,
                keywords: partial.keywords,
                publication_types: partial.publication_types,
            })),
            Some(_) => Err(Error::MalformedRecord {
                index: self.index,
                reason: "empty PMID".into(),
            }),
            None => Err(Error::MalformedRecord {
                index: self.index,
                reason: "missing PMID".into(),
            }),
        }
    }

    fn text(&mut self, text: &str, position: u64) -> Result<()> {
        if self.stack.is_empty() {
            if !text.trim().is_empty() {
                return Err(markup(position, "text outside the root element"));
            }
        } else if let Some(capture) = &mut self.capture {
            capture.text.push_str(text);
        }
        Ok(())
    }
}

/// Lazy iterator over the records of one document
///
/// Yields `Err` at most once: after a malformed record or a markup error the
/// iterator is exhausted. Records yielded before the error stay valid.
pub struct Records<B: BufRead> {
    reader: Reader<B>,
    buf: Vec<u8>,
    walker: Walker,
    finished: bool,
}

impl<B: BufRead> Records<B> {
    /// Extract from an already decompressed markup stream
    pub fn from_reader(reader: B) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            buf: Vec::with_capacity(8192),
            walker: Walker::default(),
            finished: false,
        }
    }

    /// Records started so far, including a malformed one
    pub fn records_seen(&self) -> usize {
        self.walker.index
    }

    fn next_record(&mut self) -> Result<Option<ArticleRecord>> {
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => return Err(xml_error(e, self.reader.error_position())),
            };
            let position = self.reader.buffer_position();

            match event {
                Event::Start(e) => self.walker.open(e.name().as_ref(), position)?,
                Event::Empty(e) => {
                    self.walker.open(e.name().as_ref(), position)?;
                    if let Some(record) = self.walker.close()? {
                        return Ok(Some(record));
                    }
                }
                Event::End(_) => {
                    if let Some(record) = self.walker.close()? {
                        return Ok(Some(record));
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|err| markup(position, err))?;
                    self.walker.text(&text, position)?;
                }
                Event::CData(e) => {
                    if self.walker.stack.is_empty() {
                        return Err(markup(position, "CDATA outside the root element"));
                    }
                    let text = std::str::from_utf8(&e).map_err(|err| markup(position, err))?;
                    self.walker.text(text, position)?;
                }
                Event::Eof => {
                    if let Some(open) = self.walker.stack.last() {
                        return Err(markup(
                            position,
                            format!(
                                "unexpected end of document, <{}> is not closed",
                                String::from_utf8_lossy(open)
                            ),
                        ));
                    }
                    if !self.walker.seen_root {
                        return Err(markup(position, "document has no root element"));
                    }
                    return Ok(None);
                }
                // Declarations, comments, processing instructions, DOCTYPE
                _ => {}
            }
        }
    }
}

fn path_is(stack: &[Vec<u8>], path: &[&[u8]]) -> bool {
    stack.len() == path.len() && stack.iter().zip(path).all(|(a, b)| a.as_slice() == *b)
}

fn markup(position: u64, reason: impl ToString) -> Error {
    Error::Format(FormatError::Markup {
        position,
        reason: reason.to_string(),
    })
}

/// Map a parser error; read failures keep their own classification.
fn xml_error(err: quick_xml::Error, position: u64) -> Error {
    match err {
        quick_xml::Error::Io(io) => match Arc::try_unwrap(io) {
            Ok(io) => Error::from_io(io),
            Err(shared) => Error::Io(io::Error::new(shared.kind(), shared.to_string())),
        },
        other => markup(position, other),
    }
}

impl<B: BufRead> Iterator for Records<B> {
    type Item = Result<ArticleRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl<B: BufRead> std::iter::FusedIterator for Records<B> {}
