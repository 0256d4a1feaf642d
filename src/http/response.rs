//! Response assembly.
//!
//! # Responsibilities
//! - Combine the parsed header block with the captured body sink
//! - Expose the body as a rewound, seekable stream
//! - Keep the reason phrase the server actually sent
//!
//! # Design Decisions
//! - The body is never copied into memory; the response owns the sink
//! - Assembly takes the sink by value, so the handle that captured it is
//!   left with an empty slot for its next transfer

use std::io::{self, Read, Seek, SeekFrom};

use thiserror::Error;

use crate::http::headers::{HeaderParseError, ParsedHead};
use crate::http::sink::BodySink;

/// Response type produced by every transfer.
pub type Response = http::Response<ResponseBody>;

/// Reason phrase from the status line, stored as a response extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPhrase(String);

impl ReasonPhrase {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Errors raised while assembling a response.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Failed to parse response headers: {0}")]
    Headers(#[from] HeaderParseError),

    #[error("Failed to read captured body: {0}")]
    Body(#[from] io::Error),
}

/// Response body backed by the transfer's body sink.
#[derive(Debug)]
pub struct ResponseBody {
    sink: BodySink,
    size: u64,
}

impl ResponseBody {
    /// Wrap a sink, rewinding it to the start.
    pub fn new(mut sink: BodySink) -> io::Result<Self> {
        let size = sink.len()?;
        sink.seek(SeekFrom::Start(0))?;
        Ok(Self { sink, size })
    }

    pub fn size(&self) -> Option<u64> {
        Some(self.size)
    }

    pub fn is_seekable(&self) -> bool {
        true
    }

    /// Whether the captured body spilled out of memory.
    pub fn is_spilled(&self) -> bool {
        self.sink.is_spilled()
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.sink.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Read the remaining body into memory.
    pub fn bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.sink.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read the remaining body as UTF-8 text.
    pub fn text(&mut self) -> io::Result<String> {
        let mut text = String::new();
        self.sink.read_to_string(&mut text)?;
        Ok(text)
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.sink.read(buf)
    }
}

impl Seek for ResponseBody {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.sink.seek(pos)
    }
}

/// Build a response from the parsed head and the captured body.
pub fn assemble(head: ParsedHead, sink: BodySink) -> Result<Response, AssemblyError> {
    let body = ResponseBody::new(sink)?;

    let mut response = http::Response::new(body);
    *response.status_mut() = head.status;
    *response.version_mut() = head.version;
    *response.headers_mut() = head.headers;
    response.extensions_mut().insert(ReasonPhrase(head.reason));

    Ok(response)
}

/// Reason phrase of a response, falling back to the canonical one.
pub fn reason_phrase<B>(response: &http::Response<B>) -> &str {
    response
        .extensions()
        .get::<ReasonPhrase>()
        .map(ReasonPhrase::as_str)
        .filter(|reason| !reason.is_empty())
        .or_else(|| response.status().canonical_reason())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::headers::HeaderCodec;
    use std::io::Write;

    fn head(lines: &[&str]) -> ParsedHead {
        let mut codec = HeaderCodec::new();
        for line in lines {
            codec.handle_line(line.as_bytes());
        }
        codec.finalize().unwrap()
    }

    #[test]
    fn test_assemble_rewinds_body() {
        let mut sink = BodySink::new(1024);
        sink.write_all(b"hello world").unwrap();

        let mut response = assemble(
            head(&["HTTP/1.1 200 Fine", "Content-Type: text/plain", ""]),
            sink,
        )
        .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(reason_phrase(&response), "Fine");
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(response.body().size(), Some(11));
        assert_eq!(response.body_mut().text().unwrap(), "hello world");

        response.body_mut().rewind().unwrap();
        assert_eq!(response.body_mut().bytes().unwrap(), b"hello world");
    }

    #[test]
    fn test_reason_falls_back_to_canonical() {
        let response = assemble(head(&["HTTP/2 404", ""]), BodySink::new(16)).unwrap();
        assert_eq!(response.version(), http::Version::HTTP_2);
        assert_eq!(reason_phrase(&response), "Not Found");
    }

    #[test]
    fn test_closed_sink_fails_assembly() {
        let mut sink = BodySink::new(16);
        sink.close();
        let result = assemble(head(&["HTTP/1.1 200 OK", ""]), sink);
        assert!(matches!(result, Err(AssemblyError::Body(_))));
    }
}
