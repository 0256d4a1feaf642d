//! Response header codec.
//!
//! # Responsibilities
//! - Accumulate raw header lines as the engine delivers them
//! - Keep only the final response's header block
//! - Parse the surviving block into status, reason and a multi-valued map
//!
//! # State Machine
//! ```text
//! Collecting --(blank line)--> BlockEnded
//! BlockEnded --(blank line)--> BlockEnded
//! BlockEnded --(status line)--> Collecting   [buffer reset to that line]
//! ```
//! A header block followed by another status line belongs to an interim
//! (1xx) or superseded (redirect) response and is discarded.
//!
//! # Design Decisions
//! - Parsing happens once, at finalization, never per line
//! - Finalization does not mutate the buffer, so it is repeatable
//! - Duplicate header names are appended in arrival order, never overwritten
//! - Lines are kept as raw bytes; obs-text values pass through unchanged

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode, Version};
use thiserror::Error;

/// Where the codec is relative to header block boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Inside a header block.
    Collecting,
    /// A blank line ended the last block; the next status line starts a new response.
    BlockEnded,
}

/// Errors raised while parsing the final header block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderParseError {
    #[error("No response headers were received")]
    Empty,

    #[error("Malformed status line '{0}'")]
    MalformedStatusLine(String),

    #[error("Invalid status code in '{0}'")]
    InvalidStatus(String),

    #[error("Invalid header line '{0}'")]
    InvalidHeader(String),
}

/// Parsed status line and headers of the final response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHead {
    pub version: Version,
    pub status: StatusCode,
    pub reason: String,
    pub headers: HeaderMap,
}

/// Accumulates raw header lines for one transfer.
#[derive(Debug, Clone)]
pub struct HeaderCodec {
    lines: Vec<Vec<u8>>,
    state: BlockState,
}

impl HeaderCodec {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            state: BlockState::Collecting,
        }
    }

    /// Header callback. Returns the number of bytes consumed, which is
    /// always the full length handed in; a short count aborts the transfer.
    pub fn handle_line(&mut self, raw: &[u8]) -> usize {
        let line = raw.trim_ascii().to_vec();

        match self.state {
            BlockState::BlockEnded if !line.is_empty() => {
                self.lines.clear();
                self.lines.push(line);
                self.state = BlockState::Collecting;
            }
            BlockState::BlockEnded => self.lines.push(line),
            BlockState::Collecting => {
                if line.is_empty() {
                    self.state = BlockState::BlockEnded;
                }
                self.lines.push(line);
            }
        }

        raw.len()
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    /// Raw lines of the current (latest) header block.
    pub fn lines(&self) -> &[Vec<u8>] {
        &self.lines
    }

    pub fn reset(&mut self) {
        self.lines.clear();
        self.state = BlockState::Collecting;
    }

    /// Parse the buffered block.
    pub fn finalize(&self) -> Result<ParsedHead, HeaderParseError> {
        let mut lines = self.lines.iter();
        let status_line = lines.next().ok_or(HeaderParseError::Empty)?;
        let (version, status, reason) = parse_status_line(&String::from_utf8_lossy(status_line))?;

        let mut headers = HeaderMap::new();
        for line in lines.filter(|line| !line.is_empty()) {
            let invalid = || HeaderParseError::InvalidHeader(String::from_utf8_lossy(line).into_owned());
            let Some((name, value)) = split_header_line(line) else {
                tracing::trace!(line = %String::from_utf8_lossy(line), "Skipping header line without a colon");
                continue;
            };
            let name = HeaderName::from_bytes(name).map_err(|_| invalid())?;
            let value = HeaderValue::from_bytes(value).map_err(|_| invalid())?;
            headers.append(name, value);
        }

        Ok(ParsedHead {
            version,
            status,
            reason,
            headers,
        })
    }
}

impl Default for HeaderCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a `Name: value` line at the first colon, trimming both halves.
pub(crate) fn split_header_line(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = line.iter().position(|&b| b == b':')?;
    Some((line[..colon].trim_ascii(), line[colon + 1..].trim_ascii()))
}

fn parse_status_line(line: &str) -> Result<(Version, StatusCode, String), HeaderParseError> {
    let malformed = || HeaderParseError::MalformedStatusLine(line.to_string());

    let mut parts = line.splitn(3, ' ');
    let protocol = parts.next().ok_or_else(malformed)?;
    let code = parts.next().ok_or_else(malformed)?;
    let reason = parts.next().unwrap_or("").trim().to_string();

    let version = match protocol.strip_prefix("HTTP/").ok_or_else(malformed)? {
        "0.9" => Version::HTTP_09,
        "1.0" => Version::HTTP_10,
        "1.1" => Version::HTTP_11,
        "2" | "2.0" => Version::HTTP_2,
        "3" | "3.0" => Version::HTTP_3,
        _ => return Err(malformed()),
    };

    let status = code
        .parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| HeaderParseError::InvalidStatus(line.to_string()))?;

    Ok((version, status, reason))
}
