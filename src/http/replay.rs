//! Replay a response to the calling process's own output.
//!
//! # Responsibilities
//! - Emit the status line and every header value
//! - Stream the body in fixed-size chunks without loading it whole
//! - Respect `Content-Length` (or the body's size) to avoid over-reading
//!
//! # Design Decisions
//! - 204/205/304 never emit body bytes, whatever the body holds
//! - A downstream that went away (broken pipe, reset) ends the replay quietly

use std::io::{self, Read, Write};

use http::{header, StatusCode, Version};

use crate::http::response::{reason_phrase, Response};

/// Body chunk size used while replaying.
pub const CHUNK_SIZE: usize = 8192;

/// Writes responses to an output stream.
#[derive(Debug)]
pub struct Responder<W> {
    out: W,
}

impl<W: Write> Responder<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write the whole response: head, then body.
    pub fn send(&mut self, response: &mut Response) -> io::Result<()> {
        match self.send_inner(response) {
            Err(err) if is_disconnect(&err) => {
                tracing::debug!(error = %err, "Downstream closed, stopping replay");
                Ok(())
            }
            result => result,
        }
    }

    fn send_inner(&mut self, response: &mut Response) -> io::Result<()> {
        self.write_head(response)?;

        if matches!(
            response.status(),
            StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT | StatusCode::NOT_MODIFIED
        ) {
            return self.out.flush();
        }

        let budget = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .or_else(|| response.body().size());

        let body = response.body_mut();
        if body.is_seekable() {
            body.rewind()?;
        }
        self.write_body(body, budget)?;
        self.out.flush()
    }

    fn write_head(&mut self, response: &Response) -> io::Result<()> {
        write!(
            self.out,
            "{} {} {}\r\n",
            version_label(response.version()),
            response.status().as_u16(),
            reason_phrase(response)
        )?;
        for (name, value) in response.headers() {
            self.out.write_all(name.as_str().as_bytes())?;
            self.out.write_all(b": ")?;
            self.out.write_all(value.as_bytes())?;
            self.out.write_all(b"\r\n")?;
        }
        self.out.write_all(b"\r\n")
    }

    fn write_body<R: Read>(&mut self, body: &mut R, budget: Option<u64>) -> io::Result<()> {
        let mut buf = [0u8; CHUNK_SIZE];
        let mut remaining = budget;

        loop {
            let want = match remaining {
                Some(0) => break,
                Some(left) => left.min(CHUNK_SIZE as u64) as usize,
                None => CHUNK_SIZE,
            };
            let read = match body.read(&mut buf[..want]) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            self.out.write_all(&buf[..read])?;
            if let Some(left) = remaining.as_mut() {
                *left -= read as u64;
            }
        }
        Ok(())
    }
}

pub(crate) fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}
