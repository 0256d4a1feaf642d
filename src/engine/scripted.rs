//! In-memory engine for unit tests.
//!
//! Answers every transfer locally: `200 OK` with a body echoing the request
//! body (or `METHOD /path` when there is none). Hosts containing `fail`
//! produce a transport error; the path `/redirect` answers with a `302`
//! block before the final one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::engine::{Completion, Engine, MultiTransport, PerformStatus, Transport, TransferInfo, TransportError};
use crate::error::{ConfigurationError, RegistrationError};
use crate::transfer::config::BodyStrategy;
use crate::transfer::handle::{TransferHandle, TransferId};

#[derive(Debug, Default)]
struct Counters {
    transfers: AtomicUsize,
    removals: AtomicUsize,
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedEngine {
    http2: bool,
    ignore_remove: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Self {
        Self {
            http2: true,
            ignore_remove: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
        }
    }

    pub(crate) fn without_http2() -> Self {
        Self {
            http2: false,
            ..Self::new()
        }
    }

    /// Make `remove` a no-op so removed transfers still complete.
    pub(crate) fn ignore_removals(&self) {
        self.ignore_remove.store(true, Ordering::SeqCst);
    }

    /// Transfers actually executed.
    pub(crate) fn transfers(&self) -> usize {
        self.counters.transfers.load(Ordering::SeqCst)
    }

    pub(crate) fn removals(&self) -> usize {
        self.counters.removals.load(Ordering::SeqCst)
    }
}

impl Engine for ScriptedEngine {
    fn supports_http2(&self) -> bool {
        self.http2
    }

    fn easy(&self) -> Result<Box<dyn Transport>, ConfigurationError> {
        Ok(Box::new(ScriptedTransport {
            counters: self.counters.clone(),
        }))
    }

    fn multi(&self) -> Result<Box<dyn MultiTransport>, ConfigurationError> {
        Ok(Box::new(ScriptedMulti {
            ignore_remove: self.ignore_remove.clone(),
            counters: self.counters.clone(),
            queued: VecDeque::new(),
            completed: VecDeque::new(),
        }))
    }
}

struct ScriptedTransport {
    counters: Arc<Counters>,
}

impl Transport for ScriptedTransport {
    fn perform(&mut self, handle: &mut TransferHandle) -> Result<TransferInfo, TransportError> {
        self.counters.transfers.fetch_add(1, Ordering::SeqCst);
        run(handle)
    }
}

/// Completes at most one queued transfer per `perform`.
struct ScriptedMulti {
    ignore_remove: Arc<AtomicBool>,
    counters: Arc<Counters>,
    queued: VecDeque<TransferHandle>,
    completed: VecDeque<Completion>,
}

impl MultiTransport for ScriptedMulti {
    fn add(&mut self, handle: TransferHandle) -> Result<(), RegistrationError> {
        let id = handle.id();
        if self.queued.iter().any(|queued| queued.id() == id) {
            return Err(RegistrationError::Duplicate(id));
        }
        self.queued.push_back(handle);
        Ok(())
    }

    fn remove(&mut self, id: TransferId) -> bool {
        self.counters.removals.fetch_add(1, Ordering::SeqCst);
        if self.ignore_remove.load(Ordering::SeqCst) {
            return false;
        }
        let before = self.queued.len() + self.completed.len();
        self.queued.retain(|handle| handle.id() != id);
        self.completed.retain(|completion| completion.handle.id() != id);
        before != self.queued.len() + self.completed.len()
    }

    fn perform(&mut self) -> PerformStatus {
        if let Some(mut handle) = self.queued.pop_front() {
            self.counters.transfers.fetch_add(1, Ordering::SeqCst);
            let result = run(&mut handle);
            self.completed.push_back(Completion { handle, result });
        }
        PerformStatus {
            active: self.queued.len(),
            call_again: false,
        }
    }

    fn info_read(&mut self) -> Option<Completion> {
        self.completed.pop_front()
    }
}

fn run(handle: &mut TransferHandle) -> Result<TransferInfo, TransportError> {
    let Some(config) = handle.config() else {
        return Err(TransportError::new("Transfer handle is not configured"));
    };
    let method = config.method.clone();
    let url = config.url.clone();
    let nobody = config.nobody;
    let host = url.host().unwrap_or_default().to_string();
    if host.contains("fail") {
        return Err(TransportError::new(format!("Could not resolve host: {host}")));
    }

    let upload = match handle.take_body() {
        BodyStrategy::None => Vec::new(),
        BodyStrategy::Inline(bytes) => bytes.to_vec(),
        BodyStrategy::Streamed(mut source) => {
            let mut out = Vec::new();
            while let Some(chunk) = source
                .read_chunk()
                .map_err(|err| TransportError::new(err.to_string()))?
            {
                out.extend_from_slice(&chunk);
            }
            out
        }
    };
    let bytes_uploaded = upload.len() as u64;
    let body = if upload.is_empty() {
        format!("{} {}", method, url.path()).into_bytes()
    } else {
        upload
    };

    if url.path() == "/redirect" {
        handle.on_header_line(b"HTTP/1.1 302 Found\r\n");
        handle.on_header_line(b"Location: /final\r\n");
        handle.on_header_line(b"\r\n");
    }
    handle.on_header_line(b"HTTP/1.1 200 OK\r\n");
    handle.on_header_line(b"Content-Type: text/plain\r\n");
    handle.on_header_line(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    handle.on_header_line(b"\r\n");

    let mut bytes_downloaded = 0;
    if !nobody {
        handle
            .on_body_chunk(&body)
            .map_err(|err| TransportError::new(err.to_string()))?;
        bytes_downloaded = body.len() as u64;
    }

    Ok(TransferInfo {
        effective_url: url.to_string(),
        status: 200,
        http_version: "HTTP/1.1".to_string(),
        total_time_secs: 0.0,
        bytes_uploaded,
        bytes_downloaded,
    })
}
