//! Transfer handles.
//!
//! # Responsibilities
//! - Hold one transfer's configuration, header codec and body sink
//! - Receive engine callbacks (header lines, body chunks)
//! - Turn a finished transfer into a response
//!
//! # Design Decisions
//! - A handle is reusable: `reset` fully clears the previous transfer
//! - `checkout` scopes one use of a handle and resets it on every exit path
//! - Assembly always detaches the sink, success or not

use std::io::{self, Write};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::TransferInfo;
use crate::http::headers::HeaderCodec;
use crate::http::response::{assemble, AssemblyError, Response};
use crate::http::sink::{SinkSlot, DEFAULT_MEMORY_LIMIT};
use crate::transfer::config::{BodyStrategy, TransferConfig};

/// Global counter for transfer IDs; only uniqueness matters.
static TRANSFER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transfer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(u64);

impl TransferId {
    pub fn new() -> Self {
        Self(TRANSFER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transfer-{}", self.0)
    }
}

/// One configured transfer and the state its callbacks write into.
#[derive(Debug)]
pub struct TransferHandle {
    id: TransferId,
    config: Option<TransferConfig>,
    codec: HeaderCodec,
    sink: SinkSlot,
    received: u64,
}

impl TransferHandle {
    pub fn new(sink_memory_limit: usize) -> Self {
        Self {
            id: TransferId::new(),
            config: None,
            codec: HeaderCodec::new(),
            sink: SinkSlot::new(sink_memory_limit),
            received: 0,
        }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    /// Drop every trace of the previous transfer.
    pub fn reset(&mut self) {
        self.config = None;
        self.codec.reset();
        self.sink.clear();
        self.received = 0;
    }

    /// Reset, then apply a new configuration with a fresh body sink.
    pub fn configure(&mut self, config: TransferConfig) {
        self.reset();
        if config.writes_body() {
            self.sink.get();
        }
        self.config = Some(config);
    }

    /// Configure the handle for one scoped use.
    pub fn checkout(&mut self, config: TransferConfig) -> Checkout<'_> {
        self.configure(config);
        Checkout { handle: self }
    }

    pub fn config(&self) -> Option<&TransferConfig> {
        self.config.as_ref()
    }

    /// Move the request body out for the engine to send.
    pub fn take_body(&mut self) -> BodyStrategy {
        self.config
            .as_mut()
            .map(TransferConfig::take_body)
            .unwrap_or(BodyStrategy::None)
    }

    /// Header callback.
    pub fn on_header_line(&mut self, raw: &[u8]) -> usize {
        self.codec.handle_line(raw)
    }

    /// Write callback: append a body chunk to the sink.
    pub fn on_body_chunk(&mut self, chunk: &[u8]) -> io::Result<usize> {
        self.sink.get().write_all(chunk)?;
        self.received += chunk.len() as u64;
        Ok(chunk.len())
    }

    /// Body bytes received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn codec(&self) -> &HeaderCodec {
        &self.codec
    }

    pub fn sink_mut(&mut self) -> &mut SinkSlot {
        &mut self.sink
    }

    /// Build the response for a finished transfer. The sink is detached
    /// whether or not assembly succeeds.
    pub fn assemble_response(&mut self, info: TransferInfo) -> Result<Response, AssemblyError> {
        let sink = self.sink.take();
        let head = self.codec.finalize()?;
        let mut response = assemble(head, sink)?;
        response.extensions_mut().insert(info);
        Ok(response)
    }
}

impl Default for TransferHandle {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_LIMIT)
    }
}

/// Scoped use of a handle; resets it when dropped.
#[derive(Debug)]
pub struct Checkout<'a> {
    handle: &'a mut TransferHandle,
}

impl Deref for Checkout<'_> {
    type Target = TransferHandle;

    fn deref(&self) -> &Self::Target {
        self.handle
    }
}

impl DerefMut for Checkout<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.handle
    }
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        self.handle.reset();
        tracing::trace!(transfer_id = %self.handle.id, "Transfer handle released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::body::Body;
    use crate::transfer::options::TransferOptions;
    use crate::transfer::translator::Translator;
    use std::io::Read;

    fn config(method: &str) -> TransferConfig {
        let request = http::Request::builder()
            .method(method)
            .uri("http://example.test/")
            .body(Body::empty())
            .unwrap();
        Translator::new(TransferOptions::default(), true)
            .build(request, &TransferOptions::default())
            .unwrap()
            .0
    }

    fn info() -> TransferInfo {
        TransferInfo {
            effective_url: "http://example.test/".into(),
            status: 200,
            http_version: "HTTP/1.1".into(),
            total_time_secs: 0.01,
            bytes_uploaded: 0,
            bytes_downloaded: 5,
        }
    }

    #[test]
    fn test_transfer_ids_unique() {
        assert_ne!(TransferId::new(), TransferId::new());
        assert_ne!(TransferHandle::default().id(), TransferHandle::default().id());
    }

    #[test]
    fn test_assemble_detaches_sink() {
        let mut handle = TransferHandle::default();
        handle.configure(config("GET"));
        handle.on_header_line(b"HTTP/1.1 200 OK\r\n");
        handle.on_header_line(b"Content-Length: 5\r\n");
        handle.on_header_line(b"\r\n");
        handle.on_body_chunk(b"hello").unwrap();

        let mut response = handle.assemble_response(info()).unwrap();
        let mut body = String::new();
        response.body_mut().read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello");
        assert_eq!(response.extensions().get::<TransferInfo>().unwrap().status, 200);
        assert!(!handle.sink_mut().is_filled());
    }

    #[test]
    fn test_failed_assembly_still_detaches_sink() {
        let mut handle = TransferHandle::default();
        handle.configure(config("GET"));
        handle.on_body_chunk(b"orphan").unwrap();
        assert!(handle.assemble_response(info()).is_err());
        assert!(!handle.sink_mut().is_filled());
    }

    #[test]
    fn test_checkout_resets_on_drop() {
        let mut handle = TransferHandle::default();
        {
            let mut checkout = handle.checkout(config("GET"));
            checkout.on_header_line(b"HTTP/1.1 200 OK\r\n");
            checkout.on_body_chunk(b"data").unwrap();
            assert!(checkout.config().is_some());
        }
        assert!(handle.config().is_none());
        assert!(handle.codec().lines().is_empty());
        assert_eq!(handle.received(), 0);
    }

    #[test]
    fn test_head_configures_no_sink() {
        let mut handle = TransferHandle::default();
        handle.configure(config("HEAD"));
        assert!(!handle.sink_mut().is_filled());
        assert!(matches!(handle.take_body(), BodyStrategy::None));
    }
}
