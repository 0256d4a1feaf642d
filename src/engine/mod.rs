//! Transport engine boundary.
//!
//! # Data Flow
//! ```text
//! Client ──► Engine::easy()  ──► Transport::perform(&mut handle)      (blocking)
//!        └─► Engine::multi() ──► MultiTransport::add(handle)
//!                                 MultiTransport::perform()           (bounded block)
//!                                 MultiTransport::info_read() ──► Completion
//! ```
//!
//! # Design Decisions
//! - Engines drive transfers only while one of their `perform` calls is running
//! - Header lines and body chunks flow back through the handle's callbacks
//! - A completed multi transfer hands its handle back with the result

pub mod hyper;
#[cfg(test)]
pub(crate) mod scripted;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::error::{ConfigurationError, RegistrationError};
use crate::transfer::handle::{TransferHandle, TransferId};

pub use self::hyper::{EngineOptions, HyperEngine};

/// Factory for single and multi transfer engines.
pub trait Engine: Send + Sync {
    /// Whether transfers may ask for HTTP/2.
    fn supports_http2(&self) -> bool;

    /// A blocking single-transfer engine.
    fn easy(&self) -> Result<Box<dyn Transport>, ConfigurationError>;

    /// A polling multi-transfer engine.
    fn multi(&self) -> Result<Box<dyn MultiTransport>, ConfigurationError>;

    /// Refuse passthrough options the engine would not act on. Engines
    /// without passthrough options refuse every key.
    fn check_options(&self, options: &BTreeMap<String, String>) -> Result<(), ConfigurationError> {
        match options.keys().next() {
            Some(key) => Err(ConfigurationError::UnknownEngineOption(key.clone())),
            None => Ok(()),
        }
    }
}

/// Runs one configured transfer to completion.
pub trait Transport: Send {
    fn perform(&mut self, handle: &mut TransferHandle) -> Result<TransferInfo, TransportError>;
}

/// Runs many transfers concurrently, advancing them only inside `perform`.
pub trait MultiTransport: Send {
    /// Take ownership of a configured handle.
    fn add(&mut self, handle: TransferHandle) -> Result<(), RegistrationError>;

    /// Best-effort removal. Aborts the transfer if it is still running and
    /// drops any completion not yet read. Returns false for unknown ids.
    fn remove(&mut self, id: TransferId) -> bool;

    /// Drive transfers for at most one polling interval.
    fn perform(&mut self) -> PerformStatus;

    /// Next completed transfer, if any.
    fn info_read(&mut self) -> Option<Completion>;
}

/// Result of one multi `perform` step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerformStatus {
    /// Transfers still running.
    pub active: usize,
    /// The engine wants `perform` called again without waiting.
    pub call_again: bool,
}

/// A finished multi transfer.
#[derive(Debug)]
pub struct Completion {
    pub handle: TransferHandle,
    pub result: Result<TransferInfo, TransportError>,
}

/// Engine metadata for a finished transfer, attached to every response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferInfo {
    pub effective_url: String,
    pub status: u16,
    pub http_version: String,
    pub total_time_secs: f64,
    pub bytes_uploaded: u64,
    pub bytes_downloaded: u64,
}

/// Engine-level transfer failure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
