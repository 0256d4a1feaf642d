//! Error taxonomy.
//!
//! # Propagation
//! ```text
//! translator  → ConfigurationError (before any network activity)
//! runner.add  → RegistrationError  (engine refused the handle)
//! transfer    → TransferError      (engine failure, assembly failure, cancel)
//! sink slot   → UsageError         (closed sink handed in)
//! ```
//!
//! # Design Decisions
//! - Nothing is retried internally; every error reaches the immediate caller
//! - `TransferError` always carries the request snapshot for diagnostics
//! - `Error` is the umbrella returned by the client entry points

use thiserror::Error;

use crate::http::request::RequestHead;
use crate::transfer::handle::TransferId;

/// Umbrella error for client operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Raised while building a transfer configuration, before the engine is touched.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The request asked for a protocol version the linked engine cannot speak.
    #[error("HTTP/{version} requested but the transport engine was built without support for it")]
    UnsupportedVersion { version: String },

    #[error("Invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid header line '{0}'")]
    InvalidHeader(String),

    /// A passthrough option the transport engine does not act on.
    #[error("Unknown engine option '{0}'")]
    UnknownEngineOption(String),

    #[error("Invalid value for engine option '{key}': {reason}")]
    InvalidEngineOption { key: String, reason: String },

    /// A small request body could not be read into memory.
    #[error("Failed to read request body: {0}")]
    BodyRead(#[source] std::io::Error),

    /// The transport engine could not start its runtime.
    #[error("Failed to start transport runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// What went wrong with a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferErrorKind {
    /// The engine reported a failed transfer.
    Transport,
    /// The transfer succeeded but the response could not be assembled.
    Assembly,
    /// The promise was cancelled before it resolved.
    Cancelled,
    /// The transfer left the runner without ever completing.
    Abandoned,
}

/// A failed transfer, carrying the request it was made for.
#[derive(Debug, Error)]
#[error("{message} ({request})")]
pub struct TransferError {
    kind: TransferErrorKind,
    message: String,
    request: RequestHead,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransferError {
    /// Engine-level failure with the engine's diagnostic message.
    pub fn transport(message: impl Into<String>, request: RequestHead) -> Self {
        Self {
            kind: TransferErrorKind::Transport,
            message: message.into(),
            request,
            source: None,
        }
    }

    /// Failure raised while turning a finished transfer into a response.
    pub fn assembly<E>(error: E, request: RequestHead) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: TransferErrorKind::Assembly,
            message: error.to_string(),
            request,
            source: Some(Box::new(error)),
        }
    }

    pub fn cancelled(request: RequestHead) -> Self {
        Self {
            kind: TransferErrorKind::Cancelled,
            message: "Transfer was cancelled".to_string(),
            request,
            source: None,
        }
    }

    pub fn abandoned(request: RequestHead) -> Self {
        Self {
            kind: TransferErrorKind::Abandoned,
            message: "Transfer was abandoned before it completed".to_string(),
            request,
            source: None,
        }
    }

    pub fn kind(&self) -> TransferErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The request this transfer was made for.
    pub fn request(&self) -> &RequestHead {
        &self.request
    }
}

/// The polling engine refused a handle.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0} is already registered with the polling engine")]
    Duplicate(TransferId),

    /// The core no longer owns a handle (it was already submitted once).
    #[error("{0} has no transfer handle to register")]
    Detached(TransferId),
}

/// Misuse of the temporary body sink.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("Temporary body sink must be a live sink or absent")]
    ClosedSink,
}
