//! HTTP transfer engine library.
//!
//! Blocking and promise-based HTTP clients over one transport engine,
//! with response bodies spooled to a temporary sink instead of memory.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod observability;
pub mod transfer;

pub use client::{Client, Promise, PromiseState};
pub use config::schema::ClientConfig;
pub use error::{Error, TransferError, TransferErrorKind};
pub use crate::http::{Body, Responder, Response};
pub use transfer::TransferOptions;
