//! Transfer preparation.
//!
//! # Data Flow
//! ```text
//! http::Request<Body> + TransferOptions
//!     → Translator::build  → (TransferConfig, RequestHead)
//!     → TransferHandle::configure
//!     → engine callbacks (on_header_line / on_body_chunk)
//!     → TransferHandle::assemble_response → Response
//! ```

pub mod config;
pub mod handle;
pub mod options;
pub mod translator;

pub use config::{BodyStrategy, Credentials, HttpVersion, TransferConfig, UploadSource};
pub use handle::{Checkout, TransferHandle, TransferId};
pub use options::TransferOptions;
pub use translator::Translator;
