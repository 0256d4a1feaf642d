//! HTTP message handling subsystem.
//!
//! # Data Flow
//! ```text
//! caller request
//!     → body.rs (known/unknown size, optional seek)
//!     → request.rs (immutable head snapshot for diagnostics)
//!     → [transfer layer builds the wire configuration]
//!
//! engine callbacks
//!     → headers.rs (header lines → final header block)
//!     → sink.rs (body bytes → spillable temporary store)
//!     → response.rs (head + sink → Response)
//!     → replay.rs (Response → process output)
//! ```

pub mod body;
pub mod headers;
pub mod replay;
pub mod request;
pub mod response;
pub mod sink;

pub use body::Body;
pub use headers::{HeaderCodec, ParsedHead};
pub use replay::Responder;
pub use request::RequestHead;
pub use response::{ReasonPhrase, Response, ResponseBody};
pub use sink::{BodySink, SinkSlot};
