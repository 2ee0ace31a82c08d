//! Platform HTTP strategies.
//!
//! # Design
//! The worker only knows the `HttpBackend` trait: one blocking POST per call.
//! Which native stack performs it is a compile-time choice exposed as
//! `PlatformBackend`; there is no runtime branching between stacks. Tests and
//! embedders with their own HTTP stack inject a backend through
//! `Transport::with_backend`.

mod native;

pub use native::UreqBackend;

use crate::error::TransportError;
use crate::http::HttpResponse;
use crate::request::RequestDescriptor;

/// A blocking HTTP stack the worker can drive.
///
/// `execute` runs on the worker thread and may block for as long as the
/// backend's own timeouts allow. Non-2xx responses must be returned as
/// `Ok`; only failures that produced no response are `Err`.
pub trait HttpBackend: Send + 'static {
    fn execute(&mut self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError>;
}

/// The backend compiled in for this target.
pub type PlatformBackend = UreqBackend;
