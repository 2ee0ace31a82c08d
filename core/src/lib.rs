//! Polling HTTP transport for game-backend clients.
//!
//! # Overview
//! Callers `submit` JSON POST requests from any thread; one background worker
//! performs them on the platform's blocking HTTP stack; the embedding program
//! calls `poll` once per frame to run the completion callbacks of everything
//! that has finished. Callbacks never run on the worker thread.
//!
//! # Design
//! - `RequestDescriptor` is immutable once built and carries its callback.
//! - Tasks move by value through two channels (pending, finished); exactly
//!   one side owns a task at any instant.
//! - Every submitted request produces exactly one `Completion`: an HTTP
//!   response (any status) or a `TransportError` (invalid request, connect
//!   failure, timeout, network error, cancellation, shutdown).
//! - The native stack is an `HttpBackend` strategy chosen at build time
//!   (`PlatformBackend`); tests inject their own.
//! - `ServiceClient` takes the transport by injection and adds JSON
//!   serialization on the way out and decoding on the way back.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod task;
pub mod transport;
mod worker;

pub use backend::{HttpBackend, PlatformBackend, UreqBackend};
pub use client::{parse_response, ServiceClient};
pub use config::TransportConfig;
pub use error::{ApiError, TransportError};
pub use http::HttpResponse;
pub use request::{Callback, Completion, RequestDescriptor, RequestDescriptorBuilder, RequestId};
pub use task::{RequestHandle, TaskState};
pub use transport::Transport;
