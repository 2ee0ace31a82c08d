//! Error types for the transport and the API-family client.
//!
//! # Design
//! `TransportError` covers everything that can stop a request from producing
//! an HTTP response. It is delivered through the completion callback, never
//! returned from `submit` or `poll`. A non-2xx response is *not* a transport
//! error: it arrives as a regular `HttpResponse` with the real status.
//!
//! Each variant maps to a negative status sentinel so callers that only look
//! at an integer status (the C surface, logging) can still tell failures
//! apart from real HTTP codes.
//!
//! `ApiError` is what `ServiceClient` hands to its callers after decoding a
//! completion. `NotFound` gets a dedicated variant because callers frequently
//! distinguish "the resource does not exist" from "the server returned an
//! unexpected status."

use std::io;

use thiserror::Error;

/// Why a request finished without an HTTP response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The descriptor cannot be put on the wire (bad URL, header injection).
    /// No network call was attempted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// DNS resolution or TCP connect failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The backend's connect or read timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// Any other I/O, TLS or protocol failure.
    #[error("network error: {0}")]
    Network(String),

    /// The request was cancelled before it completed.
    #[error("request cancelled")]
    Cancelled,

    /// The transport was shut down before the request could run.
    #[error("transport shut down")]
    Shutdown,

    /// The worker thread could not be started. Only ever returned by
    /// `Transport::new`; a transport without a worker can never make progress.
    #[error("failed to start transport worker: {0}")]
    WorkerSpawn(#[source] io::Error),
}

impl TransportError {
    pub const INVALID_REQUEST_STATUS: i32 = -1;
    pub const CONNECT_STATUS: i32 = -2;
    pub const TIMEOUT_STATUS: i32 = -3;
    pub const NETWORK_STATUS: i32 = -4;
    pub const CANCELLED_STATUS: i32 = -5;
    pub const SHUTDOWN_STATUS: i32 = -6;
    pub const WORKER_SPAWN_STATUS: i32 = -7;

    /// Negative sentinel reported in place of an HTTP status code.
    pub fn status_sentinel(&self) -> i32 {
        match self {
            TransportError::InvalidRequest(_) => Self::INVALID_REQUEST_STATUS,
            TransportError::Connect(_) => Self::CONNECT_STATUS,
            TransportError::Timeout => Self::TIMEOUT_STATUS,
            TransportError::Network(_) => Self::NETWORK_STATUS,
            TransportError::Cancelled => Self::CANCELLED_STATUS,
            TransportError::Shutdown => Self::SHUTDOWN_STATUS,
            TransportError::WorkerSpawn(_) => Self::WORKER_SPAWN_STATUS,
        }
    }
}

/// Errors returned to `ServiceClient` callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The request never produced an HTTP response.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
