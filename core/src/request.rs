//! Request descriptors and the completions delivered for them.
//!
//! # Design
//! A `RequestDescriptor` is immutable once built: fields are private and only
//! exposed through accessors, so nothing downstream of `submit` can rewrite
//! the URL, headers or body. The completion callback is a boxed `FnOnce`
//! that captures whatever context the caller needs; the transport never sees
//! that context and never has to manage its lifetime.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::TransportError;
use crate::http::{is_valid_header_name, is_valid_header_value, HttpResponse, JSON_CONTENT_TYPE};

/// Called exactly once, on the thread that calls `Transport::poll`.
pub type Callback = Box<dyn FnOnce(Completion) + Send + 'static>;

/// Transport-assigned identifier, unique per `Transport` instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Everything the transport needs to perform one POST.
pub struct RequestDescriptor {
    url: String,
    full_url: String,
    headers: BTreeMap<String, String>,
    body: String,
    callback: Callback,
}

impl RequestDescriptor {
    /// Start a descriptor for `url` (a path such as `/Client/LoginWithCustomID`)
    /// resolved against `base_url`.
    pub fn builder(base_url: &str, url: &str) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder {
            url: url.to_string(),
            full_url: join_url(base_url, url),
            headers: BTreeMap::new(),
            body: String::new(),
            callback: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn full_url(&self) -> &str {
        &self.full_url
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Check that the descriptor can be put on the wire as-is.
    pub fn validate(&self) -> Result<(), TransportError> {
        let scheme_ok = ["http://", "https://"].iter().any(|scheme| {
            self.full_url.len() > scheme.len()
                && self
                    .full_url
                    .get(..scheme.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        });
        if !scheme_ok {
            return Err(TransportError::InvalidRequest(format!(
                "url must be absolute http(s): {:?}",
                self.full_url
            )));
        }
        if self.full_url.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TransportError::InvalidRequest(format!(
                "url contains whitespace or control characters: {:?}",
                self.full_url
            )));
        }
        for (name, value) in &self.headers {
            if !is_valid_header_name(name) {
                return Err(TransportError::InvalidRequest(format!(
                    "invalid header name: {name:?}"
                )));
            }
            if !is_valid_header_value(value) {
                return Err(TransportError::InvalidRequest(format!(
                    "invalid value for header {name}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn into_callback(self) -> Callback {
        self.callback
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("url", &self.url)
            .field("full_url", &self.full_url)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// Builder for `RequestDescriptor`.
pub struct RequestDescriptorBuilder {
    url: String,
    full_url: String,
    headers: BTreeMap<String, String>,
    body: String,
    callback: Option<Callback>,
}

impl RequestDescriptorBuilder {
    /// Add a header. A later header with the same name (ignoring case)
    /// replaces the earlier one.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Finish the descriptor. Without `on_complete` the result is discarded
    /// on delivery.
    pub fn build(self) -> RequestDescriptor {
        let mut headers = self.headers;
        if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
            headers.insert("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string());
        }
        RequestDescriptor {
            url: self.url,
            full_url: self.full_url,
            headers,
            body: self.body,
            callback: self.callback.unwrap_or_else(|| Box::new(|_| {})),
        }
    }
}

/// The result of one submitted request, passed by value to its callback.
#[derive(Debug)]
pub struct Completion {
    pub request_id: RequestId,
    pub outcome: Result<HttpResponse, TransportError>,
}

impl Completion {
    /// The HTTP status, or the error's negative sentinel.
    pub fn status_code(&self) -> i32 {
        match &self.outcome {
            Ok(response) => i32::from(response.status),
            Err(err) => err.status_sentinel(),
        }
    }

    /// The response body; empty when no response was received.
    pub fn body(&self) -> &str {
        match &self.outcome {
            Ok(response) => &response.body,
            Err(_) => "",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, Ok(response) if response.is_success())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, Err(TransportError::Cancelled))
    }
}

fn join_url(base_url: &str, url: &str) -> String {
    if url.is_empty() {
        return base_url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}
