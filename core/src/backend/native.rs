//! Blocking backend built on a `ureq` agent.

use std::collections::BTreeMap;
use std::io;

use ureq::Agent;

use super::HttpBackend;
use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::http::HttpResponse;
use crate::request::RequestDescriptor;

/// POSTs through one long-lived `ureq::Agent`, reusing its connection pool.
///
/// Status codes are returned as data (`http_status_as_error(false)`) so 4xx
/// and 5xx reach the caller with their bodies intact. Bodies are decoded
/// lossily; only one larger than `max_response_bytes` fails the request.
pub struct UreqBackend {
    agent: Agent,
    default_headers: BTreeMap<String, String>,
    max_response_bytes: u64,
}

impl UreqBackend {
    pub fn new(config: &TransportConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(config.connect_timeout))
            .timeout_global(Some(config.request_timeout))
            .build()
            .new_agent();
        Self {
            agent,
            default_headers: config.default_headers.clone(),
            max_response_bytes: config.max_response_bytes,
        }
    }
}

impl HttpBackend for UreqBackend {
    fn execute(&mut self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        let mut builder = self.agent.post(request.full_url());
        for (name, value) in &self.default_headers {
            if request.header(name).is_none() {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder
            .send(request.body().as_bytes())
            .map_err(map_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let bytes = response
            .body_mut()
            .with_config()
            .limit(self.max_response_bytes)
            .read_to_vec()
            .map_err(map_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

fn map_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::HostNotFound => TransportError::Connect("host not found".to_string()),
        ureq::Error::ConnectionFailed => TransportError::Connect("connection failed".to_string()),
        ureq::Error::BadUri(uri) => TransportError::InvalidRequest(format!("bad uri: {uri}")),
        ureq::Error::Http(err) => TransportError::InvalidRequest(err.to_string()),
        ureq::Error::Io(err) => map_io_error(err),
        ureq::Error::BodyExceedsLimit(limit) => {
            TransportError::Network(format!("response body exceeds {limit} bytes"))
        }
        other => TransportError::Network(other.to_string()),
    }
}

fn map_io_error(err: io::Error) -> TransportError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable => TransportError::Connect(err.to_string()),
        _ => TransportError::Network(err.to_string()),
    }
}
