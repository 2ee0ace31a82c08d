//! JSON request builder and response parser for one API family.
//!
//! # Design
//! `ServiceClient` holds a base URL and an injected `Arc<Transport<B>>`;
//! there is no global instance. Each call is split into `build_request`
//! (serialize the payload into a descriptor) and `parse_response` (turn a
//! `Completion` into a typed value), with `call` gluing the two around
//! `Transport::submit`. Decoding happens inside the completion callback, so
//! typed results reach the caller on the `poll` thread like everything else.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::{HttpBackend, PlatformBackend};
use crate::error::ApiError;
use crate::request::{Completion, RequestDescriptor};
use crate::task::RequestHandle;
use crate::transport::Transport;

/// Client for a family of JSON-over-POST endpoints sharing one base URL.
#[derive(Debug)]
pub struct ServiceClient<B: HttpBackend = PlatformBackend> {
    base_url: String,
    headers: BTreeMap<String, String>,
    transport: Arc<Transport<B>>,
}

impl<B: HttpBackend> Clone for ServiceClient<B> {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            headers: self.headers.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<B: HttpBackend> ServiceClient<B> {
    pub fn new(base_url: &str, transport: Arc<Transport<B>>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: BTreeMap::new(),
            transport,
        }
    }

    /// Header added to every request built by this client, e.g. a session
    /// ticket obtained at login.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &Arc<Transport<B>> {
        &self.transport
    }

    /// Serialize `payload` into a POST descriptor for `path`. The callback is
    /// left empty; `call` attaches one.
    pub fn build_request<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<RequestDescriptor, ApiError> {
        Ok(self.builder(path, payload)?.build())
    }

    /// Submit `payload` to `path`; `on_done` receives the decoded response
    /// during a later `Transport::poll`.
    ///
    /// Only serialization failures are returned here. Everything that happens
    /// after submission is reported through `on_done`.
    pub fn call<Req, Resp, F>(
        &self,
        path: &str,
        payload: &Req,
        on_done: F,
    ) -> Result<RequestHandle, ApiError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        F: FnOnce(Result<Resp, ApiError>) + Send + 'static,
    {
        let descriptor = self
            .builder(path, payload)?
            .on_complete(move |completion| on_done(parse_response(completion)))
            .build();
        Ok(self.transport.submit(descriptor))
    }

    fn builder<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<crate::request::RequestDescriptorBuilder, ApiError> {
        let body =
            serde_json::to_string(payload).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut builder = RequestDescriptor::builder(&self.base_url, path).body(body);
        for (name, value) in &self.headers {
            builder = builder.header(name.clone(), value.clone());
        }
        Ok(builder)
    }
}

/// Map a completion to a typed result: transport failures and non-2xx
/// statuses become `ApiError`, a 2xx body is decoded as JSON. An empty 2xx
/// body decodes as JSON `null`, so `()` and `Option<T>` accept it.
pub fn parse_response<T: DeserializeOwned>(completion: Completion) -> Result<T, ApiError> {
    let response = completion.outcome?;
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    if !response.is_success() {
        return Err(ApiError::HttpError {
            status: response.status,
            body: response.body,
        });
    }
    let body = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };
    serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use serde::Deserialize;

    use super::*;
    use crate::config::TransportConfig;
    use crate::error::TransportError;
    use crate::http::HttpResponse;
    use crate::request::RequestId;

    #[derive(Debug, Serialize)]
    struct LoginRequest {
        custom_id: String,
        create_account: bool,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct LoginResult {
        session_ticket: String,
        newly_created: bool,
    }

    struct Canned(u16, &'static str);

    impl HttpBackend for Canned {
        fn execute(&mut self, _request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse {
                status: self.0,
                headers: Vec::new(),
                body: self.1.to_string(),
            })
        }
    }

    fn client(status: u16, body: &'static str) -> ServiceClient<Canned> {
        let config = TransportConfig::default().idle_wait(Duration::from_millis(5));
        let transport = Arc::new(Transport::with_backend(config, Canned(status, body)).unwrap());
        ServiceClient::new("https://titleid.example.com/", transport)
    }

    fn completion(status: u16, body: &str) -> Completion {
        Completion {
            request_id: RequestId(1),
            outcome: Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            }),
        }
    }

    fn login() -> LoginRequest {
        LoginRequest {
            custom_id: "player-1".to_string(),
            create_account: true,
        }
    }

    #[test]
    fn build_request_produces_json_post() {
        let c = client(200, "{}").with_header("X-Authorization", "ticket");
        let req = c.build_request("/Client/LoginWithCustomID", &login()).unwrap();
        assert_eq!(req.full_url(), "https://titleid.example.com/Client/LoginWithCustomID");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("x-authorization"), Some("ticket"));
        let body: serde_json::Value = serde_json::from_str(req.body()).unwrap();
        assert_eq!(body["custom_id"], "player-1");
        assert_eq!(body["create_account"], true);
    }

    #[test]
    fn trailing_slash_is_stripped() {
        assert_eq!(client(200, "{}").base_url(), "https://titleid.example.com");
    }

    #[test]
    fn parse_success() {
        let parsed: LoginResult = parse_response(completion(
            200,
            r#"{"session_ticket":"abc","newly_created":true}"#,
        ))
        .unwrap();
        assert_eq!(parsed.session_ticket, "abc");
        assert!(parsed.newly_created);
    }

    #[test]
    fn parse_not_found() {
        let err = parse_response::<LoginResult>(completion(404, "")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn parse_http_error_keeps_body() {
        let err = parse_response::<LoginResult>(completion(500, "internal error")).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 500, ref body } if body == "internal error"));
    }

    #[test]
    fn parse_bad_json() {
        let err = parse_response::<LoginResult>(completion(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn parse_empty_body_as_unit() {
        parse_response::<()>(completion(204, "")).unwrap();
    }

    #[test]
    fn parse_transport_failure() {
        let err = parse_response::<LoginResult>(Completion {
            request_id: RequestId(1),
            outcome: Err(TransportError::Timeout),
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::Transport(TransportError::Timeout)));
    }

    #[test]
    fn call_delivers_decoded_result_on_poll() {
        let c = client(200, r#"{"session_ticket":"xyz","newly_created":false}"#);
        let result = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&result);
        c.call("/Client/LoginWithCustomID", &login(), move |r: Result<LoginResult, ApiError>| {
            *slot.lock().unwrap() = Some(r);
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while c.transport().poll() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        let got = result.lock().unwrap().take().unwrap().unwrap();
        assert_eq!(
            got,
            LoginResult {
                session_ticket: "xyz".to_string(),
                newly_created: false,
            }
        );
    }
}
