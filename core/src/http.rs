//! HTTP value types shared by descriptors, backends and completions.
//!
//! # Design
//! Responses are plain data with owned fields so a finished task can move
//! from the worker thread to the polling thread, and across the C boundary,
//! without lifetime concerns. Header checks live here so every backend
//! rejects the same malformed input before touching the network.

/// Content type attached to every descriptor unless the caller overrides it.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// An HTTP response described as plain data.
///
/// Non-2xx statuses are carried here as well; only failures that produced no
/// response at all become a `TransportError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// RFC 7230 `token`: the only characters allowed in a header name.
pub fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

/// Header values may not smuggle in extra header lines.
pub fn is_valid_header_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b == b'\t' || (b >= 0x20 && b != 0x7f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: String::new(),
        };
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn success_range_is_2xx() {
        let mut response = HttpResponse {
            status: 204,
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(response.is_success());
        response.status = 301;
        assert!(!response.is_success());
        response.status = 199;
        assert!(!response.is_success());
    }

    #[test]
    fn header_names_must_be_tokens() {
        assert!(is_valid_header_name("X-Request-Id"));
        assert!(!is_valid_header_name(""));
        assert!(!is_valid_header_name("Bad Name"));
        assert!(!is_valid_header_name("Bad:Name"));
    }

    #[test]
    fn header_values_reject_line_breaks() {
        assert!(is_valid_header_value("application/json; charset=utf-8"));
        assert!(is_valid_header_value("tab\tseparated"));
        assert!(!is_valid_header_value("evil\r\nX-Injected: 1"));
        assert!(!is_valid_header_value("nul\0byte"));
    }
}
