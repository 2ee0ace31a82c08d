//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Inputs (`FfiHeader`) are borrowed from the C caller for the duration of
//! one call. Outputs (`FfiCompletion`) are borrowed by the C callback for the
//! duration of that callback; the library owns and frees them afterwards.
//! Conversion helpers live here to keep `lib.rs` focused on the `extern "C"`
//! surface.

use std::collections::HashMap;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::sync::Arc;

use parking_lot::Mutex;
use transport_core::{Completion, RequestHandle, Transport, TransportError};

/// Opaque handle to a transport. C callers receive a pointer to this and
/// pass it back into every FFI function.
pub struct FfiTransport {
    pub(crate) inner: Transport,
    /// Handles of requests whose callback has not fired yet, for
    /// `transport_cancel`. Entries are removed on delivery.
    pub(crate) in_flight: Arc<Mutex<HashMap<u64, RequestHandle>>>,
}

/// A single HTTP header as a key-value pair of borrowed C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// Outcome category reported in `FfiCompletion`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    /// An HTTP response was received; check `http_status`.
    Ok = 0,
    InvalidRequest = 1,
    Connect = 2,
    Timeout = 3,
    Network = 4,
    Cancelled = 5,
    Shutdown = 6,
}

impl From<&TransportError> for FfiErrorCode {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::InvalidRequest(_) => FfiErrorCode::InvalidRequest,
            TransportError::Connect(_) => FfiErrorCode::Connect,
            TransportError::Timeout => FfiErrorCode::Timeout,
            TransportError::Network(_) => FfiErrorCode::Network,
            TransportError::Cancelled => FfiErrorCode::Cancelled,
            TransportError::Shutdown | TransportError::WorkerSpawn(_) => FfiErrorCode::Shutdown,
        }
    }
}

/// The result of one request, handed to the C callback.
///
/// `http_status` is the real status when `error_code` is `Ok`, otherwise a
/// negative sentinel. `body` is never null (empty on failure);
/// `error_message` is null on success. Both pointers are only valid until
/// the callback returns.
#[repr(C)]
pub struct FfiCompletion {
    pub request_id: u64,
    pub error_code: FfiErrorCode,
    pub http_status: i32,
    pub body: *const c_char,
    pub error_message: *const c_char,
}

/// Completion callback. `user_data` is whatever was passed to
/// `transport_submit`, relayed verbatim.
pub type FfiCallback = extern "C" fn(completion: *const FfiCompletion, user_data: *mut c_void);

/// Caller context relayed to the callback. Never dereferenced here.
pub(crate) struct UserData(pub(crate) *mut c_void);

// SAFETY: the pointer is only carried across the worker thread and handed
// back, untouched, on the thread that calls `transport_poll`.
unsafe impl Send for UserData {}

impl UserData {
    pub(crate) fn get(&self) -> *mut c_void {
        self.0
    }
}

/// Owned C strings backing an `FfiCompletion` while the callback runs.
pub(crate) struct CompletionStrings {
    body: CString,
    error_message: Option<CString>,
}

impl CompletionStrings {
    pub(crate) fn new(completion: &Completion) -> Self {
        let error_message = completion
            .outcome
            .as_ref()
            .err()
            .map(|err| to_cstring(&err.to_string()));
        Self {
            body: to_cstring(completion.body()),
            error_message,
        }
    }

    pub(crate) fn view(&self, completion: &Completion) -> FfiCompletion {
        let error_code = match &completion.outcome {
            Ok(_) => FfiErrorCode::Ok,
            Err(err) => err.into(),
        };
        FfiCompletion {
            request_id: completion.request_id.0,
            error_code,
            http_status: completion.status_code(),
            body: self.body.as_ptr(),
            error_message: self
                .error_message
                .as_ref()
                .map_or(std::ptr::null(), |m| m.as_ptr()),
        }
    }
}

/// Read a borrowed C string; null becomes empty, invalid UTF-8 is replaced.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn read_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Interior NULs cannot cross as a C string; they are dropped.
fn to_cstring(s: &str) -> CString {
    CString::new(s).unwrap_or_else(|_| CString::new(s.replace('\0', "")).unwrap_or_default())
}
