//! C-ABI wrapper around `transport-core`.
//!
//! # Overview
//! Exposes the polling HTTP transport through `extern "C"` functions so a
//! host written in any language with a C FFI can queue requests, cancel
//! them, and pump completions on its own thread.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Requests are identified by the `u64` id returned from
//!   `transport_submit`; `0` is never a valid id and signals a null argument.
//! - Completion callbacks only run inside `transport_poll`, on the calling
//!   thread. The `FfiCompletion` they receive is borrowed for the duration of
//!   the callback.
//! - The C caller owns the transport pointer and must release it with
//!   `transport_free`.

pub mod types;

use std::collections::HashMap;
use std::ffi::c_void;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use transport_core::{RequestDescriptor, Transport, TransportConfig};

use types::*;

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Create a transport and start its worker thread.
///
/// Settings come from the `TRANSPORT_*` environment variables; a non-zero
/// timeout argument overrides the corresponding setting.
/// Returns null if the worker cannot be started or an internal panic occurs.
/// The caller must free the returned pointer with `transport_free`.
#[unsafe(no_mangle)]
pub extern "C" fn transport_new(
    connect_timeout_ms: u64,
    request_timeout_ms: u64,
) -> *mut FfiTransport {
    catch_unwind(|| {
        let mut config = TransportConfig::from_env();
        if connect_timeout_ms > 0 {
            config = config.connect_timeout(Duration::from_millis(connect_timeout_ms));
        }
        if request_timeout_ms > 0 {
            config = config.request_timeout(Duration::from_millis(request_timeout_ms));
        }
        match Transport::new(config) {
            Ok(inner) => Box::into_raw(Box::new(FfiTransport {
                inner,
                in_flight: Arc::new(Mutex::new(HashMap::new())),
            })),
            Err(err) => {
                tracing::error!(error = %err, "transport_new failed");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Stop accepting requests and join the worker.
///
/// Queued requests resolve as `Shutdown`; call `transport_poll` afterwards
/// to deliver their callbacks. Safe to call more than once, or with null.
#[unsafe(no_mangle)]
pub extern "C" fn transport_shutdown(transport: *const FfiTransport) {
    if transport.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let transport = unsafe { &*transport };
        transport.inner.shutdown();
    }));
}

/// Shut down and free a transport created by `transport_new`. Safe to call
/// with null. Completions not yet polled are dropped without callbacks.
///
/// # Safety
/// `transport` must not be used again after this call, and no other call on
/// it may be running. In particular, never free a transport from inside its
/// own completion callback: `transport_poll` is still using it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn transport_free(transport: *mut FfiTransport) {
    if !transport.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(transport) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Queue a POST of `body` to `base_url` joined with `path`.
///
/// `headers` points to `headers_len` entries (may be null when the length is
/// zero). Null strings read as empty; a request that ends up malformed still
/// gets exactly one callback, with `InvalidRequest`. `callback` may be null
/// for fire-and-forget requests; `user_data` is relayed to it untouched.
///
/// Returns the request id, or `0` if `transport` is null or an internal
/// panic occurs (in which case no callback will fire).
///
/// # Safety
/// All non-null string pointers must be NUL-terminated and `headers` must be
/// valid for `headers_len` reads; they are only read during this call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn transport_submit(
    transport: *const FfiTransport,
    base_url: *const c_char,
    path: *const c_char,
    headers: *const FfiHeader,
    headers_len: usize,
    body: *const c_char,
    callback: Option<FfiCallback>,
    user_data: *mut c_void,
) -> u64 {
    if transport.is_null() {
        return 0;
    }
    catch_unwind(AssertUnwindSafe(|| {
        let transport = unsafe { &*transport };

        let mut builder = unsafe { RequestDescriptor::builder(&read_str(base_url), &read_str(path)) }
            .body(unsafe { read_str(body) });
        if !headers.is_null() {
            let headers = unsafe { std::slice::from_raw_parts(headers, headers_len) };
            for header in headers {
                builder = unsafe { builder.header(read_str(header.key), read_str(header.value)) };
            }
        }

        let in_flight = Arc::clone(&transport.in_flight);
        let user_data = UserData(user_data);
        let descriptor = builder
            .on_complete(move |completion| {
                in_flight.lock().remove(&completion.request_id.0);
                if let Some(callback) = callback {
                    let strings = CompletionStrings::new(&completion);
                    let view = strings.view(&completion);
                    callback(&view, user_data.get());
                }
            })
            .build();

        // Held across submit so a concurrent poll cannot remove the entry
        // before it is inserted.
        let mut in_flight = transport.in_flight.lock();
        let handle = transport.inner.submit(descriptor);
        let id = handle.id().0;
        in_flight.insert(id, handle);
        id
    }))
    .unwrap_or(0)
}

/// Request cancellation of a submitted request.
///
/// Returns `false` if the id is unknown or its callback already ran. A
/// `true` return does not guarantee a `Cancelled` outcome: a request that
/// already finished keeps its real result.
#[unsafe(no_mangle)]
pub extern "C" fn transport_cancel(transport: *const FfiTransport, request_id: u64) -> bool {
    if transport.is_null() {
        return false;
    }
    catch_unwind(AssertUnwindSafe(|| {
        let transport = unsafe { &*transport };
        match transport.in_flight.lock().get(&request_id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }))
    .unwrap_or(false)
}

/// Deliver every completion finished so far, invoking callbacks on the
/// calling thread. Returns how many were delivered.
#[unsafe(no_mangle)]
pub extern "C" fn transport_poll(transport: *const FfiTransport) -> usize {
    if transport.is_null() {
        return 0;
    }
    catch_unwind(AssertUnwindSafe(|| {
        let transport = unsafe { &*transport };
        transport.inner.poll()
    }))
    .unwrap_or_else(|_| {
        tracing::error!("panic while delivering completions");
        0
    })
}

/// Number of submitted requests whose callback has not run yet.
#[unsafe(no_mangle)]
pub extern "C" fn transport_outstanding(transport: *const FfiTransport) -> usize {
    if transport.is_null() {
        return 0;
    }
    catch_unwind(AssertUnwindSafe(|| {
        let transport = unsafe { &*transport };
        transport.inner.outstanding()
    }))
    .unwrap_or(0)
}
