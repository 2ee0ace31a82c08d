//! Per-request execution state.
//!
//! # Design
//! A `RequestTask` is moved by value between the pending queue, the worker
//! and the result queue, so exactly one side owns it at any moment. The only
//! state shared across threads is the cancellation flag, which the caller
//! sets through a `RequestHandle` while the worker may be reading it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::TransportError;
use crate::http::HttpResponse;
use crate::request::{Completion, RequestDescriptor, RequestId};

/// Lifecycle of a task. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskState {
    Pending,
    Requesting,
    Finished,
}

/// Caller-side handle to a submitted request.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: RequestId,
    cancelled: Arc<AtomicBool>,
}

impl RequestHandle {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Ask for the request to be abandoned. Its callback still fires once,
    /// with `TransportError::Cancelled`, unless it had already finished.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub(crate) struct RequestTask {
    id: RequestId,
    state: TaskState,
    descriptor: RequestDescriptor,
    outcome: Option<Result<HttpResponse, TransportError>>,
    cancelled: Arc<AtomicBool>,
}

impl RequestTask {
    pub(crate) fn new(id: RequestId, descriptor: RequestDescriptor) -> (Self, RequestHandle) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = RequestHandle {
            id,
            cancelled: Arc::clone(&cancelled),
        };
        let task = RequestTask {
            id,
            state: TaskState::Pending,
            descriptor,
            outcome: None,
            cancelled,
        };
        (task, handle)
    }

    pub(crate) fn id(&self) -> RequestId {
        self.id
    }

    pub(crate) fn state(&self) -> TaskState {
        self.state
    }

    pub(crate) fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Pending -> Requesting.
    pub(crate) fn begin(&mut self) {
        self.advance(TaskState::Requesting);
    }

    /// Record the outcome and move to Finished. The first outcome wins.
    pub(crate) fn finish(&mut self, outcome: Result<HttpResponse, TransportError>) {
        if self.state == TaskState::Finished {
            tracing::warn!(request_id = %self.id, "ignoring second outcome for finished request");
            return;
        }
        self.outcome = Some(outcome);
        self.advance(TaskState::Finished);
    }

    /// Consume the task and invoke its callback.
    pub(crate) fn deliver(self) {
        let RequestTask {
            id,
            state,
            descriptor,
            outcome,
            ..
        } = self;
        debug_assert_eq!(state, TaskState::Finished);
        // An unfinished task only reaches delivery if a worker bug skipped
        // `finish`; report it as a shutdown rather than never calling back.
        let outcome = outcome.unwrap_or(Err(TransportError::Shutdown));
        let callback = descriptor.into_callback();
        callback(Completion {
            request_id: id,
            outcome,
        });
    }

    fn advance(&mut self, next: TaskState) {
        if next <= self.state {
            tracing::warn!(
                request_id = %self.id,
                from = ?self.state,
                to = ?next,
                "rejected backwards task transition"
            );
            return;
        }
        tracing::trace!(request_id = %self.id, from = ?self.state, to = ?next, "task transition");
        self.state = next;
    }
}
