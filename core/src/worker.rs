//! The background execution loop.
//!
//! # Design
//! The worker owns the receiving end of the pending queue and the backend.
//! It takes one task at a time, runs the blocking call with no lock held, and
//! hands the finished task to the result queue by value. It never invokes
//! callbacks; only `Transport::poll` does.
//!
//! Shutdown is signalled by raising the shared stop flag and dropping the
//! pending sender. The worker lets the in-flight call finish, then resolves
//! whatever is still queued as `Shutdown` so every submitted request still
//! gets exactly one outcome.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::backend::HttpBackend;
use crate::config::MIN_IDLE_WAIT;
use crate::error::TransportError;
use crate::task::RequestTask;

pub(crate) struct Worker<B> {
    backend: B,
    pending: Receiver<RequestTask>,
    finished: Sender<RequestTask>,
    stop: Arc<AtomicBool>,
    idle_wait: Duration,
}

impl<B: HttpBackend> Worker<B> {
    pub(crate) fn new(
        backend: B,
        pending: Receiver<RequestTask>,
        finished: Sender<RequestTask>,
        stop: Arc<AtomicBool>,
        idle_wait: Duration,
    ) -> Self {
        Self {
            backend,
            pending,
            finished,
            stop,
            idle_wait: idle_wait.max(MIN_IDLE_WAIT),
        }
    }

    pub(crate) fn spawn(self, name: &str) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || self.run())
    }

    fn run(mut self) {
        tracing::info!("transport worker started");
        let mut abandoned = 0usize;
        loop {
            match self.pending.recv_timeout(self.idle_wait) {
                Ok(mut task) if self.stop.load(Ordering::Acquire) => {
                    tracing::debug!(request_id = %task.id(), "abandoned at shutdown");
                    task.finish(Err(TransportError::Shutdown));
                    self.publish(task);
                    abandoned += 1;
                }
                Ok(task) => self.process(task),
                Err(RecvTimeoutError::Timeout) => continue,
                // Queued messages are still handed out after the sender
                // drops, so this only fires once the queue is empty.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::info!(abandoned, "transport worker stopped");
    }

    /// Run one task to `Finished` and publish it.
    fn process(&mut self, mut task: RequestTask) {
        let id = task.id();
        if task.is_cancelled() {
            tracing::debug!(request_id = %id, "cancelled before dispatch");
            task.finish(Err(TransportError::Cancelled));
            self.publish(task);
            return;
        }

        task.begin();
        let outcome = match task.descriptor().validate() {
            Err(err) => {
                tracing::warn!(request_id = %id, %err, "rejecting malformed request");
                Err(err)
            }
            Ok(()) => {
                tracing::debug!(request_id = %id, url = task.descriptor().full_url(), "dispatching");
                let backend = &mut self.backend;
                let descriptor = task.descriptor();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| backend.execute(descriptor)))
                    .unwrap_or_else(|_| Err(TransportError::Network("backend panicked".to_string())));
                match &outcome {
                    Ok(response) => {
                        tracing::debug!(request_id = %id, status = response.status, "request finished");
                    }
                    Err(err) => tracing::warn!(request_id = %id, %err, "request failed"),
                }
                outcome
            }
        };

        // A cancel that raced the call still wins over whatever came back.
        if task.is_cancelled() {
            tracing::debug!(request_id = %id, "cancelled while in flight");
            task.finish(Err(TransportError::Cancelled));
        } else {
            task.finish(outcome);
        }
        self.publish(task);
    }

    fn publish(&self, task: RequestTask) {
        tracing::trace!(request_id = %task.id(), state = ?task.state(), "publishing");
        if let Err(err) = self.finished.send(task) {
            // The transport owns a receiver for its whole life, so this only
            // happens if it was torn down without joining us.
            tracing::error!(request_id = %err.0.id(), "result queue closed, dropping completion");
        }
    }
}
