//! The polling transport: submit from anywhere, deliver on `poll`.
//!
//! # Design
//! Two crossbeam channels carry tasks by value: caller -> worker (pending)
//! and worker -> poller (finished). No task is ever reachable from two sides
//! at once, so the only cross-thread mutable state is the per-request cancel
//! flag and a few counters.
//!
//! `poll` snapshots how many results are ready and detaches exactly that
//! many before running any callback. Callbacks therefore run with no queue
//! lock held and may submit new requests; those land in a later `poll`.
//!
//! The pending sender sits behind an `RwLock<Option<_>>` gate. `submit`
//! takes it for reading; `shutdown` takes it for writing and clears it, so a
//! submit either reaches the worker before it stops or is resolved locally
//! as `Shutdown`. Nothing is ever dropped without a callback.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::backend::{HttpBackend, PlatformBackend};
use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::request::{RequestDescriptor, RequestId};
use crate::task::{RequestHandle, RequestTask};
use crate::worker::Worker;

/// Asynchronous HTTP POST transport driven by a per-frame `poll`.
///
/// `submit` and `poll` may be called from any thread, including different
/// threads for each. Callbacks run only inside `poll`, on its caller's
/// thread. With the single worker, completions are delivered in submission
/// order.
pub struct Transport<B: HttpBackend = PlatformBackend> {
    pending_gate: RwLock<Option<Sender<RequestTask>>>,
    pending_rx: Receiver<RequestTask>,
    finished_tx: Sender<RequestTask>,
    finished_rx: Receiver<RequestTask>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    outstanding: AtomicUsize,
    _backend: PhantomData<fn() -> B>,
}

impl Transport<PlatformBackend> {
    /// Start a transport on the platform's native HTTP stack.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let backend = PlatformBackend::new(&config);
        Self::with_backend(config, backend)
    }
}

impl<B: HttpBackend> Transport<B> {
    /// Start a transport on an injected backend.
    ///
    /// Fails only if the worker thread cannot be spawned.
    pub fn with_backend(config: TransportConfig, backend: B) -> Result<Self, TransportError> {
        let (pending_tx, pending_rx) = unbounded();
        let (finished_tx, finished_rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let worker = Worker::new(
            backend,
            pending_rx.clone(),
            finished_tx.clone(),
            Arc::clone(&stop),
            config.idle_wait,
        )
        .spawn(&config.worker_name)
        .map_err(TransportError::WorkerSpawn)?;

        tracing::debug!(
            worker = %config.worker_name,
            connect_timeout = ?config.connect_timeout,
            request_timeout = ?config.request_timeout,
            "transport started"
        );

        Ok(Self {
            pending_gate: RwLock::new(Some(pending_tx)),
            pending_rx,
            finished_tx,
            finished_rx,
            stop,
            worker: Mutex::new(Some(worker)),
            next_id: AtomicU64::new(1),
            outstanding: AtomicUsize::new(0),
            _backend: PhantomData,
        })
    }

    /// Queue a request. Never blocks beyond the queue gate and never fails:
    /// the descriptor's callback fires exactly once from a later `poll`.
    pub fn submit(&self, descriptor: RequestDescriptor) -> RequestHandle {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (task, handle) = RequestTask::new(id, descriptor);
        self.outstanding.fetch_add(1, Ordering::AcqRel);

        let rejected = {
            let gate = self.pending_gate.read();
            match gate.as_ref() {
                Some(tx) => tx.send(task).err().map(|err| err.0),
                None => Some(task),
            }
        };

        match rejected {
            None => tracing::trace!(request_id = %id, "queued"),
            Some(mut task) => {
                tracing::debug!(request_id = %id, "submitted after shutdown");
                task.finish(Err(TransportError::Shutdown));
                self.publish(task);
            }
        }
        handle
    }

    /// Deliver every result finished so far; returns the number of callbacks
    /// invoked. Never waits for the network.
    ///
    /// If a callback panics the rest of the batch is still delivered, then
    /// the first panic is resumed.
    pub fn poll(&self) -> usize {
        let ready = self.finished_rx.len();
        if ready == 0 {
            return 0;
        }
        let batch: Vec<RequestTask> = self.finished_rx.try_iter().take(ready).collect();
        let delivered = batch.len();

        let mut first_panic = None;
        for task in batch {
            let id = task.id();
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.deliver())) {
                tracing::error!(request_id = %id, "completion callback panicked");
                first_panic.get_or_insert(payload);
            }
        }

        self.outstanding.fetch_sub(delivered, Ordering::AcqRel);
        tracing::trace!(delivered, "poll delivered completions");
        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
        delivered
    }

    /// Requests submitted but whose callback has not fired yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Requests waiting for the worker.
    pub fn pending_len(&self) -> usize {
        self.pending_rx.len()
    }

    /// Finished requests waiting for `poll`.
    pub fn ready_len(&self) -> usize {
        self.finished_rx.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Stop accepting work, let the in-flight call finish, resolve anything
    /// still queued as `Shutdown`, and join the worker. Idempotent.
    ///
    /// Every caller returns only once the queue is drained, so results
    /// produced here are visible to the next `poll` on any thread.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        drop(self.pending_gate.write().take());

        // Held until the drain below completes; concurrent callers wait here.
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };
        if handle.join().is_err() {
            tracing::error!("transport worker panicked");
        }

        // Only reachable if the worker died early; it normally drains the
        // queue itself before exiting.
        for mut task in self.pending_rx.try_iter() {
            task.finish(Err(TransportError::Shutdown));
            self.publish(task);
        }
        drop(worker);
        tracing::debug!(ready = self.ready_len(), "transport shut down");
    }

    fn publish(&self, task: RequestTask) {
        // We hold `finished_rx` for our whole life, so this cannot fail.
        if let Err(err) = self.finished_tx.send(task) {
            tracing::error!(request_id = %err.0.id(), "result queue closed");
        }
    }
}

impl<B: HttpBackend> Drop for Transport<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<B: HttpBackend> fmt::Debug for Transport<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("pending", &self.pending_len())
            .field("ready", &self.ready_len())
            .field("outstanding", &self.outstanding())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
