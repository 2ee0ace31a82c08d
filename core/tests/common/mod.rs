//! Shared test utilities for transport integration tests.

// Not every test file uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing_subscriber::EnvFilter;
use transport_core::{
    Completion, HttpBackend, HttpResponse, RequestDescriptor, Transport, TransportConfig,
    TransportError,
};

/// What the scripted backend does for a given relative URL.
#[derive(Clone)]
pub enum Script {
    Status(u16, &'static str),
    Fail(fn() -> TransportError),
    /// Signal `started`, then block until the gate is released.
    Gated(u16),
}

/// Backend answering from a fixed script keyed by relative URL; unknown URLs
/// get `200 {}`. Records every call it actually performs.
#[derive(Clone)]
pub struct ScriptedBackend {
    script: Arc<HashMap<&'static str, Script>>,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub threads: Arc<Mutex<Vec<ThreadId>>>,
    started: Sender<String>,
    gate: Receiver<()>,
}

/// Test-side controls for a `ScriptedBackend`.
pub struct Controls {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub threads: Arc<Mutex<Vec<ThreadId>>>,
    pub started: Receiver<String>,
    gate: Sender<()>,
}

impl Controls {
    /// Let one gated call proceed.
    pub fn release(&self) {
        self.gate.send(()).unwrap();
    }

    /// Block until a gated call has started, returning its URL.
    pub fn wait_started(&self) -> String {
        self.started
            .recv_timeout(Duration::from_secs(5))
            .expect("gated call never started")
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn scripted(script: &[(&'static str, Script)]) -> (ScriptedBackend, Controls) {
    let (started_tx, started_rx) = crossbeam_channel::unbounded();
    let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
    let backend = ScriptedBackend {
        script: Arc::new(script.iter().cloned().collect()),
        calls: Arc::default(),
        threads: Arc::default(),
        started: started_tx,
        gate: gate_rx,
    };
    let controls = Controls {
        calls: Arc::clone(&backend.calls),
        threads: Arc::clone(&backend.threads),
        started: started_rx,
        gate: gate_tx,
    };
    (backend, controls)
}

impl HttpBackend for ScriptedBackend {
    fn execute(&mut self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        let url = request.url().to_string();
        self.calls.lock().unwrap().push(url.clone());
        self.threads.lock().unwrap().push(std::thread::current().id());

        let respond = |status: u16, body: &str| {
            Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            })
        };
        match self.script.get(url.as_str()) {
            Some(Script::Status(status, body)) => respond(*status, body),
            Some(Script::Fail(make)) => Err(make()),
            Some(Script::Gated(status)) => {
                let _ = self.started.send(url);
                let _ = self.gate.recv_timeout(Duration::from_secs(10));
                respond(*status, "{}")
            }
            None => respond(200, "{}"),
        }
    }
}

/// Route transport logs to the test harness; `RUST_LOG` overrides the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn fast_config() -> TransportConfig {
    init_tracing();
    TransportConfig::default().idle_wait(Duration::from_millis(5))
}

/// Completions captured by callbacks, with the thread each ran on.
#[derive(Clone, Default)]
pub struct Sink {
    pub completions: Arc<Mutex<Vec<(Completion, ThreadId)>>>,
}

impl Sink {
    pub fn descriptor(&self, url: &str) -> RequestDescriptor {
        self.descriptor_for("http://backend.test", url)
    }

    pub fn descriptor_for(&self, base_url: &str, url: &str) -> RequestDescriptor {
        let completions = Arc::clone(&self.completions);
        RequestDescriptor::builder(base_url, url)
            .body(r#"{"ping":true}"#)
            .on_complete(move |c| {
                completions
                    .lock()
                    .unwrap()
                    .push((c, std::thread::current().id()))
            })
            .build()
    }

    pub fn len(&self) -> usize {
        self.completions.lock().unwrap().len()
    }

    pub fn statuses(&self) -> Vec<i32> {
        self.completions
            .lock()
            .unwrap()
            .iter()
            .map(|(c, _)| c.status_code())
            .collect()
    }
}

/// Poll until `expected` callbacks have fired in total or five seconds pass.
pub fn poll_until<B: HttpBackend>(transport: &Transport<B>, expected: usize) -> usize {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut delivered = 0;
    while delivered < expected && Instant::now() < deadline {
        delivered += transport.poll();
        std::thread::sleep(Duration::from_millis(1));
    }
    delivered
}
