// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Single background worker that every session hands its send task to.
//!
//! The worker is a dedicated OS thread driving a current-thread tokio runtime.
//! It pulls tasks from an unbounded channel and runs them one at a time, so
//! the cost of telemetry stays at one thread no matter how many requests are
//! in flight. Submitting is a plain channel send: it never blocks and works
//! the same from synchronous handlers and from inside an async runtime.
//!
//! Tasks that pile up behind a slow one (the CPU sampling window, a hung
//! connection) simply wait their turn; nothing is coalesced or rejected.

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, error};

pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

const GLOBAL_WORKER_NAME: &str = "apilytics-dispatcher";

static GLOBAL: OnceLock<Dispatcher> = OnceLock::new();

/// Handle to a background worker.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Task>,
}

impl Dispatcher {
    /// The process-wide worker, started on first use and never torn down.
    pub fn global() -> &'static Dispatcher {
        GLOBAL.get_or_init(|| Dispatcher::spawn(GLOBAL_WORKER_NAME))
    }

    /// Starts a new worker thread with the given name.
    ///
    /// If the thread can't be started every submitted task is dropped.
    pub fn spawn(name: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker { rx };

        if let Err(e) = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker.run())
        {
            error!("Failed to start dispatcher worker {name}: {e}");
        }

        Self { tx }
    }

    /// Queues `task` to run after every previously submitted task.
    ///
    /// Returns immediately. The task's outcome is never reported back.
    pub fn submit<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tx.send(Box::pin(task)).is_err() {
            debug!("Dispatcher worker is not running, dropping task");
        }
    }
}

struct Worker {
    rx: mpsc::UnboundedReceiver<Task>,
}

impl Worker {
    fn run(mut self) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to create dispatcher runtime: {e}");
                return;
            }
        };

        runtime.block_on(async move {
            debug!("Dispatcher worker started");

            while let Some(task) = self.rx.recv().await {
                // Awaiting the spawned task keeps a single slot while
                // containing panics to the task that raised them.
                if let Err(e) = tokio::spawn(task).await {
                    error!("Dispatched task failed: {e}");
                }
            }

            debug!("Dispatcher worker stopped");
        });
    }
}
