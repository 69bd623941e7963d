//! Off-thread enumeration and result delivery.
//!
//! An [`EnumerationTask`] pairs an [`Enumerator`] with a [`ResultSink`]. An
//! [`Executor`] decides where the task runs; the sink receives exactly one
//! [`EnumerationResult`] when it finishes.
//!
//! ```rust,no_run
//! use std::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel();
//! ttyscan::list_ports_async(move |result| {
//!     let _ = tx.send(result);
//! });
//!
//! let (error, devices) = rx.recv().unwrap().into_pair();
//! match (error, devices) {
//!     (Some(message), _) => eprintln!("enumeration failed: {message}"),
//!     (None, Some(devices)) => println!("{} device(s)", devices.len()),
//!     (None, None) => unreachable!(),
//! }
//! ```

use {
    crate::{
        discovery::{Enumerator, default_enumerator},
        error::Result,
        record::{DeviceRecord, EnumerationResult},
    },
    log::{debug, warn},
    std::{
        sync::{Arc, Mutex, PoisonError},
        thread,
    },
};

/// Unit of work handed to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Receives the outcome of one enumeration.
pub trait ResultSink: Send + 'static {
    /// Deliver the result. Called once per task.
    fn deliver(self, result: EnumerationResult);
}

impl<F> ResultSink for F
where
    F: FnOnce(EnumerationResult) + Send + 'static,
{
    fn deliver(self, result: EnumerationResult) {
        self(result);
    }
}

/// Runs jobs somewhere other than (or on) the calling thread.
pub trait Executor {
    /// Run `job` to completion, exactly once.
    fn execute(&self, job: Job);
}

/// Runs every job on a new named worker thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadExecutor;

impl ThreadExecutor {
    /// Worker thread name.
    pub const THREAD_NAME: &'static str = "ttyscan-list";
}

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) {
        let slot = Arc::new(Mutex::new(Some(job)));
        let worker_slot = Arc::clone(&slot);

        let spawned = thread::Builder::new()
            .name(Self::THREAD_NAME.to_string())
            .spawn(move || {
                if let Some(job) = take_job(&worker_slot) {
                    job();
                }
            });

        if let Err(e) = spawned {
            warn!("Cannot spawn enumeration worker ({e}), running on the calling thread");
            if let Some(job) = take_job(&slot) {
                job();
            }
        }
    }
}

fn take_job(slot: &Mutex<Option<Job>>) -> Option<Job> {
    slot.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}

/// Runs every job on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// One enumeration and the sink awaiting its result.
pub struct EnumerationTask<E, S> {
    enumerator: E,
    sink: S,
}

impl<E, S> EnumerationTask<E, S>
where
    E: Enumerator,
    S: ResultSink,
{
    /// Pair `enumerator` with `sink`.
    pub fn new(enumerator: E, sink: S) -> Self {
        Self { enumerator, sink }
    }

    /// Enumerate and report to the sink.
    pub fn run(self) {
        let result = EnumerationResult::from(self.enumerator.enumerate());
        match &result {
            EnumerationResult::Devices(devices) => debug!("Enumeration found {} device(s)", devices.len()),
            EnumerationResult::Failed(message) => debug!("Enumeration failed: {message}"),
        }
        self.sink.deliver(result);
    }
}

/// Run an enumeration on `executor`, reporting to `sink`.
pub fn spawn_enumeration<X, E, S>(executor: &X, enumerator: E, sink: S)
where
    X: Executor + ?Sized,
    E: Enumerator + Send + 'static,
    S: ResultSink,
{
    let task = EnumerationTask::new(enumerator, sink);
    executor.execute(Box::new(move || task.run()));
}

/// Enumerate serial devices on the calling thread.
pub fn list_ports() -> Result<Vec<DeviceRecord>> {
    default_enumerator().enumerate()
}

/// Enumerate serial devices on a worker thread, reporting to `sink`.
pub fn list_ports_async<S: ResultSink>(sink: S) {
    spawn_enumeration(&ThreadExecutor, default_enumerator(), sink);
}
