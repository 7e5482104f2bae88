//! Worker threads that own registry trees and drain their command queues.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use indexmap::IndexMap;

use crate::operator::command::SetCommand;
use crate::query::Resolver;
use crate::registry::Registry;
use crate::sync::SyncError;

/// Queue poll interval used when the environment does not override it.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Environment variable overriding the queue poll interval, in milliseconds.
pub const POLL_ENV_VAR: &str = "TRELLIS_POLL_INTERVAL_MS";

/// Tunables for an operator worker.
#[derive(Debug, Clone)]
pub struct OperatorOptions {
    /// How long the worker blocks on its queue before re-checking the
    /// stop flag
    pub poll_interval: Duration,
}

impl Default for OperatorOptions {
    fn default() -> Self {
        let millis = std::env::var(POLL_ENV_VAR)
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        Self {
            poll_interval: Duration::from_millis(millis),
        }
    }
}

/// A party that owns a registry tree and accepts deferred writes to it.
///
/// While an operator is registered for a tree, other threads must not
/// write that tree directly; they enqueue [`SetCommand`]s instead and the
/// operator applies them on its own schedule.
pub trait Operator: Send + Sync {
    /// Stable identifier, unique within a hub.
    fn id(&self) -> &str;

    /// The root of the tree this operator owns.
    fn registry(&self) -> Registry;

    /// Queue a write for this operator to apply.
    ///
    /// Failure means the operator no longer accepts work; the command is
    /// returned so the caller can settle its callback.
    fn enqueue(&self, command: SetCommand) -> Result<(), SetCommand>;
}

/// Cloneable front half of an [`OperatorRuntime`]: shareable across
/// threads, feeding the runtime's queue.
#[derive(Debug, Clone)]
pub struct OperatorHandle {
    id: String,
    registry: Registry,
    sender: mpsc::Sender<SetCommand>,
}

impl Operator for OperatorHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn registry(&self) -> Registry {
        self.registry.clone()
    }

    fn enqueue(&self, command: SetCommand) -> Result<(), SetCommand> {
        self.sender
            .send(command)
            .map_err(|mpsc::SendError(command)| command)
    }
}

/// Registered operators, looked up by id or by the tree they own.
#[derive(Default)]
pub struct OperatorHub {
    operators: Mutex<IndexMap<String, Arc<dyn Operator>>>,
}

impl OperatorHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator, replacing any previous holder of its id.
    pub fn register(&self, operator: Arc<dyn Operator>) {
        let id = operator.id().to_string();
        let replaced = self
            .operators
            .lock()
            .unwrap()
            .insert(id.clone(), operator);
        if replaced.is_some() {
            log::warn!("operator '{}' re-registered, replacing previous registration", id);
        }
    }

    /// Remove an operator by id. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &str) -> bool {
        self.operators.lock().unwrap().shift_remove(id).is_some()
    }

    /// The operator registered under `id`, if any.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Operator>> {
        self.operators.lock().unwrap().get(id).cloned()
    }

    /// The operator whose owned tree is rooted at exactly this node.
    pub fn operator_owning(&self, registry: &Registry) -> Option<Arc<dyn Operator>> {
        self.operators
            .lock()
            .unwrap()
            .values()
            .find(|operator| operator.registry().same_node(registry))
            .cloned()
    }

    /// Number of registered operators.
    pub fn len(&self) -> usize {
        self.operators.lock().unwrap().len()
    }

    /// Whether no operator is registered.
    pub fn is_empty(&self) -> bool {
        self.operators.lock().unwrap().is_empty()
    }
}

/// Owns a worker thread that applies queued writes to one registry tree.
///
/// The worker holds its own [`Resolver`] over the tree and executes
/// commands strictly in arrival order. Dropping the runtime stops and
/// joins the worker; commands still queued at that point settle as
/// [`SyncError::OperatorStopped`].
pub struct OperatorRuntime {
    id: String,
    registry: Registry,
    sender: mpsc::Sender<SetCommand>,
    worker: Option<thread::JoinHandle<()>>,
    should_stop: Arc<AtomicBool>,
    executed: Arc<AtomicU64>,
}

impl OperatorRuntime {
    /// Spawn a worker for `registry` with default options.
    pub fn spawn(id: &str, registry: &Registry) -> Self {
        Self::spawn_with_options(id, registry, OperatorOptions::default())
    }

    /// Spawn a worker for `registry` with explicit options.
    pub fn spawn_with_options(id: &str, registry: &Registry, options: OperatorOptions) -> Self {
        let (sender, receiver) = mpsc::channel();
        let should_stop = Arc::new(AtomicBool::new(false));
        let executed = Arc::new(AtomicU64::new(0));

        let resolver = Resolver::new(registry);
        let worker_id = id.to_string();
        let stop_flag = Arc::clone(&should_stop);
        let counter = Arc::clone(&executed);
        let worker = thread::Builder::new()
            .name(format!("trellis-operator-{}", id))
            .spawn(move || {
                run_command_pump(
                    receiver,
                    resolver,
                    worker_id,
                    stop_flag,
                    counter,
                    options.poll_interval,
                )
            })
            .expect("failed to spawn operator worker thread");

        Self {
            id: id.to_string(),
            registry: registry.clone(),
            sender,
            worker: Some(worker),
            should_stop,
            executed,
        }
    }

    /// A cloneable handle feeding this runtime's queue.
    pub fn handle(&self) -> OperatorHandle {
        OperatorHandle {
            id: self.id.clone(),
            registry: self.registry.clone(),
            sender: self.sender.clone(),
        }
    }

    /// This runtime's operator id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The root of the owned tree.
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Number of commands the worker has applied so far.
    pub fn commands_executed(&self) -> u64 {
        self.executed.load(Ordering::SeqCst)
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// Idempotent; also invoked on drop. After this returns, handles fail
    /// to enqueue and hand their commands back.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        log::debug!("stopping operator '{}'", self.id);
        self.should_stop.store(true, Ordering::SeqCst);
        if worker.join().is_err() {
            log::warn!("operator '{}' worker panicked during shutdown", self.id);
        }
    }
}

impl Drop for OperatorRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_command_pump(
    receiver: mpsc::Receiver<SetCommand>,
    resolver: Resolver,
    id: String,
    should_stop: Arc<AtomicBool>,
    executed: Arc<AtomicU64>,
    poll_interval: Duration,
) {
    log::debug!("operator '{}' worker started", id);
    loop {
        if should_stop.load(Ordering::SeqCst) {
            break;
        }
        match receiver.recv_timeout(poll_interval) {
            Ok(command) => {
                log::trace!("operator '{}' executing {:?}", id, command);
                command.execute(&resolver);
                executed.fetch_add(1, Ordering::SeqCst);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    // Settle whatever arrived after the stop flag was raised.
    let mut unserved = 0usize;
    while let Ok(command) = receiver.try_recv() {
        command.complete(Err(SyncError::OperatorStopped { id: id.clone() }));
        unserved += 1;
    }
    if unserved > 0 {
        log::warn!("operator '{}' dropped {} queued commands at shutdown", id, unserved);
    }
    log::debug!("operator '{}' worker stopped", id);
}
