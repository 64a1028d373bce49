//! NUMA-bound worker pool.
//!
//! One worker group per NUMA node, each with its own FIFO task queue,
//! mutex, and condition variable. Workers bind themselves to their node's
//! CPUs on startup (best effort), so a task submitted to the node owning a
//! page services any cache miss from node-local memory.
//!
//! Tasks within one node run in submission order; tasks on different nodes
//! are independent. There is no task-level cancellation: `stop` lets
//! workers drain their queues before joining them.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use minidb_common::memory::bind_thread_to_node;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct GroupState {
    tasks: VecDeque<Job>,
    stop: bool,
}

struct WorkerGroup {
    node: usize,
    state: Mutex<GroupState>,
    available: Condvar,
}

impl WorkerGroup {
    fn new(node: usize) -> Self {
        Self {
            node,
            state: Mutex::new(GroupState {
                tasks: VecDeque::new(),
                stop: false,
            }),
            available: Condvar::new(),
        }
    }

    fn enqueue(&self, job: Job) {
        {
            let mut state = self.state.lock();
            state.tasks.push_back(job);
        }
        self.available.notify_one();
    }

    /// Runs until stopped with an empty queue.
    fn worker_loop(&self) {
        if let Err(e) = bind_thread_to_node(self.node) {
            debug!(node = self.node, error = %e, "NUMA thread binding unavailable");
        }
        loop {
            let job = {
                let mut state = self.state.lock();
                while state.tasks.is_empty() && !state.stop {
                    self.available.wait(&mut state);
                }
                match state.tasks.pop_front() {
                    Some(job) => job,
                    None => return, // stopped and drained
                }
            };
            job();
        }
    }
}

/// One-shot handle to a submitted task's result.
///
/// Backed by a bounded channel: the worker sends exactly one value when
/// the task finishes. [`TaskHandle::wait`] returns `None` only if the
/// worker died before completing the task.
pub struct TaskHandle<R> {
    rx: mpsc::Receiver<R>,
}

impl<R> TaskHandle<R> {
    /// Blocks until the task finishes and returns its result.
    pub fn wait(self) -> Option<R> {
        self.rx.recv().ok()
    }

    /// Returns the result if the task already finished.
    pub fn try_wait(&self) -> Option<R> {
        self.rx.try_recv().ok()
    }
}

/// Per-node FIFO task queues with pinned worker threads.
pub struct NumaWorkerPool {
    groups: Vec<Arc<WorkerGroup>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    threads_per_node: usize,
    running: Mutex<bool>,
}

impl NumaWorkerPool {
    /// Creates a stopped pool for `nodes` nodes (min 1 each way).
    #[must_use]
    pub fn new(nodes: usize, threads_per_node: usize) -> Self {
        let nodes = nodes.max(1);
        Self {
            groups: (0..nodes).map(|n| Arc::new(WorkerGroup::new(n))).collect(),
            threads: Mutex::new(Vec::new()),
            threads_per_node: threads_per_node.max(1),
            running: Mutex::new(false),
        }
    }

    /// Returns the node count.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.groups.len()
    }

    /// Returns whether workers are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Spawns the worker threads; a second call is a no-op.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if *running {
            return;
        }
        let mut threads = self.threads.lock();
        for group in &self.groups {
            {
                // A restarted pool must not inherit the old stop flag.
                group.state.lock().stop = false;
            }
            for i in 0..self.threads_per_node {
                let group = Arc::clone(group);
                let node = group.node;
                let handle = std::thread::Builder::new()
                    .name(format!("minidb-node{}-worker{}", node, i))
                    .spawn(move || group.worker_loop());
                match handle {
                    Ok(handle) => threads.push(handle),
                    Err(e) => debug!(node = node, error = %e, "failed to spawn worker"),
                }
            }
        }
        *running = true;
    }

    /// Submits a closure to the queue of `node` (wrapped modulo the node
    /// count) and returns a handle to its result.
    ///
    /// If the pool is not running the closure executes synchronously on
    /// the caller's thread and the handle is already resolved, so callers
    /// never lose work.
    pub fn submit<R, F>(&self, node: usize, f: F) -> TaskHandle<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let job = move || {
            // A dropped handle just discards the result.
            let _ = tx.send(f());
        };
        if !self.is_running() {
            job();
            return TaskHandle { rx };
        }
        let target = node % self.groups.len();
        self.groups[target].enqueue(Box::new(job));
        TaskHandle { rx }
    }

    /// Signals every group to stop, lets workers drain their queues, and
    /// joins all threads.
    pub fn stop(&self) {
        {
            let mut running = self.running.lock();
            if !*running {
                return;
            }
            *running = false;
        }
        for group in &self.groups {
            group.state.lock().stop = true;
            group.available.notify_all();
        }
        let mut threads = self.threads.lock();
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
        // A submit racing this stop may have enqueued after the workers
        // exited; run anything left so no handle waits forever.
        for group in &self.groups {
            loop {
                let job = group.state.lock().tasks.pop_front();
                match job {
                    Some(job) => job(),
                    None => break,
                }
            }
        }
    }
}

impl Drop for NumaWorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for NumaWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NumaWorkerPool")
            .field("nodes", &self.groups.len())
            .field("threads_per_node", &self.threads_per_node)
            .field("running", &self.is_running())
            .finish()
    }
}
