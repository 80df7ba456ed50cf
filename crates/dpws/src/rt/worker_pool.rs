// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded worker pool with idle-timeout reclamation.
//!
//! Workers are created on demand up to `max_workers`. A submitted task goes to
//! an idle worker if one exists, otherwise to a freshly spawned worker, otherwise
//! into a FIFO queue drained by workers as they finish. Workers idle longer than
//! `idle_timeout` retire themselves.
//!
//! # Lock order
//!
//! `PoolState` first, then a worker's `Mailbox`. Workers only ever block on
//! their mailbox while holding nothing else.

use crate::config::WorkerPoolConfig;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Unit of work executed by the pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Errors returned by [`WorkerPool`] submission.
#[derive(Debug)]
pub enum PoolError {
    /// `submit_or_reject` found no worker immediately available.
    Rejected,
    /// Pool is shutting down.
    ShutDown,
    /// OS refused to spawn a worker thread.
    Spawn(std::io::Error),
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::Rejected => write!(f, "no worker immediately available"),
            PoolError::ShutDown => write!(f, "worker pool is shut down"),
            PoolError::Spawn(e) => write!(f, "failed to spawn worker: {}", e),
        }
    }
}

impl std::error::Error for PoolError {}

impl From<PoolError> for crate::Error {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Rejected => crate::Error::Rejected,
            PoolError::ShutDown => crate::Error::ShutDown,
            PoolError::Spawn(io) => crate::Error::Io(io),
        }
    }
}

/// Hand-off slot between the pool and one worker.
struct Mailbox {
    slot: Mutex<MailboxSlot>,
    cond: Condvar,
}

#[derive(Default)]
struct MailboxSlot {
    task: Option<Task>,
    stop: bool,
}

enum Wakeup {
    Task(Task),
    Stop,
    Timeout,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            slot: Mutex::new(MailboxSlot::default()),
            cond: Condvar::new(),
        }
    }

    fn deliver(&self, task: Task) {
        self.slot.lock().task = Some(task);
        self.cond.notify_one();
    }

    fn stop(&self) {
        self.slot.lock().stop = true;
        self.cond.notify_one();
    }

    fn take_task(&self) -> Option<Task> {
        self.slot.lock().task.take()
    }

    /// Block until a task, a stop signal, or the deadline. A delivered task
    /// wins over a concurrent stop so nothing handed out is lost.
    fn wait(&self, deadline: Instant) -> Wakeup {
        let mut slot = self.slot.lock();
        loop {
            if let Some(task) = slot.task.take() {
                return Wakeup::Task(task);
            }
            if slot.stop {
                return Wakeup::Stop;
            }
            if self.cond.wait_until(&mut slot, deadline).timed_out() {
                return match slot.task.take() {
                    Some(task) => Wakeup::Task(task),
                    None => Wakeup::Timeout,
                };
            }
        }
    }
}

struct WorkerEntry {
    mailbox: Arc<Mailbox>,
    handle: Option<JoinHandle<()>>,
}

struct PoolState {
    idle: Vec<u64>,
    active: Vec<u64>,
    queue: VecDeque<Task>,
    workers: HashMap<u64, WorkerEntry>,
    next_id: u64,
    shutting_down: bool,
}

impl PoolState {
    fn park(&mut self, id: u64) {
        self.active.retain(|w| *w != id);
        self.idle.push(id);
    }

    fn activate(&mut self, id: u64) {
        self.idle.retain(|w| *w != id);
        if !self.active.contains(&id) {
            self.active.push(id);
        }
    }

    fn deregister(&mut self, id: u64) {
        self.idle.retain(|w| *w != id);
        self.active.retain(|w| *w != id);
        // Dropping a still-present handle detaches the (exiting) thread.
        self.workers.remove(&id);
    }
}

struct PoolInner {
    config: WorkerPoolConfig,
    state: Mutex<PoolState>,
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl PoolInner {
    fn run_task(&self, task: Task) {
        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                self.panicked.fetch_add(1, Ordering::Relaxed);
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "<non-string panic>".to_string());
                log::error!("[pool] {}: task panicked: {}", self.config.name, msg);
            }
        }
    }
}

/// Dynamic, bounded thread pool.
///
/// Cloning yields another handle to the same pool. Workers hold a handle
/// themselves, so call [`WorkerPool::shutdown`] to stop them.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Create an empty pool; workers are spawned on first use.
    ///
    /// Fails with [`crate::Error::Config`] when `config` does not validate.
    pub fn new(config: WorkerPoolConfig) -> crate::Result<Self> {
        config.validate()?;
        log::debug!(
            "[pool] {}: created (max_workers={} idle_timeout={:?})",
            config.name,
            config.max_workers,
            config.idle_timeout
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    active: Vec::new(),
                    queue: VecDeque::new(),
                    workers: HashMap::new(),
                    next_id: 0,
                    shutting_down: false,
                }),
                completed: AtomicU64::new(0),
                panicked: AtomicU64::new(0),
            }),
        })
    }

    /// Run `task` on an idle worker, a new worker, or queue it.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(Box::new(task), true)
    }

    /// Like [`WorkerPool::submit`] but never queues.
    ///
    /// Intended for work that is worthless when delayed, such as a watchdog.
    pub fn submit_or_reject<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(Box::new(task), false)
    }

    fn dispatch(&self, task: Task, may_queue: bool) -> Result<(), PoolError> {
        let mut state = self.inner.state.lock();
        if state.shutting_down {
            return Err(PoolError::ShutDown);
        }

        while let Some(id) = state.idle.pop() {
            let mailbox = state.workers.get(&id).map(|w| Arc::clone(&w.mailbox));
            if let Some(mailbox) = mailbox {
                state.active.push(id);
                mailbox.deliver(task);
                return Ok(());
            }
        }

        if state.workers.len() < self.inner.config.max_workers {
            return self.spawn_worker(&mut state, task);
        }

        if !may_queue {
            log::debug!("[pool] {}: saturated, task rejected", self.inner.config.name);
            return Err(PoolError::Rejected);
        }
        state.queue.push_back(task);
        Ok(())
    }

    fn spawn_worker(&self, state: &mut PoolState, first: Task) -> Result<(), PoolError> {
        let id = state.next_id;
        state.next_id += 1;
        let mailbox = Arc::new(Mailbox::new());

        let inner = Arc::clone(&self.inner);
        let worker_mailbox = Arc::clone(&mailbox);
        let handle = thread::Builder::new()
            .name(format!("{}-worker-{}", self.inner.config.name, id))
            .spawn(move || worker_loop(inner, id, worker_mailbox, first))
            .map_err(|e| {
                log::error!("[pool] {}: spawn failed: {}", self.inner.config.name, e);
                PoolError::Spawn(e)
            })?;

        state.workers.insert(
            id,
            WorkerEntry {
                mailbox,
                handle: Some(handle),
            },
        );
        state.active.push(id);
        log::debug!(
            "[pool] {}: spawned worker {} ({} total)",
            self.inner.config.name,
            id,
            state.workers.len()
        );
        Ok(())
    }

    /// Stop accepting tasks, signal every worker and join them.
    ///
    /// Queued tasks are drained before workers exit. When called from inside
    /// a pool task the calling worker is not joined.
    pub fn shutdown(&self) {
        let (mailboxes, handles) = {
            let mut state = self.inner.state.lock();
            state.shutting_down = true;
            let mailboxes: Vec<Arc<Mailbox>> =
                state.workers.values().map(|w| Arc::clone(&w.mailbox)).collect();
            let handles: Vec<JoinHandle<()>> = state
                .workers
                .values_mut()
                .filter_map(|w| w.handle.take())
                .collect();
            (mailboxes, handles)
        };

        log::debug!(
            "[pool] {}: shutting down {} worker(s)",
            self.inner.config.name,
            handles.len()
        );
        for mailbox in &mailboxes {
            mailbox.stop();
        }

        let me = thread::current().id();
        for handle in handles {
            if handle.thread().id() == me {
                continue;
            }
            if handle.join().is_err() {
                log::warn!("[pool] {}: worker exited abnormally", self.inner.config.name);
            }
        }
    }

    /// True once [`WorkerPool::shutdown`] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }

    /// Workers currently running a task.
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active.len()
    }

    /// Workers parked waiting for a task.
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    /// Live workers (idle + active).
    pub fn worker_count(&self) -> usize {
        self.inner.state.lock().workers.len()
    }

    /// Tasks waiting for a worker.
    pub fn queued_count(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Tasks that ran to completion.
    pub fn completed_count(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Tasks that panicked.
    pub fn panicked_count(&self) -> u64 {
        self.inner.panicked.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("WorkerPool")
            .field("name", &self.inner.config.name)
            .field("idle", &state.idle.len())
            .field("active", &state.active.len())
            .field("queued", &state.queue.len())
            .finish()
    }
}

fn worker_loop(inner: Arc<PoolInner>, id: u64, mailbox: Arc<Mailbox>, first: Task) {
    let mut next = Some(first);
    loop {
        if let Some(task) = next.take() {
            inner.run_task(task);
        }

        {
            let mut state = inner.state.lock();
            if let Some(task) = state.queue.pop_front() {
                next = Some(task);
                continue;
            }
            if state.shutting_down {
                state.deregister(id);
                break;
            }
            state.park(id);
        }

        let deadline = Instant::now() + inner.config.idle_timeout;
        match mailbox.wait(deadline) {
            Wakeup::Task(task) => next = Some(task),
            Wakeup::Stop => {
                // Back to the top: drains the queue, then deregisters.
                inner.state.lock().activate(id);
            }
            Wakeup::Timeout => {
                let mut state = inner.state.lock();
                // A submitter may have picked this worker as the timer fired.
                if let Some(task) = mailbox.take_task() {
                    next = Some(task);
                    continue;
                }
                state.deregister(id);
                log::debug!("[pool] {}: worker {} retired (idle)", inner.config.name, id);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn pool(max: usize) -> WorkerPool {
        WorkerPool::new(
            WorkerPoolConfig::default()
                .with_name("test")
                .with_max_workers(max),
        )
        .unwrap()
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_runs_submitted_task() {
        let pool = pool(2);
        let (tx, rx) = channel::bounded(1);
        pool.submit(move || tx.send(42).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        pool.shutdown();
    }

    #[test]
    fn test_excess_tasks_are_queued_then_run() {
        let pool = pool(2);
        let (gate_tx, gate_rx) = channel::unbounded::<()>();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let gate = gate_rx.clone();
            let done = Arc::clone(&done);
            pool.submit(move || {
                let _ = gate.recv();
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        assert_eq!(pool.worker_count(), 2);
        assert_eq!(pool.queued_count(), 3);

        for _ in 0..5 {
            gate_tx.send(()).unwrap();
        }
        assert!(wait_until(|| done.load(Ordering::SeqCst) == 5));
        assert_eq!(pool.queued_count(), 0);
        pool.shutdown();
    }

    #[test]
    fn test_submit_or_reject_never_queues() {
        let pool = pool(1);
        let (gate_tx, gate_rx) = channel::bounded::<()>(0);
        pool.submit(move || {
            let _ = gate_rx.recv();
        })
        .unwrap();

        assert!(matches!(pool.submit_or_reject(|| {}), Err(PoolError::Rejected)));
        assert_eq!(pool.queued_count(), 0);

        gate_tx.send(()).unwrap();
        assert!(wait_until(|| pool.idle_count() == 1));
        assert!(pool.submit_or_reject(|| {}).is_ok());
        pool.shutdown();
    }

    #[test]
    fn test_idle_worker_is_reused() {
        let pool = pool(4);
        pool.submit(|| {}).unwrap();
        assert!(wait_until(|| pool.idle_count() == 1));
        pool.submit(|| {}).unwrap();
        assert!(wait_until(|| pool.completed_count() == 2));
        assert_eq!(pool.worker_count(), 1);
        pool.shutdown();
    }

    #[test]
    fn test_zero_workers_refused() {
        let result = WorkerPool::new(WorkerPoolConfig::default().with_max_workers(0));
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_idle_workers_retire() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::default()
                .with_max_workers(2)
                .with_idle_timeout(Duration::from_millis(30)),
        )
        .unwrap();
        pool.submit(|| {}).unwrap();
        assert!(wait_until(|| pool.worker_count() == 0));
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = pool(1);
        pool.submit(|| panic!("boom")).unwrap();
        let (tx, rx) = channel::bounded(1);
        pool.submit(move || tx.send(()).unwrap()).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(pool.panicked_count(), 1);
        assert_eq!(pool.worker_count(), 1);
        pool.shutdown();
    }

    #[test]
    fn test_shutdown_drains_queue_and_rejects_new_work() {
        let pool = pool(1);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let done = Arc::clone(&done);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(5));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert!(matches!(pool.submit(|| {}), Err(PoolError::ShutDown)));
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn test_shutdown_from_inside_worker() {
        let pool = pool(2);
        let inner = pool.clone();
        let (tx, rx) = channel::bounded(1);
        pool.submit(move || {
            inner.shutdown();
            tx.send(()).unwrap();
        })
        .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(pool.is_shut_down());
    }

    #[test]
    fn test_worker_never_idle_and_active() {
        let pool = pool(3);
        for _ in 0..10 {
            pool.submit(|| thread::sleep(Duration::from_millis(1))).unwrap();
        }
        assert!(wait_until(|| pool.completed_count() == 10));
        let state = pool.inner.state.lock();
        for id in &state.idle {
            assert!(!state.active.contains(id));
        }
        drop(state);
        pool.shutdown();
    }
}
