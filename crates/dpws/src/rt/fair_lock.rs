// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fair, reentrant shared/exclusive lock.
//!
//! Holds are tracked per thread. Blocked requests wait in a FIFO queue; when
//! the head of the queue wants exclusive access a fairness barrier stops new
//! shared grants so a pending writer cannot be starved by a stream of readers.
//!
//! Grant rules, in order:
//!
//! | State | Shared request | Exclusive request |
//! |-------|----------------|-------------------|
//! | unlocked | granted | granted |
//! | exclusive by caller | granted (pass-through) | granted (reentrant) |
//! | exclusive by other | queued | queued |
//! | shared, caller holds a share | granted | granted if caller is the only holder |
//! | shared, barrier down | granted | queued, barrier raised |
//! | shared, barrier up | queued | queued |
//!
//! An upgrade request (exclusive, caller holds a share) is queued ahead of
//! plain waiters, which could not be served before that share is released.
//!
//! Two threads that both hold a share and both ask for exclusive access can
//! never be served. The second upgrader is detected on arrival and both
//! requests fail with [`LockError::Deadlock`]; each caller keeps its share.

use parking_lot::{Condvar, Mutex};
use std::cell::UnsafeCell;
use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::thread::{self, ThreadId};

/// Errors returned by [`FairLock`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    /// Conflicting shared-to-exclusive upgrades.
    Deadlock,
    /// Release without a matching acquire by this thread.
    NotHeld,
    /// Typed access would alias a reference this thread already holds.
    Reentrant,
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::Deadlock => write!(f, "conflicting lock upgrade (deadlock)"),
            LockError::NotHeld => write!(f, "lock not held by this thread"),
            LockError::Reentrant => write!(f, "reentrant typed access refused"),
        }
    }
}

impl std::error::Error for LockError {}

impl From<LockError> for crate::Error {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Deadlock => crate::Error::Deadlock,
            other => crate::Error::Usage(other.to_string()),
        }
    }
}

/// Observable lock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Unlocked,
    /// Total shared holds across all threads.
    Shared(usize),
    /// Reentrant exclusive depth.
    Exclusive(usize),
}

#[derive(Debug)]
struct Waiter {
    ticket: u64,
    thread: ThreadId,
    exclusive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Granted,
    Deadlock,
}

#[derive(Debug, Default)]
struct LockState {
    exclusive_owner: Option<ThreadId>,
    exclusive_count: usize,
    shared: HashMap<ThreadId, usize>,
    shared_total: usize,
    queue: VecDeque<Waiter>,
    barrier: bool,
    outcomes: HashMap<u64, Outcome>,
    next_ticket: u64,
}

impl LockState {
    fn shares_of(&self, thread: ThreadId) -> usize {
        self.shared.get(&thread).copied().unwrap_or(0)
    }

    fn can_grant_shared(&self, thread: ThreadId, respect_barrier: bool) -> bool {
        match self.exclusive_owner {
            Some(owner) => owner == thread,
            None => {
                self.shared_total == 0
                    || self.shares_of(thread) > 0
                    || !respect_barrier
                    || !self.barrier
            }
        }
    }

    fn can_grant_exclusive(&self, thread: ThreadId) -> bool {
        match self.exclusive_owner {
            Some(owner) => owner == thread,
            None => self.shared_total == self.shares_of(thread),
        }
    }

    fn grant_shared(&mut self, thread: ThreadId) {
        *self.shared.entry(thread).or_insert(0) += 1;
        self.shared_total += 1;
    }

    fn grant_exclusive(&mut self, thread: ThreadId) {
        self.exclusive_owner = Some(thread);
        self.exclusive_count += 1;
    }

    fn enqueue(&mut self, thread: ThreadId, exclusive: bool) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let waiter = Waiter {
            ticket,
            thread,
            exclusive,
        };
        // An upgrader's own share blocks everything behind it, so it goes first.
        if exclusive && self.shares_of(thread) > 0 {
            self.queue.push_front(waiter);
        } else {
            self.queue.push_back(waiter);
        }
        if exclusive {
            self.barrier = true;
        }
        ticket
    }

    /// Grant queued requests in FIFO order until one cannot be served.
    fn scan(&mut self) -> bool {
        let mut granted = false;
        while let Some(head) = self.queue.front() {
            let (thread, exclusive, ticket) = (head.thread, head.exclusive, head.ticket);
            let ok = if exclusive {
                self.can_grant_exclusive(thread)
            } else {
                self.can_grant_shared(thread, false)
            };
            if !ok {
                break;
            }
            self.queue.pop_front();
            if exclusive {
                self.grant_exclusive(thread);
            } else {
                self.grant_shared(thread);
            }
            self.outcomes.insert(ticket, Outcome::Granted);
            granted = true;
        }
        self.barrier = self.queue.front().is_some_and(|w| w.exclusive);
        granted
    }

    fn mode(&self) -> LockMode {
        if self.exclusive_count > 0 {
            LockMode::Exclusive(self.exclusive_count)
        } else if self.shared_total > 0 {
            LockMode::Shared(self.shared_total)
        } else {
            LockMode::Unlocked
        }
    }
}

/// Fair reentrant reader/writer lock without payload.
///
/// Every `acquire_*` must be paired with a `release_*` of the same kind on the
/// same thread. The guard methods [`FairLock::shared`] and
/// [`FairLock::exclusive`] do the pairing automatically.
#[derive(Debug, Default)]
pub struct FairLock {
    state: Mutex<LockState>,
    cond: Condvar,
}

impl FairLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until a shared hold is granted.
    pub fn acquire_shared(&self) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut st = self.state.lock();
        if st.can_grant_shared(me, true) {
            st.grant_shared(me);
            return Ok(());
        }
        let ticket = st.enqueue(me, false);
        self.wait_for(&mut st, ticket)
    }

    /// Block until an exclusive hold is granted.
    ///
    /// Fails with [`LockError::Deadlock`] when the caller holds a share and
    /// another share holder is already waiting to upgrade.
    pub fn acquire_exclusive(&self) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut st = self.state.lock();
        if st.can_grant_exclusive(me) {
            st.grant_exclusive(me);
            return Ok(());
        }

        if st.shares_of(me) > 0 {
            let rival = st
                .queue
                .iter()
                .position(|w| w.exclusive && w.thread != me && st.shares_of(w.thread) > 0);
            if let Some(pos) = rival {
                if let Some(waiter) = st.queue.remove(pos) {
                    st.outcomes.insert(waiter.ticket, Outcome::Deadlock);
                    log::warn!(
                        "[lock] upgrade conflict between {:?} and {:?}",
                        me,
                        waiter.thread
                    );
                }
                st.scan();
                self.cond.notify_all();
                return Err(LockError::Deadlock);
            }
        }

        let ticket = st.enqueue(me, true);
        self.wait_for(&mut st, ticket)
    }

    fn wait_for(
        &self,
        st: &mut parking_lot::MutexGuard<'_, LockState>,
        ticket: u64,
    ) -> Result<(), LockError> {
        loop {
            match st.outcomes.remove(&ticket) {
                Some(Outcome::Granted) => return Ok(()),
                Some(Outcome::Deadlock) => return Err(LockError::Deadlock),
                None => self.cond.wait(st),
            }
        }
    }

    /// Grant a shared hold if that is possible without waiting.
    pub fn try_acquire_shared(&self) -> bool {
        let me = thread::current().id();
        let mut st = self.state.lock();
        if st.can_grant_shared(me, true) {
            st.grant_shared(me);
            true
        } else {
            false
        }
    }

    /// Grant an exclusive hold if that is possible without waiting.
    pub fn try_acquire_exclusive(&self) -> bool {
        let me = thread::current().id();
        let mut st = self.state.lock();
        if st.can_grant_exclusive(me) {
            st.grant_exclusive(me);
            true
        } else {
            false
        }
    }

    /// Drop one shared hold of the calling thread.
    pub fn release_shared(&self) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut st = self.state.lock();
        match st.shared.get_mut(&me) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    st.shared.remove(&me);
                }
            }
            None => return Err(LockError::NotHeld),
        }
        st.shared_total -= 1;
        if st.scan() {
            self.cond.notify_all();
        }
        Ok(())
    }

    /// Drop one exclusive hold of the calling thread.
    pub fn release_exclusive(&self) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut st = self.state.lock();
        if st.exclusive_owner != Some(me) {
            return Err(LockError::NotHeld);
        }
        st.exclusive_count -= 1;
        if st.exclusive_count == 0 {
            st.exclusive_owner = None;
        }
        if st.scan() {
            self.cond.notify_all();
        }
        Ok(())
    }

    /// Acquire a shared hold released when the guard drops.
    pub fn shared(&self) -> Result<SharedGuard<'_>, LockError> {
        self.acquire_shared()?;
        Ok(SharedGuard { lock: self })
    }

    /// Acquire an exclusive hold released when the guard drops.
    pub fn exclusive(&self) -> Result<ExclusiveGuard<'_>, LockError> {
        self.acquire_exclusive()?;
        Ok(ExclusiveGuard { lock: self })
    }

    pub fn mode(&self) -> LockMode {
        self.state.lock().mode()
    }

    /// True if the calling thread holds at least one share.
    pub fn holds_shared(&self) -> bool {
        self.state.lock().shares_of(thread::current().id()) > 0
    }

    /// True if the calling thread is the exclusive owner.
    pub fn holds_exclusive(&self) -> bool {
        self.state.lock().exclusive_owner == Some(thread::current().id())
    }

    /// Number of blocked requests.
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// True while the queue head demands exclusive access.
    pub fn barrier_raised(&self) -> bool {
        self.state.lock().barrier
    }
}

/// RAII shared hold on a [`FairLock`].
pub struct SharedGuard<'a> {
    lock: &'a FairLock,
}

impl Drop for SharedGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release_shared() {
            log::error!("[lock] shared guard release failed: {}", e);
        }
    }
}

/// RAII exclusive hold on a [`FairLock`].
pub struct ExclusiveGuard<'a> {
    lock: &'a FairLock,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release_exclusive() {
            log::error!("[lock] exclusive guard release failed: {}", e);
        }
    }
}

// ============================================================================
// Typed wrapper
// ============================================================================

/// Value protected by a [`FairLock`].
///
/// Same fairness as the raw lock, but a thread may not take a write guard
/// while it holds any guard, nor a read guard while it holds the write guard:
/// either would alias `&mut T`. Such requests fail with
/// [`LockError::Reentrant`] instead of deadlocking.
pub struct FairRwLock<T> {
    lock: FairLock,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is mediated by `lock`; readers only obtain `&T`
// and a writer is the single exclusive holder with no other live guard.
unsafe impl<T: Send> Send for FairRwLock<T> {}
unsafe impl<T: Send + Sync> Sync for FairRwLock<T> {}

impl<T> FairRwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            lock: FairLock::new(),
            data: UnsafeCell::new(value),
        }
    }

    pub fn read(&self) -> Result<ReadGuard<'_, T>, LockError> {
        if self.lock.holds_exclusive() {
            return Err(LockError::Reentrant);
        }
        self.lock.acquire_shared()?;
        Ok(ReadGuard { owner: self })
    }

    pub fn write(&self) -> Result<WriteGuard<'_, T>, LockError> {
        if self.lock.holds_exclusive() || self.lock.holds_shared() {
            return Err(LockError::Reentrant);
        }
        self.lock.acquire_exclusive()?;
        Ok(WriteGuard { owner: self })
    }

    /// Mutable access without locking; the borrow checker proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    pub fn mode(&self) -> LockMode {
        self.lock.mode()
    }
}

impl<T: Default> Default for FairRwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

pub struct ReadGuard<'a, T> {
    owner: &'a FairRwLock<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: a shared hold is live and no thread can hold exclusive.
        unsafe { &*self.owner.data.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.owner.lock.release_shared() {
            log::error!("[lock] read guard release failed: {}", e);
        }
    }
}

pub struct WriteGuard<'a, T> {
    owner: &'a FairRwLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: this thread is the only holder of any kind.
        unsafe { &*self.owner.data.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: this thread is the only holder of any kind.
        unsafe { &mut *self.owner.data.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.owner.lock.release_exclusive() {
            log::error!("[lock] write guard release failed: {}", e);
        }
    }
}
