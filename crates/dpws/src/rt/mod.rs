// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime primitives shared by the HTTP and UDP servers.
//!
//! - [`WorkerPool`]: bounded, on-demand thread pool (connections, datagrams,
//!   repeat sends, watchdogs)
//! - [`FairLock`] / [`FairRwLock`]: reentrant reader/writer lock with FIFO
//!   fairness and upgrade-deadlock detection

mod fair_lock;
mod worker_pool;

pub use fair_lock::{
    ExclusiveGuard, FairLock, FairRwLock, LockError, LockMode, ReadGuard, SharedGuard, WriteGuard,
};
pub use worker_pool::{PoolError, Task, WorkerPool};
