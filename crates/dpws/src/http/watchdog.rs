// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Idle-connection watchdog.
//!
//! One thread per server tracks every live connection. A connection arms
//! its deadline before waiting for a request and disarms it once a head
//! arrives; an expired deadline shuts the socket down so the blocked
//! reader sees EOF.

use super::connection::IdleWatch;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

enum Command {
    Register(u64, TcpStream, Arc<AtomicBool>),
    Arm(u64, Instant),
    Disarm(u64),
    Unregister(u64),
    Stop,
}

struct Slot {
    stream: TcpStream,
    fired: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

pub(crate) struct Watchdog {
    tx: Sender<Command>,
    next_id: AtomicU64,
    timeout: Duration,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    pub(crate) fn start(timeout: Duration) -> io::Result<Self> {
        let (tx, rx) = channel::unbounded();
        let handle = thread::Builder::new()
            .name("dpws-http-watchdog".into())
            .spawn(move || watch_loop(&rx))?;
        Ok(Self {
            tx,
            next_id: AtomicU64::new(1),
            timeout,
            handle: parking_lot::Mutex::new(Some(handle)),
        })
    }

    /// Track `stream` until the returned handle is dropped.
    pub(crate) fn watch(&self, stream: &TcpStream) -> io::Result<WatchHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let fired = Arc::new(AtomicBool::new(false));
        self.tx
            .send(Command::Register(id, stream.try_clone()?, Arc::clone(&fired)))
            .map_err(|_| io::Error::new(io::ErrorKind::NotConnected, "watchdog stopped"))?;
        Ok(WatchHandle {
            id,
            timeout: self.timeout,
            tx: self.tx.clone(),
            fired,
        })
    }

    /// Close every tracked connection and stop the thread.
    pub(crate) fn stop(&self) {
        let _ = self.tx.send(Command::Stop);
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                log::error!("[http] watchdog thread panicked");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-connection side of the watchdog.
pub(crate) struct WatchHandle {
    id: u64,
    timeout: Duration,
    tx: Sender<Command>,
    fired: Arc<AtomicBool>,
}

impl IdleWatch for WatchHandle {
    fn arm(&self) {
        let _ = self.tx.send(Command::Arm(self.id, Instant::now() + self.timeout));
    }

    fn disarm(&self) {
        let _ = self.tx.send(Command::Disarm(self.id));
    }

    fn fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Unregister(self.id));
    }
}

fn watch_loop(rx: &Receiver<Command>) {
    let mut slots: HashMap<u64, Slot> = HashMap::new();
    loop {
        let next = slots.values().filter_map(|s| s.deadline).min();
        let received = match next {
            Some(deadline) => rx.recv_deadline(deadline),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(Command::Register(id, stream, fired)) => {
                slots.insert(
                    id,
                    Slot {
                        stream,
                        fired,
                        deadline: None,
                    },
                );
            }
            Ok(Command::Arm(id, deadline)) => {
                if let Some(slot) = slots.get_mut(&id) {
                    slot.deadline = Some(deadline);
                }
            }
            Ok(Command::Disarm(id)) => {
                if let Some(slot) = slots.get_mut(&id) {
                    slot.deadline = None;
                }
            }
            Ok(Command::Unregister(id)) => {
                slots.remove(&id);
            }
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        expire(&mut slots, Instant::now());
    }

    for (_, slot) in slots.drain() {
        let _ = slot.stream.shutdown(Shutdown::Both);
    }
    log::debug!("[http] watchdog stopped");
}

fn expire(slots: &mut HashMap<u64, Slot>, now: Instant) {
    for (id, slot) in slots.iter_mut() {
        if slot.deadline.is_some_and(|d| d <= now) {
            slot.deadline = None;
            slot.fired.store(true, Ordering::Release);
            log::debug!("[http] connection #{} idle past deadline, closing", id);
            let _ = slot.stream.shutdown(Shutdown::Both);
        }
    }
}
