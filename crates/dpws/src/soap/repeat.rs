// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SOAP-over-UDP retransmission.
//!
//! One immediate transmission, then `repeat_count` repeats. The first repeat
//! waits a random delay in `[min_delay, max_delay]`, each later one doubles
//! the previous delay up to `upper_delay`. A send failure aborts whatever
//! repeats remain.

use crate::config::RepeatConfig;
use crate::error::{Error, Result};
use crate::rt::WorkerPool;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Anything that can put a datagram on the wire.
pub trait DatagramSink: Send + Sync {
    fn send_datagram(&self, data: &[u8], dest: SocketAddr) -> io::Result<()>;
}

impl DatagramSink for UdpSocket {
    fn send_datagram(&self, data: &[u8], dest: SocketAddr) -> io::Result<()> {
        let sent = self.send_to(data, dest)?;
        if sent != data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram write ({} of {})", sent, data.len()),
            ));
        }
        Ok(())
    }
}

/// Delays between consecutive transmissions for one send.
///
/// Returns `repeat_count` entries; they never decrease and never exceed
/// `upper_delay`.
pub fn repeat_schedule(config: &RepeatConfig) -> Vec<Duration> {
    let lo = config.min_delay.min(config.max_delay);
    let hi = config.min_delay.max(config.max_delay);
    let upper = config.upper_delay.max(lo);

    let mut delay = fastrand::u64(lo..=hi).min(upper);
    let mut schedule = Vec::with_capacity(config.repeat_count as usize);
    for _ in 0..config.repeat_count {
        schedule.push(Duration::from_millis(delay));
        delay = delay.saturating_mul(2).min(upper);
    }
    schedule
}

/// Sends datagrams with the configured repetition.
///
/// Repeats run on the worker pool when one is attached (falling back to a
/// dedicated thread when the pool refuses), so [`RepeatSender::send`]
/// returns after the first transmission.
#[derive(Clone)]
pub struct RepeatSender {
    sink: Arc<dyn DatagramSink>,
    config: RepeatConfig,
    pool: Option<WorkerPool>,
    cancelled: Arc<AtomicBool>,
    aborted: Arc<AtomicU64>,
}

impl RepeatSender {
    pub fn new(sink: Arc<dyn DatagramSink>, config: RepeatConfig) -> Self {
        Self {
            sink,
            config,
            pool: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            aborted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Same sink, pool and cancellation flag with a different schedule.
    pub fn with_config(&self, config: RepeatConfig) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    pub fn config(&self) -> &RepeatConfig {
        &self.config
    }

    /// Sends whose repeats were cut short by a failure.
    pub fn aborted_count(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Stop pending repeats of every clone of this sender.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Transmit now and schedule the repeats in the background.
    ///
    /// Only the first transmission's failure is returned; later failures
    /// are logged.
    pub fn send(&self, data: Vec<u8>, dest: SocketAddr) -> Result<()> {
        crate::trace_fn!("RepeatSender::send");
        self.transmit(&data, dest)?;
        if self.config.repeat_count == 0 {
            return Ok(());
        }

        let schedule = repeat_schedule(&self.config);
        let this = self.clone();
        let job = move || {
            this.run_repeats(&data, dest, &schedule);
        };
        match &self.pool {
            Some(pool) => {
                if let Err(e) = pool.submit(job) {
                    log::debug!("[soap-udp] pool refused repeats ({}), not repeating", e);
                }
            }
            None => {
                thread::Builder::new()
                    .name("dpws-udp-repeat".to_string())
                    .spawn(job)
                    .map_err(Error::Io)?;
            }
        }
        Ok(())
    }

    /// Transmit and repeat on the calling thread.
    ///
    /// Returns the number of transmissions made; stops at the first failure.
    pub fn send_blocking(&self, data: &[u8], dest: SocketAddr) -> Result<usize> {
        self.transmit(data, dest)?;
        let schedule = repeat_schedule(&self.config);
        Ok(1 + self.run_repeats(data, dest, &schedule))
    }

    fn transmit(&self, data: &[u8], dest: SocketAddr) -> Result<()> {
        self.sink
            .send_datagram(data, dest)
            .map_err(|e| Error::Send(format!("{}: {}", dest, e)))
    }

    fn run_repeats(&self, data: &[u8], dest: SocketAddr, schedule: &[Duration]) -> usize {
        let mut sent = 0;
        for delay in schedule {
            thread::sleep(*delay);
            if self.cancelled.load(Ordering::Acquire) {
                break;
            }
            if let Err(e) = self.transmit(data, dest) {
                self.aborted.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "[soap-udp] {}, dropping {} remaining repeat(s)",
                    e,
                    schedule.len() - sent
                );
                break;
            }
            sent += 1;
        }
        sent
    }
}

impl std::fmt::Debug for RepeatSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepeatSender")
            .field("config", &self.config)
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}
