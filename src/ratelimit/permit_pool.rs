//! Fixed-window permit pool.
//!
//! A pool hands out at most `capacity` permits per window. A background task
//! owned by the pool refills it to full capacity at every window boundary,
//! discarding whatever was left of the previous window. Because the refill is
//! unconditional, up to twice the capacity can be admitted in a short span
//! straddling a boundary.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::window::TimeWindow;
use crate::config::LimiterConfig;
use crate::error::{GatewayError, Result};

/// State shared between the pool handle and its reset task.
struct Permits {
    /// Maximum permits per window
    capacity: u32,
    /// Permits left in the current window
    available: Mutex<u32>,
    /// Woken on every refill
    refilled: Notify,
}

impl Permits {
    fn try_take(&self) -> bool {
        let mut available = self.available.lock();
        if *available > 0 {
            *available -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&self) {
        let discarded = {
            let mut available = self.available.lock();
            let left = *available;
            *available = self.capacity;
            left
        };

        trace!(
            capacity = self.capacity,
            discarded = discarded,
            "Permit window reset"
        );

        self.refilled.notify_waiters();
    }
}

/// A bounded pool of permits refilled once per window.
///
/// The pool must be created inside a tokio runtime since construction spawns
/// the reset task. Call [`PermitPool::shutdown`] to stop that task; dropping
/// the pool stops it as well.
pub struct PermitPool {
    permits: Arc<Permits>,
    window: Duration,
    reset_task: Mutex<Option<JoinHandle<()>>>,
}

impl PermitPool {
    /// Create a pool admitting `capacity` permits per `window`.
    ///
    /// The pool starts full; the first refill happens one window after
    /// construction.
    pub fn new(window: Duration, capacity: u32) -> Result<Self> {
        if capacity == 0 {
            return Err(GatewayError::Config(
                "permit capacity must be greater than zero".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(GatewayError::Config(
                "permit window must be longer than zero".to_string(),
            ));
        }

        let permits = Arc::new(Permits {
            capacity,
            available: Mutex::new(capacity),
            refilled: Notify::new(),
        });

        let reset_task = spawn_reset_task(permits.clone(), window);

        info!(
            capacity = capacity,
            window = ?window,
            "Permit pool started"
        );

        Ok(Self {
            permits,
            window,
            reset_task: Mutex::new(Some(reset_task)),
        })
    }

    /// Create a pool from limiter configuration.
    pub fn from_config(config: &LimiterConfig) -> Result<Self> {
        Self::new(config.time_unit.duration(), config.requests_per_unit)
    }

    /// Create a pool admitting `capacity` permits per named window.
    pub fn per(window: TimeWindow, capacity: u32) -> Result<Self> {
        Self::new(window.duration(), capacity)
    }

    /// Wait for a permit and consume it.
    ///
    /// There is no bound on the wait and no fairness between waiters. Dropping
    /// the returned future before it completes never consumes a permit.
    pub async fn acquire(&self) {
        loop {
            let refilled = self.permits.refilled.notified();
            tokio::pin!(refilled);
            // Register before checking so a refill between the check and the
            // await is not lost.
            refilled.as_mut().enable();

            if self.permits.try_take() {
                trace!("Permit granted");
                return;
            }

            debug!(
                capacity = self.permits.capacity,
                "Permit pool exhausted, waiting for the next window"
            );
            refilled.await;
        }
    }

    /// Wait for a permit unless `cancel` fires first.
    ///
    /// Returns [`GatewayError::AcquisitionCancelled`] on cancellation, in which
    /// case no permit is consumed.
    pub async fn acquire_cancellable(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Permit acquisition cancelled");
                Err(GatewayError::AcquisitionCancelled)
            }
            _ = self.acquire() => Ok(()),
        }
    }

    /// Consume a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.permits.try_take()
    }

    /// Stop the reset task.
    ///
    /// Callers already waiting in [`PermitPool::acquire`] stay blocked; they
    /// are released only by permits left over from the last refill or by
    /// their own cancellation. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        if let Some(task) = self.reset_task.lock().take() {
            task.abort();
            info!(capacity = self.permits.capacity, "Permit pool stopped");
        }
    }

    /// Whether the reset task is still running.
    pub fn is_running(&self) -> bool {
        self.reset_task
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Maximum permits per window.
    pub fn capacity(&self) -> u32 {
        self.permits.capacity
    }

    /// Permits left in the current window.
    pub fn available(&self) -> u32 {
        *self.permits.available.lock()
    }

    /// Length of one window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl std::fmt::Debug for PermitPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermitPool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .field("window", &self.window)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for PermitPool {
    fn drop(&mut self) {
        if let Some(task) = self.reset_task.get_mut().take() {
            task.abort();
        }
    }
}

fn spawn_reset_task(permits: Arc<Permits>, window: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        // The pool starts full, which stands in for the refill at time zero.
        let mut ticker = tokio::time::interval_at(Instant::now() + window, window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            permits.refill();
        }
    })
}
