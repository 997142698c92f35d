//! Periodic poll timer.
//!
//! A timer does not touch the bus itself. Each tick posts
//! [`AdapterEvent::Poll`] into the adapter event loop, which owns the bus and
//! runs the read there, so polls never overlap with other bus traffic.

use crate::adapter::AdapterEvent;
use pinbridge_core::BusAddress;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::trace;

/// Repeating poll trigger for one device.
///
/// The task is aborted when the timer is cancelled or dropped.
#[derive(Debug)]
pub struct PollTimer {
    address: BusAddress,
    period: Duration,
    task: JoinHandle<()>,
}

impl PollTimer {
    /// Start posting `Poll(address)` every `period`, first tick one period
    /// from now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(address: BusAddress, period: Duration, events: mpsc::Sender<AdapterEvent>) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match events.try_send(AdapterEvent::Poll(address)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        // Event loop is behind; the next tick reads fresh data anyway
                        trace!(%address, "Skipping poll tick");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
        });

        Self {
            address,
            period,
            task,
        }
    }

    /// Device this timer polls.
    pub fn address(&self) -> BusAddress {
        self.address
    }

    /// Interval between ticks.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Check if the timer task is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the timer.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
