use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

/// Fixed-period repeating timer
///
/// Fires `period` after being armed, then every `period` thereafter, until disarmed or dropped.
/// Must be armed from within a tokio runtime.
#[derive(Debug, Default)]
pub struct HeartbeatScheduler {
    armed: Option<Armed>,
}

#[derive(Debug)]
struct Armed {
    live: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl HeartbeatScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start calling `tick` every `period`, replacing any previous schedule
    ///
    /// `tick` runs on the timer task and should hand off any real work rather than block. A zero
    /// `period` leaves the scheduler disarmed.
    pub fn arm<F>(&mut self, period: Duration, mut tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.disarm();
        if period.is_zero() {
            return;
        }
        let live = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn({
            let live = live.clone();
            async move {
                let mut interval = time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    if !live.load(Ordering::Acquire) {
                        break;
                    }
                    tick();
                }
            }
        });
        self.armed = Some(Armed { live, task });
    }

    /// Stop firing. Harmless if not armed.
    ///
    /// Returns whether a schedule was cancelled.
    pub fn disarm(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.live.store(false, Ordering::Release);
                armed.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}
