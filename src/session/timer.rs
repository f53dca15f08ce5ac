// src/session/timer.rs

use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use chrono::{DateTime, Duration, Utc};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used to simulate suspension and expiry.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// End instant of an attempt started at `start`. `None` for untimed tests.
pub fn end_time_for(start: DateTime<Utc>, duration_minutes: u32) -> Option<DateTime<Utc>> {
    (duration_minutes > 0).then(|| start + Duration::minutes(i64::from(duration_minutes)))
}

/// `max(0, end_time - now)`. Derived on every call; `end_time` is authoritative.
pub fn time_remaining(end_time: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (end_time - now).max(Duration::zero())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Handle to a running tick task.
///
/// Dropping the handle detaches the task; `cancel` aborts it.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Runs `on_tick` every `period` until it returns `Stop` or the handle is cancelled.
/// Missed ticks are skipped, not replayed.
pub fn spawn_ticker<F, Fut>(period: StdDuration, mut on_tick: F) -> TimerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = TickControl> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            if on_tick().await == TickControl::Stop {
                break;
            }
        }
    });

    TimerHandle { task }
}
