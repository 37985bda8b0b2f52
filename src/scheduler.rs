use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const DEFAULT_AUTO_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Identifies one enabled timer. A fresh handle is issued on every `enable`, so a tick carrying
/// an old handle can always be told apart from the active timer's ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct ActiveTimer {
    handle: TimerHandle,
    task: JoinHandle<()>,
}

impl Drop for ActiveTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Periodic auto-check timer. At most one timer is active; dropping the scheduler cancels it.
///
/// Aborting the task stops future ticks, but a tick may already sit in the consumer's queue.
/// Consumers must check [`AutoCheckScheduler::is_active`] before acting on a tick.
#[derive(Debug, Default)]
pub struct AutoCheckScheduler {
    active: Option<ActiveTimer>,
    issued: u64,
}

impl AutoCheckScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a timer firing every `interval`, first after one full interval. Any previously
    /// enabled timer is cancelled first. `on_tick` returning `false` stops the timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enable<F>(&mut self, interval: Duration, mut on_tick: F) -> TimerHandle
    where
        F: FnMut(TimerHandle) -> bool + Send + 'static,
    {
        self.disable_active();

        self.issued += 1;
        let handle = TimerHandle(self.issued);
        let period = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !on_tick(handle) {
                    break;
                }
            }
        });

        tracing::debug!(timer = handle.0, period_ms = period.as_millis() as u64, "auto_check_enabled");
        self.active = Some(ActiveTimer { handle, task });
        handle
    }

    pub fn disable(&mut self, handle: TimerHandle) {
        if self.is_active(handle) {
            self.disable_active();
        }
    }

    pub fn disable_active(&mut self) {
        if let Some(timer) = self.active.take() {
            tracing::debug!(timer = timer.handle.0, "auto_check_disabled");
        }
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.active.as_ref().map(|t| t.handle) == Some(handle)
    }

    pub fn active(&self) -> Option<TimerHandle> {
        self.active.as_ref().map(|t| t.handle)
    }
}
