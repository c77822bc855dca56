//! Cancellable countdown tick source for attempt sessions.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// One elapsed tick period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick;

/// Handle to a background task that emits a [`Tick`] every period.
///
/// The task stops when the handle is stopped or dropped, or when the
/// receiving side goes away. Must be started from inside a tokio runtime.
#[derive(Debug)]
pub struct CountdownTimer {
    task: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Spawn the tick task. The first tick arrives one full period from now.
    pub fn start(period: Duration) -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(Tick).is_err() {
                    tracing::debug!("tick receiver dropped, stopping countdown");
                    break;
                }
            }
        });
        (Self { task: Some(task) }, rx)
    }

    /// Abort the tick task. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("countdown stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let (_timer, mut rx) = CountdownTimer::start(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let mut ticks = 0;
        while rx.try_recv().is_ok() {
            ticks += 1;
        }
        assert_eq!(ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_the_channel() {
        let (mut timer, mut rx) = CountdownTimer::start(Duration::from_secs(1));
        assert!(timer.is_running());

        timer.stop();
        timer.stop();
        assert!(!timer.is_running());
        // The aborted task drops its sender.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_the_task() {
        let (timer, mut rx) = CountdownTimer::start(Duration::from_secs(1));
        drop(timer);
        assert_eq!(rx.recv().await, None);
    }
}
