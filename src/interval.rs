//! Periodic Task Runner
//!
//! An [`Interval`] owns one timer and a swappable piece of "current work".
//! The two are updated separately:
//!
//! - [`Interval::set_callback`] replaces the work; the timer keeps its cadence
//! - [`Interval::set_period`] re-arms the timer, but only when the period
//!   actually changes
//!
//! A period of `None` is the disabled state. When armed, the first tick
//! fires one full period after arming. Each tick runs the latest work as its
//! own task, so a slow run never delays the next tick and runs may overlap.

use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Work invoked on every tick
pub type Task = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure into a [`Task`]
pub fn task<F, Fut>(f: F) -> Task
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(f()) })
}

/// A timer that repeatedly runs the most recently installed task
pub struct Interval {
    name: &'static str,
    work: watch::Sender<Task>,
    period: Option<Duration>,
    timer: Option<JoinHandle<()>>,
}

impl Interval {
    /// Create a disarmed interval running `work` once armed
    pub fn new(name: &'static str, work: Task) -> Self {
        let (work, _) = watch::channel(work);
        Self {
            name,
            work,
            period: None,
            timer: None,
        }
    }

    /// Create a disarmed interval with no work installed yet
    pub fn idle(name: &'static str) -> Self {
        Self::new(name, task(|| async {}))
    }

    /// Replace the work run on subsequent ticks without touching the timer
    pub fn set_callback(&self, work: Task) {
        self.work.send_replace(work);
    }

    /// Arm (`Some`), re-arm, or disarm (`None`) the timer
    ///
    /// Does nothing when `period` equals the current period. A zero period
    /// is treated as disabled.
    pub fn set_period(&mut self, period: Option<Duration>) {
        let period = period.filter(|p| !p.is_zero());
        if period == self.period {
            return;
        }

        self.stop_timer();
        self.period = period;

        if let Some(period) = period {
            tracing::debug!(interval = self.name, ?period, "Arming interval");
            self.timer = Some(self.spawn_timer(period));
        } else {
            tracing::debug!(interval = self.name, "Interval disarmed");
        }
    }

    /// Current period, `None` when disarmed
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Equivalent to `set_period(None)`
    pub fn disarm(&mut self) {
        self.set_period(None);
    }

    fn spawn_timer(&self, period: Duration) -> JoinHandle<()> {
        let work = self.work.subscribe();
        let name = self.name;
        let first_tick = Instant::now() + period;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                tracing::trace!(interval = name, "Interval tick");

                let run = work.borrow().clone();
                tokio::spawn(run());
            }
        })
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Interval {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    fn counting_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = counter.clone();
        task(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    const PERIOD: Duration = Duration::from_millis(1000);
    const SLACK: Duration = Duration::from_millis(50);

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_fires() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut interval = Interval::new("test", counting_task(&counter));
        interval.set_period(None);

        tokio::time::sleep(PERIOD * 5).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!interval.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut interval = Interval::new("test", counting_task(&counter));
        interval.set_period(Some(PERIOD));

        tokio::time::sleep(PERIOD - SLACK).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(SLACK * 2).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(PERIOD * 2).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_stops_ticks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut interval = Interval::new("test", counting_task(&counter));
        interval.set_period(Some(PERIOD));

        tokio::time::sleep(PERIOD + SLACK).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        interval.disarm();
        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(interval.period(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_callback_keeps_cadence() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut interval = Interval::new("test", counting_task(&first));
        interval.set_period(Some(PERIOD));

        // Swap the work just before the first tick; the tick still lands on time
        tokio::time::sleep(PERIOD - SLACK).await;
        interval.set_callback(counting_task(&second));

        tokio::time::sleep(SLACK * 2).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_period_does_not_rearm() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut interval = Interval::new("test", counting_task(&counter));
        interval.set_period(Some(PERIOD));

        tokio::time::sleep(PERIOD - SLACK).await;
        interval.set_period(Some(PERIOD));

        tokio::time::sleep(SLACK * 2).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_period_rearms() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut interval = Interval::new("test", counting_task(&counter));
        interval.set_period(Some(PERIOD));

        tokio::time::sleep(PERIOD - SLACK).await;
        interval.set_period(Some(PERIOD * 2));

        // The old deadline passes without a tick; the new timer starts over
        tokio::time::sleep(SLACK * 2).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(PERIOD * 2).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_work_does_not_delay_ticks() {
        let started = Arc::new(AtomicUsize::new(0));
        let work = {
            let started = started.clone();
            task(move || {
                let started = started.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(PERIOD * 10).await;
                }
            })
        };

        let mut interval = Interval::new("test", work);
        interval.set_period(Some(PERIOD));

        tokio::time::sleep(PERIOD * 3 + SLACK).await;
        assert_eq!(started.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_disabled() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut interval = Interval::new("test", counting_task(&counter));
        interval.set_period(Some(Duration::ZERO));
        assert!(!interval.is_armed());
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_sub_millisecond_period_is_logged_exactly() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut interval = Interval::new("fast", counting_task(&counter));
        interval.set_period(Some(Duration::from_micros(1500)));

        assert!(logs_contain("period=1.5ms"));
        assert_eq!(interval.period(), Some(Duration::from_micros(1500)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_timer() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut interval = Interval::new("test", counting_task(&counter));
            interval.set_period(Some(PERIOD));
        }
        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
