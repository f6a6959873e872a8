//! Debounce, throttle and backoff primitives.
//!
//! Timers here are plain deadlines: the owning component asks whether a
//! deadline is due against a [`Clock`], or hands the deadline to
//! `tokio::time::sleep_until`. Nothing in this module spawns work, so tests
//! drive time with [`ManualClock`] or a paused tokio runtime.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Clock backed by tokio's time source (pausable in tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// A single re-armable deadline with `schedule`/`cancel`/`flush`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduledTask {
    deadline: Option<Instant>,
}

impl ScheduledTask {
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm (or re-arm) the task to fire `delay` after `now`.
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    /// Disarm the task. Returns whether it was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Disarm the task so the caller can run its work now.
    /// Returns whether there was anything to flush.
    pub fn flush(&mut self) -> bool {
        self.cancel()
    }

    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Disarm and return `true` if the deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

/// Coalesces a burst of values into the last one, released after a quiet period.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    task: ScheduledTask,
    pending: Option<T>,
}

impl<T> Debouncer<T> {
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            task: ScheduledTask::new(),
            pending: None,
        }
    }

    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace the pending value and restart the quiet period.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        self.task.schedule(now, self.delay);
    }

    /// Release the pending value if the quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.task.fire_if_due(now) {
            self.pending.take()
        } else {
            None
        }
    }

    /// Release the pending value immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.task.flush();
        self.pending.take()
    }

    /// Drop the pending value without releasing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.task.cancel();
        self.pending.take()
    }

    pub const fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    pub const fn deadline(&self) -> Option<Instant> {
        self.task.deadline()
    }
}

/// Leading-edge throttle: at most one acquisition per interval.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Linear backoff: `base * attempt`.
pub fn linear_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn scheduled_task_reschedule_moves_deadline() {
        let clock = ManualClock::new();
        let mut task = ScheduledTask::new();
        task.schedule(clock.now(), MS * 100);
        clock.advance(MS * 60);
        task.schedule(clock.now(), MS * 100);
        clock.advance(MS * 60);
        assert!(!task.is_due(clock.now()));
        clock.advance(MS * 40);
        assert!(task.fire_if_due(clock.now()));
        assert!(!task.is_armed());
    }

    #[test]
    fn scheduled_task_flush_and_cancel_report_armed_state() {
        let mut task = ScheduledTask::new();
        assert!(!task.flush());
        task.schedule(Instant::now(), MS);
        assert!(task.cancel());
        assert!(!task.cancel());
    }

    #[test]
    fn debouncer_keeps_only_last_value() {
        let clock = ManualClock::new();
        let mut debouncer = Debouncer::new(MS * 500);
        for value in 1..=5 {
            debouncer.push(value, clock.now());
            clock.advance(MS * 100);
            assert_eq!(debouncer.poll(clock.now()), None);
        }
        clock.advance(MS * 400);
        assert_eq!(debouncer.poll(clock.now()), Some(5));
        assert_eq!(debouncer.poll(clock.now()), None);
    }

    #[test]
    fn debouncer_flush_releases_immediately() {
        let mut debouncer = Debouncer::new(MS * 500);
        debouncer.push("draft", Instant::now());
        assert_eq!(debouncer.flush(), Some("draft"));
        assert!(debouncer.deadline().is_none());
    }

    #[test]
    fn throttle_allows_one_per_interval() {
        let clock = ManualClock::new();
        let mut throttle = Throttle::new(MS * 1000);
        assert!(throttle.try_acquire(clock.now()));
        clock.advance(MS * 999);
        assert!(!throttle.try_acquire(clock.now()));
        clock.advance(MS);
        assert!(throttle.try_acquire(clock.now()));
    }

    #[test]
    fn linear_backoff_scales_with_attempt() {
        assert_eq!(linear_backoff(MS * 1000, 3), MS * 3000);
        assert_eq!(linear_backoff(MS * 1000, 0), Duration::ZERO);
    }
}
