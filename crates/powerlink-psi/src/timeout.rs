// crates/powerlink-psi/src/timeout.rs
use alloc::rc::Rc;
use core::cell::Cell;

/// Result of [`Timeout::check_expire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Stopped,
    Running,
    Expired,
}

#[derive(Debug, Default)]
struct Counter {
    count: Cell<u16>,
    enabled: Cell<bool>,
}

/// Cooperative timeout counted in transfer cycles.
///
/// Clones share the same counter, so a channel can hand one clone to the
/// stream post-action that advances it each cycle.
#[derive(Debug, Clone)]
pub struct Timeout {
    threshold: u16,
    counter: Rc<Counter>,
}

impl Timeout {
    pub fn new(threshold: u16) -> Self {
        Self {
            threshold,
            counter: Rc::new(Counter::default()),
        }
    }

    /// Restarts counting from zero.
    pub fn start(&self) {
        self.counter.count.set(0);
        self.counter.enabled.set(true);
    }

    pub fn stop(&self) {
        self.counter.enabled.set(false);
        self.counter.count.set(0);
    }

    /// Advances the counter by one cycle while running.
    pub fn increment(&self) {
        if self.counter.enabled.get() {
            let count = self.counter.count.get();
            self.counter.count.set(count.saturating_add(1));
        }
    }

    pub fn check_expire(&self) -> TimerState {
        if !self.counter.enabled.get() {
            TimerState::Stopped
        } else if self.counter.count.get() >= self.threshold {
            TimerState::Expired
        } else {
            TimerState::Running
        }
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn elapsed(&self) -> u16 {
        self.counter.count.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_after_threshold_cycles() {
        let timeout = Timeout::new(3);
        assert_eq!(timeout.check_expire(), TimerState::Stopped);

        timeout.start();
        timeout.increment();
        timeout.increment();
        assert_eq!(timeout.check_expire(), TimerState::Running);
        timeout.increment();
        assert_eq!(timeout.check_expire(), TimerState::Expired);

        timeout.stop();
        assert_eq!(timeout.check_expire(), TimerState::Stopped);
        assert_eq!(timeout.elapsed(), 0);
    }

    #[test]
    fn test_clones_share_the_counter() {
        let timeout = Timeout::new(2);
        let ticker = timeout.clone();
        timeout.start();
        ticker.increment();
        ticker.increment();
        assert_eq!(timeout.check_expire(), TimerState::Expired);
    }

    #[test]
    fn test_increment_is_ignored_while_stopped() {
        let timeout = Timeout::new(1);
        timeout.increment();
        timeout.start();
        assert_eq!(timeout.check_expire(), TimerState::Running);
    }
}
