use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Shared interrupt flag and pause toggle for one producer or consumer loop.
///
/// Loops check the control between reads or executions, so a signal takes effect within one
/// poll interval. Give each loop its own control: pausing a consumer must never pause the
/// producer feeding it.
#[derive(Debug, Default)]
pub struct Control {
    interrupted: AtomicBool,
    paused: AtomicBool,
}

/// Control of a consumer loop.
pub type ConsumerControl = Control;
/// Control of a producer loop.
pub type ProducerControl = Control;

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the loop to return at its next check.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Clears a previous interrupt so the loop can be restarted (e.g. after cycling the active
    /// query).
    pub fn reset(&self) {
        self.interrupted.store(false, Ordering::Release);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    /// Flips the pause state and returns the new one.
    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Sleeps for `duration` in steps of at most `tick`, returning early on interrupt.
    ///
    /// Returns `false` if interrupted. A duration too large to represent as a deadline sleeps until interrupted.
    pub fn sleep(&self, duration: Duration, tick: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_interrupted() {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(remaining.min(tick));
        }
    }
}
