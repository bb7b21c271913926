//! Performance measurement tools.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    time::{Duration, Instant},
};

const MAX_DURATIONS: usize = 250;

/// A timer that can measure and average the time an operation takes.
///
/// Collected timings are averaged and reset when the timer is displayed using `{}`
/// ([`std::fmt::Display`]).
pub struct Timer {
    name: &'static str,
    durations: RefCell<Vec<Duration>>,
    forgotten: Cell<bool>,
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            durations: Default::default(),
            forgotten: Cell::new(false),
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&mut self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation using a drop guard.
    ///
    /// When the returned [`TimerGuard`] is dropped, the time between the call to `start` and the
    /// drop is measured and recorded.
    pub fn start(&mut self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn stop(&mut self, start: Instant) {
        if self.forgotten.get() {
            return;
        }

        let duration = start.elapsed();
        let durations = &mut self.durations.get_mut();
        if durations.len() < MAX_DURATIONS {
            durations.push(duration);
        } else {
            // FIXME use a better strategy
            self.forgotten.set(true);
            durations.clear();
        }
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.forgotten.get() {
            write!(f, "{}: <forgotten>", self.name)
        } else {
            // (this can't actually fail, `time` takes `&mut self` and this function can't be
            // invoked more than once at the same time because `Timer` isn't `Sync`)
            let mut durations = self.durations.borrow_mut();
            let len = durations.len();
            let num = durations.len() as f32;
            let avg_ms = durations
                .iter()
                .fold(0.0, |prev, new| prev + new.as_secs_f32() * 1000.0 / num);
            durations.clear();

            write!(f, "{}: {len}x{avg_ms:.01}ms", self.name)
        }
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a mut Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

/// Estimates the rate at which it is called, averaged over a trailing window of call intervals.
///
/// Advance the estimator once per frame from the render loop; it is not meant to be shared
/// between threads. Note that two advances sharing an identical timestamp make the window sum
/// zero, so the returned rate becomes infinite. Callers are expected to advance at most once per
/// clock tick.
pub struct FpsEstimator {
    window: VecDeque<Duration>,
    capacity: usize,
    prev: Option<Instant>,
}

impl FpsEstimator {
    /// Creates an estimator averaging over the last `capacity` call intervals.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "FPS window capacity must be non-zero");
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            prev: None,
        }
    }

    /// Records a call at the current monotonic clock reading and returns the smoothed rate.
    ///
    /// The first advance returns exactly `0.0`, since no interval is available yet. Every later
    /// advance returns the reciprocal of the mean interval over the window contents.
    pub fn advance(&mut self) -> f64 {
        self.advance_at(Instant::now())
    }

    fn advance_at(&mut self, now: Instant) -> f64 {
        let prev = match self.prev.replace(now) {
            Some(prev) => prev,
            None => return 0.0,
        };

        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(now - prev);

        let sum: Duration = self.window.iter().sum();
        self.window.len() as f64 / sum.as_secs_f64()
    }

    /// Returns the number of intervals currently held in the window.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn timestamps(millis: &[u64]) -> impl Iterator<Item = Instant> + '_ {
        let base = Instant::now();
        millis.iter().map(move |ms| base + Duration::from_millis(*ms))
    }

    #[test]
    fn first_advance_is_zero() {
        for cap in [1, 2, 30] {
            let mut fps = FpsEstimator::new(cap);
            assert_eq!(fps.advance_at(Instant::now()), 0.0);
            assert_eq!(fps.window_len(), 0);
        }
    }

    #[test]
    fn steady_rate() {
        let mut fps = FpsEstimator::new(30);
        let mut last = 0.0;
        for now in timestamps(&[0, 100, 200, 300, 400]) {
            last = fps.advance_at(now);
        }
        // 100ms per frame -> 10 FPS.
        assert_relative_eq!(last, 10.0, max_relative = 1e-9);
        assert_eq!(fps.window_len(), 4);
    }

    #[test]
    fn windowed_average_formula() {
        let ms = [0, 10, 30, 60, 100];
        let mut fps = FpsEstimator::new(3);
        let mut rates = Vec::new();
        for now in timestamps(&ms) {
            rates.push(fps.advance_at(now));
        }

        assert_eq!(rates[0], 0.0);
        // Deltas are 10, 20, 30, 40 ms; the window holds at most the last 3.
        assert_relative_eq!(rates[1], 1.0 / 0.010);
        assert_relative_eq!(rates[2], 2.0 / 0.030);
        assert_relative_eq!(rates[3], 3.0 / 0.060);
        assert_relative_eq!(rates[4], 3.0 / 0.090);
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let mut fps = FpsEstimator::new(4);
        let base = Instant::now();
        for i in 0..100 {
            fps.advance_at(base + Duration::from_millis(i * 7));
            assert!(fps.window_len() <= 4);
        }
        assert_eq!(fps.window_len(), 4);
    }

    #[test]
    fn identical_timestamps_yield_infinity() {
        // Known limitation carried over from the original: a zero interval sum divides by zero.
        let mut fps = FpsEstimator::new(8);
        let now = Instant::now();
        assert_eq!(fps.advance_at(now), 0.0);
        assert!(fps.advance_at(now).is_infinite());
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        FpsEstimator::new(0);
    }
}
