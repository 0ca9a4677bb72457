//! Progress reporting for long-running import and export calls
//!
//! The caller supplies a `FnMut(percent, message)` callback. Work is
//! measured in cells; the callback fires when a sheet starts, every
//! `interval` cells, and once with 100 at the end.

/// Tracks processed cells against a known total and forwards updates.
pub struct ProgressTracker<F: FnMut(u8, &str)> {
    callback: F,
    interval: usize,
    total: usize,
    done: usize,
    since_report: usize,
}

impl<F: FnMut(u8, &str)> ProgressTracker<F> {
    /// `interval` of 0 disables the periodic updates.
    pub fn new(callback: F, interval: usize) -> Self {
        Self {
            callback,
            interval,
            total: 0,
            done: 0,
            since_report: 0,
        }
    }

    /// Add work to the expected total
    pub fn expect(&mut self, cells: usize) {
        self.total += cells;
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        // Never report completion before `finish`
        ((self.done.min(self.total) * 99) / self.total) as u8
    }

    pub fn report(&mut self, message: &str) {
        let percent = self.percent();
        (self.callback)(percent, message);
    }

    /// Record one processed cell; reports when the interval is reached.
    pub fn tick(&mut self, message: &str) {
        self.done += 1;
        self.since_report += 1;
        if self.interval > 0 && self.since_report >= self.interval {
            self.since_report = 0;
            self.report(message);
        }
    }

    pub fn finish(&mut self, message: &str) {
        self.done = self.total;
        (self.callback)(100, message);
    }
}

/// A callback that ignores every update
pub fn silent(_percent: u8, _message: &str) {}
