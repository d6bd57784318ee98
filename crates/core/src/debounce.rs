//! Cancelable deferral of high-frequency UI work.
//!
//! Time is passed in explicitly so the owner decides what clock drives it
//! (a tokio interval in the server, plain `Instant`s in tests).

use std::time::{Duration, Instant};

/// Upper bound on how long a scroll offset may sit unpersisted.
pub const MAX_SCROLL_COALESCE: Duration = Duration::from_millis(250);
pub const DEFAULT_SCROLL_COALESCE: Duration = Duration::from_millis(200);
pub const DEFAULT_SUGGESTION_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Every push restarts the timer.
    Trailing,
    /// The deadline is fixed by the first push; later pushes only replace the value.
    Window,
}

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    mode: Mode,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    /// Trailing debounce: fires `delay` after the last push.
    pub fn trailing(delay: Duration) -> Self {
        Self {
            delay,
            mode: Mode::Trailing,
            pending: None,
        }
    }

    /// Coalescing window: fires `window` after the first push of a batch.
    pub fn window(window: Duration) -> Self {
        Self {
            delay: window,
            mode: Mode::Window,
            pending: None,
        }
    }

    /// Schedule `value`, replacing (and so cancelling) any earlier pending one.
    pub fn push(&mut self, value: T, now: Instant) {
        let deadline = match (&self.pending, self.mode) {
            (Some((_, deadline)), Mode::Window) => *deadline,
            _ => now + self.delay,
        };
        self.pending = Some((value, deadline));
    }

    /// Take the pending value if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    /// Take the pending value immediately, regardless of its deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(v, _)| v)
    }

    /// Drop the pending value without firing.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, d)| *d)
    }
}
