use std::time::Duration;

/// Identifies one scheduled snapshot emission. Only the most recently issued
/// handle can fire; older ones are stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::app) struct FrameHandle(u64);

/// Single-entry "cancel pending, schedule new" slot that coalesces any number
/// of ticks into one emitted snapshot per animation frame.
#[derive(Debug, Default)]
pub(super) struct FrameSlot {
    pending: Option<FrameHandle>,
    issued: u64,
}

impl FrameSlot {
    pub(super) fn schedule(&mut self) -> FrameHandle {
        self.issued += 1;
        let handle = FrameHandle(self.issued);
        self.pending = Some(handle);
        handle
    }

    pub(super) fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Consumes the pending frame if `handle` is it.
    pub(super) fn take(&mut self, handle: FrameHandle) -> bool {
        if self.pending == Some(handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub(super) fn cancel(&mut self) {
        self.pending = None;
    }
}

/// Converts wall-clock progress into a whole number of fixed-length ticks.
#[derive(Debug)]
pub(super) struct Cadence {
    interval: Duration,
    max_steps: usize,
    last: Option<Duration>,
    carry: Duration,
}

impl Cadence {
    pub(super) fn new(interval: Duration, max_steps: usize) -> Self {
        Self {
            interval: interval.max(Duration::from_micros(100)),
            max_steps: max_steps.max(1),
            last: None,
            carry: Duration::ZERO,
        }
    }

    /// Ticks owed at `now`. The first call after a reset owes one tick;
    /// backlog beyond `max_steps` is dropped rather than replayed.
    pub(super) fn due(&mut self, now: Duration) -> usize {
        let Some(last) = self.last.replace(now) else {
            self.carry = Duration::ZERO;
            return 1;
        };

        let elapsed = now.saturating_sub(last) + self.carry;
        let steps = (elapsed.as_nanos() / self.interval.as_nanos()) as usize;
        if steps > self.max_steps {
            self.carry = Duration::ZERO;
            return self.max_steps;
        }
        self.carry = elapsed - self.interval * steps as u32;
        steps
    }

    pub(super) fn reset(&mut self) {
        self.last = None;
        self.carry = Duration::ZERO;
    }
}
