//! Cooperative progress reporting and cancellation.
//!
//! Long-running operations call [`Progress::update`] at coarse intervals.
//! Returning `false` asks the operation to stop; it then returns whatever
//! it has produced so far instead of an error.

/// Receives progress notifications; returning `false` cancels.
pub trait Progress {
    /// Report that `done` of `total` units of work are complete.
    fn update(&mut self, done: usize, total: usize) -> bool;
}

impl<F> Progress for F
where
    F: FnMut(usize, usize) -> bool,
{
    fn update(&mut self, done: usize, total: usize) -> bool {
        self(done, total)
    }
}

/// Progress sink that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl Progress for Unbounded {
    fn update(&mut self, _done: usize, _total: usize) -> bool {
        true
    }
}

/// Wraps a [`Progress`] and remembers whether it ever asked to stop.
pub(crate) struct Tracked<'a, P: Progress + ?Sized> {
    inner: &'a mut P,
    cancelled: bool,
}

impl<'a, P: Progress + ?Sized> Tracked<'a, P> {
    pub(crate) const fn new(inner: &'a mut P) -> Self {
        Self {
            inner,
            cancelled: false,
        }
    }

    pub(crate) const fn cancelled(&self) -> bool {
        self.cancelled
    }
}

impl<P: Progress + ?Sized> Progress for Tracked<'_, P> {
    fn update(&mut self, done: usize, total: usize) -> bool {
        if self.cancelled {
            return false;
        }
        let keep_going = self.inner.update(done, total);
        if !keep_going {
            self.cancelled = true;
        }
        keep_going
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_progress_sinks() {
        let mut calls = Vec::new();
        let mut sink = |done: usize, total: usize| {
            calls.push((done, total));
            done < 2
        };
        assert!(sink.update(1, 4));
        assert!(!sink.update(2, 4));
        assert_eq!(calls, vec![(1, 4), (2, 4)]);
    }

    #[test]
    fn unbounded_never_cancels() {
        assert!(Unbounded.update(usize::MAX, 1));
    }

    #[test]
    fn tracked_latches_cancellation() {
        let mut first = true;
        let mut sink = move |_: usize, _: usize| std::mem::replace(&mut first, false);
        let mut tracked = Tracked::new(&mut sink);
        assert!(tracked.update(0, 1));
        assert!(!tracked.update(1, 1));
        assert!(tracked.cancelled());
        assert!(!tracked.update(1, 1));
    }
}
