/// Undo history: a stack of snapshots.
///
/// Two modes:
///   - unbounded — play sessions keep every action of an attempt
///   - bounded   — keeps the newest `cap` entries, dropping the oldest

use std::collections::VecDeque;

#[derive(Clone, Debug)]
pub struct History<T> {
    entries: VecDeque<T>,
    cap: Option<usize>,
}

impl<T> History<T> {
    pub fn unbounded() -> Self {
        History { entries: VecDeque::new(), cap: None }
    }

    /// A cap of 0 is treated as 1.
    pub fn bounded(cap: usize) -> Self {
        let cap = cap.max(1);
        History { entries: VecDeque::with_capacity(cap), cap: Some(cap) }
    }

    /// `limit == 0` means unbounded (config convention).
    pub fn with_limit(limit: usize) -> Self {
        if limit == 0 { Self::unbounded() } else { Self::bounded(limit) }
    }

    pub fn push(&mut self, entry: T) {
        if let Some(cap) = self.cap {
            while self.entries.len() >= cap {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_is_lifo() {
        let mut h = History::unbounded();
        h.push(1);
        h.push(2);
        assert_eq!(h.pop(), Some(2));
        assert_eq!(h.pop(), Some(1));
        assert_eq!(h.pop(), None);
    }

    #[test]
    fn unbounded_keeps_everything() {
        let mut h = History::unbounded();
        for i in 0..500 {
            h.push(i);
        }
        assert_eq!(h.len(), 500);
    }

    #[test]
    fn bounded_drops_oldest() {
        let mut h = History::bounded(50);
        for i in 0..60 {
            h.push(i);
        }
        assert_eq!(h.len(), 50);
        assert_eq!(h.pop(), Some(59));
        let mut last = None;
        while let Some(v) = h.pop() {
            last = Some(v);
        }
        assert_eq!(last, Some(10));
    }

    #[test]
    fn limit_zero_means_unbounded() {
        let fill = |mut h: History<u8>| {
            for i in 0..10 {
                h.push(i);
            }
            h.len()
        };
        assert_eq!(fill(History::with_limit(0)), 10);
        assert_eq!(fill(History::with_limit(3)), 3);
        assert_eq!(fill(History::bounded(0)), 1);
    }
}
