//! Round-robin cursor shared by both dispatch passes.
//!
//! The candidate list may grow or shrink between steps; the cursor only
//! remembers a position and wraps it around whatever count it is given.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundRobinBalancer {
    counter: usize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// First index to try among `count` candidates, or `None` for none.
    pub fn peek(&self, count: usize) -> Option<usize> {
        (count > 0).then(|| self.counter % count)
    }

    /// Every index in `0..count`, starting at the cursor and wrapping.
    pub fn rotation(&self, count: usize) -> impl Iterator<Item = usize> + use<> {
        let start = self.peek(count).unwrap_or(0);
        (0..count).map(move |k| (start + k) % count)
    }

    /// Record that `chosen` was picked; the next scan starts after it.
    pub fn advance_past(&mut self, chosen: usize) {
        self.counter = chosen + 1;
    }
}
