//! Cooperative cancellation flag shared by every pipeline stage

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Raised once, observed by the jobber, workers and stasher.
///
/// Raising it makes the jobber stop enqueuing, workers discard queued jobs after
/// their in-flight one, and the stasher close after draining what is queued.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    raised: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        if !self.raised.swap(true, Ordering::SeqCst) {
            tracing::info!("Cancellation requested");
        }
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_raised());

        token.raise();
        token.raise();
        assert!(observer.is_raised());
    }
}
