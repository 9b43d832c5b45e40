//! Progress counters shared between pipeline stages
//!
//! A [`Counter`] is the only mutable state shared across threads besides the
//! cancel flag. Increment and read go through the same mutex. Every change is
//! published as a [`CounterEvent`] so the progress monitor never polls.

use crossbeam::channel::Sender;
use std::sync::Mutex;

/// Point-in-time view of a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub value: usize,
    /// Authoritative total, known once the jobber finished validation
    pub hard_max: Option<usize>,
    /// Estimate from the raw enumeration, for early display only
    pub soft_max: Option<usize>,
}

impl CounterSnapshot {
    /// True iff the hard max is set and reached. A hard max of 0 is vacuously complete.
    pub fn is_complete(&self) -> bool {
        self.hard_max == Some(self.value)
    }
}

/// Change notification published by a counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterEvent {
    pub counter: &'static str,
    pub snapshot: CounterSnapshot,
}

/// Named, monotonically increasing progress counter
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    state: Mutex<CounterSnapshot>,
    events: Option<Sender<CounterEvent>>,
}

impl Counter {
    /// Create a counter that publishes nothing
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(CounterSnapshot {
                value: 0,
                hard_max: None,
                soft_max: None,
            }),
            events: None,
        }
    }

    /// Create a counter that publishes every change on `events`
    pub fn with_events(name: &'static str, events: Sender<CounterEvent>) -> Self {
        Self {
            events: Some(events),
            ..Self::new(name)
        }
    }

    /// Add one and return the new value.
    ///
    /// Once the hard max is set the value never exceeds it; an increment past it is
    /// refused and logged, since it can only mean a job was counted twice.
    pub fn increment(&self) -> usize {
        let name = self.name;
        self.update(|state| {
            if let Some(max) = state.hard_max.filter(|max| state.value >= *max) {
                tracing::error!(counter = name, max, "Increment past hard max refused");
                return;
            }
            state.value += 1;
        })
        .value
    }

    /// Publish the authoritative total. Later calls overwrite earlier ones.
    pub fn set_hard_max(&self, max: usize) {
        self.update(|state| state.hard_max = Some(max));
    }

    /// Publish an early estimate of the total
    pub fn set_soft_max(&self, estimate: usize) {
        self.update(|state| state.soft_max = Some(estimate));
    }

    pub fn value(&self) -> usize {
        self.snapshot().value
    }

    pub fn hard_max(&self) -> Option<usize> {
        self.snapshot().hard_max
    }

    pub fn is_complete(&self) -> bool {
        self.snapshot().is_complete()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        *self.lock()
    }

    fn update(&self, apply: impl FnOnce(&mut CounterSnapshot)) -> CounterSnapshot {
        let snapshot = {
            let mut state = self.lock();
            apply(&mut state);
            *state
        };
        if let Some(events) = &self.events {
            // Monitor gone means nobody is watching; counting continues regardless
            let _ = events.send(CounterEvent {
                counter: self.name,
                snapshot,
            });
        }
        snapshot
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CounterSnapshot> {
        // A poisoned counter still holds a valid integer
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
