//! Network reachability monitoring.
//!
//! The platform-specific connectivity source feeds raw reachability
//! events into [`ConnectivityMonitor::report`]; subscribers observe only
//! de-duplicated transitions. Suppressing repeated identical states is a
//! correctness requirement for the scheduler, which treats every emitted
//! `true` as "attempt a sync now".

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

/// Tracks network reachability and broadcasts transitions.
pub struct ConnectivityMonitor {
    online: AtomicBool,
    subscribers: RwLock<Vec<Sender<bool>>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Returns the current reachability state.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Feeds a raw reachability observation into the monitor.
    ///
    /// Emits to subscribers only when the state actually changed;
    /// duplicate consecutive observations are suppressed. The state swap
    /// and the emission happen under one lock, so concurrent reporters
    /// deliver transitions to subscribers in the order they were applied.
    pub fn report(&self, online: bool) {
        let mut subscribers = self.subscribers.write();
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return;
        }

        tracing::debug!(online, "connectivity changed");
        subscribers.retain(|tx| tx.send(online).is_ok());
    }

    /// Subscribes to reachability transitions.
    ///
    /// The receiver sees every future state change, never two identical
    /// consecutive values.
    pub fn subscribe(&self) -> Receiver<bool> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn duplicate_states_are_suppressed() {
        let monitor = ConnectivityMonitor::new(false);
        let rx = monitor.subscribe();

        monitor.report(true);
        monitor.report(true);
        monitor.report(true);
        monitor.report(false);
        monitor.report(true);

        assert!(rx.recv_timeout(Duration::from_millis(100)).unwrap());
        assert!(!rx.recv_timeout(Duration::from_millis(100)).unwrap());
        assert!(rx.recv_timeout(Duration::from_millis(100)).unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reporting_current_state_emits_nothing() {
        let monitor = ConnectivityMonitor::new(true);
        let rx = monitor.subscribe();

        monitor.report(true);
        assert!(rx.try_recv().is_err());
        assert!(monitor.is_online());
    }

    #[test]
    fn concurrent_reporters_never_emit_consecutive_duplicates() {
        let monitor = std::sync::Arc::new(ConnectivityMonitor::new(false));
        let rx = monitor.subscribe();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let monitor = std::sync::Arc::clone(&monitor);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        monitor.report(true);
                        monitor.report(false);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut previous = None;
        while let Ok(state) = rx.try_recv() {
            assert_ne!(previous, Some(state), "duplicate transition emitted");
            previous = Some(state);
        }
    }

    #[test]
    fn dropped_subscribers_are_cleaned_up() {
        let monitor = ConnectivityMonitor::new(false);
        let rx = monitor.subscribe();
        assert_eq!(monitor.subscriber_count(), 1);

        drop(rx);
        monitor.report(true);
        assert_eq!(monitor.subscriber_count(), 0);
    }
}
