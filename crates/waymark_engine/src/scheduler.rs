//! Trigger-driven sync scheduling.
//!
//! The scheduler owns a single worker thread that is the only caller of
//! [`SyncCoordinator::run_pass`], so single-flight is structural. Passes
//! are triggered by connectivity-regained transitions, a fixed interval,
//! and explicit [`sync_now`](SyncScheduler::sync_now) requests; triggers
//! that arrive while a pass is running are drained into exactly one
//! follow-up pass.

use crate::connectivity::ConnectivityMonitor;
use crate::coordinator::SyncCoordinator;
use crate::error::SyncError;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Sync,
    Shutdown,
}

/// Drives the coordinator from connectivity events, a fixed interval and
/// on-demand requests.
pub struct SyncScheduler {
    trigger_tx: Sender<Trigger>,
    coordinator: Arc<SyncCoordinator>,
    worker: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Starts the scheduler.
    ///
    /// A pass runs whenever the monitor transitions to reachable, every
    /// [`SyncConfig::sync_interval`](crate::SyncConfig::sync_interval)
    /// taken from the coordinator's configuration, and on every
    /// [`sync_now`](Self::sync_now) call.
    pub fn start(coordinator: Arc<SyncCoordinator>, connectivity: &ConnectivityMonitor) -> Self {
        let interval = coordinator.config().sync_interval;
        let (trigger_tx, trigger_rx) = mpsc::channel();

        // Forward reachability-regained transitions as sync triggers.
        // The monitor already de-duplicates, so every `true` here is a
        // genuine offline-to-online edge.
        let conn_rx = connectivity.subscribe();
        let conn_tx = trigger_tx.clone();
        std::thread::Builder::new()
            .name("waymark-connectivity".into())
            .spawn(move || {
                while let Ok(online) = conn_rx.recv() {
                    if online && conn_tx.send(Trigger::Sync).is_err() {
                        break;
                    }
                }
            })
            .expect("spawn connectivity forwarder");

        let worker_coordinator = Arc::clone(&coordinator);
        let worker = std::thread::Builder::new()
            .name("waymark-sync".into())
            .spawn(move || Self::run_loop(&worker_coordinator, &trigger_rx, interval))
            .expect("spawn sync worker");

        Self {
            trigger_tx,
            coordinator,
            worker: Some(worker),
        }
    }

    fn run_loop(
        coordinator: &SyncCoordinator,
        trigger_rx: &Receiver<Trigger>,
        interval: Duration,
    ) {
        loop {
            match trigger_rx.recv_timeout(interval) {
                Ok(Trigger::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(Trigger::Sync) | Err(RecvTimeoutError::Timeout) => {
                    if Self::pass_and_coalesce(coordinator, trigger_rx) {
                        break;
                    }
                }
            }
        }
        tracing::debug!("sync scheduler stopped");
    }

    /// Runs a pass, then drains triggers that arrived mid-pass into at
    /// most one follow-up. Returns true on shutdown.
    fn pass_and_coalesce(coordinator: &SyncCoordinator, trigger_rx: &Receiver<Trigger>) -> bool {
        loop {
            Self::run_one(coordinator);

            let mut follow_up = false;
            loop {
                match trigger_rx.try_recv() {
                    Ok(Trigger::Shutdown) => return true,
                    Ok(Trigger::Sync) => follow_up = true,
                    Err(_) => break,
                }
            }
            if !follow_up {
                return false;
            }
        }
    }

    fn run_one(coordinator: &SyncCoordinator) {
        match coordinator.run_pass() {
            Ok(_) => {}
            Err(SyncError::Offline) => {
                tracing::debug!("sync trigger skipped: offline");
            }
            Err(SyncError::Cancelled) => {
                tracing::debug!("sync pass cancelled");
            }
            Err(e) => {
                tracing::warn!(error = %e, "scheduled sync pass failed");
            }
        }
    }

    /// Requests a pass now (e.g. app foregrounded, user-visible
    /// "sync now" action).
    pub fn sync_now(&self) {
        let _ = self.trigger_tx.send(Trigger::Sync);
    }

    /// Stops the scheduler, cancelling any in-flight pass and joining the
    /// worker thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.coordinator.cancel();
            let _ = self.trigger_tx.send(Trigger::Shutdown);
            let _ = worker.join();
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::SyncConfig;
    use crate::queue::OperationQueue;
    use crate::remote::{RemoteResult, RemoteStore};
    use crate::store::{LocalStore, MemoryStore};
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use waymark_protocol::{Entity, EntityId, RegionFilter};

    /// A remote whose list call sleeps, to hold a pass in flight.
    struct SlowRemote {
        passes: AtomicUsize,
        delay: Duration,
    }

    impl SlowRemote {
        fn new(delay: Duration) -> Self {
            Self {
                passes: AtomicUsize::new(0),
                delay,
            }
        }
    }

    impl RemoteStore for SlowRemote {
        fn insert(&self, _entity: &Entity) -> RemoteResult<()> {
            Ok(())
        }
        fn update(&self, _entity: &Entity) -> RemoteResult<()> {
            Ok(())
        }
        fn delete(&self, _id: EntityId) -> RemoteResult<()> {
            Ok(())
        }
        fn list(&self, _filter: Option<&RegionFilter>) -> RemoteResult<Vec<Entity>> {
            self.passes.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Ok(Vec::new())
        }
    }

    struct Fixture {
        _dir: TempDir,
        remote: Arc<SlowRemote>,
        connectivity: Arc<ConnectivityMonitor>,
        coordinator: Arc<SyncCoordinator>,
    }

    fn fixture(online: bool, delay: Duration, interval: Duration) -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new().with_sync_interval(interval);
        let queue =
            Arc::new(OperationQueue::open(dir.path().join("ops.journal"), &config).unwrap());
        let remote = Arc::new(SlowRemote::new(delay));
        let connectivity = Arc::new(ConnectivityMonitor::new(online));
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(0, 0).unwrap()));

        let coordinator = Arc::new(SyncCoordinator::new(
            config,
            queue,
            Arc::new(MemoryStore::new()) as Arc<dyn LocalStore>,
            Arc::<SlowRemote>::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::clone(&connectivity),
            clock as Arc<dyn Clock>,
        ));

        Fixture {
            _dir: dir,
            remote,
            connectivity,
            coordinator,
        }
    }

    #[test]
    fn sync_now_triggers_a_pass() {
        let f = fixture(true, Duration::ZERO, Duration::from_secs(3600));
        let scheduler = SyncScheduler::start(Arc::clone(&f.coordinator), &f.connectivity);

        scheduler.sync_now();
        std::thread::sleep(Duration::from_millis(200));
        scheduler.stop();

        assert_eq!(f.remote.passes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connectivity_regained_triggers_a_pass() {
        let f = fixture(false, Duration::ZERO, Duration::from_secs(3600));
        let scheduler = SyncScheduler::start(Arc::clone(&f.coordinator), &f.connectivity);

        f.connectivity.report(true);
        std::thread::sleep(Duration::from_millis(200));
        scheduler.stop();

        assert_eq!(f.remote.passes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn configured_interval_triggers_passes() {
        let f = fixture(true, Duration::ZERO, Duration::from_millis(40));
        let scheduler = SyncScheduler::start(Arc::clone(&f.coordinator), &f.connectivity);

        std::thread::sleep(Duration::from_millis(220));
        scheduler.stop();

        assert!(f.remote.passes.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn overlapping_triggers_coalesce_into_one_follow_up() {
        let f = fixture(true, Duration::from_millis(150), Duration::from_secs(3600));
        let scheduler = SyncScheduler::start(Arc::clone(&f.coordinator), &f.connectivity);

        scheduler.sync_now();
        // Let the first pass get in flight, then pile on triggers.
        std::thread::sleep(Duration::from_millis(50));
        scheduler.sync_now();
        scheduler.sync_now();
        scheduler.sync_now();

        std::thread::sleep(Duration::from_millis(600));
        scheduler.stop();

        // One initial pass plus exactly one coalesced follow-up.
        assert_eq!(f.remote.passes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn offline_triggers_are_skipped() {
        let f = fixture(false, Duration::ZERO, Duration::from_secs(3600));
        let scheduler = SyncScheduler::start(Arc::clone(&f.coordinator), &f.connectivity);

        scheduler.sync_now();
        std::thread::sleep(Duration::from_millis(200));
        scheduler.stop();

        assert_eq!(f.remote.passes.load(Ordering::SeqCst), 0);
    }
}
