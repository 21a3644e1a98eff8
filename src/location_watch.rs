//! Scoped live-location subscription.
//!
//! The provider stream is acquired when the first consumer subscribes and
//! released when the last [`LocationSubscription`] is dropped. Consumers see
//! only the latest fix; stale updates are superseded.
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, trace, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{AdventureError, Capability, Coordinates, LocationProvider, PermissionStatus, Result};

#[derive(Debug, Clone)]
pub enum WatchCommand {
    /// Stop forwarding updates and release the provider stream
    Stop,
}

#[derive(Debug, Clone)]
pub struct LocationWatcherStatus {
    /// Whether a provider stream is currently held
    pub is_running: bool,
    /// Number of live subscription handles
    pub consumers: usize,
    /// The most recent fix of the running session
    pub last_fix: Option<Coordinates>,
}

/// One acquisition of the provider stream
struct Session {
    /// Distinguishes this session from earlier ones of the same watcher
    generation: u64,

    /// Live handles attached to this session
    consumers: usize,

    /// Channel to send commands to the forwarding task
    command_tx: mpsc::Sender<WatchCommand>,

    /// Handle to the forwarding task
    task: JoinHandle<()>,

    /// Latest fix, shared with every subscriber
    latest: watch::Receiver<Option<Coordinates>>,
}

impl Session {
    fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Counts one more consumer and hands out its handle
    fn join(&mut self, state: &Arc<Mutex<WatchState>>) -> LocationSubscription {
        self.consumers += 1;
        trace!(
            "Attached to location session {} ({} consumers)",
            self.generation,
            self.consumers
        );
        LocationSubscription {
            generation: self.generation,
            latest: self.latest.clone(),
            state: Arc::clone(state),
        }
    }

    fn stop(self) {
        if let Err(e) = self.command_tx.try_send(WatchCommand::Stop) {
            debug!("Stop command not delivered: {}", e);
        }
        // The task may never be polled again if the runtime is going away
        self.task.abort();
    }
}

#[derive(Default)]
struct WatchState {
    session: Option<Session>,
    next_generation: u64,
}

impl WatchState {
    /// Forgets a session whose provider stream already ended, along with
    /// its consumer count
    fn discard_finished(&mut self) {
        if self.session.as_ref().is_some_and(|s| !s.is_running()) {
            debug!("Previous location session ended, a new one will be started");
            self.session = None;
        }
    }
}

fn lock_state(state: &Mutex<WatchState>) -> Result<MutexGuard<'_, WatchState>> {
    state
        .lock()
        .map_err(|_| AdventureError::LockAcquisitionFailed {
            message: "Failed to acquire lock on location watcher".to_string(),
        })
}

/// Shares one provider subscription between any number of consumers.
#[derive(Clone)]
pub struct LocationWatcher {
    provider: Arc<dyn LocationProvider>,
    state: Arc<Mutex<WatchState>>,
}

impl LocationWatcher {
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self {
            provider,
            state: Arc::new(Mutex::new(WatchState::default())),
        }
    }

    /// Subscribes to live location updates.
    ///
    /// The first subscriber checks (and if needed requests) the foreground
    /// location permission and starts the provider stream. Must be called
    /// from within a tokio runtime.
    pub async fn subscribe(&self) -> Result<LocationSubscription> {
        if let Some(subscription) = self.attach()? {
            return Ok(subscription);
        }

        self.ensure_permission().await?;
        let updates = self.provider.watch_position().await?;

        let mut state = lock_state(&self.state)?;
        state.discard_finished();
        if let Some(session) = state.session.as_mut() {
            // Another consumer started a session while we were waiting;
            // our stream is released when `updates` drops
            return Ok(session.join(&self.state));
        }

        let generation = state.next_generation;
        state.next_generation += 1;
        let session = start_session(generation, updates);
        let latest = session.latest.clone();
        state.session = Some(session);
        info!("Live location subscription started (session {})", generation);

        Ok(LocationSubscription {
            generation,
            latest,
            state: Arc::clone(&self.state),
        })
    }

    /// Joins a running session, if there is one
    fn attach(&self) -> Result<Option<LocationSubscription>> {
        let mut state = lock_state(&self.state)?;
        state.discard_finished();

        Ok(state.session.as_mut().map(|session| session.join(&self.state)))
    }

    async fn ensure_permission(&self) -> Result<()> {
        let mut status = self.provider.permission_status().await?;
        if status == PermissionStatus::Undetermined {
            debug!("Requesting foreground location permission");
            status = self.provider.request_permission().await?;
        }

        if status != PermissionStatus::Granted {
            warn!("Location permission not granted: {:?}", status);
            return Err(AdventureError::PermissionDenied {
                capability: Capability::Location,
            });
        }
        Ok(())
    }

    /// Get the current status of the watcher
    pub fn status(&self) -> Result<LocationWatcherStatus> {
        let state = lock_state(&self.state)?;
        let running = state.session.as_ref().filter(|s| s.is_running());
        Ok(LocationWatcherStatus {
            is_running: running.is_some(),
            consumers: running.map_or(0, |s| s.consumers),
            last_fix: running.and_then(|s| *s.latest.borrow()),
        })
    }

    pub fn is_active(&self) -> bool {
        self.status().is_ok_and(|s| s.is_running)
    }

    pub fn consumer_count(&self) -> usize {
        self.status().map(|s| s.consumers).unwrap_or(0)
    }

    /// Stops the running session regardless of remaining consumers.
    ///
    /// Live subscriptions stop receiving updates and their `changed` calls
    /// return `None`. Their handles no longer count towards any later
    /// session.
    pub async fn shutdown(&self) -> Result<()> {
        let session = lock_state(&self.state)?.session.take();

        if let Some(session) = session {
            if let Err(e) = session.command_tx.send(WatchCommand::Stop).await {
                error!("Failed to send stop command to location watcher: {}", e);
            }

            if let Err(e) = session.task.await {
                if !e.is_cancelled() {
                    error!("Location watcher task failed: {}", e);
                }
            }
            info!("Live location subscription stopped");
        } else {
            debug!("Location watcher is not running");
        }

        Ok(())
    }
}

fn start_session(generation: u64, mut updates: mpsc::Receiver<Coordinates>) -> Session {
    let (command_tx, mut command_rx) = mpsc::channel(4);
    let (latest_tx, latest) = watch::channel(None);

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(cmd) = command_rx.recv() => match cmd {
                    WatchCommand::Stop => {
                        debug!("Location watcher stopping...");
                        break;
                    }
                },
                update = updates.recv() => match update {
                    Some(fix) => {
                        trace!("Location update: {}", fix);
                        latest_tx.send_replace(Some(fix));
                    }
                    None => {
                        debug!("Location provider closed its stream");
                        break;
                    }
                },
            }
        }
        // `updates` is dropped here, releasing the provider stream
    });

    Session {
        generation,
        consumers: 1,
        command_tx,
        task,
        latest,
    }
}

/// A consumer's handle on the live location. Dropping it releases the
/// provider stream once no other consumer remains.
pub struct LocationSubscription {
    /// The session this handle was counted in
    generation: u64,
    latest: watch::Receiver<Option<Coordinates>>,
    state: Arc<Mutex<WatchState>>,
}

impl LocationSubscription {
    /// Last known user location, `None` until the first fix arrives
    pub fn current(&self) -> Option<Coordinates> {
        *self.latest.borrow()
    }

    /// Waits for the next fix. Returns `None` once the session has ended.
    pub async fn changed(&mut self) -> Option<Coordinates> {
        self.latest.changed().await.ok()?;
        *self.latest.borrow_and_update()
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        let Ok(mut state) = self.state.lock() else {
            error!("Failed to acquire lock on location watcher while unsubscribing");
            return;
        };

        let Some(session) = state
            .session
            .as_mut()
            .filter(|s| s.generation == self.generation)
        else {
            // The session this handle belonged to is already gone
            return;
        };

        session.consumers = session.consumers.saturating_sub(1);
        if session.consumers > 0 {
            return;
        }

        if let Some(session) = state.session.take() {
            session.stop();
            info!("Live location subscription released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::time::timeout;

    use crate::SimulatedLocation;

    fn point(latitude: f64, longitude: f64) -> Coordinates {
        Coordinates::new(latitude, longitude).unwrap()
    }

    #[tokio::test]
    async fn first_subscriber_starts_and_last_releases() {
        let provider = Arc::new(SimulatedLocation::granted(vec![]));
        let watcher = LocationWatcher::new(provider.clone());
        assert!(!watcher.is_active());

        let first = watcher.subscribe().await.unwrap();
        let second = watcher.subscribe().await.unwrap();
        assert!(watcher.is_active());
        assert_eq!(watcher.consumer_count(), 2);
        assert_eq!(provider.watch_calls(), 1);

        drop(first);
        assert!(watcher.is_active());

        drop(second);
        assert!(!watcher.is_active());
        assert_eq!(watcher.consumer_count(), 0);

        // The provider sees its stream closed
        let closed = timeout(Duration::from_secs(1), provider.wait_all_closed()).await;
        assert!(closed.is_ok());
    }

    #[tokio::test]
    async fn subscribers_see_latest_fix_only() {
        let provider = Arc::new(SimulatedLocation::granted(vec![]));
        let watcher = LocationWatcher::new(provider.clone());
        let mut subscription = watcher.subscribe().await.unwrap();
        assert_eq!(subscription.current(), None);

        provider.push(point(1.0, 1.0)).await;
        let fix = timeout(Duration::from_secs(1), subscription.changed())
            .await
            .unwrap();
        assert_eq!(fix, Some(point(1.0, 1.0)));

        provider.push(point(2.0, 2.0)).await;
        provider.push(point(3.0, 3.0)).await;
        // Wait until the forwarder has applied the last update
        timeout(Duration::from_secs(1), async {
            while subscription.current() != Some(point(3.0, 3.0)) {
                subscription.changed().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(subscription.current(), Some(point(3.0, 3.0)));
    }

    #[tokio::test]
    async fn denied_permission_is_an_error() {
        let provider = Arc::new(SimulatedLocation::with_permission(
            PermissionStatus::Denied,
            PermissionStatus::Denied,
            vec![],
        ));
        let watcher = LocationWatcher::new(provider.clone());

        let err = watcher.subscribe().await.err().unwrap();
        assert!(matches!(
            err,
            AdventureError::PermissionDenied {
                capability: Capability::Location
            }
        ));
        assert_eq!(provider.watch_calls(), 0);
        assert!(!watcher.is_active());
    }

    #[tokio::test]
    async fn undetermined_permission_is_requested() {
        let provider = Arc::new(SimulatedLocation::with_permission(
            PermissionStatus::Undetermined,
            PermissionStatus::Granted,
            vec![point(-23.5505, -46.6333)],
        ));
        let watcher = LocationWatcher::new(provider.clone());

        let mut subscription = watcher.subscribe().await.unwrap();
        let fix = timeout(Duration::from_secs(1), subscription.changed())
            .await
            .unwrap();
        assert_eq!(fix, Some(point(-23.5505, -46.6333)));
    }

    #[tokio::test]
    async fn shutdown_ends_live_subscriptions() {
        let provider = Arc::new(SimulatedLocation::granted(vec![]));
        let watcher = LocationWatcher::new(provider.clone());
        let mut subscription = watcher.subscribe().await.unwrap();

        watcher.shutdown().await.unwrap();
        assert!(!watcher.is_active());

        let next = timeout(Duration::from_secs(1), subscription.changed())
            .await
            .unwrap();
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn handles_from_a_shut_down_session_do_not_hold_the_next_one() {
        let provider = Arc::new(SimulatedLocation::granted(vec![]));
        let watcher = LocationWatcher::new(provider.clone());

        let stale = watcher.subscribe().await.unwrap();
        watcher.shutdown().await.unwrap();

        let fresh = watcher.subscribe().await.unwrap();
        assert_eq!(watcher.consumer_count(), 1);
        assert_eq!(provider.active_streams(), 1);

        drop(fresh);
        assert!(!watcher.is_active());
        let closed = timeout(Duration::from_secs(1), provider.wait_all_closed()).await;
        assert!(closed.is_ok());
        assert_eq!(provider.active_streams(), 0);

        // The leftover handle belongs to no session and changes nothing
        drop(stale);
        assert_eq!(watcher.consumer_count(), 0);
        assert_eq!(provider.watch_calls(), 2);
    }

    #[tokio::test]
    async fn stale_handle_drop_keeps_the_new_session() {
        let provider = Arc::new(SimulatedLocation::granted(vec![]));
        let watcher = LocationWatcher::new(provider.clone());

        let stale = watcher.subscribe().await.unwrap();
        watcher.shutdown().await.unwrap();
        let _fresh = watcher.subscribe().await.unwrap();

        drop(stale);
        assert!(watcher.is_active());
        assert_eq!(watcher.consumer_count(), 1);
    }

    #[tokio::test]
    async fn status_reports_the_latest_fix() {
        let provider = Arc::new(SimulatedLocation::granted(vec![]));
        let watcher = LocationWatcher::new(provider.clone());
        assert_eq!(watcher.status().unwrap().last_fix, None);

        let mut subscription = watcher.subscribe().await.unwrap();
        provider.push(point(-25.4284, -49.2733)).await;
        timeout(Duration::from_secs(1), subscription.changed())
            .await
            .unwrap();

        let status = watcher.status().unwrap();
        assert!(status.is_running);
        assert_eq!(status.consumers, 1);
        assert_eq!(status.last_fix, Some(point(-25.4284, -49.2733)));
    }

    #[tokio::test]
    async fn resubscribing_after_release_starts_fresh() {
        let provider = Arc::new(SimulatedLocation::granted(vec![]));
        let watcher = LocationWatcher::new(provider.clone());

        let first = watcher.subscribe().await.unwrap();
        provider.push(point(5.0, 5.0)).await;
        drop(first);

        let second = watcher.subscribe().await.unwrap();
        assert_eq!(provider.watch_calls(), 2);
        assert_eq!(second.current(), None);
    }
}
