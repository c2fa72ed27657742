//! Single liveness timer shared by the ingest and process stages.
//!
//! The ingest side owns a [`WatchdogHandle`] and re-arms it on every frame;
//! the process side awaits [`Watchdog::expired`]. There is only ever one
//! deadline: each reset replaces it.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Arm {
    deadline: Instant,
    interval: Duration,
}

impl Arm {
    fn after(interval: Duration) -> Self {
        Self {
            deadline: Instant::now() + interval,
            interval,
        }
    }
}

/// Expiry side of the watchdog.
#[derive(Debug)]
pub struct Watchdog {
    rx: watch::Receiver<Option<Arm>>,
}

/// Control side of the watchdog.
#[derive(Debug)]
pub struct WatchdogHandle {
    tx: watch::Sender<Option<Arm>>,
}

impl Watchdog {
    /// Create a watchdog armed to fire after `interval`.
    pub fn start(interval: Duration) -> (Watchdog, WatchdogHandle) {
        let (tx, rx) = watch::channel(Some(Arm::after(interval)));
        (Watchdog { rx }, WatchdogHandle { tx })
    }

    /// Whether a deadline is currently set.
    pub fn is_armed(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolve with the interval that elapsed once the current deadline passes.
    ///
    /// Never resolves while stopped. If the handle is dropped the last
    /// deadline stays in force. Cancel safe.
    pub async fn expired(&mut self) -> Duration {
        loop {
            let current = *self.rx.borrow_and_update();
            match current {
                Some(arm) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(arm.deadline) => return arm.interval,
                        changed = self.rx.changed() => {
                            if changed.is_err() {
                                tokio::time::sleep_until(arm.deadline).await;
                                return arm.interval;
                            }
                        }
                    }
                }
                None => {
                    if self.rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
            }
        }
    }
}

impl WatchdogHandle {
    /// Replace the deadline with `now + interval`.
    pub fn reset(&self, interval: Duration) {
        self.tx.send_replace(Some(Arm::after(interval)));
    }

    /// Disarm until the next reset.
    pub fn stop(&self) {
        self.tx.send_replace(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_initial_interval() {
        let (mut watchdog, _handle) = Watchdog::start(Duration::from_secs(5));
        let start = Instant::now();
        let after = watchdog.expired().await;
        assert_eq!(after, Duration::from_secs(5));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_replaces_deadline() {
        let (mut watchdog, handle) = Watchdog::start(Duration::from_secs(5));
        let start = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            handle.reset(Duration::from_secs(1));
            // Keep the handle alive past the deadline
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let after = watchdog.expired().await;
        assert_eq!(after, Duration::from_secs(1));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_disarms() {
        let (mut watchdog, handle) = Watchdog::start(Duration::from_secs(1));
        handle.stop();
        assert!(!watchdog.is_armed());

        let result = tokio::time::timeout(Duration::from_secs(30), watchdog.expired()).await;
        assert!(result.is_err(), "stopped watchdog must not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_then_dropped_never_fires() {
        let (mut watchdog, handle) = Watchdog::start(Duration::from_secs(1));
        handle.stop();
        drop(handle);

        let result = tokio::time::timeout(Duration::from_secs(30), watchdog.expired()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_keeps_deadline() {
        let (mut watchdog, handle) = Watchdog::start(Duration::from_secs(2));
        drop(handle);

        let start = Instant::now();
        assert_eq!(watchdog.expired().await, Duration::from_secs(2));
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_after_stop() {
        let (mut watchdog, handle) = Watchdog::start(Duration::from_secs(1));
        handle.stop();
        handle.reset(Duration::from_millis(500));
        assert!(watchdog.is_armed());
        assert_eq!(watchdog.expired().await, Duration::from_millis(500));
    }
}
