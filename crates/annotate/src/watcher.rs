//! Re-trigger loop for dynamic pages.
//!
//! The host reports DOM mutations through a plain channel; what counts as
//! a qualifying mutation (added nodes, attribute changes on the watched
//! attributes) is the host's concern, which keeps this loop free of any
//! particular observer mechanism. Three policies:
//!
//! - `disabled`: scan once at load, never re-trigger (the loop exits).
//! - `observe`: coalesce mutation bursts behind a debounce window; a new
//!   event resets the pending timer, it never stacks a second pass.
//! - `ping`: fixed-interval re-scan, mutations ignored. The fallback for
//!   hosts where mutation reporting is unavailable or unreliable.

use std::time::Duration;

use shelfmark_core::{RetriggerPolicy, Settings};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Mutation bursts within this window collapse into one scan pass.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(750);

/// Drives repeated scan passes according to the configured policy.
#[derive(Debug, Clone)]
pub struct MutationWatcher {
    policy: RetriggerPolicy,
    debounce: Duration,
    ping_interval: Duration,
}

impl MutationWatcher {
    pub fn new(settings: &Settings) -> Self {
        Self {
            policy: settings.dynamic_content,
            debounce: DEBOUNCE_WINDOW,
            ping_interval: Duration::from_millis(settings.ping_interval_ms),
        }
    }

    #[cfg(test)]
    fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Run until the trigger channel closes. `scan` fires once per
    /// coalesced burst (observe) or per tick (ping); the initial pass at
    /// page load is the caller's, not ours.
    pub async fn run<F>(self, mut triggers: mpsc::Receiver<()>, mut scan: F)
    where
        F: FnMut(),
    {
        match self.policy {
            RetriggerPolicy::Disabled => {}
            RetriggerPolicy::Observe => loop {
                if triggers.recv().await.is_none() {
                    return;
                }
                // debounce: each further event resets the timer
                loop {
                    let sleep = tokio::time::sleep(self.debounce);
                    tokio::pin!(sleep);
                    tokio::select! {
                        _ = &mut sleep => {
                            scan();
                            break;
                        }
                        event = triggers.recv() => {
                            if event.is_none() {
                                scan();
                                return;
                            }
                        }
                    }
                }
            },
            RetriggerPolicy::Ping => {
                let mut tick = tokio::time::interval(self.ping_interval);
                tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
                tick.tick().await; // the immediate first tick is the caller's initial pass
                loop {
                    tokio::select! {
                        _ = tick.tick() => scan(),
                        event = triggers.recv() => {
                            // mutations don't drive ping mode, but a closed
                            // channel still ends the loop
                            if event.is_none() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted() -> (Arc<AtomicUsize>, impl FnMut()) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        (count, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn watcher(policy: RetriggerPolicy) -> MutationWatcher {
        MutationWatcher::new(&Settings { dynamic_content: policy, ..Default::default() })
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_scans() {
        let (count, scan) = counted();
        let (tx, rx) = mpsc::channel(16);

        tx.send(()).await.unwrap();
        watcher(RetriggerPolicy::Disabled).run(rx, scan).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_coalesces_bursts() {
        let (count, scan) = counted();
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(watcher(RetriggerPolicy::Observe).run(rx, scan));

        // a burst of mutations within the window
        for _ in 0..3 {
            tx.send(()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // a later mutation starts a fresh debounce
        tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_resets_timer_not_stacks() {
        let (count, scan) = counted();
        let (tx, rx) = mpsc::channel(16);
        let watcher = watcher(RetriggerPolicy::Observe).with_debounce(Duration::from_millis(500));
        let handle = tokio::spawn(watcher.run(rx, scan));

        // keep poking just inside the window; no scan may fire meanwhile
        for _ in 0..5 {
            tx.send(()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(400)).await;
            assert_eq!(count.load(Ordering::SeqCst), 0);
        }
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_scans_on_interval() {
        let (count, scan) = counted();
        let (_tx, rx) = mpsc::channel(16);
        let settings = Settings {
            dynamic_content: RetriggerPolicy::Ping,
            ping_interval_ms: 1500,
            ..Default::default()
        };
        let handle = tokio::spawn(MutationWatcher::new(&settings).run(rx, scan));

        tokio::time::sleep(Duration::from_millis(4000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        drop(_tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_ends_observe_loop() {
        let (count, scan) = counted();
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(watcher(RetriggerPolicy::Observe).run(rx, scan));

        tx.send(()).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        // the pending debounced pass still fired
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
