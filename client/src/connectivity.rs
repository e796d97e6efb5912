//! Connectivity monitor.
//!
//! Holds the current online/offline state, updated only by transition
//! signals from the host runtime. Nothing is polled. Going back online does
//! not drain the pending queue; draining stays a user action.

use serde::Serialize;
use tokio::sync::watch;

/// Network reachability as last reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// Tracks connectivity and lets interested parties watch transitions.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the state the host reports at startup.
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(Connectivity::from_online(online));
        Self { tx }
    }

    /// Current state.
    pub fn state(&self) -> Connectivity {
        *self.tx.borrow()
    }

    /// Check if the host reported being offline.
    pub fn is_offline(&self) -> bool {
        self.state() == Connectivity::Offline
    }

    /// Record an online/offline signal.
    ///
    /// Returns `true` if this was a transition. Repeated signals for the same
    /// state do not wake watchers.
    pub fn set_online(&self, online: bool) -> bool {
        let next = Connectivity::from_online(online);
        let changed = self.tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });

        if changed {
            tracing::info!(state = ?next, "Connectivity changed");
        }
        changed
    }

    /// Receive every future transition.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state() {
        assert!(!ConnectivityMonitor::new(true).is_offline());
        assert!(ConnectivityMonitor::new(false).is_offline());
    }

    #[test]
    fn only_transitions_count() {
        let monitor = ConnectivityMonitor::new(true);
        assert!(!monitor.set_online(true));
        assert!(monitor.set_online(false));
        assert!(!monitor.set_online(false));
        assert!(monitor.is_offline());
        assert!(monitor.set_online(true));
        assert_eq!(monitor.state(), Connectivity::Online);
    }

    #[tokio::test]
    async fn watchers_see_transitions() {
        let monitor = ConnectivityMonitor::new(true);
        let mut rx = monitor.subscribe();

        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());

        monitor.set_online(false);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Connectivity::Offline);
    }
}
