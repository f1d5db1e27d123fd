//! Online/offline signal shared by the router and the drainer.

use tokio::sync::watch;

/// Boolean connectivity status plus transition notifications.
///
/// Cloning yields another handle to the same signal.
#[derive(Debug, Clone)]
pub struct Connectivity {
    sender: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _receiver) = watch::channel(online);
        Self { sender }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Report a new status; subscribers are only woken on actual changes.
    pub fn set_online(&self, online: bool) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
    }

    /// Receiver woken on every online/offline transition
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let connectivity = Connectivity::new(false);
        let mut receiver = connectivity.subscribe();
        assert!(!connectivity.is_online());

        connectivity.set_online(true);
        receiver.changed().await.unwrap();
        assert!(*receiver.borrow_and_update());
        assert!(connectivity.is_online());
    }

    #[tokio::test]
    async fn repeated_status_is_not_a_transition() {
        let connectivity = Connectivity::new(true);
        let receiver = connectivity.subscribe();
        connectivity.set_online(true);
        assert!(!receiver.has_changed().unwrap());
    }
}
