use tokio::sync::watch;

#[derive(Debug)]
pub struct LoginModal {
    visible_tx: watch::Sender<bool>,
}

impl LoginModal {
    pub fn new() -> Self {
        let (visible_tx, _) = watch::channel(false);
        Self { visible_tx }
    }

    pub fn is_open(&self) -> bool {
        *self.visible_tx.borrow()
    }

    pub fn open(&self) {
        self.set_open(true);
    }

    pub fn close(&self) {
        self.set_open(false);
    }

    /// Returns whether the visibility changed. Subscribers are only notified on change.
    pub fn set_open(&self, open: bool) -> bool {
        self.visible_tx.send_if_modified(|visible| {
            if *visible == open {
                return false;
            }
            *visible = open;
            true
        })
    }

    pub fn subscribe(&self) -> LoginModalSubscriber {
        LoginModalSubscriber {
            visible_rx: self.visible_tx.subscribe(),
        }
    }
}

impl Default for LoginModal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct LoginModalSubscriber {
    visible_rx: watch::Receiver<bool>,
}

impl LoginModalSubscriber {
    pub fn is_open(&self) -> bool {
        *self.visible_rx.borrow()
    }

    pub async fn changed(&mut self) -> Option<bool> {
        self.visible_rx.changed().await.ok()?;
        Some(*self.visible_rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::LoginModal;

    #[tokio::test]
    async fn subscribers_observe_visibility_changes() {
        let modal = LoginModal::new();
        let mut first = modal.subscribe();
        let second = modal.subscribe();

        assert!(!first.is_open());
        assert!(modal.set_open(true));
        assert_eq!(first.changed().await, Some(true));
        assert!(second.is_open());

        modal.close();
        assert_eq!(first.changed().await, Some(false));
    }

    #[test]
    fn repeated_open_does_not_report_a_change() {
        let modal = LoginModal::new();
        assert!(modal.set_open(true));
        assert!(!modal.set_open(true));
        assert!(modal.is_open());
    }

    #[tokio::test]
    async fn subscriber_sees_writer_drop() {
        let modal = LoginModal::new();
        let mut subscriber = modal.subscribe();
        drop(modal);
        assert_eq!(subscriber.changed().await, None);
    }
}
