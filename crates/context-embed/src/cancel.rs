use tokio::sync::watch;

/// Issuing side of a cancellation signal. Dropping every clone of the
/// token without calling `cancel` leaves listeners waiting forever, so
/// holders are expected to always resolve one way or another.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: watch::Sender<bool>,
}

/// Receiving side, cheap to clone and pass down into nested calls.
#[derive(Debug, Clone)]
pub struct CancellationListener {
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn new() -> (CancellationToken, CancellationListener) {
        let (tx, rx) = watch::channel(false);
        (CancellationToken { tx }, CancellationListener { rx })
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new().0
    }
}

impl CancellationListener {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is signalled. Safe to call from multiple
    /// clones concurrently.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
