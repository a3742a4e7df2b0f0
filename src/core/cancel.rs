use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use parking_lot::{Condvar, Mutex};
use crate::core::error::{Error, Result};

/// How long a paused thread sleeps before re-checking for cancellation
const PAUSE_RECHECK: Duration = Duration::from_millis(100);

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Suspends hit-producing loops while paused (priority throttling)
#[derive(Debug, Default)]
pub struct Pauser {
    paused: AtomicBool,
    lock: Mutex<()>,
    resumed: Condvar,
}

impl Pauser {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        let _guard = self.lock.lock();
        self.resumed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn wake(&self) {
        let _guard = self.lock.lock();
        self.resumed.notify_all();
    }

    /// Block while paused; returns early once the token is cancelled
    pub fn wait_while_paused(&self, token: &CancellationToken) {
        let mut guard = self.lock.lock();
        while self.is_paused() && !token.is_cancelled() {
            self.resumed.wait_for(&mut guard, PAUSE_RECHECK);
        }
    }
}

/// Cooperative suspension point: pause, then cancel check.
///
/// One checkpoint is shared by a whole result lineage and passed into
/// every loop that produces or transforms hits.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    token: CancellationToken,
    pauser: Arc<Pauser>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Checkpoint::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Checkpoint { token, pauser: Arc::new(Pauser::default()) }
    }

    pub fn check(&self) -> Result<()> {
        if self.pauser.is_paused() {
            self.pauser.wait_while_paused(&self.token);
        }
        if self.token.is_cancelled() {
            return Err(Error::interrupted("search was cancelled"));
        }
        Ok(())
    }

    pub fn cancel(&self) {
        self.token.cancel();
        self.pauser.wake();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn pause(&self) {
        self.pauser.pause();
    }

    pub fn resume(&self) {
        self.pauser.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.pauser.is_paused()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn check_fails_after_cancel() {
        let checkpoint = Checkpoint::new();
        assert!(checkpoint.check().is_ok());
        checkpoint.cancel();
        let err = checkpoint.check().unwrap_err();
        assert!(err.is_interrupted());
    }

    #[test]
    fn paused_checkpoint_blocks_until_resumed() {
        let checkpoint = Checkpoint::new();
        checkpoint.pause();

        let worker = {
            let checkpoint = checkpoint.clone();
            thread::spawn(move || checkpoint.check())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!worker.is_finished());

        checkpoint.resume();
        assert!(worker.join().unwrap().is_ok());
    }

    #[test]
    fn cancel_releases_paused_thread() {
        let checkpoint = Checkpoint::new();
        checkpoint.pause();
        let worker = {
            let checkpoint = checkpoint.clone();
            thread::spawn(move || checkpoint.check())
        };
        checkpoint.cancel();
        assert!(worker.join().unwrap().unwrap_err().is_interrupted());
    }
}
