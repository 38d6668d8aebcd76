//! Awaiting follow-up modal submissions
//!
//! A command handler that opens a modal registers interest with
//! [`SubmissionBroker::expect`] and then waits on the returned
//! [`PendingSubmission`]. The submission endpoint hands fields over with
//! [`SubmissionBroker::deliver`]. Waiting is bounded; dropping the pending
//! handle (for example when the request future is cancelled) deregisters it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{Result, TradeError};
use crate::interaction::ModalFields;

/// How long a handler waits for a modal unless configured otherwise
pub const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Correlates a submission with the handler waiting for it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionKey {
    pub custom_id: String,
    pub user_id: String,
}

impl SubmissionKey {
    pub fn new(custom_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            custom_id: custom_id.into(),
            user_id: user_id.into(),
        }
    }
}

struct Waiter {
    token: u64,
    tx: oneshot::Sender<ModalFields>,
}

type Waiters = Arc<Mutex<HashMap<SubmissionKey, Waiter>>>;

fn lock(waiters: &Waiters) -> MutexGuard<'_, HashMap<SubmissionKey, Waiter>> {
    // a panic while holding the lock cannot leave the map inconsistent
    waiters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registry of handlers waiting for a modal submission
#[derive(Clone, Default)]
pub struct SubmissionBroker {
    waiters: Waiters,
    next_token: Arc<AtomicU64>,
}

impl SubmissionBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the next submission for `key`.
    ///
    /// A newer registration for the same key supersedes the older one, which
    /// then fails as if it had timed out.
    pub fn expect(&self, key: SubmissionKey) -> PendingSubmission {
        let (tx, rx) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        if lock(&self.waiters)
            .insert(key.clone(), Waiter { token, tx })
            .is_some()
        {
            tracing::debug!(custom_id = %key.custom_id, user_id = %key.user_id, "superseding pending submission");
        }

        PendingSubmission {
            key,
            token,
            rx,
            waiters: Arc::clone(&self.waiters),
        }
    }

    /// Hand `fields` to the handler waiting on `key`.
    ///
    /// Returns false when nobody is waiting (never registered, timed out or
    /// cancelled).
    pub fn deliver(&self, key: &SubmissionKey, fields: ModalFields) -> bool {
        let waiter = lock(&self.waiters).remove(key);
        match waiter {
            Some(waiter) => waiter.tx.send(fields).is_ok(),
            None => {
                tracing::debug!(custom_id = %key.custom_id, user_id = %key.user_id, "no handler waiting for submission");
                false
            }
        }
    }

    /// Number of handlers currently waiting
    pub fn pending(&self) -> usize {
        lock(&self.waiters).len()
    }
}

/// A registered wait for one modal submission
pub struct PendingSubmission {
    key: SubmissionKey,
    token: u64,
    rx: oneshot::Receiver<ModalFields>,
    waiters: Waiters,
}

impl PendingSubmission {
    pub fn key(&self) -> &SubmissionKey {
        &self.key
    }

    /// Wait for the submission, failing with `Timeout` after `timeout`.
    pub async fn wait(mut self, timeout: Duration) -> Result<ModalFields> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(fields)) => Ok(fields),
            Ok(Err(_)) | Err(_) => {
                tracing::info!(
                    custom_id = %self.key.custom_id,
                    user_id = %self.key.user_id,
                    seconds = timeout.as_secs(),
                    "modal submission not received"
                );
                Err(TradeError::timeout(self.key.custom_id.clone(), timeout.as_secs()))
            }
        }
    }
}

impl Drop for PendingSubmission {
    fn drop(&mut self) {
        let mut waiters = lock(&self.waiters);
        if waiters.get(&self.key).map(|w| w.token) == Some(self.token) {
            waiters.remove(&self.key);
        }
    }
}
