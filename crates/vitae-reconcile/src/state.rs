//! Per-credential verification and mint state.
//!
//! ```text
//! Unverified -> Verifying -> Verified { object_id }     (terminal for the session)
//!                         -> Failed { reason }          (retryable)
//!
//! NotMinted  -> Minting   -> Minted { transaction_id }  (resets verification to Unverified)
//!                         -> MintFailed { reason }      (retryable)
//! ```
//!
//! Operations are single-flight per credential id and phase: a second `verify`
//! (or `mint`) for an id already in flight waits for the running one and
//! returns its outcome instead of starting another. If the running future is
//! dropped, the state becomes failed with reason [`CANCELLED`] and waiters are
//! released.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::debug;

/// Failure reason recorded when an in-flight operation is dropped.
pub const CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationState {
    Unverified,
    Verifying,
    Verified { object_id: String },
    Failed { reason: String },
}

impl VerificationState {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationState::Verified { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MintState {
    NotMinted,
    Minting,
    Minted { transaction_id: String },
    MintFailed { reason: String },
}

/// Both phases for one credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub verification: VerificationState,
    pub mint: MintState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Phase {
    Verify,
    Mint,
}

type FlightKey = (Phase, String);

#[derive(Default)]
struct Inner {
    verification: HashMap<String, VerificationState>,
    minting: HashMap<String, MintState>,
    inflight: HashMap<FlightKey, Arc<Notify>>,
}

impl Inner {
    fn verification(&self, id: &str) -> VerificationState {
        self.verification
            .get(id)
            .cloned()
            .unwrap_or(VerificationState::Unverified)
    }

    fn mint(&self, id: &str) -> MintState {
        self.minting.get(id).cloned().unwrap_or(MintState::NotMinted)
    }
}

/// Verification and mint state for every credential in a session.
#[derive(Default)]
pub struct CredentialStateMachine {
    inner: Mutex<Inner>,
}

enum Join {
    Lead,
    Wait(Arc<Notify>),
}

impl CredentialStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: &str) -> CredentialStatus {
        let inner = self.inner.lock();
        CredentialStatus {
            verification: inner.verification(id),
            mint: inner.mint(id),
        }
    }

    pub fn verification_state(&self, id: &str) -> VerificationState {
        self.inner.lock().verification(id)
    }

    pub fn mint_state(&self, id: &str) -> MintState {
        self.inner.lock().mint(id)
    }

    /// Record a verified outcome observed elsewhere (e.g. a reconciliation pass).
    pub fn mark_verified(&self, id: &str, object_id: &str) {
        self.inner.lock().verification.insert(
            id.to_string(),
            VerificationState::Verified {
                object_id: object_id.to_string(),
            },
        );
    }

    /// Run `op` as the verification of `id`, unless already verified or in flight.
    ///
    /// `op` resolves to the verified object id or a failure reason.
    pub async fn verify<F, Fut, E>(&self, id: &str, op: F) -> VerificationState
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
    {
        let key = (Phase::Verify, id.to_string());
        let join = {
            let mut inner = self.inner.lock();
            let current = inner.verification(id);
            if current.is_verified() {
                return current;
            }
            self.join(&mut inner, &key, |inner| {
                inner
                    .verification
                    .insert(id.to_string(), VerificationState::Verifying);
            })
        };

        if let Join::Wait(notify) = join {
            self.wait(&key, notify).await;
            return self.verification_state(id);
        }

        let guard = FlightGuard::new(self, key);
        let state = match op().await {
            Ok(object_id) => VerificationState::Verified { object_id },
            Err(e) => VerificationState::Failed {
                reason: e.to_string(),
            },
        };
        debug!(credential = id, state = ?state, "verification finished");
        let published = state.clone();
        guard.complete(|inner| {
            inner.verification.insert(id.to_string(), published);
        });
        state
    }

    /// Run `op` as the mint of `id`, unless already minted or in flight.
    ///
    /// `op` resolves to the transaction id or a failure reason. A successful
    /// mint resets a non-verified verification state to `Unverified`.
    pub async fn mint<F, Fut, E>(&self, id: &str, op: F) -> MintState
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
    {
        let key = (Phase::Mint, id.to_string());
        let join = {
            let mut inner = self.inner.lock();
            let current = inner.mint(id);
            if matches!(current, MintState::Minted { .. }) {
                return current;
            }
            self.join(&mut inner, &key, |inner| {
                inner.minting.insert(id.to_string(), MintState::Minting);
            })
        };

        if let Join::Wait(notify) = join {
            self.wait(&key, notify).await;
            return self.mint_state(id);
        }

        let guard = FlightGuard::new(self, key);
        let state = match op().await {
            Ok(transaction_id) => MintState::Minted { transaction_id },
            Err(e) => MintState::MintFailed {
                reason: e.to_string(),
            },
        };
        debug!(credential = id, state = ?state, "mint finished");
        let published = state.clone();
        guard.complete(|inner| {
            if matches!(published, MintState::Minted { .. })
                && !inner.verification(id).is_verified()
            {
                inner
                    .verification
                    .insert(id.to_string(), VerificationState::Unverified);
            }
            inner.minting.insert(id.to_string(), published);
        });
        state
    }

    fn join(&self, inner: &mut Inner, key: &FlightKey, start: impl FnOnce(&mut Inner)) -> Join {
        if let Some(notify) = inner.inflight.get(key) {
            return Join::Wait(notify.clone());
        }
        inner.inflight.insert(key.clone(), Arc::new(Notify::new()));
        start(inner);
        Join::Lead
    }

    /// Wait until the flight registered under `notify` is over.
    async fn wait(&self, key: &FlightKey, notify: Arc<Notify>) {
        let notified = notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        let running = self
            .inner
            .lock()
            .inflight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &notify));
        if running {
            notified.await;
        }
    }
}

/// Ends a flight: publishes the outcome, or `cancelled` if dropped first.
struct FlightGuard<'a> {
    machine: &'a CredentialStateMachine,
    key: FlightKey,
    done: bool,
}

impl<'a> FlightGuard<'a> {
    fn new(machine: &'a CredentialStateMachine, key: FlightKey) -> Self {
        Self {
            machine,
            key,
            done: false,
        }
    }

    fn complete(mut self, publish: impl FnOnce(&mut Inner)) {
        self.finish(publish);
        self.done = true;
    }

    fn finish(&self, publish: impl FnOnce(&mut Inner)) {
        let mut inner = self.machine.inner.lock();
        publish(&mut inner);
        if let Some(notify) = inner.inflight.remove(&self.key) {
            notify.notify_waiters();
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let (phase, id) = self.key.clone();
        debug!(credential = %id, ?phase, "in-flight operation dropped");
        self.finish(|inner| match phase {
            Phase::Verify => {
                inner.verification.insert(
                    id,
                    VerificationState::Failed {
                        reason: CANCELLED.to_string(),
                    },
                );
            }
            Phase::Mint => {
                inner.minting.insert(
                    id,
                    MintState::MintFailed {
                        reason: CANCELLED.to_string(),
                    },
                );
            }
        });
    }
}
