//! Single shared authority snapshot with change notification.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use estately_auth::{AuthoritySession, Principal, RoleResolution, SessionState};

use crate::aggregator::AggregationError;

/// Owner of the current [`AuthoritySession`].
///
/// Readers get immutable `Arc` snapshots or a `watch` subscription. Writes
/// happen only through the lifecycle transitions below, each applied under the
/// channel's write lock so no reader ever sees a partial update.
#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<Arc<AuthoritySession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(AuthoritySession::unauthenticated(0)));
        Self { tx }
    }

    pub fn snapshot(&self) -> Arc<AuthoritySession> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AuthoritySession>> {
        self.tx.subscribe()
    }

    /// Enter `Loading` for `principal` under a fresh generation, which is returned.
    pub fn begin_loading(&self, principal: Principal) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|current| {
            generation = current.generation() + 1;
            *current = Arc::new(AuthoritySession::loading(generation, principal));
        });
        generation
    }

    /// Publish the result of the resolution started under `generation`.
    ///
    /// Ignored unless `generation` is still current and the session is
    /// `Loading`; returns whether the result was applied.
    pub fn complete(
        &self,
        generation: u64,
        result: Result<RoleResolution, AggregationError>,
    ) -> bool {
        self.tx.send_if_modified(|current| {
            if current.generation() != generation || current.state() != SessionState::Loading {
                return false;
            }
            let Some(principal) = current.principal().cloned() else {
                return false;
            };

            let now = Utc::now();
            *current = Arc::new(match result {
                Ok(resolution) => AuthoritySession::ready(generation, principal, resolution, now),
                Err(_) => AuthoritySession::degraded(generation, principal, now),
            });
            true
        })
    }

    /// Drop back to `Unauthenticated`; returns the new generation.
    ///
    /// Bumping the generation invalidates any resolution still in flight.
    pub fn clear(&self) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|current| {
            generation = current.generation() + 1;
            *current = Arc::new(AuthoritySession::unauthenticated(generation));
        });
        generation
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
