//! Identity event processing and the public authority surface.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use estately_auth::{AuthoritySession, ModulePolicy, PermissionGate, Principal, SessionState};
use estately_core::PrincipalId;

use crate::aggregator::RoleAggregator;
use crate::config::AuthorityConfig;
use crate::directory::{ProfileStore, RoleAssignmentStore};

use super::store::SessionStore;

/// Events emitted by the external identity layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    SignedIn {
        principal_id: PrincipalId,
        email: String,
    },
    SignedOut,
    TokenRefreshed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity provider error: {0}")]
    Provider(String),
}

/// Commands this core sends back to the identity layer.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_out(&self) -> Result<(), IdentityError>;
}

/// Identity provider that has nothing to revoke (local runs, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIdentityProvider;

#[async_trait::async_trait]
impl IdentityProvider for NoopIdentityProvider {
    async fn sign_out(&self) -> Result<(), IdentityError> {
        Ok(())
    }
}

/// Composition-root object that owns the authority session.
///
/// Identity events are applied one at a time. Each sign-in starts a resolution
/// task tagged with a new session generation; a later event aborts that task
/// and bumps the generation, so a result that still slips through is discarded
/// by [`SessionStore::complete`].
pub struct AuthorityService<P, R> {
    aggregator: Arc<RoleAggregator<P, R>>,
    store: Arc<SessionStore>,
    policy: Arc<ModulePolicy>,
    identity: Arc<dyn IdentityProvider>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl<P, R> AuthorityService<P, R>
where
    P: ProfileStore + 'static,
    R: RoleAssignmentStore + 'static,
{
    pub fn new(
        config: &AuthorityConfig,
        profiles: P,
        roles: R,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            aggregator: Arc::new(RoleAggregator::new(profiles, roles, config.lookup_timeout)),
            store: Arc::new(SessionStore::new()),
            policy: Arc::new(config.module_policy.clone()),
            identity,
            in_flight: Mutex::new(None),
        }
    }

    /// Current session snapshot.
    pub fn snapshot(&self) -> Arc<AuthoritySession> {
        self.store.snapshot()
    }

    /// Observe every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AuthoritySession>> {
        self.store.subscribe()
    }

    /// Permission checks over the current snapshot.
    pub fn gate(&self) -> PermissionGate {
        PermissionGate::new(self.store.snapshot(), self.policy.clone())
    }

    /// Apply one identity event. Must be called from within a tokio runtime.
    pub fn handle_event(&self, event: IdentityEvent) {
        match event {
            IdentityEvent::SignedIn {
                principal_id,
                email,
            } => self.start_resolution(Principal::new(principal_id, email)),
            IdentityEvent::SignedOut => self.clear_local(),
            IdentityEvent::TokenRefreshed => self.on_token_refreshed(),
        }
    }

    /// Sign out through the identity layer and clear the local session.
    ///
    /// The local session is cleared even if the identity layer reports an error.
    pub async fn sign_out(&self) {
        if let Err(err) = self.identity.sign_out().await {
            warn!(error = %err, "identity provider sign-out failed; clearing local session anyway");
        }
        self.clear_local();
    }

    /// Wait for the resolution started by the last sign-in, if still running.
    ///
    /// Returns once that resolution has published (or been superseded), so a
    /// signed-in session never stays `Loading`. Bounded by two lookup timeouts.
    pub async fn settle(&self) {
        let pending = self.in_flight_slot().take();
        let Some(task) = pending else {
            return;
        };
        if let Err(err) = task.await {
            if !err.is_cancelled() {
                warn!(error = %err, "resolution task failed");
            }
        }
    }

    /// Consume identity events until the sender side is dropped, then let the
    /// pending resolution finish.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<IdentityEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        debug!("identity event stream closed");
        self.settle().await;
    }

    pub fn spawn(self: Arc<Self>, events: mpsc::Receiver<IdentityEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    fn start_resolution(&self, principal: Principal) {
        let generation = self.store.begin_loading(principal.clone());
        info!(principal_id = %principal.id, generation, "resolving authority");

        let aggregator = self.aggregator.clone();
        let store = self.store.clone();
        let task = tokio::spawn(async move {
            let result = aggregator.resolve(principal.id).await;
            if let Err(err) = &result {
                warn!(
                    principal_id = %principal.id,
                    generation,
                    error = %err,
                    "role aggregation failed; publishing degraded session"
                );
            }

            if store.complete(generation, result) {
                let session = store.snapshot();
                info!(
                    principal_id = %principal.id,
                    generation,
                    state = %session.state(),
                    scope = %session.scope(),
                    "authority resolved"
                );
            } else {
                debug!(generation, "discarding stale resolution");
            }
        });

        self.replace_in_flight(Some(task));
    }

    fn clear_local(&self) {
        self.replace_in_flight(None);
        let generation = self.store.clear();
        info!(generation, "session cleared");
    }

    fn on_token_refreshed(&self) {
        let session = self.store.snapshot();
        match (session.state(), session.principal()) {
            (SessionState::Degraded, Some(principal)) => {
                info!(principal_id = %principal.id, "token refreshed; retrying degraded session");
                self.start_resolution(principal.clone());
            }
            (state, _) => debug!(%state, "token refreshed; nothing to do"),
        }
    }

    /// Swap the tracked resolution task, aborting the one it replaces.
    fn replace_in_flight(&self, next: Option<JoinHandle<()>>) {
        if let Some(previous) = std::mem::replace(&mut *self.in_flight_slot(), next) {
            previous.abort();
        }
    }

    fn in_flight_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
