//! Immutable authority snapshot published to the rest of the application.

use chrono::{DateTime, Utc};
use serde::Serialize;

use estately_core::UserId;

use crate::principal::{Affiliation, Principal};
use crate::roles::{RoleAssignment, RoleSet};
use crate::scope::{self, EffectiveScope};

/// Lifecycle state of the authority session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Loading,
    Ready,
    Degraded,
}

impl SessionState {
    /// `Ready` or `Degraded`.
    pub fn is_resolved(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Degraded)
    }
}

impl core::fmt::Display for SessionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

/// Successful output of role aggregation for one principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleResolution {
    pub user_id: UserId,
    pub roles: RoleSet,
    pub affiliation: Affiliation,
}

/// Composed authority for the current principal.
///
/// Snapshots are never mutated in place: every lifecycle transition publishes a
/// new value, tagged with the session generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthoritySession {
    generation: u64,
    state: SessionState,
    principal: Option<Principal>,
    user_id: Option<UserId>,
    roles: Vec<RoleAssignment>,
    affiliation: Affiliation,
    scope: EffectiveScope,
    resolved_at: Option<DateTime<Utc>>,
}

impl AuthoritySession {
    pub fn unauthenticated(generation: u64) -> Self {
        Self {
            generation,
            state: SessionState::Unauthenticated,
            principal: None,
            user_id: None,
            roles: Vec::new(),
            affiliation: Affiliation::default(),
            scope: EffectiveScope::Own,
            resolved_at: None,
        }
    }

    pub fn loading(generation: u64, principal: Principal) -> Self {
        Self {
            state: SessionState::Loading,
            principal: Some(principal),
            ..Self::unauthenticated(generation)
        }
    }

    pub fn ready(
        generation: u64,
        principal: Principal,
        resolution: RoleResolution,
        resolved_at: DateTime<Utc>,
    ) -> Self {
        let scope = resolution.roles.scope();
        Self {
            generation,
            state: SessionState::Ready,
            principal: Some(principal),
            user_id: Some(resolution.user_id),
            roles: resolution.roles.into_vec(),
            affiliation: resolution.affiliation,
            scope,
            resolved_at: Some(resolved_at),
        }
    }

    /// Minimal-privilege session used when role aggregation failed outright.
    pub fn degraded(generation: u64, principal: Principal, resolved_at: DateTime<Utc>) -> Self {
        Self {
            generation,
            state: SessionState::Degraded,
            principal: Some(principal),
            user_id: None,
            roles: RoleSet::fallback_default().into_vec(),
            affiliation: Affiliation::default(),
            scope: EffectiveScope::Own,
            resolved_at: Some(resolved_at),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn roles(&self) -> &[RoleAssignment] {
        &self.roles
    }

    pub fn affiliation(&self) -> &Affiliation {
        &self.affiliation
    }

    pub fn scope(&self) -> EffectiveScope {
        self.scope
    }

    pub fn max_level(&self) -> i32 {
        scope::max_level(&self.roles)
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn is_resolved(&self) -> bool {
        self.state.is_resolved()
    }
}
