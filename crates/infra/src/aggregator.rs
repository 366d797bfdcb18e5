//! Role aggregation: principal id → non-empty role set.
//!
//! Two sequential lookups (profile, then role assignments), each raced against
//! a fixed timeout. The losing lookup future is dropped, so a late answer is
//! never observed. Failures fall through the chain
//! explicit assignments → legacy profile role → default role.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use estately_auth::{Affiliation, RoleAssignment, RoleName, RoleResolution, RoleSet};
use estately_core::{CountryCode, PrincipalId};

use crate::directory::{
    DirectoryError, ProfileRecord, ProfileStore, RoleAssignmentRecord, RoleAssignmentStore,
};

/// Outcome of one bounded lookup that did not produce a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("lookup timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Total failure: no profile could be resolved for the principal.
///
/// The session layer turns this into a degraded session; it is never shown to
/// users.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("no profile for principal {0}")]
    ProfileMissing(PrincipalId),

    #[error("profile lookup failed: {0}")]
    ProfileLookup(#[source] LookupError),
}

/// Run `lookup` against a fixed time budget.
async fn bounded<T, F>(limit: Duration, lookup: F) -> Result<T, LookupError>
where
    F: Future<Output = Result<T, DirectoryError>>,
{
    match tokio::time::timeout(limit, lookup).await {
        Ok(result) => result.map_err(LookupError::from),
        Err(_elapsed) => Err(LookupError::TimedOut(limit)),
    }
}

/// Resolves the active role assignments of a principal.
#[derive(Debug)]
pub struct RoleAggregator<P, R> {
    profiles: P,
    roles: R,
    timeout: Duration,
}

impl<P, R> RoleAggregator<P, R>
where
    P: ProfileStore,
    R: RoleAssignmentStore,
{
    pub fn new(profiles: P, roles: R, timeout: Duration) -> Self {
        Self {
            profiles,
            roles,
            timeout,
        }
    }

    /// Resolve the role set of `principal_id`.
    ///
    /// Returns `Err` only when the profile itself cannot be resolved. Every
    /// other failure degrades to the legacy or default role. No retries.
    pub async fn resolve(&self, principal_id: PrincipalId) -> Result<RoleResolution, AggregationError> {
        let profile = match bounded(self.timeout, self.profiles.find_by_principal(principal_id)).await
        {
            Ok(Some(profile)) => profile,
            Ok(None) => return Err(AggregationError::ProfileMissing(principal_id)),
            Err(err) => return Err(AggregationError::ProfileLookup(err)),
        };

        let roles = self.resolve_roles(&profile).await;
        debug!(
            %principal_id,
            user_id = %profile.user_id,
            source = ?roles.source(),
            max_level = roles.max_level(),
            "roles aggregated"
        );

        Ok(RoleResolution {
            user_id: profile.user_id,
            roles,
            affiliation: affiliation(&profile),
        })
    }

    async fn resolve_roles(&self, profile: &ProfileRecord) -> RoleSet {
        match bounded(self.timeout, self.roles.list_for_user(profile.user_id)).await {
            Ok(records) => {
                if let Some(set) = explicit_roles(records) {
                    return set;
                }
            }
            Err(err) => {
                warn!(user_id = %profile.user_id, error = %err, "role assignment lookup failed");
            }
        }

        legacy_or_default(profile)
    }
}

/// Active, recognised store assignments. Unknown role names are dropped.
fn explicit_roles(records: Vec<RoleAssignmentRecord>) -> Option<RoleSet> {
    let assignments = records
        .into_iter()
        .filter_map(|r| match r.name.parse::<RoleName>() {
            Ok(name) => Some(RoleAssignment::explicit(
                r.role_id,
                name,
                r.display_name,
                r.level,
                r.active,
            )),
            Err(err) => {
                warn!(role_id = %r.role_id, error = %err, "ignoring role assignment");
                None
            }
        })
        .collect();

    RoleSet::from_active(assignments)
}

fn legacy_or_default(profile: &ProfileRecord) -> RoleSet {
    let legacy = profile
        .legacy_role
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .and_then(|name| match name.parse::<RoleName>() {
            Ok(role) => Some(role),
            Err(err) => {
                warn!(user_id = %profile.user_id, error = %err, "ignoring legacy role");
                None
            }
        });

    match legacy {
        Some(role) => RoleSet::single(RoleAssignment::legacy(role)),
        None => RoleSet::fallback_default(),
    }
}

fn affiliation(profile: &ProfileRecord) -> Affiliation {
    let country = profile
        .country_code
        .as_deref()
        .and_then(|code| match CountryCode::new(code) {
            Ok(c) => Some(c),
            Err(err) => {
                warn!(user_id = %profile.user_id, error = %err, "ignoring country code");
                None
            }
        });

    Affiliation {
        country,
        team: profile.team_id,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use estately_auth::{EffectiveScope, RoleSource};
    use estately_core::{TeamId, UserId};
    use uuid::Uuid;

    use crate::directory::{InMemoryDirectory, LookupBehavior};

    const TIMEOUT: Duration = Duration::from_millis(500);

    struct Fixture {
        dir: Arc<InMemoryDirectory>,
        principal_id: PrincipalId,
        user_id: UserId,
    }

    impl Fixture {
        fn new(legacy_role: Option<&str>) -> Self {
            let dir = Arc::new(InMemoryDirectory::new());
            let principal_id = PrincipalId::new();
            let user_id = UserId::new();
            dir.upsert_profile(ProfileRecord {
                principal_id,
                user_id,
                email: "omar@example.com".to_string(),
                legacy_role: legacy_role.map(str::to_string),
                country_code: Some("ae".to_string()),
                team_id: None,
            });
            Self {
                dir,
                principal_id,
                user_id,
            }
        }

        fn assign(&self, name: &str, level: i32, active: bool) {
            self.dir.add_assignment(RoleAssignmentRecord {
                user_id: self.user_id,
                role_id: Uuid::now_v7(),
                name: name.to_string(),
                display_name: name.to_string(),
                level,
                active,
            });
        }

        fn aggregator(&self) -> RoleAggregator<Arc<InMemoryDirectory>, Arc<InMemoryDirectory>> {
            RoleAggregator::new(self.dir.clone(), self.dir.clone(), TIMEOUT)
        }
    }

    #[tokio::test]
    async fn explicit_roles_win_and_highest_level_sets_scope() {
        let f = Fixture::new(Some("viewer"));
        f.assign("agent", 3, true);
        f.assign("admin", 8, true);

        let res = f.aggregator().resolve(f.principal_id).await.unwrap();
        assert_eq!(res.user_id, f.user_id);
        assert_eq!(res.roles.len(), 2);
        assert_eq!(res.roles.source(), RoleSource::Explicit);
        assert_eq!(res.roles.scope(), EffectiveScope::Country);
        assert_eq!(res.affiliation.country.unwrap().as_str(), "AE");
    }

    #[tokio::test]
    async fn legacy_role_used_when_no_assignments() {
        let f = Fixture::new(Some("admin"));

        let res = f.aggregator().resolve(f.principal_id).await.unwrap();
        assert_eq!(res.roles.source(), RoleSource::Legacy);
        assert_eq!(res.roles.max_level(), 8);
        assert_eq!(res.roles.scope(), EffectiveScope::Country);
    }

    #[tokio::test]
    async fn only_inactive_assignments_fall_back_to_legacy() {
        let f = Fixture::new(Some("manager"));
        f.assign("super_admin", 10, false);

        let res = f.aggregator().resolve(f.principal_id).await.unwrap();
        assert_eq!(res.roles.source(), RoleSource::Legacy);
        assert!(res.roles.contains(RoleName::Manager));
    }

    #[tokio::test]
    async fn default_agent_when_nothing_is_known() {
        let f = Fixture::new(None);

        let res = f.aggregator().resolve(f.principal_id).await.unwrap();
        assert_eq!(res.roles.source(), RoleSource::Default);
        assert!(res.roles.contains(RoleName::Agent));
        assert_eq!(res.roles.scope(), EffectiveScope::Own);
    }

    #[tokio::test]
    async fn unknown_names_are_dropped_at_the_boundary() {
        let f = Fixture::new(Some("overlord"));
        f.assign("overlord", 99, true);

        let res = f.aggregator().resolve(f.principal_id).await.unwrap();
        assert_eq!(res.roles.source(), RoleSource::Default);
        assert_eq!(res.roles.max_level(), 3);
    }

    #[tokio::test]
    async fn failed_role_lookup_falls_back_to_legacy() {
        let f = Fixture::new(Some("admin"));
        f.assign("super_admin", 10, true);
        f.dir
            .set_assignment_behavior(LookupBehavior::Fail("replica lag".to_string()));

        let res = f.aggregator().resolve(f.principal_id).await.unwrap();
        assert_eq!(res.roles.source(), RoleSource::Legacy);
        assert_eq!(res.roles.max_level(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_role_lookup_times_out_to_default() {
        let f = Fixture::new(None);
        f.assign("admin", 8, true);
        f.dir.set_assignment_behavior(LookupBehavior::Hang);

        let res = f.aggregator().resolve(f.principal_id).await.unwrap();
        assert_eq!(res.roles.source(), RoleSource::Default);
    }

    #[tokio::test(start_paused = true)]
    async fn profile_timeout_is_total_failure() {
        let f = Fixture::new(Some("admin"));
        f.dir.set_profile_behavior(LookupBehavior::Hang);

        let err = f.aggregator().resolve(f.principal_id).await.unwrap_err();
        assert_eq!(err, AggregationError::ProfileLookup(LookupError::TimedOut(TIMEOUT)));
    }

    #[tokio::test(start_paused = true)]
    async fn profile_answering_inside_budget_is_accepted() {
        let f = Fixture::new(Some("manager"));
        f.dir
            .set_profile_behavior(LookupBehavior::Delay(TIMEOUT - Duration::from_millis(1)));

        let res = f.aggregator().resolve(f.principal_id).await.unwrap();
        assert!(res.roles.contains(RoleName::Manager));
    }

    #[tokio::test]
    async fn missing_profile_is_total_failure() {
        let f = Fixture::new(None);
        let stranger = PrincipalId::new();

        let err = f.aggregator().resolve(stranger).await.unwrap_err();
        assert_eq!(err, AggregationError::ProfileMissing(stranger));
    }

    #[tokio::test]
    async fn team_affiliation_is_carried_through() {
        let f = Fixture::new(None);
        let team = TeamId::new();
        f.dir.upsert_profile(ProfileRecord {
            principal_id: f.principal_id,
            user_id: f.user_id,
            email: "omar@example.com".to_string(),
            legacy_role: None,
            country_code: Some("not-a-country".to_string()),
            team_id: Some(team),
        });

        let res = f.aggregator().resolve(f.principal_id).await.unwrap();
        assert_eq!(res.affiliation.team, Some(team));
        assert!(res.affiliation.country.is_none());
    }
}
