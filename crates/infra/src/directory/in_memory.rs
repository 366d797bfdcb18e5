//! In-memory directory for tests/dev.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use estately_core::{PrincipalId, UserId};

use super::r#trait::{
    DirectoryError, ProfileRecord, ProfileStore, RoleAssignmentRecord, RoleAssignmentStore,
};

/// How a lookup against the in-memory directory behaves.
///
/// Lets tests and local runs reproduce a slow or broken backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LookupBehavior {
    #[default]
    Normal,
    /// Answer normally after a delay.
    Delay(Duration),
    /// Fail with `DirectoryError::Unavailable`.
    Fail(String),
    /// Never answer.
    Hang,
}

impl LookupBehavior {
    async fn apply(&self) -> Result<(), DirectoryError> {
        match self {
            LookupBehavior::Normal => Ok(()),
            LookupBehavior::Delay(d) => {
                tokio::time::sleep(*d).await;
                Ok(())
            }
            LookupBehavior::Fail(msg) => Err(DirectoryError::Unavailable(msg.clone())),
            LookupBehavior::Hang => std::future::pending().await,
        }
    }
}

/// JSON seed for [`InMemoryDirectory`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub profiles: Vec<ProfileRecord>,
    #[serde(default)]
    pub assignments: Vec<RoleAssignmentRecord>,
}

/// Profile + role-assignment store backed by in-process maps.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    profiles: RwLock<HashMap<PrincipalId, ProfileRecord>>,
    assignments: RwLock<HashMap<UserId, Vec<RoleAssignmentRecord>>>,
    profile_behavior: RwLock<LookupBehavior>,
    assignment_behavior: RwLock<LookupBehavior>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        let directory = Self::new();
        for profile in seed.profiles {
            directory.upsert_profile(profile);
        }
        for assignment in seed.assignments {
            directory.add_assignment(assignment);
        }
        directory
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_seed(serde_json::from_str(json)?))
    }

    pub fn upsert_profile(&self, profile: ProfileRecord) {
        write_recovering(&self.profiles, "profiles").insert(profile.principal_id, profile);
    }

    pub fn add_assignment(&self, assignment: RoleAssignmentRecord) {
        write_recovering(&self.assignments, "assignments")
            .entry(assignment.user_id)
            .or_default()
            .push(assignment);
    }

    pub fn set_profile_behavior(&self, behavior: LookupBehavior) {
        *write_recovering(&self.profile_behavior, "profile_behavior") = behavior;
    }

    pub fn set_assignment_behavior(&self, behavior: LookupBehavior) {
        *write_recovering(&self.assignment_behavior, "assignment_behavior") = behavior;
    }

    fn behavior(slot: &RwLock<LookupBehavior>) -> LookupBehavior {
        slot.read().map(|b| b.clone()).unwrap_or_default()
    }
}

/// Take the write lock even if a previous writer panicked.
///
/// The maps hold plain records with no cross-entry invariant, so the poison
/// flag is cleared and later reads succeed.
fn write_recovering<'a, T>(lock: &'a RwLock<T>, name: &'static str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(map = name, "in-memory directory lock poisoned; recovering");
            lock.clear_poison();
            poisoned.into_inner()
        }
    }
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryDirectory {
    async fn find_by_principal(
        &self,
        principal_id: PrincipalId,
    ) -> Result<Option<ProfileRecord>, DirectoryError> {
        Self::behavior(&self.profile_behavior).apply().await?;

        let map = self
            .profiles
            .read()
            .map_err(|_| DirectoryError::Backend("profile map poisoned".to_string()))?;
        Ok(map.get(&principal_id).cloned())
    }
}

#[async_trait::async_trait]
impl RoleAssignmentStore for InMemoryDirectory {
    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RoleAssignmentRecord>, DirectoryError> {
        Self::behavior(&self.assignment_behavior).apply().await?;

        let map = self
            .assignments
            .read()
            .map_err(|_| DirectoryError::Backend("assignment map poisoned".to_string()))?;
        Ok(map.get(&user_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_from_json() {
        let principal_id = PrincipalId::new();
        let user_id = UserId::new();
        let json = format!(
            r#"{{
                "profiles": [
                    {{ "principal_id": "{principal_id}", "user_id": "{user_id}",
                       "email": "dana@example.com", "legacy_role": "admin" }}
                ],
                "assignments": [
                    {{ "user_id": "{user_id}", "role_id": "{role_id}", "name": "manager",
                       "display_name": "Manager", "level": 5, "active": true }}
                ]
            }}"#,
            role_id = uuid::Uuid::now_v7(),
        );

        let dir = InMemoryDirectory::from_json(&json).unwrap();
        let profiles = dir.profiles.read().unwrap();
        let profile = profiles.get(&principal_id).unwrap();
        assert_eq!(profile.legacy_role.as_deref(), Some("admin"));
        assert!(profile.country_code.is_none());
        assert_eq!(dir.assignments.read().unwrap().get(&user_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_behavior_surfaces_unavailable() {
        let dir = InMemoryDirectory::new();
        dir.set_profile_behavior(LookupBehavior::Fail("db down".to_string()));

        let err = dir.find_by_principal(PrincipalId::new()).await.unwrap_err();
        assert_eq!(err, DirectoryError::Unavailable("db down".to_string()));
    }

    #[tokio::test]
    async fn writes_survive_a_poisoned_lock() {
        let dir = InMemoryDirectory::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = dir.profiles.write().unwrap();
            panic!("writer died holding the lock");
        }));
        assert!(dir.profiles.is_poisoned());

        let principal_id = PrincipalId::new();
        dir.upsert_profile(ProfileRecord {
            principal_id,
            user_id: UserId::new(),
            email: "rami@example.com".to_string(),
            legacy_role: None,
            country_code: None,
            team_id: None,
        });

        assert!(!dir.profiles.is_poisoned());
        let found = dir.find_by_principal(principal_id).await.unwrap();
        assert_eq!(found.unwrap().email, "rami@example.com");
    }

    #[tokio::test]
    async fn unknown_user_has_no_assignments() {
        let dir = InMemoryDirectory::new();
        assert!(dir.list_for_user(UserId::new()).await.unwrap().is_empty());
    }
}
