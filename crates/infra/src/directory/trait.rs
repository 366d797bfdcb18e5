use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use estately_core::{PrincipalId, TeamId, UserId};

/// Internal user record, keyed by the external principal id.
///
/// Field values are raw store data: `legacy_role` and `country_code` are
/// validated by the aggregator, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub principal_id: PrincipalId,
    pub user_id: UserId,
    pub email: String,
    #[serde(default)]
    pub legacy_role: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub team_id: Option<TeamId>,
}

/// One row of the role-assignment store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignmentRecord {
    pub user_id: UserId,
    pub role_id: Uuid,
    pub name: String,
    pub display_name: String,
    pub level: i32,
    pub active: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Profile lookup by principal id. At most one record per principal.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_principal(
        &self,
        principal_id: PrincipalId,
    ) -> Result<Option<ProfileRecord>, DirectoryError>;
}

/// Role-assignment lookup by internal user id. Returns active and inactive rows.
#[async_trait::async_trait]
pub trait RoleAssignmentStore: Send + Sync {
    async fn list_for_user(&self, user_id: UserId)
    -> Result<Vec<RoleAssignmentRecord>, DirectoryError>;
}

#[async_trait::async_trait]
impl<S> ProfileStore for Arc<S>
where
    S: ProfileStore + ?Sized,
{
    async fn find_by_principal(
        &self,
        principal_id: PrincipalId,
    ) -> Result<Option<ProfileRecord>, DirectoryError> {
        (**self).find_by_principal(principal_id).await
    }
}

#[async_trait::async_trait]
impl<S> RoleAssignmentStore for Arc<S>
where
    S: RoleAssignmentStore + ?Sized,
{
    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RoleAssignmentRecord>, DirectoryError> {
        (**self).list_for_user(user_id).await
    }
}
