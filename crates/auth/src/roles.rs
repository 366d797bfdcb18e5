use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use estately_core::DomainError;

use crate::scope::{self, EffectiveScope};

/// Closed registry of role names known to the platform.
///
/// Role names are validated once, where role data enters the system. A typo in
/// a role name is a parse error rather than a check that silently evaluates to
/// `false`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleName {
    SuperAdmin,
    Admin,
    Manager,
    Agent,
    Viewer,
}

impl RoleName {
    pub const ALL: [RoleName; 5] = [
        RoleName::SuperAdmin,
        RoleName::Admin,
        RoleName::Manager,
        RoleName::Agent,
        RoleName::Viewer,
    ];

    /// Role synthesized when nothing better is known about a principal.
    pub const DEFAULT: RoleName = RoleName::Agent;

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::SuperAdmin => "super_admin",
            RoleName::Admin => "admin",
            RoleName::Manager => "manager",
            RoleName::Agent => "agent",
            RoleName::Viewer => "viewer",
        }
    }

    /// Privilege level used when a role has to be synthesized from its name alone
    /// (legacy profile field, default role).
    pub fn default_level(&self) -> i32 {
        match self {
            RoleName::SuperAdmin => 10,
            RoleName::Admin => 8,
            RoleName::Manager => 5,
            RoleName::Agent => 3,
            RoleName::Viewer => 1,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RoleName::SuperAdmin => "Super Administrator",
            RoleName::Admin => "Administrator",
            RoleName::Manager => "Manager",
            RoleName::Agent => "Agent",
            RoleName::Viewer => "Viewer",
        }
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        RoleName::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| DomainError::validation(format!("unknown role name '{}'", s.trim())))
    }
}

/// Where a role assignment came from.
///
/// Ordered by trust: `Default < Legacy < Explicit`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    /// Synthesized because no role data could be found.
    Default,
    /// Derived from the single role name on the user profile.
    Legacy,
    /// Read from the role-assignment store.
    Explicit,
}

/// A grant of a named role, carrying a numeric privilege level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Store id of the role; `None` for synthesized assignments.
    pub role_id: Option<Uuid>,
    pub name: RoleName,
    pub display_name: String,
    pub level: i32,
    pub active: bool,
    pub source: RoleSource,
}

impl RoleAssignment {
    pub fn explicit(
        role_id: Uuid,
        name: RoleName,
        display_name: impl Into<String>,
        level: i32,
        active: bool,
    ) -> Self {
        Self {
            role_id: Some(role_id),
            name,
            display_name: display_name.into(),
            level,
            active,
            source: RoleSource::Explicit,
        }
    }

    /// Synthesize an assignment from a legacy profile role name.
    pub fn legacy(name: RoleName) -> Self {
        Self::synthesized(name, RoleSource::Legacy)
    }

    /// The minimal-privilege assignment used when all role data is missing.
    pub fn fallback_default() -> Self {
        Self::synthesized(RoleName::DEFAULT, RoleSource::Default)
    }

    fn synthesized(name: RoleName, source: RoleSource) -> Self {
        Self {
            role_id: None,
            name,
            display_name: name.display_name().to_string(),
            level: name.default_level(),
            active: true,
            source,
        }
    }
}

/// Non-empty set of active role assignments, highest level first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSet(Vec<RoleAssignment>);

impl RoleSet {
    /// Keep the active assignments; `None` when nothing active remains.
    pub fn from_active(assignments: Vec<RoleAssignment>) -> Option<Self> {
        let mut active: Vec<RoleAssignment> =
            assignments.into_iter().filter(|a| a.active).collect();
        if active.is_empty() {
            return None;
        }
        active.sort_by(|a, b| b.level.cmp(&a.level).then(a.name.cmp(&b.name)));
        Some(Self(active))
    }

    pub fn single(assignment: RoleAssignment) -> Self {
        Self(vec![assignment])
    }

    pub fn fallback_default() -> Self {
        Self::single(RoleAssignment::fallback_default())
    }

    /// Most trusted provenance present in the set.
    pub fn source(&self) -> RoleSource {
        self.0
            .iter()
            .map(|a| a.source)
            .max()
            .unwrap_or(RoleSource::Default)
    }

    pub fn max_level(&self) -> i32 {
        scope::max_level(&self.0)
    }

    pub fn scope(&self) -> EffectiveScope {
        scope::resolve_scope(&self.0)
    }

    pub fn contains(&self, name: RoleName) -> bool {
        self.0.iter().any(|a| a.name == name)
    }

    pub fn as_slice(&self) -> &[RoleAssignment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn into_vec(self) -> Vec<RoleAssignment> {
        self.0
    }
}
