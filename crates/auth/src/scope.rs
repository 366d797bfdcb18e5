//! Effective data-visibility scope derived from role levels.

use serde::{Deserialize, Serialize};

use crate::roles::RoleAssignment;

/// Level assumed when no active assignment is present.
pub const MIN_LEVEL: i32 = 1;

pub const TEAM_THRESHOLD: i32 = 5;
pub const COUNTRY_THRESHOLD: i32 = 8;
pub const ALL_THRESHOLD: i32 = 10;

/// Coarse visibility tier, ordered `Own < Team < Country < All`.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveScope {
    #[default]
    Own,
    Team,
    Country,
    All,
}

impl EffectiveScope {
    /// Threshold table, evaluated top-down with `>=`.
    pub fn from_level(level: i32) -> Self {
        if level >= ALL_THRESHOLD {
            EffectiveScope::All
        } else if level >= COUNTRY_THRESHOLD {
            EffectiveScope::Country
        } else if level >= TEAM_THRESHOLD {
            EffectiveScope::Team
        } else {
            EffectiveScope::Own
        }
    }

    /// Whether this scope lets the principal edit records owned by others.
    pub fn grants_blanket_edit(self) -> bool {
        self >= EffectiveScope::Team
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveScope::Own => "own",
            EffectiveScope::Team => "team",
            EffectiveScope::Country => "country",
            EffectiveScope::All => "all",
        }
    }
}

impl core::fmt::Display for EffectiveScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Highest level among active assignments, or [`MIN_LEVEL`].
pub fn max_level(assignments: &[RoleAssignment]) -> i32 {
    assignments
        .iter()
        .filter(|a| a.active)
        .map(|a| a.level)
        .max()
        .unwrap_or(MIN_LEVEL)
}

/// Map a role set to one effective scope (pure max + table lookup).
pub fn resolve_scope(assignments: &[RoleAssignment]) -> EffectiveScope {
    EffectiveScope::from_level(max_level(assignments))
}
