//! `estately-auth`: pure authorization core (no IO, no async).
//!
//! Role aggregation results come in from the infra layer; this crate turns them
//! into an effective scope, an immutable session snapshot and advisory UX gates.
//! Authoritative enforcement belongs to the data-access layer, which re-derives
//! scope from the same role data.

pub mod gate;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod scope;
pub mod session;

pub use gate::{ModuleAccessExplanation, OwnedRecord, PermissionGate, can_edit_record};
pub use policy::ModulePolicy;
pub use principal::{Affiliation, Principal};
pub use roles::{RoleAssignment, RoleName, RoleSet, RoleSource};
pub use scope::{EffectiveScope, max_level, resolve_scope};
pub use session::{AuthoritySession, RoleResolution, SessionState};
