use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use estately_core::{DomainResult, PrincipalId, TeamId};

use crate::policy::ModulePolicy;
use crate::roles::RoleName;
use crate::scope::EffectiveScope;
use crate::session::{AuthoritySession, SessionState};

/// A gated business record (contact, request, property, article, ...).
///
/// The gate only reads ownership; it never owns or loads records.
pub trait OwnedRecord {
    fn owner_id(&self) -> PrincipalId;

    fn team_id(&self) -> Option<TeamId> {
        None
    }
}

/// Record ownership check against a session.
///
/// Team, country and global scopes may edit any record; own scope may edit only
/// records owned by the session principal. Without a principal nothing is editable.
pub fn can_edit_record<R: OwnedRecord + ?Sized>(record: &R, session: &AuthoritySession) -> bool {
    let Some(principal) = session.principal() else {
        return false;
    };

    session.scope().grants_blanket_edit() || record.owner_id() == principal.id
}

/// Advisory permission checks built from one session snapshot.
///
/// These drive navigation and UI affordances only. The data-access layer must
/// re-derive scope from role data and enforce it independently.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    session: Arc<AuthoritySession>,
    policy: Arc<ModulePolicy>,
}

impl PermissionGate {
    pub fn new(session: Arc<AuthoritySession>, policy: Arc<ModulePolicy>) -> Self {
        Self { session, policy }
    }

    pub fn session(&self) -> &AuthoritySession {
        &self.session
    }

    pub fn scope(&self) -> EffectiveScope {
        self.session.scope()
    }

    pub fn has_role(&self, name: RoleName) -> bool {
        self.session
            .roles()
            .iter()
            .any(|a| a.active && a.name == name)
    }

    pub fn has_any_role(&self, names: &[RoleName]) -> bool {
        names.iter().any(|n| self.has_role(*n))
    }

    /// String form of [`has_role`](Self::has_role) for callers holding raw names.
    ///
    /// Unknown names are an error, not `false`.
    pub fn has_role_named(&self, name: &str) -> DomainResult<bool> {
        Ok(self.has_role(name.parse()?))
    }

    pub fn can_access_module(&self, module: &str) -> bool {
        match self.policy.allowed_roles(module) {
            None => true,
            Some(allowed) => {
                let granted = self.has_any_role(allowed);
                if !granted {
                    debug!(module, scope = %self.scope(), "module access denied");
                }
                granted
            }
        }
    }

    pub fn can_edit_record<R: OwnedRecord + ?Sized>(&self, record: &R) -> bool {
        can_edit_record(record, &self.session)
    }

    /// Explain the outcome of [`can_access_module`](Self::can_access_module).
    pub fn explain_module_access(&self, module: &str) -> ModuleAccessExplanation {
        let held_roles: Vec<RoleName> = self
            .session
            .roles()
            .iter()
            .filter(|a| a.active)
            .map(|a| a.name)
            .collect();

        let (granted, required_roles, reason) = match self.policy.allowed_roles(module) {
            None => (true, Vec::new(), format!("module '{module}' is not restricted")),
            Some(allowed) => {
                let matching: Vec<RoleName> = allowed
                    .iter()
                    .copied()
                    .filter(|r| held_roles.contains(r))
                    .collect();
                let reason = if matching.is_empty() {
                    format!("none of the held roles {held_roles:?} is allowed into '{module}'")
                } else {
                    format!("granted by role(s) {matching:?}")
                };
                (!matching.is_empty(), allowed.to_vec(), reason)
            }
        };

        ModuleAccessExplanation {
            module: module.to_string(),
            granted,
            reason,
            required_roles,
            held_roles,
            state: self.session.state(),
            scope: self.session.scope(),
        }
    }
}

/// Debuggable account of a module access decision.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleAccessExplanation {
    pub module: String,
    pub granted: bool,
    pub reason: String,
    /// Empty when the module is not restricted.
    pub required_roles: Vec<RoleName>,
    pub held_roles: Vec<RoleName>,
    pub state: SessionState,
    pub scope: EffectiveScope,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use estately_core::UserId;
    use uuid::Uuid;

    use crate::principal::{Affiliation, Principal};
    use crate::roles::{RoleAssignment, RoleSet};
    use crate::session::RoleResolution;

    struct Listing {
        owner: PrincipalId,
    }

    impl OwnedRecord for Listing {
        fn owner_id(&self) -> PrincipalId {
            self.owner
        }
    }

    fn principal() -> Principal {
        Principal::new(PrincipalId::new(), "agent@example.com")
    }

    fn ready_with(principal: Principal, roles: &[(RoleName, i32)]) -> Arc<AuthoritySession> {
        let assignments = roles
            .iter()
            .map(|(name, level)| {
                RoleAssignment::explicit(Uuid::now_v7(), *name, name.display_name(), *level, true)
            })
            .collect();
        let resolution = RoleResolution {
            user_id: UserId::new(),
            roles: RoleSet::from_active(assignments).unwrap(),
            affiliation: Affiliation::default(),
        };
        Arc::new(AuthoritySession::ready(1, principal, resolution, Utc::now()))
    }

    fn gate(session: Arc<AuthoritySession>) -> PermissionGate {
        PermissionGate::new(session, Arc::new(ModulePolicy::default()))
    }

    #[test]
    fn has_role_and_has_any_role() {
        let g = gate(ready_with(principal(), &[(RoleName::Agent, 3), (RoleName::Admin, 8)]));
        assert!(g.has_role(RoleName::Admin));
        assert!(!g.has_role(RoleName::Manager));
        assert!(g.has_any_role(&[RoleName::Manager, RoleName::Agent]));
        assert!(!g.has_any_role(&[]));
    }

    #[test]
    fn has_role_named_fails_fast_on_typos() {
        let g = gate(ready_with(principal(), &[(RoleName::Manager, 5)]));
        assert!(g.has_role_named("manager").unwrap());
        assert!(!g.has_role_named("viewer").unwrap());
        assert!(g.has_role_named("managr").is_err());
    }

    #[test]
    fn manager_reaches_users_module_and_edits_any_record() {
        let g = gate(ready_with(principal(), &[(RoleName::Manager, 5)]));
        assert_eq!(g.scope(), EffectiveScope::Team);
        assert!(g.can_access_module("users"));
        assert!(!g.can_access_module("settings"));
        assert!(g.can_access_module("contacts"));

        let foreign = Listing {
            owner: PrincipalId::new(),
        };
        assert!(g.can_edit_record(&foreign));
    }

    #[test]
    fn own_scope_edits_only_owned_records() {
        let me = principal();
        let g = gate(ready_with(me.clone(), &[(RoleName::Agent, 3)]));
        assert_eq!(g.scope(), EffectiveScope::Own);

        assert!(g.can_edit_record(&Listing { owner: me.id }));
        assert!(!g.can_edit_record(&Listing {
            owner: PrincipalId::new()
        }));
    }

    #[test]
    fn blanket_scopes_ignore_owner() {
        for (name, level) in [
            (RoleName::Manager, 5),
            (RoleName::Admin, 8),
            (RoleName::SuperAdmin, 10),
        ] {
            let g = gate(ready_with(principal(), &[(name, level)]));
            assert!(g.can_edit_record(&Listing {
                owner: PrincipalId::new()
            }));
        }
    }

    struct TeamListing {
        owner: PrincipalId,
        team: TeamId,
    }

    impl OwnedRecord for TeamListing {
        fn owner_id(&self) -> PrincipalId {
            self.owner
        }

        fn team_id(&self) -> Option<TeamId> {
            Some(self.team)
        }
    }

    #[test]
    fn team_tag_does_not_narrow_edit_rights() {
        let foreign = TeamListing {
            owner: PrincipalId::new(),
            team: TeamId::new(),
        };
        assert!(foreign.team_id().is_some());
        assert!(Listing { owner: PrincipalId::new() }.team_id().is_none());

        let manager = gate(ready_with(principal(), &[(RoleName::Manager, 5)]));
        assert!(manager.can_edit_record(&foreign));

        let agent = gate(ready_with(principal(), &[(RoleName::Agent, 3)]));
        assert!(!agent.can_edit_record(&foreign));
    }

    #[test]
    fn unauthenticated_session_edits_nothing_and_holds_no_roles() {
        let g = gate(Arc::new(AuthoritySession::unauthenticated(0)));
        assert!(!g.can_edit_record(&Listing {
            owner: PrincipalId::new()
        }));
        assert!(!g.has_role(RoleName::Agent));
        assert!(!g.can_access_module("users"));
    }

    #[test]
    fn degraded_session_is_minimal_agent() {
        let me = principal();
        let g = gate(Arc::new(AuthoritySession::degraded(4, me.clone(), Utc::now())));
        assert!(g.has_role(RoleName::Agent));
        assert!(!g.can_access_module("users"));
        assert!(g.can_edit_record(&Listing { owner: me.id }));
        assert!(!g.can_edit_record(&Listing {
            owner: PrincipalId::new()
        }));
    }

    #[test]
    fn explanation_names_required_and_held_roles() {
        let g = gate(ready_with(principal(), &[(RoleName::Agent, 3)]));
        let denied = g.explain_module_access("settings");
        assert!(!denied.granted);
        assert_eq!(denied.held_roles, vec![RoleName::Agent]);
        assert!(denied.required_roles.contains(&RoleName::Admin));

        let open = g.explain_module_access("properties");
        assert!(open.granted);
        assert!(open.required_roles.is_empty());
    }
}
