use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::roles::RoleName;

/// Allow-lists for sensitive application modules.
///
/// Modules that do not appear here are open to every signed-in principal.
/// Module names are matched case-insensitively.
///
/// Serialized as a JSON object of module name to role names:
///
/// ```json
/// { "users": ["super_admin", "admin", "manager"], "settings": ["super_admin", "admin"] }
/// ```
///
/// Unknown role names are rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<RoleName>>", into = "BTreeMap<String, Vec<RoleName>>")]
pub struct ModulePolicy {
    modules: BTreeMap<String, Vec<RoleName>>,
}

pub const USERS_MODULE: &str = "users";
pub const SETTINGS_MODULE: &str = "settings";

impl ModulePolicy {
    /// A policy with no sensitive modules (every module is open).
    pub fn open() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// Restrict `module` to the given roles, replacing any previous allow-list.
    pub fn with_module(
        mut self,
        module: impl AsRef<str>,
        roles: impl IntoIterator<Item = RoleName>,
    ) -> Self {
        self.modules
            .insert(normalize(module.as_ref()), roles.into_iter().collect());
        self
    }

    /// Roles allowed into `module`, or `None` when the module is not restricted.
    pub fn allowed_roles(&self, module: &str) -> Option<&[RoleName]> {
        self.modules.get(&normalize(module)).map(Vec::as_slice)
    }

    pub fn is_sensitive(&self, module: &str) -> bool {
        self.modules.contains_key(&normalize(module))
    }

    pub fn sensitive_modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for ModulePolicy {
    /// Development defaults: user administration for managers and up,
    /// system configuration for administrators only.
    fn default() -> Self {
        Self::open()
            .with_module(
                USERS_MODULE,
                [RoleName::SuperAdmin, RoleName::Admin, RoleName::Manager],
            )
            .with_module(SETTINGS_MODULE, [RoleName::SuperAdmin, RoleName::Admin])
    }
}

impl From<BTreeMap<String, Vec<RoleName>>> for ModulePolicy {
    fn from(value: BTreeMap<String, Vec<RoleName>>) -> Self {
        value
            .into_iter()
            .fold(Self::open(), |policy, (module, roles)| policy.with_module(module, roles))
    }
}

impl From<ModulePolicy> for BTreeMap<String, Vec<RoleName>> {
    fn from(value: ModulePolicy) -> Self {
        value.modules
    }
}

fn normalize(module: &str) -> String {
    module.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_restricts_users_and_settings() {
        let policy = ModulePolicy::default();
        assert!(policy.is_sensitive("users"));
        assert!(policy.is_sensitive("Settings"));
        assert!(!policy.is_sensitive("contacts"));
        assert!(policy.allowed_roles("users").unwrap().contains(&RoleName::Manager));
        assert!(!policy.allowed_roles("settings").unwrap().contains(&RoleName::Manager));
        assert_eq!(
            policy.sensitive_modules().collect::<Vec<_>>(),
            vec!["settings", "users"]
        );
    }

    #[test]
    fn parses_from_json_and_normalizes_module_names() {
        let policy = ModulePolicy::from_json(r#"{ " Reports ": ["admin"] }"#).unwrap();
        assert_eq!(policy.allowed_roles("reports"), Some(&[RoleName::Admin][..]));
        assert!(!policy.is_sensitive("users"));
    }

    #[test]
    fn unknown_role_in_json_is_rejected() {
        let err = ModulePolicy::from_json(r#"{ "users": ["admn"] }"#);
        assert!(err.is_err());
    }
}
