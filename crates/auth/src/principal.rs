use serde::{Deserialize, Serialize};

use estately_core::{CountryCode, PrincipalId, TeamId};

/// The authenticated actor for the current session.
///
/// Supplied by the identity layer on sign-in and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
}

impl Principal {
    pub fn new(id: PrincipalId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}

/// Country/team affiliation carried on the internal user profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliation {
    pub country: Option<CountryCode>,
    pub team: Option<TeamId>,
}
