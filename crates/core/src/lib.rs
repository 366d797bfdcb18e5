//! `estately-core`: shared identity and value primitives.
//!
//! Everything here is pure data: no IO, no async, no policy.

pub mod country;
pub mod error;
pub mod id;

pub use country::CountryCode;
pub use error::{DomainError, DomainResult};
pub use id::{PrincipalId, TeamId, UserId};
