//! Authority session lifecycle.
//!
//! `Unauthenticated → Loading → {Ready | Degraded} → Unauthenticated`

pub mod service;
pub mod store;

pub use service::{
    AuthorityService, IdentityError, IdentityEvent, IdentityProvider, NoopIdentityProvider,
};
pub use store::SessionStore;
