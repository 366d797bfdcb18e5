//! Infrastructure layer: directory backends, role aggregation and the
//! observable authority session.

pub mod aggregator;
pub mod config;
pub mod directory;
pub mod session;

pub use aggregator::{AggregationError, LookupError, RoleAggregator};
pub use config::{AuthorityConfig, ConfigError};
pub use directory::{
    DirectoryError, InMemoryDirectory, LookupBehavior, ProfileRecord, ProfileStore,
    RoleAssignmentRecord, RoleAssignmentStore,
};
pub use session::{
    AuthorityService, IdentityError, IdentityEvent, IdentityProvider, NoopIdentityProvider,
    SessionStore,
};
