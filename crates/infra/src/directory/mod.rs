//! Profile and role-assignment store boundary.
//!
//! Both stores are external collaborators; this module defines the query
//! contracts the role aggregator depends on and an in-memory backend for
//! tests and local runs.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{DirectorySeed, InMemoryDirectory, LookupBehavior};
pub use r#trait::{
    DirectoryError, ProfileRecord, ProfileStore, RoleAssignmentRecord, RoleAssignmentStore,
};
