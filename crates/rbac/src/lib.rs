//! `rbacload-rbac` — verified RBAC policy loading.
//!
//! Reconstructs a [`Policy`] (global and project-scoped rules plus the
//! principals they apply to) from storage, checking each stored rule record's
//! signature on the way. Tampered rows are dropped and logged; failures of the
//! verification machinery or of storage abort the load.
//!
//! This crate does not decide allow/deny outcomes and does not own a storage
//! driver: it talks to storage through [`RbacStore`].

pub mod error;
pub mod loader;
pub mod model;
pub mod principals;
pub mod record;
pub mod roles;
pub mod screen;
pub mod signature;
pub mod store;

pub use error::LoadError;
pub use loader::{GlobalRuleLoader, LoadStrategy, PolicyLoader, ProjectRuleLoader};
pub use model::{
    GlobalRule, Policy, Principal, PrincipalKind, PrincipalScope, ProjectKey, ProjectRule,
};
pub use principals::PrincipalResolver;
pub use record::{GlobalRuleRecord, PolicyHeader, ProjectRuleRecord, RuleRecord, RuleScope};
pub use roles::Role;
pub use screen::{Rejection, RowOutcome, Screened};
pub use signature::{Keyring, Signable, SignatureError, SignatureVerifier, SigningKey};
pub use store::{InMemoryRbacStore, RbacStore, StoreError, StoreQuery};
