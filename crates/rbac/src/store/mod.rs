//! Read-only storage boundary for RBAC records.
//!
//! The loaders only ever issue the queries listed in [`StoreQuery`]. Storage
//! adapters (in-memory here, Postgres in `rbacload-infra`) implement
//! [`RbacStore`].

pub mod in_memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use rbacload_core::{GroupId, PolicyId, RuleId, UserId};

use crate::model::ProjectKey;
use crate::record::{GlobalRuleRecord, PolicyHeader, ProjectRuleRecord, RuleScope};

pub use in_memory::InMemoryRbacStore;

/// Storage failure. Always fatal for the load that hit it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("failed to decode row: {0}")]
    Decode(String),
}

/// One query issued against storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreQuery {
    PolicyById(PolicyId),
    PolicyByName(String),
    GlobalRules(PolicyId),
    ProjectRules(PolicyId),
    RuleUsers(RuleScope, RuleId),
    RuleGroups(RuleScope, RuleId),
    ProjectKeys(RuleId),
}

impl StoreQuery {
    /// Rule scope the query touches; `None` for policy header lookups.
    pub fn scope(&self) -> Option<RuleScope> {
        match self {
            StoreQuery::PolicyById(_) | StoreQuery::PolicyByName(_) => None,
            StoreQuery::GlobalRules(_) => Some(RuleScope::Global),
            StoreQuery::ProjectRules(_) | StoreQuery::ProjectKeys(_) => Some(RuleScope::Project),
            StoreQuery::RuleUsers(scope, _) | StoreQuery::RuleGroups(scope, _) => Some(*scope),
        }
    }
}

/// Parameterized read-only queries over RBAC storage.
///
/// Row order is whatever storage returns; callers must not rely on it.
#[async_trait]
pub trait RbacStore: Send + Sync {
    async fn policy_by_id(&self, id: PolicyId) -> Result<Option<PolicyHeader>, StoreError>;

    async fn policy_by_name(&self, name: &str) -> Result<Option<PolicyHeader>, StoreError>;

    async fn global_rules(&self, policy_id: PolicyId) -> Result<Vec<GlobalRuleRecord>, StoreError>;

    async fn project_rules(&self, policy_id: PolicyId) -> Result<Vec<ProjectRuleRecord>, StoreError>;

    /// User links of a rule in the given scope's link table.
    async fn rule_users(&self, scope: RuleScope, rule_id: RuleId) -> Result<Vec<UserId>, StoreError>;

    /// Group links of a rule in the given scope's link table.
    async fn rule_groups(&self, scope: RuleScope, rule_id: RuleId) -> Result<Vec<GroupId>, StoreError>;

    /// Project keys a project rule applies to.
    async fn project_keys(&self, rule_id: RuleId) -> Result<Vec<ProjectKey>, StoreError>;
}

#[async_trait]
impl<S> RbacStore for Arc<S>
where
    S: RbacStore + ?Sized,
{
    async fn policy_by_id(&self, id: PolicyId) -> Result<Option<PolicyHeader>, StoreError> {
        (**self).policy_by_id(id).await
    }

    async fn policy_by_name(&self, name: &str) -> Result<Option<PolicyHeader>, StoreError> {
        (**self).policy_by_name(name).await
    }

    async fn global_rules(&self, policy_id: PolicyId) -> Result<Vec<GlobalRuleRecord>, StoreError> {
        (**self).global_rules(policy_id).await
    }

    async fn project_rules(&self, policy_id: PolicyId) -> Result<Vec<ProjectRuleRecord>, StoreError> {
        (**self).project_rules(policy_id).await
    }

    async fn rule_users(&self, scope: RuleScope, rule_id: RuleId) -> Result<Vec<UserId>, StoreError> {
        (**self).rule_users(scope, rule_id).await
    }

    async fn rule_groups(&self, scope: RuleScope, rule_id: RuleId) -> Result<Vec<GroupId>, StoreError> {
        (**self).rule_groups(scope, rule_id).await
    }

    async fn project_keys(&self, rule_id: RuleId) -> Result<Vec<ProjectKey>, StoreError> {
        (**self).project_keys(rule_id).await
    }
}
