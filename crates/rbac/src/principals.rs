//! Principal resolution for a single rule.

use std::collections::HashSet;
use std::hash::Hash;

use rbacload_core::{GroupId, RuleId, UserId};

use crate::record::RuleScope;
use crate::store::{RbacStore, StoreError};

/// Loads the users and groups a rule applies to.
///
/// Links are not signed on their own; their integrity rides on the owning
/// rule's signature, so nothing is verified here.
#[derive(Debug, Clone)]
pub struct PrincipalResolver<S> {
    store: S,
}

impl<S> PrincipalResolver<S>
where
    S: RbacStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Users linked to the rule, in storage order, without duplicates.
    pub async fn resolve_users(&self, scope: RuleScope, rule_id: RuleId) -> Result<Vec<UserId>, StoreError> {
        Ok(dedup(self.store.rule_users(scope, rule_id).await?))
    }

    /// Groups linked to the rule, in storage order, without duplicates.
    pub async fn resolve_groups(&self, scope: RuleScope, rule_id: RuleId) -> Result<Vec<GroupId>, StoreError> {
        Ok(dedup(self.store.rule_groups(scope, rule_id).await?))
    }
}

fn dedup<T>(items: Vec<T>) -> Vec<T>
where
    T: Copy + Eq + Hash,
{
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|i| seen.insert(*i)).collect()
}
