use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use rbacload_core::{GroupId, PolicyId, RuleId, UserId};

use super::{RbacStore, StoreError, StoreQuery};
use crate::model::ProjectKey;
use crate::record::{GlobalRuleRecord, PolicyHeader, ProjectRuleRecord, RuleScope};

type FaultFn = Box<dyn Fn(&StoreQuery) -> bool + Send + Sync>;

#[derive(Debug, Default)]
struct Tables {
    policies: Vec<PolicyHeader>,
    globals: Vec<GlobalRuleRecord>,
    projects: Vec<ProjectRuleRecord>,
    users: HashMap<(RuleScope, RuleId), Vec<UserId>>,
    groups: HashMap<(RuleScope, RuleId), Vec<GroupId>>,
    project_keys: HashMap<RuleId, Vec<ProjectKey>>,
}

/// In-memory RBAC storage.
///
/// Intended for tests/dev. Rows come back in insertion order. Every query is
/// appended to a journal, and a fault predicate can make selected queries fail.
#[derive(Default)]
pub struct InMemoryRbacStore {
    tables: RwLock<Tables>,
    journal: Mutex<Vec<StoreQuery>>,
    fault: RwLock<Option<FaultFn>>,
}

impl core::fmt::Debug for InMemoryRbacStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryRbacStore")
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl InMemoryRbacStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_policy(&self, header: PolicyHeader) {
        if let Ok(mut t) = self.tables.write() {
            t.policies.retain(|p| p.id != header.id);
            t.policies.push(header);
        }
    }

    /// Insert or replace (by id) a global rule row.
    pub fn insert_global_rule(&self, record: GlobalRuleRecord) {
        if let Ok(mut t) = self.tables.write() {
            match t.globals.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => t.globals.push(record),
            }
        }
    }

    /// Insert or replace (by id) a project rule row.
    pub fn insert_project_rule(&self, record: ProjectRuleRecord) {
        if let Ok(mut t) = self.tables.write() {
            match t.projects.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => t.projects.push(record),
            }
        }
    }

    pub fn link_user(&self, scope: RuleScope, rule_id: RuleId, user: UserId) {
        if let Ok(mut t) = self.tables.write() {
            let links = t.users.entry((scope, rule_id)).or_default();
            if !links.contains(&user) {
                links.push(user);
            }
        }
    }

    pub fn link_group(&self, scope: RuleScope, rule_id: RuleId, group: GroupId) {
        if let Ok(mut t) = self.tables.write() {
            let links = t.groups.entry((scope, rule_id)).or_default();
            if !links.contains(&group) {
                links.push(group);
            }
        }
    }

    pub fn link_project(&self, rule_id: RuleId, key: ProjectKey) {
        if let Ok(mut t) = self.tables.write() {
            let links = t.project_keys.entry(rule_id).or_default();
            if !links.contains(&key) {
                links.push(key);
            }
        }
    }

    /// Make every query matching `predicate` fail with [`StoreError::Unavailable`].
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreQuery) -> bool + Send + Sync + 'static,
    {
        if let Ok(mut fault) = self.fault.write() {
            *fault = Some(Box::new(predicate));
        }
    }

    pub fn clear_fault(&self) {
        if let Ok(mut fault) = self.fault.write() {
            *fault = None;
        }
    }

    /// Queries issued so far, oldest first.
    pub fn queries(&self) -> Vec<StoreQuery> {
        self.journal.lock().map(|j| j.clone()).unwrap_or_default()
    }

    pub fn clear_queries(&self) {
        if let Ok(mut j) = self.journal.lock() {
            j.clear();
        }
    }

    fn issue(&self, query: StoreQuery) -> Result<(), StoreError> {
        let failing = {
            let fault = self.fault.read().map_err(|_| poisoned())?;
            fault.as_ref().is_some_and(|f| f(&query))
        };
        let message = format!("injected failure for {query:?}");
        self.journal.lock().map_err(|_| poisoned())?.push(query);
        if failing {
            return Err(StoreError::Unavailable(message));
        }
        Ok(())
    }
}

#[async_trait]
impl RbacStore for InMemoryRbacStore {
    async fn policy_by_id(&self, id: PolicyId) -> Result<Option<PolicyHeader>, StoreError> {
        self.issue(StoreQuery::PolicyById(id))?;
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.policies.iter().find(|p| p.id == id).cloned())
    }

    async fn policy_by_name(&self, name: &str) -> Result<Option<PolicyHeader>, StoreError> {
        self.issue(StoreQuery::PolicyByName(name.to_string()))?;
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.policies.iter().find(|p| p.name == name).cloned())
    }

    async fn global_rules(&self, policy_id: PolicyId) -> Result<Vec<GlobalRuleRecord>, StoreError> {
        self.issue(StoreQuery::GlobalRules(policy_id))?;
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.globals
            .iter()
            .filter(|r| r.policy_id == policy_id)
            .cloned()
            .collect())
    }

    async fn project_rules(&self, policy_id: PolicyId) -> Result<Vec<ProjectRuleRecord>, StoreError> {
        self.issue(StoreQuery::ProjectRules(policy_id))?;
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.projects
            .iter()
            .filter(|r| r.policy_id == policy_id)
            .cloned()
            .collect())
    }

    async fn rule_users(&self, scope: RuleScope, rule_id: RuleId) -> Result<Vec<UserId>, StoreError> {
        self.issue(StoreQuery::RuleUsers(scope, rule_id))?;
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.users.get(&(scope, rule_id)).cloned().unwrap_or_default())
    }

    async fn rule_groups(&self, scope: RuleScope, rule_id: RuleId) -> Result<Vec<GroupId>, StoreError> {
        self.issue(StoreQuery::RuleGroups(scope, rule_id))?;
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.groups.get(&(scope, rule_id)).cloned().unwrap_or_default())
    }

    async fn project_keys(&self, rule_id: RuleId) -> Result<Vec<ProjectKey>, StoreError> {
        self.issue(StoreQuery::ProjectKeys(rule_id))?;
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.project_keys.get(&rule_id).cloned().unwrap_or_default())
    }
}
