use tracing::instrument;

use rbacload_core::PolicyId;

use super::{GlobalRuleLoader, LoadStrategy, ProjectRuleLoader};
use crate::error::LoadError;
use crate::model::Policy;
use crate::record::PolicyHeader;
use crate::signature::SignatureVerifier;
use crate::store::RbacStore;

/// Builds a verified [`Policy`] from storage.
///
/// Holds nothing but its loaders, so concurrent loads (of the same policy or
/// not) are independent and each returns its own snapshot. The policy value is
/// only assembled once every requested scope has loaded; an error, or dropping
/// the future midway, leaves nothing behind.
#[derive(Debug, Clone)]
pub struct PolicyLoader<S, V> {
    store: S,
    global: GlobalRuleLoader<S, V>,
    project: ProjectRuleLoader<S, V>,
}

impl<S, V> PolicyLoader<S, V>
where
    S: RbacStore + Clone,
    V: SignatureVerifier + Clone,
{
    pub fn new(store: S, verifier: V) -> Self {
        Self {
            global: GlobalRuleLoader::new(store.clone(), verifier.clone()),
            project: ProjectRuleLoader::new(store.clone(), verifier),
            store,
        }
    }

    pub fn global_rules(&self) -> &GlobalRuleLoader<S, V> {
        &self.global
    }

    pub fn project_rules(&self) -> &ProjectRuleLoader<S, V> {
        &self.project
    }

    #[instrument(skip(self), fields(policy_id = %policy_id, strategy = %strategy), err)]
    pub async fn load(&self, policy_id: PolicyId, strategy: LoadStrategy) -> Result<Policy, LoadError> {
        let header = self
            .store
            .policy_by_id(policy_id)
            .await?
            .ok_or_else(|| LoadError::PolicyNotFound(policy_id.to_string()))?;
        self.populate(header, strategy).await
    }

    #[instrument(skip(self), fields(strategy = %strategy), err)]
    pub async fn load_by_name(&self, name: &str, strategy: LoadStrategy) -> Result<Policy, LoadError> {
        let header = self
            .store
            .policy_by_name(name)
            .await?
            .ok_or_else(|| LoadError::PolicyNotFound(name.to_string()))?;
        self.populate(header, strategy).await
    }

    async fn populate(&self, header: PolicyHeader, strategy: LoadStrategy) -> Result<Policy, LoadError> {
        let globals = if strategy.loads_global() {
            self.global.load(header.id).await?
        } else {
            Vec::new()
        };
        let projects = if strategy.loads_project() {
            self.project.load(header.id).await?
        } else {
            Vec::new()
        };

        Ok(Policy {
            id: header.id,
            name: header.name,
            globals,
            projects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbacload_core::RuleId;

    use crate::loader::test_support::{keyring, store, BrokenOn};
    use crate::record::{GlobalRuleRecord, ProjectRuleRecord, RuleScope};
    use crate::roles::Role;
    use crate::store::{StoreQuery, StoreError};

    #[tokio::test]
    async fn unknown_policy_is_not_found_and_issues_no_rule_queries() {
        let store = store();
        let loader = PolicyLoader::new(store.clone(), keyring());
        let id = PolicyId::new();

        let err = loader.load(id, LoadStrategy::Default).await.unwrap_err();
        assert_eq!(err, LoadError::PolicyNotFound(id.to_string()));
        assert!(!err.is_infrastructure());
        assert_eq!(store.queries(), vec![StoreQuery::PolicyById(id)]);
    }

    #[tokio::test]
    async fn load_by_name_resolves_header() {
        let keyring = keyring();
        let store = store();
        let id = PolicyId::new();
        store.insert_policy(PolicyHeader::new(id, "admins"));
        store.insert_global_rule(
            GlobalRuleRecord::new(RuleId::new(), id, Role::new("manage-permission"))
                .signed(&keyring)
                .unwrap(),
        );

        let policy = PolicyLoader::new(store, keyring)
            .load_by_name("admins", LoadStrategy::Default)
            .await
            .unwrap();
        assert_eq!(policy.id, id);
        assert_eq!(policy.name, "admins");
        assert_eq!(policy.globals.len(), 1);
    }

    #[tokio::test]
    async fn project_failure_discards_loaded_globals() {
        let keyring = keyring();
        let store = store();
        let id = PolicyId::new();
        store.insert_policy(PolicyHeader::new(id, "p"));
        store.insert_global_rule(
            GlobalRuleRecord::new(RuleId::new(), id, Role::new("read"))
                .signed(&keyring)
                .unwrap(),
        );
        let broken = ProjectRuleRecord::new(RuleId::new(), id, Role::new("read"), false)
            .signed(&keyring)
            .unwrap();
        store.insert_project_rule(broken.clone());

        let loader = PolicyLoader::new(
            store,
            BrokenOn {
                rule_id: broken.id,
                keyring,
            },
        );
        let err = loader.load(id, LoadStrategy::Default).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Verification {
                scope: RuleScope::Project,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn storage_failure_on_global_fetch_stops_before_project_scope() {
        let store = store();
        let id = PolicyId::new();
        store.insert_policy(PolicyHeader::new(id, "p"));
        store.fail_when(|q| matches!(q, StoreQuery::GlobalRules(_)));

        let err = PolicyLoader::new(store.clone(), keyring())
            .load(id, LoadStrategy::Default)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Store(StoreError::Unavailable(_))));
        assert!(store.queries().iter().all(|q| q.scope() != Some(RuleScope::Project)));
    }
}
