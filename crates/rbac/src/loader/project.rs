use tracing::instrument;

use rbacload_core::PolicyId;

use crate::error::LoadError;
use crate::model::ProjectRule;
use crate::principals::PrincipalResolver;
use crate::record::RuleScope;
use crate::screen::screen_rows;
use crate::signature::SignatureVerifier;
use crate::store::RbacStore;

/// Loads the verified project-scope rules of a policy.
#[derive(Debug, Clone)]
pub struct ProjectRuleLoader<S, V> {
    store: S,
    verifier: V,
    principals: PrincipalResolver<S>,
}

impl<S, V> ProjectRuleLoader<S, V>
where
    S: RbacStore + Clone,
    V: SignatureVerifier,
{
    pub fn new(store: S, verifier: V) -> Self {
        Self {
            principals: PrincipalResolver::new(store.clone()),
            store,
            verifier,
        }
    }

    /// Same contract as [`crate::GlobalRuleLoader::load`], with project keys
    /// always resolved and principals resolved only for rules without `all`.
    #[instrument(skip(self), fields(policy_id = %policy_id), err)]
    pub async fn load(&self, policy_id: PolicyId) -> Result<Vec<ProjectRule>, LoadError> {
        let records = self.store.project_rules(policy_id).await?;
        let fetched = records.len();

        let screened = screen_rows(&self.verifier, records);
        screened.log_rejections();
        let rejected = screened.rejected.len();
        let kept = screened.into_result()?;

        let mut rules = Vec::with_capacity(kept.len());
        for record in kept {
            let projects = self.store.project_keys(record.id).await?;
            let (users, groups) = if record.all {
                (Vec::new(), Vec::new())
            } else {
                (
                    self.principals.resolve_users(RuleScope::Project, record.id).await?,
                    self.principals.resolve_groups(RuleScope::Project, record.id).await?,
                )
            };
            rules.push(ProjectRule {
                id: record.id,
                policy_id: record.policy_id,
                role: record.role,
                all: record.all,
                projects,
                users,
                groups,
            });
        }

        tracing::debug!(fetched, rejected, kept = rules.len(), "project rules loaded");
        Ok(rules)
    }
}
