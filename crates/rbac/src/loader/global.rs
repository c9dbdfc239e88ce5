use tracing::instrument;

use rbacload_core::PolicyId;

use crate::error::LoadError;
use crate::model::GlobalRule;
use crate::principals::PrincipalResolver;
use crate::record::RuleScope;
use crate::screen::screen_rows;
use crate::signature::SignatureVerifier;
use crate::store::RbacStore;

/// Loads the verified global-scope rules of a policy.
#[derive(Debug, Clone)]
pub struct GlobalRuleLoader<S, V> {
    store: S,
    verifier: V,
    principals: PrincipalResolver<S>,
}

impl<S, V> GlobalRuleLoader<S, V>
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

    /// Fetch every global rule row of the policy, drop rows whose signature
    /// does not match, and attach users and groups to the rest.
    ///
    /// No rows is an empty result, not an error. A verification computation
    /// failure or a storage failure aborts with no rules returned.
    #[instrument(skip(self), fields(policy_id = %policy_id), err)]
    pub async fn load(&self, policy_id: PolicyId) -> Result<Vec<GlobalRule>, LoadError> {
        let records = self.store.global_rules(policy_id).await?;
        let fetched = records.len();

        let screened = screen_rows(&self.verifier, records);
        screened.log_rejections();
        let rejected = screened.rejected.len();
        let kept = screened.into_result()?;

        let mut rules = Vec::with_capacity(kept.len());
        for record in kept {
            let users = self.principals.resolve_users(RuleScope::Global, record.id).await?;
            let groups = self.principals.resolve_groups(RuleScope::Global, record.id).await?;
            rules.push(GlobalRule {
                id: record.id,
                policy_id: record.policy_id,
                role: record.role,
                users,
                groups,
            });
        }

        tracing::debug!(fetched, rejected, kept = rules.len(), "global rules loaded");
        Ok(rules)
    }
}
