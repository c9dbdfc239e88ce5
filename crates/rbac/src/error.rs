//! Load error model.

use thiserror::Error;

use rbacload_core::RuleId;

use crate::record::RuleScope;
use crate::signature::SignatureError;
use crate::store::StoreError;

/// Why a policy load failed. Any of these means no policy is returned.
///
/// Tampered rows are not errors; they are dropped and logged while the load
/// carries on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("error when checking signature for {scope} rule {rule_id}: {source}")]
    Verification {
        scope: RuleScope,
        rule_id: RuleId,
        #[source]
        source: SignatureError,
    },

    #[error("policy not found: {0}")]
    PolicyNotFound(String),
}

impl LoadError {
    pub fn verification(scope: RuleScope, rule_id: RuleId, source: SignatureError) -> Self {
        Self::Verification {
            scope,
            rule_id,
            source,
        }
    }

    /// True for failures of the storage or verification machinery, as opposed
    /// to a lookup that simply found nothing.
    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, LoadError::PolicyNotFound(_))
    }
}
