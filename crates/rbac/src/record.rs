//! Storage-shaped rule records.
//!
//! These are the rows as they come back from storage, signature included.
//! They only become domain rules ([`crate::model`]) once the signature has
//! been checked.

use serde::{Deserialize, Serialize};

use rbacload_core::{PolicyId, RuleId};

use crate::roles::Role;
use crate::signature::{Keyring, Signable, SignatureError};

/// Which rule table a record (or a principal link) belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Global,
    Project,
}

impl RuleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleScope::Global => "global",
            RuleScope::Project => "project",
        }
    }
}

impl core::fmt::Display for RuleScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy header row: identity and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyHeader {
    pub id: PolicyId,
    pub name: String,
}

impl PolicyHeader {
    pub fn new(id: PolicyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A signed rule row, whatever its scope.
pub trait RuleRecord: Signable {
    const SCOPE: RuleScope;

    fn rule_id(&self) -> RuleId;

    fn policy_id(&self) -> PolicyId;
}

/// Stored global-scope rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRuleRecord {
    pub id: RuleId,
    pub policy_id: PolicyId,
    pub role: Role,
    /// HMAC over the canonical content; not part of the signed content itself.
    pub signature: Vec<u8>,
}

/// Stored project-scope rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRuleRecord {
    pub id: RuleId,
    pub policy_id: PolicyId,
    pub role: Role,
    /// Applies to every project in scope rather than an explicit principal list.
    pub all: bool,
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct GlobalRuleContent<'a> {
    id: &'a RuleId,
    policy_id: &'a PolicyId,
    role: &'a Role,
}

#[derive(Serialize)]
struct ProjectRuleContent<'a> {
    id: &'a RuleId,
    policy_id: &'a PolicyId,
    role: &'a Role,
    all: bool,
}

impl GlobalRuleRecord {
    /// Build an unsigned record. Call [`GlobalRuleRecord::signed`] before storing it.
    pub fn new(id: RuleId, policy_id: PolicyId, role: Role) -> Self {
        Self {
            id,
            policy_id,
            role,
            signature: Vec::new(),
        }
    }

    /// Sign the record with the keyring's current key.
    pub fn signed(mut self, keyring: &Keyring) -> Result<Self, SignatureError> {
        self.signature = keyring.sign(&self)?;
        Ok(self)
    }
}

impl ProjectRuleRecord {
    /// Build an unsigned record. Call [`ProjectRuleRecord::signed`] before storing it.
    pub fn new(id: RuleId, policy_id: PolicyId, role: Role, all: bool) -> Self {
        Self {
            id,
            policy_id,
            role,
            all,
            signature: Vec::new(),
        }
    }

    pub fn signed(mut self, keyring: &Keyring) -> Result<Self, SignatureError> {
        self.signature = keyring.sign(&self)?;
        Ok(self)
    }
}

impl Signable for GlobalRuleRecord {
    const KIND: &'static str = "rbac_global";

    fn canonical_content(&self) -> Result<Vec<u8>, SignatureError> {
        serde_json::to_vec(&GlobalRuleContent {
            id: &self.id,
            policy_id: &self.policy_id,
            role: &self.role,
        })
        .map_err(|e| SignatureError::Serialization(e.to_string()))
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }
}

impl Signable for ProjectRuleRecord {
    const KIND: &'static str = "rbac_project";

    fn canonical_content(&self) -> Result<Vec<u8>, SignatureError> {
        serde_json::to_vec(&ProjectRuleContent {
            id: &self.id,
            policy_id: &self.policy_id,
            role: &self.role,
            all: self.all,
        })
        .map_err(|e| SignatureError::Serialization(e.to_string()))
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }
}

impl RuleRecord for GlobalRuleRecord {
    const SCOPE: RuleScope = RuleScope::Global;

    fn rule_id(&self) -> RuleId {
        self.id
    }

    fn policy_id(&self) -> PolicyId {
        self.policy_id
    }
}

impl RuleRecord for ProjectRuleRecord {
    const SCOPE: RuleScope = RuleScope::Project;

    fn rule_id(&self) -> RuleId {
        self.id
    }

    fn policy_id(&self) -> PolicyId {
        self.policy_id
    }
}
