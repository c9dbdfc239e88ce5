//! In-memory RBAC policy model.
//!
//! Everything here is a value snapshot produced by one load. Nothing points
//! back into storage, and two loads never share state.

use serde::{Deserialize, Serialize};

use rbacload_core::{Entity, GroupId, PolicyId, RuleId, UserId};

use crate::roles::Role;

/// Key of a project a project-scoped rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectKey(String);

impl ProjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    Group,
}

/// A user or group a rule applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    User(UserId),
    Group(GroupId),
}

impl Principal {
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::User(_) => PrincipalKind::User,
            Principal::Group(_) => PrincipalKind::Group,
        }
    }
}

/// A verified permission grant effective system-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRule {
    pub id: RuleId,
    pub policy_id: PolicyId,
    pub role: Role,
    pub users: Vec<UserId>,
    pub groups: Vec<GroupId>,
}

impl GlobalRule {
    /// Users first, then groups, each in storage order.
    pub fn principals(&self) -> impl Iterator<Item = Principal> + '_ {
        self.users
            .iter()
            .copied()
            .map(Principal::User)
            .chain(self.groups.iter().copied().map(Principal::Group))
    }
}

/// A verified permission grant scoped to projects.
///
/// When `all` is set the principal lists are never loaded and stay empty:
/// the rule inherits each project's own access, see [`ProjectRule::principal_scope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRule {
    pub id: RuleId,
    pub policy_id: PolicyId,
    pub role: Role,
    pub all: bool,
    pub projects: Vec<ProjectKey>,
    pub users: Vec<UserId>,
    pub groups: Vec<GroupId>,
}

/// Who a project rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalScope<'a> {
    /// `all` rule: whoever already has access to the projects. Not "nobody".
    InheritFromProjects,
    Explicit {
        users: &'a [UserId],
        groups: &'a [GroupId],
    },
}

impl ProjectRule {
    pub fn applies_to_all(&self) -> bool {
        self.all
    }

    pub fn principal_scope(&self) -> PrincipalScope<'_> {
        if self.all {
            PrincipalScope::InheritFromProjects
        } else {
            PrincipalScope::Explicit {
                users: &self.users,
                groups: &self.groups,
            }
        }
    }

    pub fn covers_project(&self, key: &ProjectKey) -> bool {
        self.projects.contains(key)
    }
}

/// A fully loaded RBAC policy. Only rules whose signature verified are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub name: String,
    pub globals: Vec<GlobalRule>,
    pub projects: Vec<ProjectRule>,
}

impl Policy {
    pub fn global_rule(&self, id: RuleId) -> Option<&GlobalRule> {
        self.globals.iter().find(|r| r.id == id)
    }

    pub fn project_rule(&self, id: RuleId) -> Option<&ProjectRule> {
        self.projects.iter().find(|r| r.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty() && self.projects.is_empty()
    }
}

impl Entity for Policy {
    type Id = PolicyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Entity for GlobalRule {
    type Id = RuleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Entity for ProjectRule {
    type Id = RuleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
