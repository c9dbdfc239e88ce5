//! Postgres-backed RBAC store.
//!
//! Read-only: every method is a single parameterized `SELECT`.
//!
//! ## Tables
//!
//! | table | columns |
//! |-------|---------|
//! | `rbac` | `id uuid`, `name text` |
//! | `rbac_global` | `id uuid`, `rbac_id uuid`, `role text`, `signature bytea` |
//! | `rbac_global_users` | `rbac_global_id uuid`, `user_id uuid` |
//! | `rbac_global_groups` | `rbac_global_id uuid`, `group_id uuid` |
//! | `rbac_project` | `id uuid`, `rbac_id uuid`, `role text`, `all_projects bool`, `signature bytea` |
//! | `rbac_project_keys` | `rbac_project_id uuid`, `project_key text` |
//! | `rbac_project_users` | `rbac_project_id uuid`, `user_id uuid` |
//! | `rbac_project_groups` | `rbac_project_id uuid`, `group_id uuid` |
//!
//! Link tables carry a unique constraint on their two columns.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | `PoolClosed`, `PoolTimedOut`, `Io`, `Tls` | `Unavailable` |
//! | `ColumnDecode`, `ColumnNotFound`, `Decode`, `TypeNotFound` | `Decode` |
//! | anything else | `Query` |

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use rbacload_core::{GroupId, PolicyId, RuleId, UserId};
use rbacload_rbac::{
    GlobalRuleRecord, PolicyHeader, ProjectKey, ProjectRuleRecord, RbacStore, Role, RuleScope,
    StoreError,
};

/// Postgres-backed RBAC store. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresRbacStore {
    pool: Arc<PgPool>,
}

impl PostgresRbacStore {
    /// Create a new PostgresRbacStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn users_query(scope: RuleScope) -> &'static str {
    match scope {
        RuleScope::Global => {
            "SELECT user_id FROM rbac_global_users WHERE rbac_global_id = $1 ORDER BY user_id"
        }
        RuleScope::Project => {
            "SELECT user_id FROM rbac_project_users WHERE rbac_project_id = $1 ORDER BY user_id"
        }
    }
}

fn groups_query(scope: RuleScope) -> &'static str {
    match scope {
        RuleScope::Global => {
            "SELECT group_id FROM rbac_global_groups WHERE rbac_global_id = $1 ORDER BY group_id"
        }
        RuleScope::Project => {
            "SELECT group_id FROM rbac_project_groups WHERE rbac_project_id = $1 ORDER BY group_id"
        }
    }
}

#[async_trait]
impl RbacStore for PostgresRbacStore {
    #[instrument(skip(self), fields(policy_id = %id), err)]
    async fn policy_by_id(&self, id: PolicyId) -> Result<Option<PolicyHeader>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM rbac WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("policy_by_id", e))?;
        row.as_ref().map(decode_header).transpose()
    }

    #[instrument(skip(self), err)]
    async fn policy_by_name(&self, name: &str) -> Result<Option<PolicyHeader>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM rbac WHERE name = $1")
            .bind(name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("policy_by_name", e))?;
        row.as_ref().map(decode_header).transpose()
    }

    #[instrument(skip(self), fields(policy_id = %policy_id), err)]
    async fn global_rules(&self, policy_id: PolicyId) -> Result<Vec<GlobalRuleRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, rbac_id, role, signature
            FROM rbac_global
            WHERE rbac_id = $1
            ORDER BY id
            "#,
        )
        .bind(policy_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("global_rules", e))?;

        rows.iter()
            .map(|row| {
                Ok(GlobalRuleRecord {
                    id: RuleId::from_uuid(get(row, "id")?),
                    policy_id: PolicyId::from_uuid(get(row, "rbac_id")?),
                    role: Role::new(get::<String>(row, "role")?),
                    signature: get(row, "signature")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(policy_id = %policy_id), err)]
    async fn project_rules(&self, policy_id: PolicyId) -> Result<Vec<ProjectRuleRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, rbac_id, role, all_projects, signature
            FROM rbac_project
            WHERE rbac_id = $1
            ORDER BY id
            "#,
        )
        .bind(policy_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("project_rules", e))?;

        rows.iter()
            .map(|row| {
                Ok(ProjectRuleRecord {
                    id: RuleId::from_uuid(get(row, "id")?),
                    policy_id: PolicyId::from_uuid(get(row, "rbac_id")?),
                    role: Role::new(get::<String>(row, "role")?),
                    all: get(row, "all_projects")?,
                    signature: get(row, "signature")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(rule_id = %rule_id), err)]
    async fn rule_users(&self, scope: RuleScope, rule_id: RuleId) -> Result<Vec<UserId>, StoreError> {
        let rows = sqlx::query(users_query(scope))
            .bind(rule_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("rule_users", e))?;
        rows.iter()
            .map(|row| get::<Uuid>(row, "user_id").map(UserId::from_uuid))
            .collect()
    }

    #[instrument(skip(self), fields(rule_id = %rule_id), err)]
    async fn rule_groups(&self, scope: RuleScope, rule_id: RuleId) -> Result<Vec<GroupId>, StoreError> {
        let rows = sqlx::query(groups_query(scope))
            .bind(rule_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("rule_groups", e))?;
        rows.iter()
            .map(|row| get::<Uuid>(row, "group_id").map(GroupId::from_uuid))
            .collect()
    }

    #[instrument(skip(self), fields(rule_id = %rule_id), err)]
    async fn project_keys(&self, rule_id: RuleId) -> Result<Vec<ProjectKey>, StoreError> {
        let rows = sqlx::query(
            "SELECT project_key FROM rbac_project_keys WHERE rbac_project_id = $1 ORDER BY project_key",
        )
        .bind(rule_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("project_keys", e))?;
        rows.iter()
            .map(|row| get::<String>(row, "project_key").map(ProjectKey::new))
            .collect()
    }
}

fn decode_header(row: &PgRow) -> Result<PolicyHeader, StoreError> {
    Ok(PolicyHeader {
        id: PolicyId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
    })
}

fn get<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Decode(format!("column '{column}': {e}")))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::Database(db_err) => {
            StoreError::Query(format!("database error in {operation}: {}", db_err.message()))
        }
        err @ (sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. }) => {
            StoreError::Decode(format!("{operation}: {err}"))
        }
        _ => StoreError::Query(format!("sqlx error in {operation}: {err}")),
    }
}
