//! RLS table flags and policies, persisted in `_rls_tables` and
//! `_rls_policies`.

use sqlx::{Row, SqlitePool};

use crate::error::CatalogError;

/// The verb a policy applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolicyCommand {
    Select,
    Insert,
    Update,
    Delete,
}

impl PolicyCommand {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SELECT" => Some(PolicyCommand::Select),
            "INSERT" => Some(PolicyCommand::Insert),
            "UPDATE" => Some(PolicyCommand::Update),
            "DELETE" => Some(PolicyCommand::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyCommand::Select => "SELECT",
            PolicyCommand::Insert => "INSERT",
            PolicyCommand::Update => "UPDATE",
            PolicyCommand::Delete => "DELETE",
        }
    }
}

/// One row-level security policy.
///
/// Which expressions a command may carry:
/// SELECT/DELETE only `using_expr`, INSERT only `check_expr`, UPDATE both.
/// Multiple policies for the same `(table, command)` OR-combine.
#[derive(Clone, Debug)]
pub struct Policy {
    pub table: String,
    pub name: String,
    pub command: PolicyCommand,
    pub using_expr: Option<String>,
    pub check_expr: Option<String>,
}

impl Policy {
    fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |msg: &str| Err(CatalogError::InvalidPolicy(msg.into()));
        match self.command {
            PolicyCommand::Select | PolicyCommand::Delete => {
                if self.using_expr.is_none() {
                    return invalid("SELECT/DELETE policies require a USING expression");
                }
                if self.check_expr.is_some() {
                    return invalid("SELECT/DELETE policies cannot carry WITH CHECK");
                }
            }
            PolicyCommand::Insert => {
                if self.check_expr.is_none() {
                    return invalid("INSERT policies require a WITH CHECK expression");
                }
                if self.using_expr.is_some() {
                    return invalid("INSERT policies cannot carry USING");
                }
            }
            PolicyCommand::Update => {
                if self.using_expr.is_none() && self.check_expr.is_none() {
                    return invalid("UPDATE policies require USING and/or WITH CHECK");
                }
            }
        }
        Ok(())
    }
}

/// Persistent policy catalog.
#[derive(Clone)]
pub struct PolicyCatalog {
    pool: SqlitePool,
}

impl PolicyCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Toggle row-level security for a table. Disabled by default.
    pub async fn set_rls(&self, table: &str, enabled: bool) -> Result<(), CatalogError> {
        sqlx::query("INSERT OR REPLACE INTO _rls_tables (table_name, enabled) VALUES (?, ?)")
            .bind(table)
            .bind(enabled)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn rls_enabled(&self, table: &str) -> Result<bool, CatalogError> {
        let row = sqlx::query("SELECT enabled FROM _rls_tables WHERE table_name = ?")
            .bind(table)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|r| r.try_get::<bool, _>("enabled"))
            .transpose()?
            .unwrap_or(false))
    }

    pub async fn add_policy(&self, policy: Policy) -> Result<(), CatalogError> {
        policy.validate()?;
        sqlx::query(
            "INSERT OR REPLACE INTO _rls_policies \
             (table_name, policy_name, command, using_expr, check_expr) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&policy.table)
        .bind(&policy.name)
        .bind(policy.command.as_str())
        .bind(&policy.using_expr)
        .bind(&policy.check_expr)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Policies for `(table, command)` in insertion order.
    pub async fn list_policies(
        &self,
        table: &str,
        command: PolicyCommand,
    ) -> Result<Vec<Policy>, CatalogError> {
        let rows = sqlx::query(
            "SELECT table_name, policy_name, command, using_expr, check_expr \
             FROM _rls_policies WHERE table_name = ? AND command = ? ORDER BY rowid",
        )
        .bind(table)
        .bind(command.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(policy_from_row).collect()
    }

    pub async fn delete_table_policies(&self, table: &str) -> Result<(), CatalogError> {
        sqlx::query("DELETE FROM _rls_policies WHERE table_name = ?")
            .bind(table)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM _rls_tables WHERE table_name = ?")
            .bind(table)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub(crate) fn policy_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Policy, CatalogError> {
    let command_str: String = row.try_get("command")?;
    let command = PolicyCommand::parse(&command_str).ok_or_else(|| {
        CatalogError::InvalidPolicy(format!("unknown policy command: {command_str}"))
    })?;
    Ok(Policy {
        table: row.try_get("table_name")?,
        name: row.try_get("policy_name")?,
        command,
        using_expr: row.try_get("using_expr")?,
        check_expr: row.try_get("check_expr")?,
    })
}
