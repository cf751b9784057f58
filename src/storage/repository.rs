use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    Category, FeatureFlag, NewTransaction, Role, TransactionId, TransactionKind, TransactionRecord,
    User, UserId,
};

use super::MIGRATION_001_INITIAL;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Optional constraints on a transaction query. Dates are inclusive.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    /// Match any of these category keys, ignoring case. Empty means any
    /// category.
    pub category_keys: Vec<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Repository for persisting and querying users, categories, transactions
/// and feature flags.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // User operations
    // ========================

    pub async fn save_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, email, role, created_at) VALUES (?, ?, ?, ?)")
            .bind(user.id.to_string())
            .bind(&user.email)
            .bind(user.role.as_str())
            .bind(user.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to save user")?;
        Ok(())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, role, created_at FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by email")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, email, role, created_at FROM users ORDER BY email")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    pub async fn count_users(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        Ok(row.get("count"))
    }

    pub async fn update_user_role(&self, id: UserId, role: Role) -> Result<()> {
        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update user role")?;
        Ok(())
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let id_str: String = row.get("id");
        let role_str: String = row.get("role");
        let created_at_str: String = row.get("created_at");

        Ok(User {
            id: Uuid::parse_str(&id_str).context("Invalid user ID")?,
            email: row.get("email"),
            role: Role::parse(&role_str)?,
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    // ========================
    // Category operations
    // ========================

    pub async fn save_category(&self, category: &Category) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, user_id, name, color, kind)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(category.id.to_string())
        .bind(category.user_id.to_string())
        .bind(&category.name)
        .bind(&category.color)
        .bind(category.kind.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to save category")?;
        Ok(())
    }

    /// Find a user's category by name, ignoring case.
    pub async fn get_category_by_name(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<Option<Category>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, color, kind
            FROM categories
            WHERE user_id = ? AND name = ? COLLATE NOCASE
            "#,
        )
        .bind(user_id.to_string())
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch category by name")?;

        row.as_ref().map(Self::row_to_category).transpose()
    }

    pub async fn list_categories(&self, user_id: UserId) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, color, kind
            FROM categories
            WHERE user_id = ?
            ORDER BY name COLLATE NOCASE
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list categories")?;

        rows.iter().map(Self::row_to_category).collect()
    }

    fn row_to_category(row: &sqlx::sqlite::SqliteRow) -> Result<Category> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let kind_str: String = row.get("kind");

        Ok(Category {
            id: Uuid::parse_str(&id_str).context("Invalid category ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            name: row.get("name"),
            color: row.get("color"),
            kind: TransactionKind::parse(&kind_str)?,
        })
    }

    // ========================
    // Transaction operations
    // ========================

    pub async fn save_transaction(&self, tx: &TransactionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, amount, kind, category_id, date, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tx.id().to_string())
        .bind(tx.user_id().to_string())
        .bind(tx.amount())
        .bind(tx.kind().as_str())
        .bind(tx.category_id())
        .bind(tx.date().format(DATE_FORMAT).to_string())
        .bind(tx.description())
        .bind(tx.created_at().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save transaction")?;
        Ok(())
    }

    /// Save several transactions atomically.
    pub async fn save_transactions(&self, records: &[TransactionRecord]) -> Result<()> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        for tx in records {
            sqlx::query(
                r#"
                INSERT INTO transactions (id, user_id, amount, kind, category_id, date, description, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(tx.id().to_string())
            .bind(tx.user_id().to_string())
            .bind(tx.amount())
            .bind(tx.kind().as_str())
            .bind(tx.category_id())
            .bind(tx.date().format(DATE_FORMAT).to_string())
            .bind(tx.description())
            .bind(tx.created_at().to_rfc3339())
            .execute(&mut *db_tx)
            .await
            .context("Failed to save transaction")?;
        }

        db_tx.commit().await.context("Failed to commit transactions")?;
        Ok(())
    }

    /// Get one of a user's transactions by ID.
    pub async fn get_transaction(
        &self,
        user_id: UserId,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, amount, kind, category_id, date, description, created_at
            FROM transactions
            WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    /// Overwrite the stored row with its replacement record (same id).
    pub async fn replace_transaction(&self, tx: &TransactionRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE transactions
            SET amount = ?, kind = ?, category_id = ?, date = ?, description = ?, created_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(tx.amount())
        .bind(tx.kind().as_str())
        .bind(tx.category_id())
        .bind(tx.date().format(DATE_FORMAT).to_string())
        .bind(tx.description())
        .bind(tx.created_at().to_rfc3339())
        .bind(tx.id().to_string())
        .bind(tx.user_id().to_string())
        .execute(&self.pool)
        .await
        .context("Failed to replace transaction")?;
        Ok(())
    }

    /// Delete a transaction. Returns false when nothing matched.
    pub async fn delete_transaction(&self, user_id: UserId, id: TransactionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE user_id = ? AND id = ?")
            .bind(user_id.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete transaction")?;
        Ok(result.rows_affected() > 0)
    }

    /// List a user's transactions with optional filters, oldest first.
    pub async fn list_transactions(
        &self,
        user_id: UserId,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>> {
        // Build query dynamically based on filters
        let mut query = String::from(
            "SELECT id, user_id, amount, kind, category_id, date, description, created_at FROM transactions WHERE user_id = ?",
        );

        let from_date_str = filter.from_date.map(|d| d.format(DATE_FORMAT).to_string());
        let to_date_str = filter.to_date.map(|d| d.format(DATE_FORMAT).to_string());

        if filter.kind.is_some() {
            query.push_str(" AND kind = ?");
        }
        if !filter.category_keys.is_empty() {
            let placeholders = vec!["?"; filter.category_keys.len()].join(", ");
            query.push_str(&format!(
                " AND category_id COLLATE NOCASE IN ({})",
                placeholders
            ));
        }
        if from_date_str.is_some() {
            query.push_str(" AND date >= ?");
        }
        if to_date_str.is_some() {
            query.push_str(" AND date <= ?");
        }

        query.push_str(" ORDER BY date, created_at");

        if let Some(lim) = filter.limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        debug!(%query, "listing transactions");

        let mut sql_query = sqlx::query(&query).bind(user_id.to_string());

        if let Some(kind) = filter.kind {
            sql_query = sql_query.bind(kind.as_str());
        }
        for key in &filter.category_keys {
            sql_query = sql_query.bind(key);
        }
        if let Some(ref fd_str) = from_date_str {
            sql_query = sql_query.bind(fd_str);
        }
        if let Some(ref td_str) = to_date_str {
            sql_query = sql_query.bind(td_str);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list filtered transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<TransactionRecord> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let kind_str: String = row.get("kind");
        let date_str: String = row.get("date");
        let created_at_str: String = row.get("created_at");

        let input = NewTransaction {
            amount: row.get("amount"),
            kind: TransactionKind::parse(&kind_str)?,
            category_id: row.get("category_id"),
            date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                .context("Invalid transaction date")?,
            description: row.get("description"),
        };

        Ok(TransactionRecord::restore(
            Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            input,
            parse_timestamp(&created_at_str)?,
        )?)
    }

    // ========================
    // Ledger metadata
    // ========================

    /// Store `value` under `key` unless the key is already set.
    pub async fn insert_meta_if_absent(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO ledger_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .context("Failed to save ledger metadata")?;
        Ok(())
    }

    pub async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM ledger_meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch ledger metadata")?;
        Ok(row.map(|r| r.get("value")))
    }

    // ========================
    // Feature flag operations
    // ========================

    /// Insert or update a feature flag.
    pub async fn upsert_feature_flag(&self, flag: &FeatureFlag) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feature_flags (name, enabled, description, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                enabled = excluded.enabled,
                description = COALESCE(excluded.description, feature_flags.description),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&flag.name)
        .bind(flag.enabled)
        .bind(&flag.description)
        .bind(flag.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save feature flag")?;
        Ok(())
    }

    pub async fn get_feature_flag(&self, name: &str) -> Result<Option<FeatureFlag>> {
        let row = sqlx::query(
            "SELECT name, enabled, description, updated_at FROM feature_flags WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch feature flag")?;

        row.as_ref().map(Self::row_to_flag).transpose()
    }

    pub async fn list_feature_flags(&self) -> Result<Vec<FeatureFlag>> {
        let rows = sqlx::query(
            "SELECT name, enabled, description, updated_at FROM feature_flags ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list feature flags")?;

        rows.iter().map(Self::row_to_flag).collect()
    }

    fn row_to_flag(row: &sqlx::sqlite::SqliteRow) -> Result<FeatureFlag> {
        let updated_at_str: String = row.get("updated_at");
        Ok(FeatureFlag {
            name: row.get("name"),
            enabled: row.get::<i32, _>("enabled") != 0,
            description: row.get("description"),
            updated_at: parse_timestamp(&updated_at_str)?,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .context("Invalid timestamp")?
        .with_timezone(&Utc))
}
