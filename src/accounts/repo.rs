use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::accounts::model::Account;
use crate::error::AppError;

/// Abstract persistence boundary for accounts.
///
/// The backing store must enforce email uniqueness on its own (for
/// Postgres, a unique index on `LOWER(email)`); the service's existence
/// check before insert is only a fast path. `search_by_email` returns the
/// full unordered matching set, paging happens in the service.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;
    async fn insert(&self, account: Account) -> Result<Account, AppError>;
    async fn update(&self, account: Account) -> Result<Account, AppError>;
    async fn delete(&self, id: Uuid) -> Result<u64, AppError>;
    async fn search_by_email(&self, keyword: &str) -> Result<Vec<Account>, AppError>;
}

#[derive(Clone)]
pub struct PgAccountRepository {
    db: PgPool,
}

impl PgAccountRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_insert_err(e: sqlx::Error) -> AppError {
    // 23505 = unique_violation; the index on LOWER(email) is the actual
    // guard against two concurrent registrations racing past the lookup.
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some("23505") {
            return AppError::conflict("email is existed");
        }
    }
    AppError::Persistence(e)
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, password_hash, name, avatar_url, avatar_ref, joined_at
            FROM accounts
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, password_hash, name, avatar_url, avatar_ref, joined_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn insert(&self, account: Account) -> Result<Account, AppError> {
        let inserted = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, email, password_hash, name, avatar_url, avatar_ref, joined_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, email, password_hash, name, avatar_url, avatar_ref, joined_at
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.name)
        .bind(&account.avatar_url)
        .bind(&account.avatar_ref)
        .bind(account.joined_at)
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_err)?;
        Ok(inserted)
    }

    async fn update(&self, account: Account) -> Result<Account, AppError> {
        // Only profile fields are writable; identity columns and the
        // credential hash stay out of the SET list.
        let updated = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET name = $2, avatar_url = $3, avatar_ref = $4
            WHERE id = $1
            RETURNING id, email, password_hash, name, avatar_url, avatar_ref, joined_at
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.avatar_url)
        .bind(&account.avatar_ref)
        .fetch_one(&self.db)
        .await?;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn search_by_email(&self, keyword: &str) -> Result<Vec<Account>, AppError> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, password_hash, name, avatar_url, avatar_ref, joined_at
            FROM accounts
            WHERE email ILIKE '%' || $1 || '%'
            "#,
        )
        .bind(keyword)
        .fetch_all(&self.db)
        .await?;
        Ok(accounts)
    }
}
