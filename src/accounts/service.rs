use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::model::{Account, AccountView, SessionClaims};
use crate::accounts::paging::{paginate, Page};
use crate::accounts::password::{hash_password, verify_password};
use crate::accounts::repo::AccountRepository;
use crate::accounts::token::TokenIssuer;
use crate::error::AppError;

/// Input for registration.
#[derive(Debug)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Partial profile changes; `None` means "leave untouched".
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub avatar_ref: Option<String>,
}

/// Business rules for accounts: registration, login, profile mutation,
/// removal and paged search. Persistence and token signing are injected
/// at construction; the service holds no other state.
#[derive(Clone)]
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
    issuer: Arc<dyn TokenIssuer>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AccountService {
    pub fn new(repo: Arc<dyn AccountRepository>, issuer: Arc<dyn TokenIssuer>) -> Self {
        Self { repo, issuer }
    }

    /// Creates an account and returns its view carrying a fresh token.
    ///
    /// The existence check here is a fast path; the repository's unique
    /// index on the email is what actually decides a registration race.
    pub async fn register(&self, new: NewAccount) -> Result<AccountView, AppError> {
        let email = normalize_email(&new.email);

        if self.repo.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "registration rejected, email taken");
            return Err(AppError::conflict("email is existed"));
        }

        let account = Account {
            id: Uuid::new_v4(),
            email,
            password_hash: hash_password(&new.password)?,
            name: new.name,
            avatar_url: None,
            avatar_ref: None,
            joined_at: OffsetDateTime::now_utc(),
        };
        let account = self.repo.insert(account).await?;

        info!(account_id = %account.id, email = %account.email, "account registered");
        self.authenticated_view(account)
    }

    /// Verifies credentials and returns the view with a fresh token.
    /// Mutates nothing.
    ///
    /// The "email is incorrect" / "password is incorrect" messages stay
    /// distinguishable on purpose; unifying them to resist account
    /// enumeration is a hardening option documented in DESIGN.md.
    pub async fn login(&self, email: &str, password: &str) -> Result<AccountView, AppError> {
        let email = normalize_email(email);

        let account = self
            .repo
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::not_found("email is incorrect"))?;

        if !verify_password(password, &account.password_hash)? {
            warn!(account_id = %account.id, "login with invalid password");
            return Err(AppError::not_found("password is incorrect"));
        }

        info!(account_id = %account.id, "account logged in");
        self.authenticated_view(account)
    }

    /// Looks up one account; no token attached.
    pub async fn profile(&self, id: Uuid) -> Result<AccountView, AppError> {
        let account = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("account is not found"))?;
        Ok(AccountView::from_account(account))
    }

    /// Applies a partial profile update and re-issues the token.
    ///
    /// Only supplied fields change; identity fields (`id`, `email`,
    /// `joined_at`) and the credential hash never pass through this path.
    /// The merged record is built as a new value before the write, the
    /// fetched record is never mutated in place.
    pub async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<AccountView, AppError> {
        let current = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("account is not found"))?;

        let merged = Account {
            id: current.id,
            email: current.email,
            password_hash: current.password_hash,
            name: changes.name.or(current.name),
            avatar_url: changes.avatar_url.or(current.avatar_url),
            avatar_ref: changes.avatar_ref.or(current.avatar_ref),
            joined_at: current.joined_at,
        };
        let updated = self.repo.update(merged).await?;

        info!(account_id = %updated.id, "profile updated");
        self.authenticated_view(updated)
    }

    /// Sets exactly the two avatar fields. Returns `Ok(None)` for an
    /// unknown id instead of failing: the caller is a trusted internal
    /// one that has already resolved the account. No token attached.
    pub async fn set_avatar(
        &self,
        id: Uuid,
        avatar_url: String,
        avatar_ref: String,
    ) -> Result<Option<AccountView>, AppError> {
        let Some(current) = self.repo.find_by_id(id).await? else {
            return Ok(None);
        };

        let merged = Account {
            avatar_url: Some(avatar_url),
            avatar_ref: Some(avatar_ref),
            ..current
        };
        let updated = self.repo.update(merged).await?;

        info!(account_id = %updated.id, "avatar updated");
        Ok(Some(AccountView::from_account(updated)))
    }

    /// Deletes one account and reports the count of removed records.
    /// Not idempotent: removing an already-removed id fails.
    pub async fn remove(&self, id: Uuid) -> Result<u64, AppError> {
        if self.repo.find_by_id(id).await?.is_none() {
            return Err(AppError::not_found("account is not found"));
        }
        let deleted = self.repo.delete(id).await?;
        info!(account_id = %id, deleted, "account removed");
        Ok(deleted)
    }

    /// Case-insensitive substring search on email (empty keyword matches
    /// all), paged in-process. Listed items never carry a token.
    pub async fn list(
        &self,
        keyword: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<AccountView>, AppError> {
        if page < 1 || page_size < 1 {
            return Err(AppError::validation("page and page_size must be at least 1"));
        }
        let matches = self.repo.search_by_email(keyword).await?;
        let views = matches.into_iter().map(AccountView::from_account).collect();
        Ok(paginate(views, page, page_size))
    }

    fn authenticated_view(&self, account: Account) -> Result<AccountView, AppError> {
        let token = self.issuer.issue(&SessionClaims::for_account(&account))?;
        Ok(AccountView::from_account(account).with_token(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::token::JwtIssuer;
    use crate::config::JwtConfig;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory stand-in for the Postgres repository. Enforces the same
    /// email uniqueness on insert that the unique index would.
    #[derive(Default)]
    struct MemoryRepo {
        accounts: Mutex<HashMap<Uuid, Account>>,
    }

    #[async_trait]
    impl AccountRepository for MemoryRepo {
        async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
            let accounts = self.accounts.lock().unwrap();
            Ok(accounts
                .values()
                .find(|a| a.email.eq_ignore_ascii_case(email))
                .cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
            Ok(self.accounts.lock().unwrap().get(&id).cloned())
        }

        async fn insert(&self, account: Account) -> Result<Account, AppError> {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts
                .values()
                .any(|a| a.email.eq_ignore_ascii_case(&account.email))
            {
                return Err(AppError::conflict("email is existed"));
            }
            accounts.insert(account.id, account.clone());
            Ok(account)
        }

        async fn update(&self, account: Account) -> Result<Account, AppError> {
            let mut accounts = self.accounts.lock().unwrap();
            accounts.insert(account.id, account.clone());
            Ok(account)
        }

        async fn delete(&self, id: Uuid) -> Result<u64, AppError> {
            let mut accounts = self.accounts.lock().unwrap();
            Ok(accounts.remove(&id).map_or(0, |_| 1))
        }

        async fn search_by_email(&self, keyword: &str) -> Result<Vec<Account>, AppError> {
            let keyword = keyword.to_lowercase();
            let accounts = self.accounts.lock().unwrap();
            Ok(accounts
                .values()
                .filter(|a| a.email.to_lowercase().contains(&keyword))
                .cloned()
                .collect())
        }
    }

    fn make_service() -> (AccountService, Arc<MemoryRepo>) {
        let repo = Arc::new(MemoryRepo::default());
        let issuer = Arc::new(JwtIssuer::from_config(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        }));
        (AccountService::new(repo.clone(), issuer), repo)
    }

    fn new_account(email: &str, password: &str) -> NewAccount {
        NewAccount {
            email: email.into(),
            password: password.into(),
            name: None,
        }
    }

    #[tokio::test]
    async fn register_returns_token_and_persists_hash() {
        let (service, repo) = make_service();
        let view = service
            .register(new_account("a@x.com", "p1"))
            .await
            .expect("register");
        assert!(view.access_token.is_some());
        assert_eq!(view.email, "a@x.com");

        let stored = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "p1");
        assert!(verify_password("p1", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict_case_insensitive() {
        let (service, _) = make_service();
        service
            .register(new_account("A@X.com", "p1"))
            .await
            .expect("first register");
        let err = service
            .register(new_account("a@x.com", "p2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn login_verifies_credentials() {
        let (service, _) = make_service();
        service
            .register(new_account("a@x.com", "p1"))
            .await
            .expect("register");

        let err = service.login("missing@x.com", "p1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "email is incorrect"));

        let err = service.login("a@x.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "password is incorrect"));

        let view = service.login("a@x.com", "p1").await.expect("login");
        assert!(view.access_token.is_some());
    }

    #[tokio::test]
    async fn login_mutates_nothing() {
        let (service, repo) = make_service();
        service
            .register(new_account("a@x.com", "p1"))
            .await
            .expect("register");
        let before = repo.find_by_email("a@x.com").await.unwrap().unwrap();

        service.login("a@x.com", "p1").await.expect("login");

        let after = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(before.password_hash, after.password_hash);
        assert_eq!(before.joined_at, after.joined_at);
    }

    #[tokio::test]
    async fn update_profile_merges_partially_and_preserves_identity() {
        let (service, repo) = make_service();
        let registered = service
            .register(NewAccount {
                email: "a@x.com".into(),
                password: "p1".into(),
                name: Some("Alice".into()),
            })
            .await
            .expect("register");

        let updated = service
            .update_profile(
                registered.id,
                ProfileChanges {
                    avatar_url: Some("https://cdn/x.png".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("update");

        // untouched fields survive the merge
        assert_eq!(updated.name.as_deref(), Some("Alice"));
        assert_eq!(updated.avatar_url.as_deref(), Some("https://cdn/x.png"));
        assert!(updated.access_token.is_some());

        // identity fields never change
        let stored = repo.find_by_id(registered.id).await.unwrap().unwrap();
        assert_eq!(stored.id, registered.id);
        assert_eq!(stored.email, "a@x.com");
        assert_eq!(stored.joined_at, registered.joined_at);
    }

    #[tokio::test]
    async fn update_profile_unknown_id_is_not_found() {
        let (service, _) = make_service();
        let err = service
            .update_profile(Uuid::new_v4(), ProfileChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn set_avatar_carries_no_token() {
        let (service, _) = make_service();
        let registered = service
            .register(new_account("a@x.com", "p1"))
            .await
            .expect("register");

        let view = service
            .set_avatar(registered.id, "https://cdn/a.png".into(), "ref-1".into())
            .await
            .expect("set_avatar")
            .expect("account present");
        assert_eq!(view.avatar_url.as_deref(), Some("https://cdn/a.png"));
        assert_eq!(view.avatar_ref.as_deref(), Some("ref-1"));
        assert!(view.access_token.is_none());
    }

    #[tokio::test]
    async fn set_avatar_unknown_id_is_none_not_error() {
        let (service, _) = make_service();
        let result = service
            .set_avatar(Uuid::new_v4(), "u".into(), "r".into())
            .await
            .expect("no error for unknown id");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn remove_is_not_idempotent() {
        let (service, _) = make_service();
        let registered = service
            .register(new_account("a@x.com", "p1"))
            .await
            .expect("register");

        let deleted = service.remove(registered.id).await.expect("first remove");
        assert_eq!(deleted, 1);

        let err = service.remove(registered.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_pages_search_results() {
        let (service, _) = make_service();
        for i in 0..25 {
            service
                .register(new_account(&format!("user{i:02}@x.com"), "p"))
                .await
                .expect("register");
        }

        let page = service.list("", 1, 10).await.expect("page 1");
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.total_items, 25);
        assert_eq!(page.total_pages, 3);

        let page = service.list("", 3, 10).await.expect("page 3");
        assert_eq!(page.items.len(), 5);

        let page = service.list("", 4, 10).await.expect("page 4");
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 3);

        // keyword narrows by case-insensitive substring
        let page = service.list("USER1", 1, 20).await.expect("keyword page");
        assert_eq!(page.total_items, 10);

        // listed items never expose a token
        assert!(page.items.iter().all(|v| v.access_token.is_none()));
    }

    #[tokio::test]
    async fn list_rejects_zero_paging_params() {
        let (service, _) = make_service();
        let err = service.list("", 0, 10).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = service.list("", 1, 0).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn register_login_scenario() {
        let (service, _) = make_service();

        let view = service
            .register(new_account("a@x.com", "p1"))
            .await
            .expect("register");
        assert!(view.access_token.is_some());

        let err = service
            .register(new_account("a@x.com", "p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = service.login("a@x.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let logged_in = service.login("a@x.com", "p1").await.expect("login");
        assert!(logged_in.access_token.is_some());
        assert_eq!(logged_in.id, view.id);
        assert_eq!(logged_in.email, view.email);
        assert_eq!(logged_in.joined_at, view.joined_at);
    }
}
