use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account record as persisted.
///
/// `email` is stored normalized to lowercase; a unique index on
/// `LOWER(email)` backs the one-account-per-email invariant. `id` and
/// `joined_at` are assigned once at creation and never change.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string, not exposed in JSON
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub avatar_ref: Option<String>, // storage reference for the avatar object
    pub joined_at: OffsetDateTime,
}

/// Ephemeral claims pair minted for every authenticated response.
/// Never persisted; consumed only by the token issuer.
#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub identity: String,
}

impl SessionClaims {
    pub fn for_account(account: &Account) -> Self {
        Self {
            sub: account.id,
            identity: account.email.clone(),
        }
    }
}

/// Public projection of an account returned to clients.
///
/// Carries a bearer token only on the operations that authenticate or
/// re-authenticate (register, login, profile update).
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub avatar_ref: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl AccountView {
    pub fn from_account(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            name: account.name,
            avatar_url: account.avatar_url,
            avatar_ref: account.avatar_ref,
            joined_at: account.joined_at,
            access_token: None,
        }
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.access_token = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_account() -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$fake".into(),
            name: Some("Alice".into()),
            avatar_url: None,
            avatar_ref: None,
            joined_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn view_never_serializes_password_hash() {
        let view = AccountView::from_account(sample_account());
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn token_field_is_omitted_when_absent() {
        let view = AccountView::from_account(sample_account());
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("access_token"));

        let with_token = AccountView::from_account(sample_account()).with_token("tok".into());
        let json = serde_json::to_string(&with_token).unwrap();
        assert!(json.contains("access_token"));
    }

    #[test]
    fn claims_carry_id_and_email() {
        let account = sample_account();
        let claims = SessionClaims::for_account(&account);
        assert_eq!(claims.sub, account.id);
        assert_eq!(claims.identity, "a@x.com");
    }
}
