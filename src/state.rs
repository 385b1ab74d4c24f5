use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;

use crate::accounts::repo::PgAccountRepository;
use crate::accounts::service::AccountService;
use crate::accounts::token::JwtIssuer;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub accounts: AccountService,
    pub jwt: Arc<JwtIssuer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let jwt = Arc::new(JwtIssuer::from_config(&config.jwt));
        let repo = Arc::new(PgAccountRepository::new(db.clone()));
        let accounts = AccountService::new(repo, jwt.clone());

        Ok(Self {
            db,
            config,
            accounts,
            jwt,
        })
    }
}
