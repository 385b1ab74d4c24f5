use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod model;
pub mod paging;
pub mod password;
pub mod repo;
pub mod service;
pub mod token;
pub(crate) mod extractors;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
