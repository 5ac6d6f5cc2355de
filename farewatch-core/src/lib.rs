pub mod search_url;
pub mod extraction;
pub mod repository;
pub mod messaging;
pub mod session_store;
pub mod i18n;
pub mod dates;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid search URL: {0}")]
    InvalidQueryFormat(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
