use async_trait::async_trait;

use super::domain::{
    Flat, FlatId, FlatStatus, House, HouseId, NewFlat, NewHouse, User, UserId, UserType,
};

/// Storage abstraction so the service can be exercised without a database.
///
/// Implementations own every durable read and write; nothing above this trait
/// caches state between requests.
#[async_trait]
pub trait HouseRepository: Send + Sync {
    async fn create_user(
        &self,
        id: UserId,
        email: &str,
        password_hash: &str,
        user_type: UserType,
    ) -> Result<UserId, RepositoryError>;

    async fn fetch_user(&self, id: UserId) -> Result<User, RepositoryError>;

    async fn create_house(&self, house: NewHouse) -> Result<House, RepositoryError>;

    async fn list_flats(&self, house_id: HouseId) -> Result<Vec<Flat>, RepositoryError>;

    /// Inserts a flat numbered `max + 1` for its house and bumps the house's
    /// `updated_at`, all or nothing.
    async fn create_flat(&self, flat: NewFlat) -> Result<Flat, RepositoryError>;

    /// Sets the status unconditionally. A move to `on_moderation` claims an
    /// unclaimed flat for `moderator`.
    async fn update_flat_status(
        &self,
        flat_id: FlatId,
        status: FlatStatus,
        moderator: UserId,
    ) -> Result<Flat, RepositoryError>;

    /// Moderator currently claiming the flat, `None` when unclaimed.
    async fn flat_moderator(&self, flat_id: FlatId) -> Result<Option<UserId>, RepositoryError>;

    async fn subscribe(&self, house_id: HouseId, email: &str) -> Result<(), RepositoryError>;

    async fn subscribers(&self, house_id: HouseId) -> Result<Vec<String>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("stored value is invalid: {0}")]
    Corrupt(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Database(other),
        }
    }
}
