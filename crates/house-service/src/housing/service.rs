use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{
    Flat, FlatId, FlatStatus, House, HouseId, NewFlat, NewHouse, UserId, UserType,
};
use super::notify::Notifier;
use super::repository::{HouseRepository, RepositoryError};
use crate::auth::password::{hash_password, verify_password, PasswordError};

/// Service composing password hashing, the repository, and subscriber notifications.
pub struct HouseService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
}

impl<R, N> HouseService<R, N>
where
    R: HouseRepository + 'static,
    N: Notifier,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        user_type: UserType,
    ) -> Result<UserId, ServiceError> {
        let password = password.to_owned();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await?
            .inspect_err(|err| warn!(error = %err, "hashing password"))?;
        let user_id = self
            .repository
            .create_user(UserId::generate(), email, &password_hash, user_type)
            .await
            .inspect_err(|err| warn!(error = %err, "creating user"))?;
        info!(%user_id, role = user_type.label(), "user registered");
        Ok(user_id)
    }

    /// `Some(role)` when the password matches, `None` when it does not.
    pub async fn authenticate(
        &self,
        user_id: UserId,
        password: &str,
    ) -> Result<Option<UserType>, ServiceError> {
        let user = self
            .repository
            .fetch_user(user_id)
            .await
            .inspect_err(|err| warn!(%user_id, error = %err, "loading user"))?;

        let password = password.to_owned();
        let password_hash = user.password_hash;
        let matches =
            tokio::task::spawn_blocking(move || verify_password(&password_hash, &password))
                .await?;

        if matches {
            Ok(Some(user.user_type))
        } else {
            Ok(None)
        }
    }

    pub async fn create_house(&self, house: NewHouse) -> Result<House, ServiceError> {
        let house = self
            .repository
            .create_house(house)
            .await
            .inspect_err(|err| warn!(error = %err, "creating house"))?;
        Ok(house)
    }

    pub async fn list_flats(&self, house_id: HouseId) -> Result<Vec<Flat>, ServiceError> {
        let flats = self
            .repository
            .list_flats(house_id)
            .await
            .inspect_err(|err| warn!(house_id, error = %err, "listing flats"))?;
        Ok(flats)
    }

    /// Stores the flat, then notifies the house's subscribers in the background.
    ///
    /// Notification problems are logged and never reach the caller.
    pub async fn create_flat(&self, new_flat: NewFlat) -> Result<Flat, ServiceError> {
        let flat = self
            .repository
            .create_flat(new_flat)
            .await
            .inspect_err(|err| {
                warn!(house_id = new_flat.house_id, error = %err, "creating flat");
            })?;

        self.notify_subscribers(flat.house_id).await;
        Ok(flat)
    }

    async fn notify_subscribers(&self, house_id: HouseId) {
        let subscribers = match self.repository.subscribers(house_id).await {
            Ok(subscribers) => subscribers,
            Err(err) => {
                warn!(house_id, error = %err, "loading subscribers");
                return;
            }
        };

        let message = format!("A new flat is available in house #{house_id}");
        for recipient in subscribers {
            let notifier = Arc::clone(&self.notifier);
            let message = message.clone();
            tokio::spawn(async move {
                if let Err(err) = notifier.send(&recipient, &message).await {
                    warn!(%recipient, error = %err, "notification dropped");
                }
            });
        }
    }

    /// Callers must confirm eligibility with [`Self::check_flat_moderator`] first.
    pub async fn update_flat_status(
        &self,
        flat_id: FlatId,
        status: FlatStatus,
        moderator: UserId,
    ) -> Result<Flat, ServiceError> {
        let flat = self
            .repository
            .update_flat_status(flat_id, status, moderator)
            .await
            .inspect_err(|err| warn!(flat_id, error = %err, "updating flat"))?;
        info!(flat_id, status = status.label(), %moderator, "flat status updated");
        Ok(flat)
    }

    /// True when the flat is unclaimed or claimed by `user_id`.
    pub async fn check_flat_moderator(
        &self,
        flat_id: FlatId,
        user_id: UserId,
    ) -> Result<bool, ServiceError> {
        let moderator = self
            .repository
            .flat_moderator(flat_id)
            .await
            .inspect_err(|err| warn!(flat_id, error = %err, "loading flat moderator"))?;
        Ok(moderator.map_or(true, |claimed| claimed == user_id))
    }

    pub async fn subscribe(&self, house_id: HouseId, email: &str) -> Result<(), ServiceError> {
        self.repository
            .subscribe(house_id, email)
            .await
            .inspect_err(|err| warn!(house_id, error = %err, "subscribing"))?;
        Ok(())
    }
}

/// Error raised by the house service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Hashing(#[from] PasswordError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("password task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}
