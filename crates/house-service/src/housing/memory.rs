//! Process-local [`HouseRepository`] used by `serve --in-memory` and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::domain::{
    Flat, FlatId, FlatStatus, House, HouseId, NewFlat, NewHouse, User, UserId, UserType,
};
use super::repository::{HouseRepository, RepositoryError};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    houses: Vec<House>,
    flats: Vec<Flat>,
    subscriptions: Vec<(HouseId, String)>,
}

/// Every operation runs under one lock, which gives `create_flat` the same
/// all-or-nothing behaviour as the Postgres transaction.
#[derive(Default)]
pub struct InMemoryHouseRepository {
    tables: Mutex<Tables>,
}

impl InMemoryHouseRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

#[async_trait]
impl HouseRepository for InMemoryHouseRepository {
    async fn create_user(
        &self,
        id: UserId,
        email: &str,
        password_hash: &str,
        user_type: UserType,
    ) -> Result<UserId, RepositoryError> {
        let mut tables = self.lock()?;
        tables.users.insert(
            id,
            User {
                id,
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                user_type,
            },
        );
        Ok(id)
    }

    async fn fetch_user(&self, id: UserId) -> Result<User, RepositoryError> {
        let tables = self.lock()?;
        tables.users.get(&id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn create_house(&self, house: NewHouse) -> Result<House, RepositoryError> {
        let mut tables = self.lock()?;
        let now = Utc::now();
        let record = House {
            id: tables.houses.len() as HouseId + 1,
            address: house.address,
            developer: house.developer,
            year_built: house.year_built,
            created_at: now,
            updated_at: now,
        };
        tables.houses.push(record.clone());
        Ok(record)
    }

    async fn list_flats(&self, house_id: HouseId) -> Result<Vec<Flat>, RepositoryError> {
        let tables = self.lock()?;
        let mut flats: Vec<Flat> = tables
            .flats
            .iter()
            .filter(|flat| flat.house_id == house_id)
            .cloned()
            .collect();
        flats.sort_by_key(|flat| flat.flat_number);
        Ok(flats)
    }

    async fn create_flat(&self, flat: NewFlat) -> Result<Flat, RepositoryError> {
        let mut tables = self.lock()?;
        let house = tables
            .houses
            .iter_mut()
            .find(|house| house.id == flat.house_id)
            .ok_or(RepositoryError::NotFound)?;
        house.updated_at = Utc::now();

        let last_number = tables
            .flats
            .iter()
            .filter(|existing| existing.house_id == flat.house_id)
            .map(|existing| existing.flat_number)
            .max()
            .unwrap_or(0);

        let record = Flat {
            id: tables.flats.len() as FlatId + 1,
            house_id: flat.house_id,
            flat_number: last_number + 1,
            price: flat.price,
            rooms: flat.rooms,
            status: FlatStatus::Created,
            moderator_id: None,
        };
        tables.flats.push(record.clone());
        Ok(record)
    }

    async fn update_flat_status(
        &self,
        flat_id: FlatId,
        status: FlatStatus,
        moderator: UserId,
    ) -> Result<Flat, RepositoryError> {
        let mut tables = self.lock()?;
        let flat = tables
            .flats
            .iter_mut()
            .find(|flat| flat.id == flat_id)
            .ok_or(RepositoryError::NotFound)?;
        flat.status = status;
        if status == FlatStatus::OnModeration && flat.moderator_id.is_none() {
            flat.moderator_id = Some(moderator);
        }
        Ok(flat.clone())
    }

    async fn flat_moderator(&self, flat_id: FlatId) -> Result<Option<UserId>, RepositoryError> {
        let tables = self.lock()?;
        tables
            .flats
            .iter()
            .find(|flat| flat.id == flat_id)
            .map(|flat| flat.moderator_id)
            .ok_or(RepositoryError::NotFound)
    }

    async fn subscribe(&self, house_id: HouseId, email: &str) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.houses.iter().any(|house| house.id == house_id) {
            return Err(RepositoryError::NotFound);
        }
        tables.subscriptions.push((house_id, email.to_string()));
        Ok(())
    }

    async fn subscribers(&self, house_id: HouseId) -> Result<Vec<String>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .subscriptions
            .iter()
            .filter(|(subscribed, _)| *subscribed == house_id)
            .map(|(_, email)| email.clone())
            .collect())
    }
}
