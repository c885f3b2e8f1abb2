//! PostgreSQL implementation of [`HouseRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::domain::{
    Flat, FlatId, FlatStatus, House, HouseId, NewFlat, NewHouse, User, UserId, UserType,
};
use super::repository::{HouseRepository, RepositoryError};
use crate::config::DatabaseConfig;

/// Migrations embedded from `crates/house-service/migrations`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const FLAT_COLUMNS: &str = "id, house_id, flat_number, price, rooms, status, moderator_id";

#[derive(Clone)]
pub struct PgHouseRepository {
    pool: PgPool,
}

impl PgHouseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    user_type: String,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let user_type = row
            .user_type
            .parse::<UserType>()
            .map_err(|err| RepositoryError::Corrupt(err.to_string()))?;
        Ok(User {
            id: UserId(row.id),
            email: row.email,
            password_hash: row.password_hash,
            user_type,
        })
    }
}

#[derive(FromRow)]
struct HouseRow {
    id: i32,
    address: String,
    developer: String,
    year_built: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<HouseRow> for House {
    fn from(row: HouseRow) -> Self {
        House {
            id: row.id,
            address: row.address,
            developer: row.developer,
            year_built: row.year_built,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct FlatRow {
    id: i32,
    house_id: i32,
    flat_number: i32,
    price: i64,
    rooms: i32,
    status: String,
    moderator_id: Option<Uuid>,
}

impl TryFrom<FlatRow> for Flat {
    type Error = RepositoryError;

    fn try_from(row: FlatRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<FlatStatus>()
            .map_err(|err| RepositoryError::Corrupt(err.to_string()))?;
        Ok(Flat {
            id: row.id,
            house_id: row.house_id,
            flat_number: row.flat_number,
            price: row.price,
            rooms: row.rooms,
            status,
            moderator_id: row.moderator_id.map(UserId),
        })
    }
}

#[async_trait]
impl HouseRepository for PgHouseRepository {
    async fn create_user(
        &self,
        id: UserId,
        email: &str,
        password_hash: &str,
        user_type: UserType,
    ) -> Result<UserId, RepositoryError> {
        let stored: Uuid = sqlx::query_scalar(
            "INSERT INTO users (id, email, password_hash, user_type) VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(id.0)
        .bind(email)
        .bind(password_hash)
        .bind(user_type.label())
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(stored))
    }

    async fn fetch_user(&self, id: UserId) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(
            "SELECT id, email, password_hash, user_type FROM users WHERE id = $1",
        )
        .bind(id.0)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn create_house(&self, house: NewHouse) -> Result<House, RepositoryError> {
        let row: HouseRow = sqlx::query_as(
            "INSERT INTO houses (address, developer, year_built) VALUES ($1, $2, $3)
             RETURNING id, address, developer, year_built, created_at, updated_at",
        )
        .bind(&house.address)
        .bind(&house.developer)
        .bind(house.year_built)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_flats(&self, house_id: HouseId) -> Result<Vec<Flat>, RepositoryError> {
        let rows: Vec<FlatRow> = sqlx::query_as(&format!(
            "SELECT {FLAT_COLUMNS} FROM flats WHERE house_id = $1 ORDER BY flat_number"
        ))
        .bind(house_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Flat::try_from).collect()
    }

    async fn create_flat(&self, flat: NewFlat) -> Result<Flat, RepositoryError> {
        // Dropping the transaction without commit rolls it back, so every `?`
        // below leaves the store untouched.
        let mut tx = self.pool.begin().await?;

        // Locks the house row: concurrent creators for the same house queue
        // here, which keeps the max + 1 numbering free of duplicates.
        sqlx::query_scalar::<_, i32>(
            "UPDATE houses SET updated_at = now() WHERE id = $1 RETURNING id",
        )
        .bind(flat.house_id)
        .fetch_one(&mut *tx)
        .await?;

        let last_number: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(flat_number), 0) FROM flats WHERE house_id = $1",
        )
        .bind(flat.house_id)
        .fetch_one(&mut *tx)
        .await?;

        let row: FlatRow = sqlx::query_as(&format!(
            "INSERT INTO flats (house_id, price, rooms, flat_number, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {FLAT_COLUMNS}"
        ))
        .bind(flat.house_id)
        .bind(flat.price)
        .bind(flat.rooms)
        .bind(last_number + 1)
        .bind(FlatStatus::Created.label())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn update_flat_status(
        &self,
        flat_id: FlatId,
        status: FlatStatus,
        moderator: UserId,
    ) -> Result<Flat, RepositoryError> {
        let row: FlatRow = sqlx::query_as(&format!(
            "UPDATE flats
             SET status = $1,
                 moderator_id = CASE WHEN $1 = 'on_moderation'
                                     THEN COALESCE(moderator_id, $3)
                                     ELSE moderator_id END
             WHERE id = $2
             RETURNING {FLAT_COLUMNS}"
        ))
        .bind(status.label())
        .bind(flat_id)
        .bind(moderator.0)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn flat_moderator(&self, flat_id: FlatId) -> Result<Option<UserId>, RepositoryError> {
        let moderator: Option<Uuid> =
            sqlx::query_scalar("SELECT moderator_id FROM flats WHERE id = $1")
                .bind(flat_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(moderator.map(UserId))
    }

    async fn subscribe(&self, house_id: HouseId, email: &str) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO subscriptions (house_id, email) VALUES ($1, $2)")
            .bind(house_id)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn subscribers(&self, house_id: HouseId) -> Result<Vec<String>, RepositoryError> {
        let emails: Vec<String> =
            sqlx::query_scalar("SELECT email FROM subscriptions WHERE house_id = $1")
                .bind(house_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(emails)
    }
}
