use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for registered users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub type HouseId = i32;
pub type FlatId = i32;

/// Role carried by a user account and by issued tokens.
///
/// `Unknown` stands in for anything unrecognised (or a missing token) and is
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    User,
    Moderator,
    #[serde(other)]
    Unknown,
}

impl UserType {
    pub const fn label(self) -> &'static str {
        match self {
            UserType::User => "user",
            UserType::Moderator => "moderator",
            UserType::Unknown => "unknown",
        }
    }

    /// Parses a role supplied by a client, rejecting the `unknown` sentinel.
    pub fn parse_known(raw: &str) -> Result<Self, ValidationError> {
        match raw.parse::<Self>()? {
            UserType::Unknown => Err(ValidationError::UnsupportedUserType(raw.to_string())),
            known => Ok(known),
        }
    }
}

impl FromStr for UserType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(UserType::User),
            "moderator" => Ok(UserType::Moderator),
            "unknown" => Ok(UserType::Unknown),
            other => Err(ValidationError::UnsupportedUserType(other.to_string())),
        }
    }
}

/// Moderation status of a flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatStatus {
    Created,
    OnModeration,
    Approved,
    Declined,
    #[serde(other)]
    Unknown,
}

impl FlatStatus {
    pub const fn label(self) -> &'static str {
        match self {
            FlatStatus::Created => "created",
            FlatStatus::OnModeration => "on_moderation",
            FlatStatus::Approved => "approved",
            FlatStatus::Declined => "declined",
            FlatStatus::Unknown => "unknown",
        }
    }

    /// Statuses a moderator may move a flat into. Any of them is reachable
    /// from any prior status.
    pub fn parse_update_target(raw: &str) -> Result<Self, ValidationError> {
        match raw.parse::<Self>() {
            Ok(status @ (FlatStatus::OnModeration | FlatStatus::Approved | FlatStatus::Declined)) => {
                Ok(status)
            }
            _ => Err(ValidationError::UnsupportedFlatStatus(raw.to_string())),
        }
    }
}

impl FromStr for FlatStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" => Ok(FlatStatus::Created),
            "on_moderation" => Ok(FlatStatus::OnModeration),
            "approved" => Ok(FlatStatus::Approved),
            "declined" => Ok(FlatStatus::Declined),
            other => Err(ValidationError::UnsupportedFlatStatus(other.to_string())),
        }
    }
}

/// Stored account. The hash never leaves the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub user_type: UserType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub id: HouseId,
    pub address: String,
    pub developer: String,
    pub year_built: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flat {
    pub id: FlatId,
    pub house_id: HouseId,
    pub flat_number: i32,
    pub price: i64,
    pub rooms: i32,
    pub status: FlatStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderator_id: Option<UserId>,
}

/// Validated input for a new house.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHouse {
    pub address: String,
    pub developer: String,
    pub year_built: i32,
}

impl NewHouse {
    pub fn new(
        address: impl Into<String>,
        developer: impl Into<String>,
        year_built: i32,
    ) -> Result<Self, ValidationError> {
        if year_built < 0 {
            return Err(ValidationError::NegativeYear(year_built));
        }
        Ok(Self {
            address: address.into(),
            developer: developer.into(),
            year_built,
        })
    }
}

/// Validated input for a new flat. The flat number is assigned by storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewFlat {
    pub house_id: HouseId,
    pub price: i64,
    pub rooms: i32,
}

impl NewFlat {
    pub fn new(house_id: HouseId, price: i64, rooms: i32) -> Result<Self, ValidationError> {
        if price < 0 {
            return Err(ValidationError::NegativePrice(price));
        }
        if rooms < 1 {
            return Err(ValidationError::TooFewRooms(rooms));
        }
        Ok(Self {
            house_id,
            price,
            rooms,
        })
    }
}

/// Input rejected before any storage access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unsupported user type '{0}'")]
    UnsupportedUserType(String),
    #[error("unsupported flat status '{0}'")]
    UnsupportedFlatStatus(String),
    #[error("year built must not be negative (got {0})")]
    NegativeYear(i32),
    #[error("price must not be negative (got {0})")]
    NegativePrice(i64),
    #[error("a flat needs at least one room (got {0})")]
    TooFewRooms(i32),
}
