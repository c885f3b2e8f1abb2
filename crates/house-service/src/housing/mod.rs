//! Houses, flats, moderation and subscriber notifications.

pub mod domain;
pub mod memory;
pub mod notify;
pub mod postgres;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Flat, FlatId, FlatStatus, House, HouseId, NewFlat, NewHouse, User, UserId, UserType,
    ValidationError,
};
pub use memory::InMemoryHouseRepository;
pub use notify::{Notifier, NotifyError, SimulatedMailer};
pub use postgres::{PgHouseRepository, MIGRATOR};
pub use repository::{HouseRepository, RepositoryError};
pub use router::{housing_router, ApiError, HousingState, DUMMY_USER_ID};
pub use service::{HouseService, ServiceError};
