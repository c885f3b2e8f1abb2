//! Password hashing, token issuance and the role gate in front of protected routes.

pub mod gate;
pub mod password;
pub mod token;

pub use gate::{authorize, moderator_auth, user_auth, AuthenticatedUser, GateError};
pub use password::{hash_password, verify_password, PasswordError};
pub use token::{TokenError, TokenIssuer};
