use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::housing::domain::{UserId, UserType};

/// Claims embedded in every issued token. No `exp`: tokens do not expire.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_type: UserType,
    user_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("token could not be issued: {0}")]
    Issue(String),
}

/// HS256 issuer/verifier over a secret fixed at startup.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, user_type: UserType, user_id: UserId) -> Result<String, TokenError> {
        let claims = Claims {
            user_type,
            user_id: user_id.0,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| TokenError::Issue(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<(UserType, UserId), TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(err.to_string()),
            }
        })?;
        Ok((data.claims.user_type, UserId(data.claims.user_id)))
    }
}
