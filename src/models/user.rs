//! Caller identity and token claims

use serde::{Deserialize, Serialize};

use super::enums::UserRole;
use crate::error::{AppError, AppResult};

/// Authenticated identity handed to every circulation operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i32,
    pub role: UserRole,
}

impl Caller {
    pub fn admin(user_id: i32) -> Self {
        Self { user_id, role: UserRole::Admin }
    }

    pub fn member(user_id: i32) -> Self {
        Self { user_id, role: UserRole::Member }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "User {} is not an administrator",
                self.user_id
            )))
        }
    }

    /// Admins may act on anyone's records, members only on their own
    pub fn require_self_or_admin(&self, owner_id: i32) -> AppResult<()> {
        if self.is_admin() || self.user_id == owner_id {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "User {} cannot access records of user {}",
                self.user_id, owner_id
            )))
        }
    }
}

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Encode a token. Only tooling and tests mint tokens; the server just verifies them.
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.user_id,
            role: self.role,
        }
    }
}
