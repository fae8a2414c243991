//! Identity Verification Port
//!
//! The core consumes identity as an external capability: a bearer credential
//! goes in, a stable user id comes out. Token issuance lives entirely with
//! the identity provider.

use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::core_types::UserId;
use crate::error::BankError;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Subject (user_id as string)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
}

/// Verifies a bearer credential and resolves the calling user.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Returns the authenticated user id, or `Unauthorized`.
    async fn verify(&self, bearer: &str) -> Result<UserId, BankError>;
}

/// HS256 JWT verifier sharing a secret with the identity provider.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, bearer: &str) -> Result<UserId, BankError> {
        let data = decode::<Claims>(bearer, &self.decoding_key, &self.validation)
            .map_err(|_| BankError::Unauthorized)?;
        data.claims
            .sub
            .parse::<UserId>()
            .map_err(|_| BankError::Unauthorized)
    }
}

/// Static token map for deterministic tests: token string -> user id.
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, user: UserId) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, bearer: &str) -> Result<UserId, BankError> {
        self.tokens
            .get(bearer)
            .copied()
            .ok_or(BankError::Unauthorized)
    }
}

/// Strip the `Bearer ` prefix from an Authorization header value.
pub fn bearer_token(header: &str) -> Result<&str, BankError> {
    header
        .strip_prefix("Bearer ")
        .ok_or(BankError::Unauthorized)
}
