//! # Autenticación con Bearer Tokens
//! src/auth.rs
//!
//! Tokens JWT firmados con HS256 y un secreto compartido. El token viaja en
//! `Authorization: Bearer <token>`; el servidor rechaza con 403 los requests
//! sin token, con token expirado o con firma inválida.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Vida útil de un token emitido (1 hora)
pub const TOKEN_TTL_SECS: u64 = 3600;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized, token missing")]
    Missing,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Claims del token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// Valida tokens contra un secreto fijo
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Valida el valor crudo del header `Authorization`
    pub fn validate_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = header
            .map(str::trim)
            .and_then(|h| h.strip_prefix(BEARER_PREFIX))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Missing)?;

        self.validate_token(token)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            })
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Emite un token válido por [`TOKEN_TTL_SECS`] desde ahora
pub fn issue_token(secret: &str, subject: &str) -> Result<String, AuthError> {
    issue_token_at(secret, subject, now_secs())
}

/// Emite un token como si se hubiera creado en `issued_at` (segundos Unix)
pub fn issue_token_at(secret: &str, subject: &str, issued_at: u64) -> Result<String, AuthError> {
    let claims = Claims {
        sub: subject.to_string(),
        iat: issued_at,
        exp: issued_at + TOKEN_TTL_SECS,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Encoding(e.to_string()))
}
