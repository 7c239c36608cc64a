//! Password hashing, token signing and the authenticated-user extractor

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bson::doc;
use codeweb_common::{CodewebError, Result};
use codeweb_mongodb::{parse_object_id, FindQuery, Store};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;
use crate::models::{CollectionName, DatabaseName, UserRole};
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Hash a password into an Argon2id PHC string with a random salt
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| CodewebError::Internal(format!("Failed to encode salt: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CodewebError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored hash. Malformed hashes never match.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub name: String,
    pub role: UserRole,
}

/// Signs and verifies access tokens.
///
/// A token is `base64url(claims json) "." base64url(hmac-sha256)`. Tokens do
/// not expire.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign `claims` into a token
    pub fn issue<T: Serialize>(&self, claims: &T) -> Result<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes()));
        Ok(format!("{}.{}", payload, signature))
    }

    /// Claims of a token signed with this issuer's secret
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        let (payload, signature) = token.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }
}

/// Whether a user other than `exclude_user_id` already holds `email`
pub async fn email_exists(
    store: &Store,
    email: &str,
    exclude_user_id: Option<&str>,
) -> Result<bool> {
    let mut query = FindQuery::new().condition("email__eq", email);
    if let Some(user_id) = exclude_user_id {
        query = query.filter(doc! { "_id": { "$ne": parse_object_id(user_id)? } });
    } else {
        query = query.limit(1);
    }

    let users = store
        .find_many(
            DatabaseName::Account.as_str(),
            CollectionName::User.as_str(),
            query,
        )
        .await?;
    Ok(!users.is_empty())
}

/// The caller identified by a `Bearer` token
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.0.user_id
    }

    /// Admins and staff may act on any question
    pub fn is_staff(&self) -> bool {
        matches!(self.0.role, UserRole::Admin | UserRole::Staff)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        state
            .tokens
            .verify::<Claims>(token.trim())
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}
