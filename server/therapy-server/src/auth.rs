//! Bearer-token authentication and role checks
//!
//! Tokens are HS256 JWTs issued elsewhere; this server only verifies them.
//! Handlers take an [`AuthContext`] argument and axum rejects the request
//! with 401 before the handler runs when the token is missing or invalid.

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Therapist,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Patient => "patient",
            Role::Therapist => "therapist",
            Role::Admin => "admin",
        })
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub role: Role,
    /// Expiration timestamp (seconds since epoch)
    pub exp: i64,
}

/// Verifies HS256 tokens with a shared secret
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &Secret<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.validate_exp = true;

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!(reason = ?e.kind(), "Token rejected");
            match e.kind() {
                ErrorKind::ExpiredSignature => ApiError::authentication("Token has expired"),
                _ => ApiError::authentication("Invalid token"),
            }
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(ApiError::authentication("Token subject is empty"));
        }
        Ok(data.claims)
    }
}

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Therapist | Role::Admin)
    }

    /// Patients see only themselves; therapists and admins see any patient
    pub fn can_view(&self, user_id: &str) -> bool {
        self.user_id == user_id || self.is_staff()
    }

    pub fn require_view(&self, user_id: &str) -> Result<(), ApiError> {
        if self.can_view(user_id) {
            Ok(())
        } else {
            Err(ApiError::authorization("Access to another patient's data is not permitted"))
        }
    }

    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(ApiError::authorization(format!("Requires the {role} role")))
        }
    }

    /// Therapist or admin
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ApiError::authorization("Requires the therapist or admin role"))
        }
    }
}

/// Extract the bearer token from the Authorization header
fn extract_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::authentication("Missing Authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::authentication("Invalid Authorization header format. Expected: Bearer <token>"))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)?;
        let state = AppState::from_ref(state);
        let claims = state.jwt.verify(token)?;

        Ok(AuthContext {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}
