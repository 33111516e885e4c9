/// Authentication extractors and utilities
///
/// Identity lives with an external provider; the catalog only verifies the
/// HS256 bearer token it issues and reads the user id from `sub`.
use crate::{context::AppContext, error::CatalogError};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde::{Deserialize, Serialize};

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = CatalogError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| CatalogError::Authentication("Missing authorization header".to_string()))?;

        let claims = verify_jwt_token(&token, &state.config.authentication.jwt_secret)?;

        Ok(AuthContext {
            user_id: claims.sub,
        })
    }
}

/// Optional authenticated caller - anonymous when no valid token is present
#[derive(Debug, Clone)]
pub struct OptionalAuthContext {
    pub auth: Option<AuthContext>,
}

impl OptionalAuthContext {
    pub fn user_id(&self) -> Option<&str> {
        self.auth.as_ref().map(|auth| auth.user_id.as_str())
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = CatalogError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = extract_bearer_token(&parts.headers).and_then(|token| {
            match verify_jwt_token(&token, &state.config.authentication.jwt_secret) {
                Ok(claims) => Some(AuthContext {
                    user_id: claims.sub,
                }),
                Err(e) => {
                    tracing::debug!("Ignoring invalid bearer token: {}", e);
                    None
                }
            }
        });

        Ok(OptionalAuthContext { auth })
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Verify a JWT token's signature and expiry
pub fn verify_jwt_token(token: &str, jwt_secret: &str) -> Result<Claims, CatalogError> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (5 minutes)
    validation.leeway = 300;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                CatalogError::Authentication("Token has expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                CatalogError::Authentication("Invalid token signature".to_string())
            }
            _ => CatalogError::Authentication(format!("Invalid token: {}", e)),
        })
}

/// Mint a token the way the identity provider does
#[cfg(test)]
pub fn issue_token(user_id: &str, jwt_secret: &str, ttl_secs: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + ttl_secs) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .unwrap()
}
