//! Bearer-token verification against the identity provider.
use std::collections::HashSet;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode, header};
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation, decode, decode_header};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{config::Auth0Config, errors::ApiError, router::AppState};

/// Auth failure modes, with the status and message each one reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingHeader,
    WrongScheme,
    MissingToken,
    TooManyParts,
    MalformedToken,
    NoMatchingKey,
    TokenExpired,
    InvalidClaims,
    InvalidToken,
    PermissionsMissing,
    Forbidden,
}

impl AuthError {
    pub fn status(self) -> StatusCode {
        match self {
            Self::MissingHeader
            | Self::WrongScheme
            | Self::MissingToken
            | Self::TooManyParts
            | Self::MalformedToken
            | Self::TokenExpired
            | Self::InvalidClaims => StatusCode::UNAUTHORIZED,
            Self::NoMatchingKey | Self::InvalidToken | Self::PermissionsMissing => {
                StatusCode::BAD_REQUEST
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::MissingHeader => "Authorization header missing.",
            Self::WrongScheme => "Authorization header must start with 'Bearer'",
            Self::MissingToken => "Token not found.",
            Self::TooManyParts => "Authorization header must be 'Bearer token'",
            Self::MalformedToken => "Authorization malformed.",
            Self::NoMatchingKey => "Unable to find the appropriate key.",
            Self::TokenExpired => "Token expired.",
            Self::InvalidClaims => "Invalid claims. Please check the audience and issuer.",
            Self::InvalidToken => "Unable to parse token.",
            Self::PermissionsMissing => "Permissions not included in JWT.",
            Self::Forbidden => "Permission not found.",
        }
    }
}

/// Pulls the token out of the `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingHeader)?;
    let parts: Vec<&str> = header.split_whitespace().collect();
    match parts.as_slice() {
        [] => Err(AuthError::MissingHeader),
        [scheme, rest @ ..] if !scheme.eq_ignore_ascii_case("bearer") => {
            debug!(%scheme, parts = rest.len() + 1, "rejected authorization scheme");
            Err(AuthError::WrongScheme)
        }
        [_] => Err(AuthError::MissingToken),
        [_, token] => Ok(*token),
        _ => Err(AuthError::TooManyParts),
    }
}

/// Claims must grant the requested permission, e.g. `post:drinks`.
pub fn check_permissions(permission: &str, claims: &serde_json::Value) -> Result<(), AuthError> {
    let granted = claims
        .get("permissions")
        .and_then(|v| v.as_array())
        .ok_or(AuthError::PermissionsMissing)?;
    if granted.iter().any(|p| p.as_str() == Some(permission)) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    pub n: Option<String>,
    pub e: Option<String>,
}

/// Signing keys fetched from the tenant's JWKS endpoint, cached per `kid`.
/// An unknown `kid` triggers a refetch before failing, so key rotation on
/// the tenant does not strand the server.
pub struct JwksCache {
    http: Client,
    keys: DashMap<String, Jwk>,
}

impl JwksCache {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            keys: DashMap::new(),
        }
    }

    pub async fn decoding_key(&self, auth0: &Auth0Config, kid: &str) -> Result<DecodingKey, ApiError> {
        if !self.keys.contains_key(kid) {
            self.refresh(auth0).await?;
        }
        let jwk = self.keys.get(kid).ok_or(AuthError::NoMatchingKey)?;
        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            return Err(AuthError::NoMatchingKey.into());
        };
        DecodingKey::from_rsa_components(n, e).map_err(|_| AuthError::InvalidToken.into())
    }

    async fn refresh(&self, auth0: &Auth0Config) -> Result<(), ApiError> {
        let url = auth0.jwks_url();
        debug!(%url, "fetching signing keys");
        let jwks: Jwks = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                warn!("JWKS fetch failed: {e}");
                ApiError::Internal
            })?
            .json()
            .await
            .map_err(|e| {
                warn!("JWKS response unparseable: {e}");
                ApiError::Internal
            })?;
        self.store(jwks);
        Ok(())
    }

    fn store(&self, jwks: Jwks) {
        self.keys.clear();
        for key in jwks.keys {
            if key.kty == "RSA" {
                self.keys.insert(key.kid.clone(), key);
            }
        }
    }
}

impl Default for JwksCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Verifies signature, expiry, audience, and issuer, returning the claims.
pub async fn verify_jwt(
    jwks: &JwksCache,
    auth0: &Auth0Config,
    token: &str,
) -> Result<serde_json::Value, ApiError> {
    let header = decode_header(token).map_err(|_| AuthError::InvalidToken)?;
    let kid = header.kid.ok_or(AuthError::MalformedToken)?;
    let key = jwks.decoding_key(auth0, &kid).await?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_required_spec_claims(&["exp", "aud", "iss"]);
    validation.aud = Some(HashSet::from_iter([auth0.audience.clone()]));
    validation.iss = Some(HashSet::from_iter([auth0.issuer()]));
    let data: TokenData<serde_json::Value> =
        decode(token, &key, &validation).map_err(|e| map_decode_error(&e))?;
    Ok(data.claims)
}

fn map_decode_error(err: &jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::MissingRequiredClaim(_) => AuthError::InvalidClaims,
        _ => AuthError::InvalidToken,
    }
}

/// The gate every protected handler passes through: extract the bearer
/// token, verify it, and check the required permission.
pub async fn require_permission(
    state: &AppState,
    auth0: &Auth0Config,
    headers: &HeaderMap,
    permission: &str,
) -> Result<serde_json::Value, ApiError> {
    let token = bearer_token(headers)?;
    let claims = verify_jwt(&state.jwks, auth0, token).await?;
    check_permissions(permission, &claims)?;
    debug!(permission, sub = claims.get("sub").and_then(|v| v.as_str()), "authorized");
    Ok(claims)
}
