//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the account id and role. The [`Caller`]
//! extractor verifies the token, checks the account is still active and
//! resolves the consultant profile so handlers receive a complete [`Actor`].

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use clinic_core::{
  account::{Actor, Identity, Role},
  store::ClientStore,
};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub sub:     String,
  pub user_id: i64,
  pub role:    Role,
  pub exp:     u64,
}

/// Signing and verification keys derived from the shared secret.
#[derive(Clone)]
pub struct TokenKeys {
  encoding: EncodingKey,
  decoding: DecodingKey,
  ttl_secs: u64,
}

impl TokenKeys {
  pub fn from_secret(secret: &str, ttl_secs: u64) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      ttl_secs,
    }
  }

  pub fn issue(&self, identity: Identity) -> Result<String, jsonwebtoken::errors::Error> {
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    let claims = Claims {
      sub:     identity.user_id.to_string(),
      user_id: identity.user_id,
      role:    identity.role,
      exp:     now + self.ttl_secs,
    };
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
  }

  pub fn verify(&self, token: &str) -> Result<Identity, ApiError> {
    let data = jsonwebtoken::decode::<Claims>(
      token,
      &self.decoding,
      &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| match e.kind() {
      ErrorKind::ExpiredSignature => ApiError::Unauthorized("token expired".into()),
      _ => ApiError::Unauthorized("invalid token".into()),
    })?;
    Ok(Identity { user_id: data.claims.user_id, role: data.claims.role })
  }
}

/// Pull the token out of `Authorization: Bearer …`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))
}

/// Turn a verified identity into an [`Actor`].
///
/// The account must exist and be active. Consultant roles must own a
/// consultant profile.
pub async fn resolve_actor<S: ClientStore>(
  store: &S,
  identity: Identity,
) -> Result<Actor, ApiError> {
  let account = store
    .get_account(identity.user_id)
    .await
    .map_err(ApiError::store)?
    .filter(|a| a.is_active)
    .ok_or_else(|| ApiError::Unauthorized("account not found or disabled".into()))?;

  let consultant_id = if identity.role.is_consultant() {
    let profile = store
      .consultant_for_account(account.id)
      .await
      .map_err(ApiError::store)?
      .ok_or_else(|| ApiError::NotFound("consultant profile not found".into()))?;
    Some(profile.id)
  } else {
    None
  };

  Ok(Actor { user_id: account.id, role: identity.role, consultant_id })
}

/// The authenticated caller of a request.
pub struct Caller(pub Actor);

impl<S> FromRequestParts<AppState<S>> for Caller
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers)?;
    let identity = state.keys.verify(token)?;
    let actor = resolve_actor(state.store.as_ref(), identity).await?;
    Ok(Caller(actor))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  #[test]
  fn issued_tokens_verify() {
    let keys = TokenKeys::from_secret("s3cret", 60);
    let token = keys.issue(Identity { user_id: 7, role: Role::Consultant }).unwrap();
    let id = keys.verify(&token).unwrap();
    assert_eq!(id, Identity { user_id: 7, role: Role::Consultant });
  }

  #[test]
  fn wrong_secret_is_rejected() {
    let token = TokenKeys::from_secret("a", 60)
      .issue(Identity { user_id: 1, role: Role::Admin })
      .unwrap();
    let err = TokenKeys::from_secret("b", 60).verify(&token).unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
  }

  #[test]
  fn expired_token_is_rejected() {
    let keys = TokenKeys::from_secret("s3cret", 0);
    let claims = Claims {
      sub:     "1".into(),
      user_id: 1,
      role:    Role::Admin,
      exp:     1_000_000,
    };
    let token = jsonwebtoken::encode(&Header::default(), &claims, &keys.encoding).unwrap();
    match keys.verify(&token) {
      Err(ApiError::Unauthorized(m)) => assert_eq!(m, "token expired"),
      other => panic!("expected expiry, got {other:?}"),
    }
  }

  #[test]
  fn bearer_header_parsing() {
    let mut headers = HeaderMap::new();
    assert!(bearer_token(&headers).is_err());
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
    assert!(bearer_token(&headers).is_err());
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
    assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
  }
}
