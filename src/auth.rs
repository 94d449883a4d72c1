//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the user's row id. Handlers that need an
//! authenticated caller take an [`AuthUser`] guard; a missing, malformed or
//! expired token ends the request with 401 before the handler runs.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};

use crate::internal_error::{InternalError, InternalResult};
use crate::users::data::UserID;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub id: UserID,
    pub iat: u64,
    pub exp: u64,
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_secs: u64) -> TokenKeys {
        TokenKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn issue(&self, user_id: UserID) -> InternalResult<String> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            id: user_id,
            iat: now,
            exp: now + self.ttl_secs,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| InternalError::Internal(format!("Could not sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> InternalResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| InternalError::unauthorized(format!("Token is not valid: {}", e)))?;

        if data.claims.id <= 0 {
            return Err(InternalError::unauthorized("Token is not valid"));
        }

        Ok(data.claims)
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next()?;
    let token = parts.next()?.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// The caller identity decoded from a valid bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: UserID,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = InternalError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let keys = match request.rocket().state::<TokenKeys>() {
            Some(keys) => keys,
            None => {
                return Outcome::Error((
                    Status::InternalServerError,
                    InternalError::from("Token keys are not managed"),
                ))
            }
        };

        let token = match request
            .headers()
            .get_one("Authorization")
            .and_then(bearer_token)
        {
            Some(token) => token,
            None => {
                tracing::debug!("{} {}: no bearer token", request.method(), request.uri());
                return Outcome::Error((
                    Status::Unauthorized,
                    InternalError::unauthorized("Not authorized, no token"),
                ));
            }
        };

        match keys.verify(token) {
            Ok(claims) => Outcome::Success(AuthUser { id: claims.id }),
            Err(e) => {
                tracing::debug!("{} {}: {}", request.method(), request.uri(), e);
                Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let keys = TokenKeys::new("secret", 60);
        let token = keys.issue(42).unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.id, 42);
        assert_eq!(claims.exp, claims.iat + 60);
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let token = TokenKeys::new("secret", 60).issue(1).unwrap();
        let result = TokenKeys::new("other", 60).verify(&token);

        assert!(matches!(result, Err(InternalError::Unauthorized(_))));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = TokenKeys::new("secret", 60);
        let past = Utc::now().timestamp() as u64 - 3600;
        let claims = Claims {
            id: 7,
            iat: past - 60,
            exp: past,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();

        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
