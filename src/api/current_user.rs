//! Current user service
//!
//! Get the current user from the request based on the Authorization header

use axum::Extension;
use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::errors::ErrorKind;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::api::Error;

/// How long a session token stays valid
const TOKEN_LIFETIME_DAYS: i64 = 7;

/// Session token errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature or not a token at all
    #[error("Invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),

    /// Token is past its expiration date
    #[error("Token expired")]
    Expired,

    /// Token could not be signed
    #[error("Could not sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// The keys used for encoding/decoding JWT tokens
#[derive(Clone)]
pub struct JwtKeys {
    /// The encoding key
    encoding: EncodingKey,

    /// The decoding key
    decoding: DecodingKey,
}

impl JwtKeys {
    /// Create new encoding/decoding keys, derived from a secret
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a session token for a user, valid for a week
    pub fn issue(&self, user_id: &Uuid) -> Result<String, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a session token as if it was issued at `issued_at`
    pub fn issue_at(&self, user_id: &Uuid, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        use jsonwebtoken::Header;
        use jsonwebtoken::encode;

        let claims = Claims {
            sub: *user_id,
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Signing)
    }

    /// Verify a session token and get the user ID it was issued for
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        use jsonwebtoken::Validation;
        use jsonwebtoken::decode;

        // expiry is exact, without the default clock leeway
        let mut validation = Validation::default();
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|err| {
                if matches!(err.kind(), ErrorKind::ExpiredSignature) {
                    TokenError::Expired
                } else {
                    TokenError::Invalid(err)
                }
            })?;

        Ok(token_data.claims.sub)
    }
}

/// The JWT claims to identify a user
#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    /// The user ID
    sub: Uuid,

    /// When was the token issued, in seconds since the epoch
    iat: i64,

    /// When does the token expire, in seconds since the epoch
    exp: i64,
}

/// The user making the request, proven by a valid session token
///
/// The user itself is not loaded, handlers needing more than the ID fetch it from storage
#[derive(Clone, Debug)]
pub struct CurrentUser {
    /// The ID of the user
    pub id: Uuid,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Extract the token from the authorization header
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| Error::unauthorized("No token provided"))?;

        let Extension(jwt_keys) = parts
            .extract::<Extension<JwtKeys>>()
            .await
            .map_err(Error::internal_server_error)?;

        let id = jwt_keys.verify(bearer.token()).map_err(|err| {
            tracing::debug!("Rejected session token: {err}");
            Error::unauthorized("Invalid token")
        })?;

        Ok(CurrentUser { id })
    }
}
