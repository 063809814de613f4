//! Federated identities
//!
//! Verifies the ID token a browser got from Google Sign-In and turns it into an identity we can
//! look up users with.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Google endpoint validating ID tokens
const GOOGLE_TOKEN_INFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Issuers Google uses for its ID tokens
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Identity provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider is not configured
    #[error("Identity provider is not configured")]
    NotConfigured,

    /// The provider did not accept the token
    #[error("Invalid provider token: {0}")]
    InvalidToken(String),

    /// The provider could not be reached
    #[error("Identity provider request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Identity asserted by the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderIdentity {
    /// Subject at the provider
    pub subject: String,

    /// Verified email address
    pub email: String,

    /// Display name, falls back to the email address
    pub name: String,
}

/// Something that verifies provider tokens
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a token and return the identity it asserts
    async fn verify(&self, token: &str) -> Result<ProviderIdentity, ProviderError>;
}

/// Identity provider shared by all requests
pub type SharedIdentityProvider = Arc<dyn IdentityProvider>;

/// Setup the Google identity provider
///
/// Without client ID every verification fails with [`ProviderError::NotConfigured`]
pub fn setup(google_client_id: Option<&str>) -> SharedIdentityProvider {
    Arc::new(Google {
        client: reqwest::Client::new(),
        client_id: google_client_id.map(ToString::to_string),
    })
}

/// Google Sign-In
pub struct Google {
    /// HTTP client for the token info endpoint
    client: reqwest::Client,

    /// The OAuth client ID the tokens must be issued for
    client_id: Option<String>,
}

/// Response of the Google token info endpoint
///
/// All values are strings, booleans included
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    iss: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
}

impl TokenInfo {
    /// Check the token was meant for us and carries a verified email address
    fn into_identity(self, client_id: &str) -> Result<ProviderIdentity, ProviderError> {
        if self.aud != client_id {
            return Err(ProviderError::InvalidToken(
                "Token is issued for another client".to_string(),
            ));
        }

        if !GOOGLE_ISSUERS.contains(&self.iss.as_str()) {
            return Err(ProviderError::InvalidToken(format!(
                "Unknown issuer: {}",
                self.iss
            )));
        }

        let Some(email) = self.email else {
            return Err(ProviderError::InvalidToken(
                "Token has no email address".to_string(),
            ));
        };

        if self.email_verified.as_deref() != Some("true") {
            return Err(ProviderError::InvalidToken(
                "Email address is not verified".to_string(),
            ));
        }

        let name = self
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.clone());

        Ok(ProviderIdentity {
            subject: self.sub,
            email,
            name,
        })
    }
}

#[async_trait]
impl IdentityProvider for Google {
    async fn verify(&self, token: &str) -> Result<ProviderIdentity, ProviderError> {
        let Some(client_id) = &self.client_id else {
            return Err(ProviderError::NotConfigured);
        };

        let response = self
            .client
            .get(GOOGLE_TOKEN_INFO_URL)
            .query(&[("id_token", token)])
            .send()
            .await?;

        // Google answers invalid or expired tokens with a 4xx
        if !response.status().is_success() {
            return Err(ProviderError::InvalidToken(format!(
                "Google rejected the token with status {}",
                response.status()
            )));
        }

        response.json::<TokenInfo>().await?.into_identity(client_id)
    }
}
