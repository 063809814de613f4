//! Application configuration
//!
//! Read once from the environment on startup and handed to the parts that need it

use std::net::SocketAddr;

use anyhow::Result;

use crate::password::generate;
use crate::utils::env_var;
use crate::utils::env_var_or_else;

const DEFAULT_ADDRESS: &str = "0.0.0.0:5000";
const DEFAULT_SMTP_PORT: u16 = 587;

/// The environment the app runs in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    /// One-time codes are echoed in API responses, for testing without a mailbox
    Development,

    /// One-time codes are only delivered by email
    #[default]
    Production,
}

impl Environment {
    fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("development") {
            Self::Development
        } else {
            Self::Production
        }
    }

    /// Should one-time codes be part of the API responses?
    pub fn echoes_codes(self) -> bool {
        self == Self::Development
    }
}

/// Where users and notes are stored
pub enum StorageConfig {
    /// Keep everything in memory, gone after a restart
    Memory,

    /// Connect to Postgres with a connection string
    Postgres(String),
}

/// SMTP settings to deliver one-time codes
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// All configuration of the app
pub struct Config {
    /// Address to listen on
    pub address: SocketAddr,

    /// Secret to sign session tokens with
    pub jwt_secret: String,

    /// Storage backend
    pub storage: StorageConfig,

    /// The only origin allowed to call the API from a browser
    pub allowed_origin: Option<String>,

    /// Google OAuth client ID, Google sign-in is disabled without it
    pub google_client_id: Option<String>,

    /// Development or production
    pub environment: Environment,

    /// Email delivery of one-time codes, disabled without it
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Read the configuration from the environment
    ///
    /// # Errors
    ///
    /// Will return `Err` when `ADDRESS`, `PORT` or `SMTP_PORT` can not be parsed
    pub fn from_env() -> Result<Self> {
        let storage = if let Some(database_url) = env_var("DATABASE_URL") {
            StorageConfig::Postgres(database_url)
        } else {
            tracing::warn!("`DATABASE_URL` is not set, using memory storage");
            StorageConfig::Memory
        };

        let jwt_secret = env_var_or_else("JWT_SECRET", || {
            let jwt_secret = generate();
            tracing::info!("`JWT_SECRET` is not set, generating temporary one: {jwt_secret}");
            jwt_secret
        });

        let environment = env_var("APP_ENV")
            .map(|name| Environment::from_name(&name))
            .unwrap_or_default();

        Ok(Self {
            address: address_from_env()?,
            jwt_secret,
            storage,
            allowed_origin: env_var("ALLOWED_ORIGIN"),
            google_client_id: env_var("GOOGLE_CLIENT_ID"),
            environment,
            smtp: smtp_from_env()?,
        })
    }
}

fn address_from_env() -> Result<SocketAddr> {
    let mut address =
        env_var_or_else("ADDRESS", || String::from(DEFAULT_ADDRESS)).parse::<SocketAddr>()?;

    // optional override of just the port
    if let Some(port) = env_var("PORT") {
        address.set_port(port.parse::<u16>()?);
    }

    Ok(address)
}

fn smtp_from_env() -> Result<Option<SmtpConfig>> {
    let Some(host) = env_var("SMTP_HOST") else {
        tracing::warn!("`SMTP_HOST` is not set, one-time codes will not be emailed");
        return Ok(None);
    };

    let port = env_var("SMTP_PORT")
        .map(|port| port.parse::<u16>())
        .transpose()?
        .unwrap_or(DEFAULT_SMTP_PORT);

    let username = env_var("SMTP_USERNAME");

    let from = env_var("SMTP_FROM")
        .or_else(|| username.clone())
        .unwrap_or_else(|| format!("no-reply@{host}"));

    Ok(Some(SmtpConfig {
        host,
        port,
        username,
        password: env_var("SMTP_PASSWORD"),
        from,
    }))
}
