//! The root!
//!
//! Health check and the answer for everything that is not an API route

use crate::api::Error;

/// Health check
pub async fn root() -> &'static str {
    "API is running..."
}

/// All requests without a route end up here
pub async fn not_found() -> Error {
    Error::not_found("Route not found").unhandled()
}
