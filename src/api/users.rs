//! User API

use axum::Extension;
use serde::Serialize;

use crate::storage::Storage;

use super::CurrentUser;
use super::Error;
use super::Success;

/// Profile of the current user
#[derive(Debug, Serialize)]
pub struct MeResponse {
    name: String,
    email: String,
}

/// Get the profile of the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/user/me
/// ```
///
/// Response:
/// ```json
/// { "name": "Alice", "email": "alice@example.com" }
/// ```
pub async fn me<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
) -> Result<Success<MeResponse>, Error> {
    let user = storage
        .find_single_user_by_id(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?
        .ok_or_else(|| Error::not_found("User not found"))?;

    Ok(Success::ok(MeResponse {
        name: user.name,
        email: user.email,
    }))
}
