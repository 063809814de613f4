//! All API endpoint setup

use axum::Router;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;

pub use current_user::CurrentUser;
pub use current_user::JwtKeys;
pub use request::Form;
pub use request::PathParameters;
pub use request::null_as_empty;
pub use response::Error;
pub use response::MessageResponse;
pub use response::Success;
pub use response::panic_response;

use crate::storage::Storage;

mod auth;
mod current_user;
mod notes;
mod request;
mod response;
mod users;

/// Get the Axum router for all API routes
pub fn router<S: Storage>() -> Router {
    let auth = Router::new()
        .route("/signup", post(auth::signup::<S>))
        .route("/login", post(auth::login::<S>))
        .route("/verify-otp", post(auth::verify_otp::<S>))
        .route("/resend-otp", post(auth::resend_otp::<S>))
        .route("/google", post(auth::google::<S>));

    let notes = Router::new()
        .route("/", get(notes::list::<S>).post(notes::create::<S>))
        .route("/{note}", delete(notes::delete::<S>));

    let user = Router::new().route("/me", get(users::me::<S>));

    Router::new()
        .nest("/auth", auth)
        .nest("/notes", notes)
        .nest("/user", user)
}
