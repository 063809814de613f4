//! Authentication API
//!
//! Password users get a one-time code by email on signup and on every login, only a verified
//! code gets them a session token. Google users get a session token right away.

use axum::Extension;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Environment;
use crate::identity::ProviderError;
use crate::identity::SharedIdentityProvider;
use crate::mailer::SharedMailer;
use crate::otp;
use crate::password::hash;
use crate::password::verify;
use crate::storage;
use crate::storage::CreateUserValues;
use crate::storage::Storage;
use crate::users::User;

use super::Error;
use super::Form;
use super::JwtKeys;
use super::Success;

const USER_EXISTS: &str = "User already exists";
const USER_NOT_FOUND: &str = "User not found";

/// Response after a one-time code is issued
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSentResponse {
    /// The user to verify the code for, not repeated on a resend
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,

    message: &'static str,

    /// The code itself, only in development
    #[serde(skip_serializing_if = "Option::is_none")]
    dev_otp: Option<String>,
}

impl CodeSentResponse {
    fn new(
        user_id: Option<Uuid>,
        message: &'static str,
        code: String,
        environment: Environment,
    ) -> Self {
        Self {
            user_id,
            message,
            dev_otp: environment.echoes_codes().then_some(code),
        }
    }
}

/// Response with a session token
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    message: &'static str,
    token: String,
}

/// Public information of a user
#[derive(Debug, Serialize)]
pub struct UserResponse {
    id: Uuid,
    name: String,
    email: String,
}

/// Response with a session token for a Google user
#[derive(Debug, Serialize)]
pub struct GoogleLoginResponse {
    message: &'static str,
    token: String,
    user: UserResponse,
}

/// Signup form
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    #[serde(default, deserialize_with = "super::null_as_empty")]
    name: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    email: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    password: String,
}

/// Sign up with a password
///
/// The new user is unverified until the emailed code is verified
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "name": "Alice", "email": "alice@example.com", "password": "secret1" }' \
///     http://localhost:5000/api/auth/signup
/// ```
///
/// Response:
/// ```json
/// { "userId": "<uuid>", "message": "OTP sent" }
/// ```
pub async fn signup<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(mailer): Extension<SharedMailer>,
    Extension(environment): Extension<Environment>,
    Form(form): Form<SignupForm>,
) -> Result<Success<CodeSentResponse>, Error> {
    if form.name.is_empty() || form.email.is_empty() || form.password.is_empty() {
        return Err(Error::bad_request("Name, email and password are required"));
    }

    let existing_user = storage
        .find_single_user_by_email(&form.email)
        .await
        .map_err(Error::internal_server_error)?;

    if existing_user.is_some() {
        return Err(Error::bad_request(USER_EXISTS));
    }

    let hashed_password = hash(&form.password).map_err(Error::internal_server_error)?;
    let (code, expires_at) = otp::issue(Utc::now().naive_utc());

    let values = CreateUserValues {
        name: &form.name,
        email: &form.email,
        hashed_password: Some(&hashed_password),
        google_id: None,
        otp: Some(&code),
        otp_expires_at: Some(expires_at),
        is_verified: false,
    };

    let user = storage.create_user(&values).await.map_err(create_error)?;

    tracing::info!("User {} signed up", user.id);

    deliver_code(&mailer, &user.email, &code).await;

    Ok(Success::ok(CodeSentResponse::new(
        Some(user.id),
        "OTP sent",
        code,
        environment,
    )))
}

/// Login form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default, deserialize_with = "super::null_as_empty")]
    email: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    password: String,
}

/// Log in with a password
///
/// A correct password only gets a new one-time code, the session token follows after
/// verifying it
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "email": "alice@example.com", "password": "secret1" }' \
///     http://localhost:5000/api/auth/login
/// ```
///
/// Response:
/// ```json
/// { "userId": "<uuid>", "message": "OTP sent" }
/// ```
pub async fn login<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(mailer): Extension<SharedMailer>,
    Extension(environment): Extension<Environment>,
    Form(form): Form<LoginForm>,
) -> Result<Success<CodeSentResponse>, Error> {
    if form.email.is_empty() || form.password.is_empty() {
        return Err(Error::bad_request("Email and password are required"));
    }

    let mut user = storage
        .find_single_user_by_email(&form.email)
        .await
        .map_err(Error::internal_server_error)?
        .ok_or_else(|| Error::not_found(USER_NOT_FOUND))?;

    let Some(hashed_password) = &user.hashed_password else {
        return Err(Error::bad_request("This account uses Google sign-in"));
    };

    if !verify(hashed_password, &form.password) {
        return Err(Error::bad_request("Incorrect password"));
    }

    let code = reissue_code(&storage, &mailer, &mut user).await?;

    Ok(Success::ok(CodeSentResponse::new(
        Some(user.id),
        "OTP sent",
        code,
        environment,
    )))
}

/// Verify code form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeForm {
    #[serde(default, deserialize_with = "super::null_as_empty")]
    user_id: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    otp: String,
}

/// Verify a one-time code and get a session token
///
/// Completes both the signup and the login
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "userId": "<uuid>", "otp": "123456" }' \
///     http://localhost:5000/api/auth/verify-otp
/// ```
///
/// Response:
/// ```json
/// { "message": "Verification successful", "token": "some token" }
/// ```
pub async fn verify_otp<S: Storage>(
    Extension(jwt_keys): Extension<JwtKeys>,
    Extension(storage): Extension<S>,
    Form(form): Form<VerifyCodeForm>,
) -> Result<Success<TokenResponse>, Error> {
    if form.user_id.is_empty() || form.otp.is_empty() {
        return Err(Error::bad_request("UserId and OTP are required"));
    }

    let mut user = fetch_user(&storage, &form.user_id).await?;

    if !user.consume_code(&form.otp, Utc::now().naive_utc()) {
        return Err(Error::bad_request("Invalid or expired OTP"));
    }

    user.is_verified = true;

    let user = storage
        .update_user(&user)
        .await
        .map_err(Error::internal_server_error)?;

    let token = jwt_keys
        .issue(&user.id)
        .map_err(Error::internal_server_error)?;

    tracing::info!("User {} verified a one-time code", user.id);

    Ok(Success::ok(TokenResponse {
        message: "Verification successful",
        token,
    }))
}

/// Resend code form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendCodeForm {
    #[serde(default, deserialize_with = "super::null_as_empty")]
    user_id: String,
}

/// Send a new one-time code, the previous one stops working
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "userId": "<uuid>" }' \
///     http://localhost:5000/api/auth/resend-otp
/// ```
///
/// Response:
/// ```json
/// { "message": "OTP resent successfully" }
/// ```
pub async fn resend_otp<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(mailer): Extension<SharedMailer>,
    Extension(environment): Extension<Environment>,
    Form(form): Form<ResendCodeForm>,
) -> Result<Success<CodeSentResponse>, Error> {
    if form.user_id.is_empty() {
        return Err(Error::bad_request("UserId is required"));
    }

    let mut user = fetch_user(&storage, &form.user_id).await?;

    let code = reissue_code(&storage, &mailer, &mut user).await?;

    Ok(Success::ok(CodeSentResponse::new(
        None,
        "OTP resent successfully",
        code,
        environment,
    )))
}

/// Google login form
#[derive(Debug, Deserialize)]
pub struct GoogleLoginForm {
    /// ID token from Google Sign-In
    #[serde(default, deserialize_with = "super::null_as_empty")]
    token: String,
}

/// Log in (or sign up) with Google
///
/// Accounts with a password are refused, they have to log in with their password
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "token": "google id token" }' \
///     http://localhost:5000/api/auth/google
/// ```
///
/// Response:
/// ```json
/// { "message": "Google login successful", "token": "some token", "user": { ... } }
/// ```
pub async fn google<S: Storage>(
    Extension(jwt_keys): Extension<JwtKeys>,
    Extension(storage): Extension<S>,
    Extension(identity_provider): Extension<SharedIdentityProvider>,
    Form(form): Form<GoogleLoginForm>,
) -> Result<Success<GoogleLoginResponse>, Error> {
    if form.token.is_empty() {
        return Err(Error::bad_request("Google token is required"));
    }

    let identity = identity_provider
        .verify(&form.token)
        .await
        .map_err(|err| match err {
            ProviderError::InvalidToken(reason) => {
                tracing::debug!("Rejected Google token: {reason}");
                Error::bad_request("Invalid Google token")
            }
            err => Error::internal_server_error(err),
        })?;

    let existing_user = storage
        .find_single_user_by_email(&identity.email)
        .await
        .map_err(Error::internal_server_error)?;

    let user = if let Some(mut user) = existing_user {
        if user.has_password() {
            return Err(Error::bad_request(
                "Account registered with password, please log in with email and password",
            ));
        }

        if user.google_id.is_none() {
            user.google_id = Some(identity.subject.clone());

            storage
                .update_user(&user)
                .await
                .map_err(Error::internal_server_error)?
        } else {
            user
        }
    } else {
        let values = CreateUserValues {
            name: &identity.name,
            email: &identity.email,
            hashed_password: None,
            google_id: Some(&identity.subject),
            otp: None,
            otp_expires_at: None,
            is_verified: true,
        };

        let user = storage.create_user(&values).await.map_err(create_error)?;

        tracing::info!("User {} signed up with Google", user.id);

        user
    };

    let token = jwt_keys
        .issue(&user.id)
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(GoogleLoginResponse {
        message: "Google login successful",
        token,
        user: UserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    }))
}

/// Give the user a new code, save it and try to deliver it
async fn reissue_code<S: Storage>(
    storage: &S,
    mailer: &SharedMailer,
    user: &mut User,
) -> Result<String, Error> {
    let code = user.issue_code(Utc::now().naive_utc());

    storage
        .update_user(user)
        .await
        .map_err(Error::internal_server_error)?;

    deliver_code(mailer, &user.email, &code).await;

    Ok(code)
}

/// Try to deliver a code, a failure is only logged
async fn deliver_code(mailer: &SharedMailer, email: &str, code: &str) {
    if let Err(err) = mailer.send_code(email, code).await {
        tracing::warn!("Could not deliver one-time code to {email}: {err}");
    }
}

/// Fetch a user from storage by the ID given in a form
async fn fetch_user<S: Storage>(storage: &S, user_id: &str) -> Result<User, Error> {
    let user_id = Uuid::parse_str(user_id).map_err(|_| Error::bad_request("Invalid user ID"))?;

    storage
        .find_single_user_by_id(&user_id)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found(USER_NOT_FOUND)), Ok)
}

/// Map storage errors while creating a user
fn create_error(err: storage::Error) -> Error {
    match err {
        storage::Error::DuplicateEmail => Error::bad_request(USER_EXISTS),
        err @ storage::Error::Connection(_) => Error::internal_server_error(err),
    }
}
