use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use http_body_util::BodyExt;
use serde_json::Map;
use serde_json::Value;
use tower::Service;
use uuid::Uuid;

use crate::Services;
use crate::api::JwtKeys;
use crate::config::Environment;
use crate::create_router;
use crate::identity::IdentityProvider;
use crate::identity::ProviderError;
use crate::identity::ProviderIdentity;
use crate::identity::SharedIdentityProvider;
use crate::mailer::DisabledMailer;
use crate::mailer::MailError;
use crate::mailer::Mailer;
use crate::mailer::SharedMailer;
use crate::storage::Memory;

pub const JWT_SECRET: &[u8] = b"verysecret";

/// Test helper version of the response after a code is sent
#[derive(Debug)]
pub struct CodeSent {
    pub user_id: Option<Uuid>,
    pub dev_otp: Option<String>,
}

/// Test helper version of a logged in Google user
#[derive(Debug)]
pub struct GoogleLogin {
    pub access_token: String,
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Test helper version of the current user
#[derive(Debug, PartialEq, Eq)]
pub struct Me {
    pub name: String,
    pub email: String,
}

/// Test helper version of Note struct
#[derive(Debug, PartialEq, Eq)]
pub struct Note {
    pub id: Uuid,
    pub user: Uuid,
    pub title: String,
    pub content: String,
}

/// Error response
#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    pub message: String,
    pub description: Option<String>,
}

/// Mailer remembering the last code sent to every email address
#[derive(Default)]
pub struct RecordingMailer {
    codes: Mutex<HashMap<String, String>>,
}

impl RecordingMailer {
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.codes.lock().unwrap().get(email).cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), MailError> {
        self.codes
            .lock()
            .unwrap()
            .insert(email.to_string(), code.to_string());

        Ok(())
    }
}

/// Identity provider accepting tokens like `google|<email>|<name>`
pub struct FakeGoogle;

#[async_trait]
impl IdentityProvider for FakeGoogle {
    async fn verify(&self, token: &str) -> Result<ProviderIdentity, ProviderError> {
        match token.split('|').collect::<Vec<&str>>()[..] {
            ["google", email, name] => Ok(ProviderIdentity {
                subject: format!("sub-{email}"),
                email: email.to_string(),
                name: name.to_string(),
            }),
            _ => Err(ProviderError::InvalidToken("Not a fake Google token".to_string())),
        }
    }
}

/// Google token accepted by [`FakeGoogle`]
pub fn google_token(email: &str, name: &str) -> String {
    format!("google|{email}|{name}")
}

/// Setup the Notekeeper app
///
/// Runs in development, so codes are part of the responses. Email delivery always fails.
pub fn setup_test_app() -> Router {
    let (app, _) = setup_test_app_with(
        Environment::Development,
        Arc::new(DisabledMailer),
        Arc::new(FakeGoogle),
    );

    app
}

/// Setup the Notekeeper app with specific parts
///
/// The storage is returned as well, to look behind the scenes
pub fn setup_test_app_with(
    environment: Environment,
    mailer: SharedMailer,
    identity_provider: SharedIdentityProvider,
) -> (Router, Memory) {
    let storage = Memory::new();

    let services = Services {
        jwt_keys: JwtKeys::new(JWT_SECRET),
        mailer,
        identity_provider,
        environment,
    };

    let app = create_router(storage.clone(), services, None).unwrap();

    (app, storage)
}

/// Call the app and collect the response
async fn call(
    app: &mut Router,
    method: Method,
    uri: &str,
    access_token: Option<&str>,
    payload: Option<Map<String, Value>>,
) -> (StatusCode, Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(access_token) = access_token {
        builder = builder.header(AUTHORIZATION, access_token);
    }

    let body = if let Some(payload) = payload {
        builder = builder.header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
        Body::from(serde_json::to_vec(&payload).unwrap())
    } else {
        Body::empty()
    };

    let response = app.call(builder.body(body).unwrap()).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (status_code, body)
}

fn payload(fields: &[(&str, &str)]) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| ((*key).to_string(), Value::String((*value).to_string())))
        .collect()
}

pub async fn get(app: &mut Router, uri: &str) -> (StatusCode, String) {
    let (status_code, body) = call(app, Method::GET, uri, None, None).await;

    (status_code, String::from_utf8_lossy(&body[..]).to_string())
}

pub async fn maybe_signup(
    app: &mut Router,
    name: &str,
    email: &str,
    password: &str,
) -> (StatusCode, Option<CodeSent>, Option<String>) {
    let payload = payload(&[("name", name), ("email", email), ("password", password)]);

    let (status_code, body) =
        call(app, Method::POST, "/api/auth/signup", None, Some(payload)).await;

    code_sent_or_error(status_code, &body)
}

pub async fn maybe_login(
    app: &mut Router,
    email: &str,
    password: &str,
) -> (StatusCode, Option<CodeSent>, Option<String>) {
    let payload = payload(&[("email", email), ("password", password)]);

    let (status_code, body) = call(app, Method::POST, "/api/auth/login", None, Some(payload)).await;

    code_sent_or_error(status_code, &body)
}

pub async fn maybe_resend_otp(
    app: &mut Router,
    user_id: &str,
) -> (StatusCode, Option<CodeSent>, Option<String>) {
    let payload = payload(&[("userId", user_id)]);

    let (status_code, body) =
        call(app, Method::POST, "/api/auth/resend-otp", None, Some(payload)).await;

    code_sent_or_error(status_code, &body)
}

pub async fn maybe_verify_otp(
    app: &mut Router,
    user_id: &str,
    otp: &str,
) -> (StatusCode, Option<String>, Option<String>) {
    let payload = payload(&[("userId", user_id), ("otp", otp)]);

    let (status_code, body) =
        call(app, Method::POST, "/api/auth/verify-otp", None, Some(payload)).await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_access_token(&body))
        } else {
            None
        },
        error_message_if_failed(status_code, &body),
    )
}

pub async fn maybe_google_login(
    app: &mut Router,
    token: &str,
) -> (StatusCode, Option<GoogleLogin>, Option<String>) {
    let payload = payload(&[("token", token)]);

    let (status_code, body) =
        call(app, Method::POST, "/api/auth/google", None, Some(payload)).await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_google_login(&body))
        } else {
            None
        },
        error_message_if_failed(status_code, &body),
    )
}

/// Sign up and verify the code, returns the user ID and the access token
pub async fn signup_and_verify(
    app: &mut Router,
    name: &str,
    email: &str,
    password: &str,
) -> (Uuid, String) {
    let (status_code, code_sent, _) = maybe_signup(app, name, email, password).await;
    assert_eq!(StatusCode::OK, status_code);
    let code_sent = code_sent.unwrap();
    let user_id = code_sent.user_id.unwrap();

    let (status_code, access_token, _) =
        maybe_verify_otp(app, &user_id.to_string(), &code_sent.dev_otp.unwrap()).await;
    assert_eq!(StatusCode::OK, status_code);

    (user_id, access_token.unwrap())
}

pub async fn list_notes(
    app: &mut Router,
    access_token: &str,
) -> (StatusCode, Option<Vec<Note>>, Option<String>) {
    let (status_code, body) = call(app, Method::GET, "/api/notes", Some(access_token), None).await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_notes(&body))
        } else {
            None
        },
        error_message_if_failed(status_code, &body),
    )
}

pub async fn maybe_create_note(
    app: &mut Router,
    access_token: &str,
    title: &str,
    content: &str,
) -> (StatusCode, Option<Note>, Option<String>) {
    let payload = payload(&[("title", title), ("content", content)]);

    let (status_code, body) = call(
        app,
        Method::POST,
        "/api/notes",
        Some(access_token),
        Some(payload),
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::CREATED {
            Some(get_note(&body))
        } else {
            None
        },
        error_message_if_failed(status_code, &body),
    )
}

pub async fn maybe_delete_note(
    app: &mut Router,
    access_token: &str,
    note_id: &str,
) -> (StatusCode, Option<String>) {
    let (status_code, body) = call(
        app,
        Method::DELETE,
        &format!("/api/notes/{note_id}"),
        Some(access_token),
        None,
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_message(&body))
        } else {
            error_message_if_failed(status_code, &body)
        },
    )
}

pub async fn current_user(
    app: &mut Router,
    access_token: &str,
) -> (StatusCode, Option<Me>, Option<String>) {
    let (status_code, body) =
        call(app, Method::GET, "/api/user/me", Some(access_token), None).await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_me(&body))
        } else {
            None
        },
        error_message_if_failed(status_code, &body),
    )
}

pub async fn maybe_signup_with_raw_body(
    app: &mut Router,
    body: &'static str,
    include_content_type: bool,
) -> (StatusCode, Option<Error>) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/signup");

    if include_content_type {
        builder = builder.header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
    }

    let request = builder.body(Body::from(body.as_bytes())).unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (
        status_code,
        if status_code == StatusCode::BAD_REQUEST {
            Some(get_error(&body))
        } else {
            None
        },
    )
}

fn code_sent_or_error(
    status_code: StatusCode,
    body: &Bytes,
) -> (StatusCode, Option<CodeSent>, Option<String>) {
    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_code_sent(body))
        } else {
            None
        },
        error_message_if_failed(status_code, body),
    )
}

fn error_message_if_failed(status_code: StatusCode, body: &Bytes) -> Option<String> {
    if status_code.is_client_error() || status_code.is_server_error() {
        Some(get_error_message(body))
    } else {
        None
    }
}

fn get_json(body: &Bytes) -> Value {
    serde_json::from_slice::<Value>(&body[..]).unwrap()
}

fn get_code_sent(body: &Bytes) -> CodeSent {
    let json = get_json(body);

    CodeSent {
        user_id: json
            .get("userId")
            .and_then(Value::as_str)
            .map(|user_id| Uuid::parse_str(user_id).unwrap()),
        dev_otp: json
            .get("devOtp")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    }
}

fn get_google_login(body: &Bytes) -> GoogleLogin {
    let json = get_json(body);

    GoogleLogin {
        access_token: format!("Bearer {}", json["token"].as_str().unwrap()),
        id: json["user"]["id"]
            .as_str()
            .map(Uuid::parse_str)
            .unwrap()
            .unwrap(),
        name: json["user"]["name"].as_str().unwrap().to_string(),
        email: json["user"]["email"].as_str().unwrap().to_string(),
    }
}

fn get_me(body: &Bytes) -> Me {
    let json = get_json(body);

    Me {
        name: json["name"].as_str().unwrap().to_string(),
        email: json["email"].as_str().unwrap().to_string(),
    }
}

fn value_to_note(note: &Map<String, Value>) -> Note {
    Note {
        id: note["id"].as_str().map(Uuid::parse_str).unwrap().unwrap(),
        user: note["user"].as_str().map(Uuid::parse_str).unwrap().unwrap(),
        title: note["title"].as_str().map(ToString::to_string).unwrap(),
        content: note["content"].as_str().map(ToString::to_string).unwrap(),
    }
}

fn get_note(body: &Bytes) -> Note {
    get_json(body).as_object().map(value_to_note).unwrap()
}

fn get_notes(body: &Bytes) -> Vec<Note> {
    get_json(body)
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_object().unwrap())
        .map(value_to_note)
        .collect()
}

fn value_to_error(error: &Map<String, Value>) -> Error {
    Error {
        message: error["message"].as_str().map(ToString::to_string).unwrap(),
        description: error
            .get("description")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    }
}

fn get_error(body: &Bytes) -> Error {
    get_json(body).as_object().map(value_to_error).unwrap()
}

fn get_error_message(body: &Bytes) -> String {
    get_json(body)["message"]
        .as_str()
        .map(ToString::to_string)
        .unwrap()
}

fn get_message(body: &Bytes) -> String {
    get_error_message(body)
}

fn get_access_token(body: &Bytes) -> String {
    get_json(body)["token"]
        .as_str()
        .map(|access_token| format!("Bearer {access_token}"))
        .unwrap()
}
