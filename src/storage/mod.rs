//! All things related to the storage of users and notes

use async_trait::async_trait;
use chrono::naive::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::notes::Note;
use crate::users::User;

pub use memory::Memory;
pub use postgres::Postgres;

mod memory;
mod postgres;

/// Storage errors
#[derive(Debug, Error)]
pub enum Error {
    /// A connection error with the storage
    #[error("Connection error: {0}")]
    Connection(String),

    /// Another user already uses this email address
    #[error("Email address is already in use")]
    DuplicateEmail,
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Values to create a User
pub struct CreateUserValues<'a> {
    /// The display name
    pub name: &'a str,

    /// The email address, unique over all users
    pub email: &'a str,

    /// The hashed password, not set for Google users
    pub hashed_password: Option<&'a str>,

    /// The Google subject, only set for Google users
    pub google_id: Option<&'a str>,

    /// The initial one-time code
    pub otp: Option<&'a str>,

    /// When the initial one-time code expires
    pub otp_expires_at: Option<NaiveDateTime>,

    /// Is the email address already verified?
    pub is_verified: bool,
}

/// Values to create a Note
pub struct CreateNoteValues<'a> {
    /// Owner of the note
    pub user: &'a Uuid,

    /// Title of the note
    pub title: &'a str,

    /// Content of the note
    pub content: &'a str,
}

/// Storage with all supported operations
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    /// Finds a single user by its email address
    ///
    /// Exact match, case-sensitive
    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Finds a single user by its ID
    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>>;

    /// Create a single user
    ///
    /// Fails with [`Error::DuplicateEmail`] when the email address is taken
    async fn create_user(&self, values: &CreateUserValues) -> Result<User>;

    /// Save the mutable fields of a user
    ///
    /// Overwrites the one-time code, verification status and Google ID, last write wins
    async fn update_user(&self, user: &User) -> Result<User>;

    /// Find all notes of a user, newest first
    async fn find_all_notes_by_user(&self, user_id: &Uuid) -> Result<Vec<Note>>;

    /// Find a single note of a user
    ///
    /// Notes of other users are never found
    async fn find_single_note_by_id(&self, user_id: &Uuid, note_id: &Uuid)
    -> Result<Option<Note>>;

    /// Create a note
    async fn create_note(&self, values: &CreateNoteValues) -> Result<Note>;

    /// Delete a note
    async fn delete_note(&self, note: &Note) -> Result<()>;
}
