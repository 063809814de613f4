//! Postgres storage

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::notes::Note;
use crate::users::User;

use super::CreateNoteValues;
use super::CreateUserValues;
use super::Error;
use super::Result;
use super::Storage;

/// Migrator to run migrations on startup
static MIGRATOR: Migrator = sqlx::migrate!();

/// Columns of the users table, in the order of [`PostgresUser`]
const USER_COLUMNS: &str = r"
    id,
    name,
    email,
    hashed_password,
    google_id,
    otp,
    otp_expires_at,
    is_verified,
    updated_at
";

/// Columns of the notes table, in the order of [`PostgresNote`]
const NOTE_COLUMNS: &str = r"
    id,
    user_id,
    title,
    content,
    created_at,
    updated_at
";

/// Postgres storage
#[derive(Clone)]
pub struct Postgres {
    /// Pool of connections
    connection_pool: PgPool,
}

impl Postgres {
    /// Create Postgres storage from a connection string
    ///
    /// Migrations will be run
    pub async fn new(database_url: &str) -> Result<Self> {
        let connection_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
            .map_err(connection_error)?;

        Self::new_with_pool(connection_pool).await
    }

    /// Create Postgres storage with existing pool
    ///
    /// Migrations will be run
    pub async fn new_with_pool(connection_pool: PgPool) -> Result<Self> {
        MIGRATOR
            .run(&connection_pool)
            .await
            .map_err(|err| Error::Connection(format!("Migrations could not run: {err}")))?;

        Ok(Self { connection_pool })
    }
}

/// Postgres version of user
#[derive(sqlx::FromRow)]
struct PostgresUser {
    /// User ID
    id: Uuid,

    /// Display name
    name: String,

    /// Email address
    email: String,

    /// Hashed password
    hashed_password: Option<String>,

    /// Google subject
    google_id: Option<String>,

    /// Current one-time code
    otp: Option<String>,

    /// Expiry of the current one-time code
    otp_expires_at: Option<NaiveDateTime>,

    /// Verified email address
    is_verified: bool,

    /// Last updated at
    updated_at: NaiveDateTime,
}

impl User {
    /// Create user from postgres version
    fn from_postgres_user(user: PostgresUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            hashed_password: user.hashed_password,
            google_id: user.google_id,
            otp: user.otp,
            otp_expires_at: user.otp_expires_at,
            is_verified: user.is_verified,
            updated_at: user.updated_at,
        }
    }

    /// Maybe create user from postgres version
    fn from_postgres_user_optional(user: Option<PostgresUser>) -> Option<Self> {
        user.map(Self::from_postgres_user)
    }
}

/// Postgres version of note
#[derive(sqlx::FromRow)]
struct PostgresNote {
    id: Uuid,
    user_id: Uuid,
    title: String,
    content: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl Note {
    /// Create note from postgres version
    fn from_postgres_note(note: PostgresNote) -> Self {
        Self {
            id: note.id,
            user_id: note.user_id,
            title: note.title,
            content: note.content,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }

    /// Create multiple notes from postgres version
    fn from_postgres_note_multiple(notes: Vec<PostgresNote>) -> Vec<Self> {
        notes
            .into_iter()
            .map(Self::from_postgres_note)
            .collect::<Vec<Self>>()
    }
}

#[async_trait]
impl Storage for Postgres {
    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE email = $1
            LIMIT 1
            "
        ))
        .bind(email)
        .fetch_optional(&self.connection_pool)
        .await
        .map(User::from_postgres_user_optional)
        .map_err(connection_error)?;

        Ok(user)
    }

    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = $1
            LIMIT 1
            "
        ))
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
        .map(User::from_postgres_user_optional)
        .map_err(connection_error)?;

        Ok(user)
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            r"
            INSERT INTO users (
                id,
                name,
                email,
                hashed_password,
                google_id,
                otp,
                otp_expires_at,
                is_verified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(values.name)
        .bind(values.email)
        .bind(values.hashed_password)
        .bind(values.google_id)
        .bind(values.otp)
        .bind(values.otp_expires_at)
        .bind(values.is_verified)
        .fetch_one(&self.connection_pool)
        .await
        .map(User::from_postgres_user)
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Error::DuplicateEmail,
            err => connection_error(err),
        })?;

        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            r"
            UPDATE users
            SET
                google_id = $1,
                otp = $2,
                otp_expires_at = $3,
                is_verified = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $5
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(&user.google_id)
        .bind(&user.otp)
        .bind(user.otp_expires_at)
        .bind(user.is_verified)
        .bind(user.id)
        .fetch_one(&self.connection_pool)
        .await
        .map(User::from_postgres_user)
        .map_err(connection_error)?;

        Ok(user)
    }

    async fn find_all_notes_by_user(&self, user_id: &Uuid) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, PostgresNote>(&format!(
            r"
            SELECT {NOTE_COLUMNS}
            FROM notes
            WHERE user_id = $1
            ORDER BY created_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(&self.connection_pool)
        .await
        .map(Note::from_postgres_note_multiple)
        .map_err(connection_error)?;

        Ok(notes)
    }

    async fn find_single_note_by_id(
        &self,
        user_id: &Uuid,
        note_id: &Uuid,
    ) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, PostgresNote>(&format!(
            r"
            SELECT {NOTE_COLUMNS}
            FROM notes
            WHERE user_id = $1 AND id = $2
            LIMIT 1
            "
        ))
        .bind(user_id)
        .bind(note_id)
        .fetch_optional(&self.connection_pool)
        .await
        .map(|note| note.map(Note::from_postgres_note))
        .map_err(connection_error)?;

        Ok(note)
    }

    async fn create_note(&self, values: &CreateNoteValues) -> Result<Note> {
        let note = sqlx::query_as::<_, PostgresNote>(&format!(
            r"
            INSERT INTO notes (id, user_id, title, content)
            VALUES ($1, $2, $3, $4)
            RETURNING {NOTE_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(values.user)
        .bind(values.title)
        .bind(values.content)
        .fetch_one(&self.connection_pool)
        .await
        .map(Note::from_postgres_note)
        .map_err(connection_error)?;

        Ok(note)
    }

    async fn delete_note(&self, note: &Note) -> Result<()> {
        sqlx::query(
            r"
            DELETE FROM notes
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(note.id)
        .bind(note.user_id)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(())
    }
}

/// Map any `SQLx` error to a connection error
fn connection_error<E>(err: E) -> Error
where
    E: std::error::Error,
{
    Error::Connection(err.to_string())
}
