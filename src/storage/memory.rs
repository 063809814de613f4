//! Memory storage
//!
//! Will be destroyed on system shutdown

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::notes::Note;
use crate::users::User;

use super::CreateNoteValues;
use super::CreateUserValues;
use super::Error;
use super::Result;
use super::Storage;

/// An in-memory storage
///
/// Will be destroyed on system shutdown
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// All users in storage
    users: Arc<Mutex<HashMap<Uuid, User>>>,

    /// All notes in storage
    notes: Arc<Mutex<HashMap<Uuid, Note>>>,
}

impl Memory {
    /// Create a new empty Memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for Memory {
    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(id).cloned())
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let mut users = self.users.lock().await;

        if users.values().any(|user| user.email == values.email) {
            return Err(Error::DuplicateEmail);
        }

        let now = Utc::now().naive_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: values.name.to_string(),
            email: values.email.to_string(),
            hashed_password: values.hashed_password.map(ToString::to_string),
            google_id: values.google_id.map(ToString::to_string),
            otp: values.otp.map(ToString::to_string),
            otp_expires_at: values.otp_expires_at,
            is_verified: values.is_verified,
            updated_at: now,
        };

        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let mut users = self.users.lock().await;

        let stored = users
            .get_mut(&user.id)
            .ok_or_else(|| Error::Connection(format!("User {} is not stored", user.id)))?;

        stored.google_id.clone_from(&user.google_id);
        stored.otp.clone_from(&user.otp);
        stored.otp_expires_at = user.otp_expires_at;
        stored.is_verified = user.is_verified;
        stored.updated_at = Utc::now().naive_utc();

        Ok(stored.clone())
    }

    async fn find_all_notes_by_user(&self, user_id: &Uuid) -> Result<Vec<Note>> {
        let mut notes = self
            .notes
            .lock()
            .await
            .values()
            .filter(|note| &note.user_id == user_id)
            .cloned()
            .collect::<Vec<Note>>();

        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(notes)
    }

    async fn find_single_note_by_id(
        &self,
        user_id: &Uuid,
        note_id: &Uuid,
    ) -> Result<Option<Note>> {
        Ok(self
            .notes
            .lock()
            .await
            .get(note_id)
            .filter(|note| &note.user_id == user_id)
            .cloned())
    }

    async fn create_note(&self, values: &CreateNoteValues) -> Result<Note> {
        let now = Utc::now().naive_utc();
        let note = Note {
            id: Uuid::new_v4(),
            user_id: *values.user,
            title: values.title.to_string(),
            content: values.content.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.notes.lock().await.insert(note.id, note.clone());

        Ok(note)
    }

    async fn delete_note(&self, note: &Note) -> Result<()> {
        self.notes.lock().await.remove(&note.id);

        Ok(())
    }
}
