//! Notes API
//!
//! Every note belongs to a single user, other users can not see or touch it.

use axum::Extension;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::notes::Note;
use crate::storage::CreateNoteValues;
use crate::storage::Storage;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::MessageResponse;
use super::PathParameters;
use super::Success;

const NOTE_NOT_FOUND: &str = "Note not found";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    pub id: Uuid,
    pub user: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NoteResponse {
    fn from_note(note: Note) -> Self {
        Self {
            id: note.id,
            user: note.user_id,
            title: note.title,
            content: note.content,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }

    fn from_note_multiple(notes: Vec<Note>) -> Vec<Self> {
        notes.into_iter().map(Self::from_note).collect::<Vec<Self>>()
    }
}

/// List the notes of the current user, newest first
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/notes
/// ```
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
) -> Result<Success<Vec<NoteResponse>>, Error> {
    let notes = storage
        .find_all_notes_by_user(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(NoteResponse::from_note_multiple(notes)))
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteForm {
    #[serde(default, deserialize_with = "super::null_as_empty")]
    title: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    content: String,
}

/// Create a note for the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "title": "Groceries", "content": "Milk" }' \
///     http://localhost:5000/api/notes
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    Form(form): Form<CreateNoteForm>,
) -> Result<Success<NoteResponse>, Error> {
    if form.title.is_empty() || form.content.is_empty() {
        return Err(Error::bad_request("Title and content are required"));
    }

    let values = CreateNoteValues {
        user: &current_user.id,
        title: &form.title,
        content: &form.content,
    };

    let note = storage
        .create_note(&values)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::created(NoteResponse::from_note(note)))
}

/// Delete a note of the current user
///
/// Notes of other users are reported as not found
///
/// Request:
/// ```sh
/// curl -v -XDELETE \
///     -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/notes/<uuid>
/// ```
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(note_id): PathParameters<String>,
) -> Result<Success<MessageResponse>, Error> {
    // an ID that can not exist is just another unknown note
    let note_id = Uuid::parse_str(&note_id).map_err(|_| Error::not_found(NOTE_NOT_FOUND))?;

    let note = storage
        .find_single_note_by_id(&current_user.id, &note_id)
        .await
        .map_err(Error::internal_server_error)?
        .ok_or_else(|| Error::not_found(NOTE_NOT_FOUND))?;

    storage
        .delete_note(&note)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(MessageResponse {
        message: "Note deleted successfully",
    }))
}
