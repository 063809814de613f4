use chrono::naive::NaiveDateTime;
use uuid::Uuid;

/// A registered user
///
/// Users signing up with a password have a `hashed_password`, users coming in through Google
/// only have a `google_id`
#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub hashed_password: Option<String>,
    pub google_id: Option<String>,
    pub otp: Option<String>,
    pub otp_expires_at: Option<NaiveDateTime>,
    pub is_verified: bool,
    pub updated_at: NaiveDateTime,
}

impl User {
    /// Does this user log in with a password (and a one-time code)?
    pub fn has_password(&self) -> bool {
        self.hashed_password.is_some()
    }
}
