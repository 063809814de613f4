//! One-time codes
//!
//! A code proves the user can read the mailbox of their email address. Every issued code
//! replaces the previous one and is valid for a couple of minutes, after a successful use it is
//! gone.

use chrono::Duration;
use chrono::naive::NaiveDateTime;
use rand::Rng;

use crate::users::User;

/// How long a code stays valid after it is issued
pub const CODE_LIFETIME_MINUTES: i64 = 5;

/// Generate a new 6-digit code
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Generate a new code, valid from `now`
///
/// Returns the code and its expiry
pub fn issue(now: NaiveDateTime) -> (String, NaiveDateTime) {
    (
        generate_code(),
        now + Duration::minutes(CODE_LIFETIME_MINUTES),
    )
}

impl User {
    /// Issue a fresh code for this user, valid from `now`
    ///
    /// Any earlier code is overwritten. The user still needs to be saved.
    pub fn issue_code(&mut self, now: NaiveDateTime) -> String {
        let (code, expires_at) = issue(now);

        self.otp = Some(code.clone());
        self.otp_expires_at = Some(expires_at);

        code
    }

    /// Try to use the code of this user
    ///
    /// On success the code is cleared, the user still needs to be saved. On failure nothing
    /// changes.
    pub fn consume_code(&mut self, submitted_code: &str, now: NaiveDateTime) -> bool {
        let is_valid = match (&self.otp, &self.otp_expires_at) {
            (Some(code), Some(expires_at)) => {
                !code.is_empty() && code == submitted_code && now <= *expires_at
            }
            _ => false,
        };

        if is_valid {
            self.otp = None;
            self.otp_expires_at = None;
        }

        is_valid
    }
}
