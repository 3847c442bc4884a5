//! Accounts, input validation and password hashing.

use crate::credential::Credential;
use crate::error::{Error, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Passwords shorter than this are rejected.
pub const MIN_PASSWORD_LEN: usize = 5;

const MIN_EMAIL_LEN: usize = 6;
const MAX_EMAIL_LEN: usize = 254;
const MAX_LOCAL_PART_LEN: usize = 64;

/// A developer account.
///
/// This is the shape stored inside session records, so it carries the
/// password hash. Use [`AccountView`] for anything sent to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    /// The live credential. Only present on accounts read from a session.
    #[serde(default)]
    pub credential: Option<Credential>,
}

impl Account {
    /// Local part of the email address.
    pub fn email_username(&self) -> &str {
        email_local_part(&self.email)
    }

    /// Unique handle: email local part followed by the account id.
    pub fn username(&self) -> String {
        format!("{}{}", self.email_username(), self.id)
    }

    /// Client-facing projection without the password hash.
    pub fn view(&self) -> AccountView {
        AccountView::from(self)
    }
}

/// Signup input, validated before anything is persisted.
#[derive(Clone, Debug, Deserialize)]
pub struct NewAccount {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl NewAccount {
    /// Check email shape and password strength.
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::WeakPassword);
        }
        Ok(())
    }
}

/// Account as returned over the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            email: account.email.clone(),
            created_at: account.created_at,
            updated_at: account.updated_at,
            credential: account.credential.clone(),
        }
    }
}

fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn is_local_part_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c)
}

/// Validate an email address.
///
/// The address is split at its last `@`; the local part must use the
/// RFC 5322 atom characters and the host must look like a dotted name.
pub fn validate_email(email: &str) -> Result<()> {
    if email.len() < MIN_EMAIL_LEN || email.len() > MAX_EMAIL_LEN {
        return Err(Error::InvalidEmail);
    }

    let at = email.rfind('@').ok_or(Error::InvalidEmail)?;
    if at == 0 || at > email.len() - 3 {
        return Err(Error::InvalidEmail);
    }

    let (user, host) = (&email[..at], &email[at + 1..]);
    if user.len() > MAX_LOCAL_PART_LEN || !user.chars().all(is_local_part_char) {
        return Err(Error::InvalidEmail);
    }

    if host.chars().any(char::is_whitespace) {
        return Err(Error::InvalidEmail);
    }
    // Some dot with text on both sides.
    let dotted = host
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < host.len());
    if !dotted {
        return Err(Error::InvalidEmail);
    }

    Ok(())
}

/// Hash a password with Argon2id into a PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Check a password against a stored PHC hash.
///
/// A malformed stored hash is an error, a mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
