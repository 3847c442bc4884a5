//! Two-tier bearer credentials.
//!
//! Every account holds one live [`Credential`]: a private key that unlocks
//! every operation and a public key that may only upload. Both keys start
//! with the same 20-character session key, which is how a presented key is
//! mapped back to its session without storing the key itself as a lookup
//! index.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::{Duration, OffsetDateTime};

/// Length of the shared lookup prefix used as the session cache key.
pub const SESSION_KEY_LEN: usize = 20;

/// Random hex characters at the start of both keys.
const PREFIX_HEX_LEN: usize = 16;

/// Marker completing the shared lookup prefix.
const KEY_MARKER: &str = "blbr";

/// Random bytes in each key suffix (64 hex chars).
const SUFFIX_BYTES: usize = 32;

/// How long a freshly issued credential is valid for.
pub const CREDENTIAL_LIFETIME: Duration = Duration::hours(125);

/// Which half of a credential a presented key matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyRole {
    Private,
    Public,
}

impl KeyRole {
    fn tag(self) -> &'static str {
        match self {
            Self::Private => "priv",
            Self::Public => "pub",
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Private => "private",
            Self::Public => "public",
        })
    }
}

/// A private/public access key pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub private_access_key: String,
    pub public_access_key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Credential {
    /// Issue a fresh credential pair.
    pub fn issue() -> Self {
        Self::issue_at(OffsetDateTime::now_utc())
    }

    /// Issue a credential as if the current time were `now`.
    pub fn issue_at(now: OffsetDateTime) -> Self {
        let mut rng = rand::rng();

        let mut prefix = [0u8; PREFIX_HEX_LEN / 2];
        rng.fill_bytes(&mut prefix);
        let prefix = format!("{}{KEY_MARKER}", hex::encode(prefix));

        let make_key = |rng: &mut rand::rngs::ThreadRng, role: KeyRole| {
            let mut suffix = [0u8; SUFFIX_BYTES];
            rng.fill_bytes(&mut suffix);
            format!("{prefix}{}{}", role.tag(), hex::encode(suffix))
        };

        Self {
            private_access_key: make_key(&mut rng, KeyRole::Private),
            public_access_key: make_key(&mut rng, KeyRole::Public),
            expires_at: now + CREDENTIAL_LIFETIME,
        }
    }

    /// The session cache key for this credential.
    ///
    /// Taken from the private key when present, otherwise from the public key.
    pub fn session_key(&self) -> &str {
        let key = if self.private_access_key.is_empty() {
            &self.public_access_key
        } else {
            &self.private_access_key
        };
        session_key_of(key).unwrap_or(key)
    }

    /// Match a presented key against this credential.
    pub fn role_of(&self, key: &str) -> Option<KeyRole> {
        if !self.private_access_key.is_empty() && key == self.private_access_key {
            Some(KeyRole::Private)
        } else if !self.public_access_key.is_empty() && key == self.public_access_key {
            Some(KeyRole::Public)
        } else {
            None
        }
    }

    /// Whether the credential has passed its expiry time.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("session_key", &self.session_key())
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Derive the session cache key from a presented key.
///
/// Returns `None` for keys too short to carry a session key.
pub fn session_key_of(key: &str) -> Option<&str> {
    key.get(..SESSION_KEY_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_keys_share_session_key() {
        let cred = Credential::issue();
        assert_eq!(cred.session_key().len(), SESSION_KEY_LEN);
        assert_eq!(
            session_key_of(&cred.private_access_key),
            session_key_of(&cred.public_access_key)
        );
        assert_ne!(cred.private_access_key, cred.public_access_key);
    }

    #[test]
    fn key_layout() {
        let cred = Credential::issue();
        let private = &cred.private_access_key;
        let public = &cred.public_access_key;

        assert!(private[..PREFIX_HEX_LEN].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(&private[PREFIX_HEX_LEN..SESSION_KEY_LEN], KEY_MARKER);
        assert_eq!(&private[SESSION_KEY_LEN..SESSION_KEY_LEN + 4], "priv");
        assert_eq!(&public[SESSION_KEY_LEN..SESSION_KEY_LEN + 3], "pub");
        assert_eq!(private.len(), SESSION_KEY_LEN + 4 + 64);
        assert_eq!(public.len(), SESSION_KEY_LEN + 3 + 64);
    }

    #[test]
    fn session_keys_differ_between_issues() {
        let a = Credential::issue();
        let b = Credential::issue();
        assert_ne!(a.session_key(), b.session_key());
    }

    #[test]
    fn session_key_falls_back_to_public_key() {
        let mut cred = Credential::issue();
        let expected = cred.session_key().to_string();
        cred.private_access_key.clear();
        assert_eq!(cred.session_key(), expected);
    }

    #[test]
    fn role_of_matches_full_key_only() {
        let cred = Credential::issue();
        assert_eq!(cred.role_of(&cred.private_access_key), Some(KeyRole::Private));
        assert_eq!(cred.role_of(&cred.public_access_key), Some(KeyRole::Public));
        assert_eq!(cred.role_of(cred.session_key()), None);
        assert_eq!(cred.role_of(""), None);
    }

    #[test]
    fn expiry_is_125_hours_out() {
        let now = OffsetDateTime::now_utc();
        let cred = Credential::issue_at(now);
        assert_eq!(cred.expires_at - now, Duration::hours(125));
        assert!(!cred.is_expired(now));
        assert!(cred.is_expired(now + Duration::hours(125)));
    }

    #[test]
    fn short_keys_have_no_session_key() {
        assert!(session_key_of("too-short").is_none());
        assert_eq!(session_key_of("abcdefghijklmnopqrstuvwxyz"), Some("abcdefghijklmnopqrst"));
    }
}
