//! Core domain types and shared logic for blober.
//!
//! This crate defines the data model used across all other crates:
//! - Accounts, validation and password hashing
//! - Two-tier access credentials and their session keys
//! - Apps, namespaces and blobs
//! - Content type sniffing
//! - Service configuration

pub mod account;
pub mod app;
pub mod config;
pub mod credential;
pub mod error;
pub mod sniff;

pub use account::{Account, AccountView, NewAccount};
pub use app::{App, Blob, NewApp, NewBlob};
pub use credential::{Credential, KeyRole, SESSION_KEY_LEN};
pub use error::{Error, Result};

/// Number of blobs per page when listing an app.
pub const BLOB_PAGE_SIZE: i64 = 20;
