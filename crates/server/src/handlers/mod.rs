//! HTTP request handlers.

pub mod accounts;
pub mod apps;
pub mod blobs;
pub mod common;

pub use accounts::*;
pub use apps::*;
pub use blobs::*;
pub use common::*;
