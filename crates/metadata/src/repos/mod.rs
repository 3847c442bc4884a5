//! Repository traits for metadata operations.

pub mod accounts;
pub mod apps;
pub mod blobs;

pub use accounts::AccountRepo;
pub use apps::AppRepo;
pub use blobs::BlobRepo;
