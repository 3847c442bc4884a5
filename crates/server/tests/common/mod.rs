//! Common test utilities and fixtures.

pub mod requests;
pub mod server;
pub mod storage;
pub mod stores;

#[allow(unused_imports)]
pub use requests::*;
#[allow(unused_imports)]
pub use server::*;
#[allow(unused_imports)]
pub use storage::*;
#[allow(unused_imports)]
pub use stores::*;
