pub mod catalog;
pub mod error;
pub mod model;
pub mod offline;
pub mod playlists;
pub mod queue;
pub mod session;
pub mod sort;
pub mod store;

#[cfg(test)]
pub mod testing;

pub use error::{CoreError, Result};
