//! Command implementations.

pub mod generate;
pub mod init;
pub mod list;
pub mod map;
pub mod summary;
