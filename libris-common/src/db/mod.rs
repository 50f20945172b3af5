//! Record store schema

pub mod init;

pub use init::*;
