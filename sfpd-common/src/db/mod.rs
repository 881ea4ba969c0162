//! Local cache database

pub mod init;
