//! sfpd-etl library interface
//!
//! Downloads SFPD incident data, resolves incident coordinates to
//! neighborhoods (with a local SQLite cache), and loads locations and
//! incidents into the warehouse through SQL templates.

pub mod cli;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;

pub use crate::error::{EtlError, EtlResult};
