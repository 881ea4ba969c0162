//! # SFPD Common Library
//!
//! Shared code for the SFPD neighborhood ETL including:
//! - Error types
//! - Layered configuration loading
//! - SQL template rendering
//! - Local coordinate cache database initialization

pub mod config;
pub mod db;
pub mod error;
pub mod template;

pub use error::{Error, Result};
pub use template::{Statement, TemplateContext, TemplateRenderer};
