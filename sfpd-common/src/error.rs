//! Common error types for the SFPD ETL

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for SFPD ETL operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the ETL crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQL template file does not exist
    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    /// Template references a placeholder with no context entry
    #[error("Missing template variable '{name}' in {}", .template.display())]
    MissingVariable { template: PathBuf, name: String },

    /// Malformed placeholder in a template
    #[error("Template syntax error in {}: {message}", .template.display())]
    TemplateSyntax { template: PathBuf, message: String },
}
