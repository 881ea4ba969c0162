//! SQL script templates
//!
//! Templates are plain `.sql` files with two placeholder forms:
//!
//! - `{{ name }}` is substituted verbatim. Use it for identifiers such as
//!   table names, which cannot be bound as parameters.
//! - `{{? name }}` marks a value. [`TemplateRenderer::render_statement`]
//!   turns it into a positional `$N` parameter, [`TemplateRenderer::render`]
//!   inlines it as a quoted SQL literal.
//!
//! Everything outside placeholders is copied unmodified.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Mapping of placeholder name to value
pub type TemplateContext = HashMap<String, String>;

/// What to do when a template references a name absent from the context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingVariablePolicy {
    /// Fail with [`Error::MissingVariable`]
    #[default]
    Error,
    /// Substitute an empty string
    Blank,
}

/// Rendered SQL with its bound parameter values in positional order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<String>,
}

/// One parsed piece of a template
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Raw(&'a str),
    Bind(&'a str),
}

/// Renders SQL templates against a [`TemplateContext`]
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    missing: MissingVariablePolicy,
}

impl TemplateRenderer {
    pub fn new(missing: MissingVariablePolicy) -> Self {
        Self { missing }
    }

    pub fn missing_variable_policy(&self) -> MissingVariablePolicy {
        self.missing
    }

    /// Render a template to executable SQL text with values inlined
    pub fn render(&self, path: &Path, context: &TemplateContext) -> Result<String> {
        let source = read_template(path)?;
        let mut out = String::with_capacity(source.len());

        for segment in parse(path, &source)? {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Raw(name) => out.push_str(&self.resolve(path, context, name)?),
                Segment::Bind(name) => {
                    let value = self.resolve(path, context, name)?;
                    out.push('\'');
                    out.push_str(&value.replace('\'', "''"));
                    out.push('\'');
                }
            }
        }

        Ok(out)
    }

    /// Render a template to a parameterized [`Statement`]
    ///
    /// Each `{{? name }}` occurrence becomes the next `$N` placeholder.
    pub fn render_statement(&self, path: &Path, context: &TemplateContext) -> Result<Statement> {
        let source = read_template(path)?;
        let mut sql = String::with_capacity(source.len());
        let mut params = Vec::new();

        for segment in parse(path, &source)? {
            match segment {
                Segment::Text(text) => sql.push_str(text),
                Segment::Raw(name) => sql.push_str(&self.resolve(path, context, name)?),
                Segment::Bind(name) => {
                    params.push(self.resolve(path, context, name)?);
                    sql.push('$');
                    sql.push_str(&params.len().to_string());
                }
            }
        }

        Ok(Statement { sql, params })
    }

    fn resolve(&self, path: &Path, context: &TemplateContext, name: &str) -> Result<String> {
        match (context.get(name), self.missing) {
            (Some(value), _) => Ok(value.clone()),
            (None, MissingVariablePolicy::Blank) => {
                tracing::debug!(template = %path.display(), name, "Blank substitution for missing variable");
                Ok(String::new())
            }
            (None, MissingVariablePolicy::Error) => Err(Error::MissingVariable {
                template: path.to_path_buf(),
                name: name.to_string(),
            }),
        }
    }
}

fn read_template(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(source) => Ok(source),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::TemplateNotFound(path.to_path_buf()))
        }
        Err(e) => Err(Error::Io(e)),
    }
}

fn parse<'a>(path: &Path, source: &'a str) -> Result<Vec<Segment<'a>>> {
    let mut segments = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }

        let after_open = &rest[start + 2..];
        let end = after_open.find("}}").ok_or_else(|| syntax_error(path, "unterminated '{{'"))?;
        let inner = after_open[..end].trim();

        let segment = match inner.strip_prefix('?') {
            Some(name) => Segment::Bind(validate_name(path, name.trim())?),
            None => Segment::Raw(validate_name(path, inner)?),
        };
        segments.push(segment);

        rest = &after_open[end + 2..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }

    Ok(segments)
}

fn validate_name<'a>(path: &Path, name: &'a str) -> Result<&'a str> {
    if name.is_empty() {
        return Err(syntax_error(path, "empty placeholder"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(syntax_error(path, &format!("invalid placeholder name '{}'", name)));
    }
    Ok(name)
}

fn syntax_error(path: &Path, message: &str) -> Error {
    Error::TemplateSyntax {
        template: PathBuf::from(path),
        message: message.to_string(),
    }
}
