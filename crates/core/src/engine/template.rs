//! `{{ name }}` substitution of host variables into command text.

use crate::error::{Error, Result};
use crate::inventory::Variables;
use crate::vault::Secret;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Why a template could not be rendered for a host.
#[derive(Debug)]
pub enum RenderError {
    /// Affects only this host, such as an undefined variable.
    Host(String),
    /// Stops the whole batch: a missing secret or an undecryptable value.
    Engine(Error),
}

impl From<Error> for RenderError {
    fn from(error: Error) -> Self {
        RenderError::Engine(error)
    }
}

/// Replaces every `{{ name }}` in `text` with the host variable `name`.
///
/// Text without a closing `}}` is copied through unchanged.
///
/// # Errors
///
/// Returns [`RenderError::Host`] for an undefined variable or an unsupported
/// expression, and [`RenderError::Engine`] when a vaulted value needs the
/// secret or fails to decrypt.
pub fn render(
    text: &str,
    variables: &Variables,
    secret: Option<&Secret>,
) -> std::result::Result<String, RenderError> {
    let mut rendered = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };

        rendered.push_str(&rest[..start]);

        let name = after_open[..end].trim();
        if !is_identifier(name) {
            return Err(RenderError::Host(format!(
                "unsupported template expression `{{{{ {name} }}}}`"
            )));
        }

        let Some(variable) = variables.get(name) else {
            return Err(RenderError::Host(format!("undefined variable `{name}`")));
        };
        rendered.push_str(&variable.reveal(secret)?);

        rest = &after_open[end + CLOSE.len()..];
    }

    rendered.push_str(rest);
    Ok(rendered)
}

fn is_identifier(name: &str) -> bool {
    let mut characters = name.chars();
    characters
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && characters.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Looks up a single variable's rendered value, if defined.
///
/// # Errors
///
/// Returns an error if the variable is vaulted and cannot be revealed.
pub fn lookup(name: &str, variables: &Variables, secret: Option<&Secret>) -> Result<Option<String>> {
    variables
        .get(name)
        .map(|variable| variable.reveal(secret))
        .transpose()
}
