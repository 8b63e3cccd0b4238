use indexmap::IndexMap;
use serde_yaml::value::Tag;
use serde_yaml::Value;

use crate::error::{Error, Result};
use crate::vault::{envelope, Secret};

const VAULT_TAG: &str = "vault";

/// A single inventory variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    Plain(Value),
    /// A vault envelope that can only be read with the session secret.
    Vaulted(String),
}

pub type Variables = IndexMap<String, Variable>;

impl Variable {
    /// Renders the value as it should appear inside a command line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SecretRequired`] for a vaulted value when no secret is
    /// given, or a vault error if decryption fails.
    pub fn reveal(&self, secret: Option<&Secret>) -> Result<String> {
        match self {
            Variable::Plain(value) => Ok(render_value(value)),
            Variable::Vaulted(text) => {
                let secret = secret.ok_or(Error::SecretRequired)?;
                envelope::decrypt_to_string(text, secret)
            }
        }
    }
}

/// A whole vars file that is vault encrypted and opened on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct SealedVars {
    pub path: String,
    pub envelope: String,
}

impl SealedVars {
    /// Decrypts and parses the file into variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SecretRequired`] without a secret, a vault error if
    /// decryption fails, or a YAML error if the plaintext is not a mapping.
    pub fn open(&self, secret: Option<&Secret>) -> Result<Variables> {
        let secret = secret.ok_or(Error::SecretRequired)?;
        let plaintext = envelope::decrypt_to_string(&self.envelope, secret)?;
        parse_variables_document(&self.path, &plaintext)
    }
}

/// Parses a YAML document holding a mapping of variables.
///
/// # Errors
///
/// Returns an error if the text is not YAML or not a mapping.
pub fn parse_variables_document(path: &str, text: &str) -> Result<Variables> {
    let value: Value = serde_yaml::from_str(text).map_err(|e| {
        Error::yaml_error(
            "reading".to_string(),
            "variables".to_string(),
            path.to_string(),
            e,
        )
    })?;

    match value {
        Value::Null => Ok(Variables::new()),
        Value::Mapping(_) => variables_from_value(path, &value),
        _ => Err(Error::inventory(path, "variables must be a mapping")),
    }
}

/// Converts a YAML mapping into variables, recognising `!vault` values.
///
/// # Errors
///
/// Returns an error if `value` is neither null nor a mapping with string keys.
pub fn variables_from_value(path: &str, value: &Value) -> Result<Variables> {
    let mut variables = Variables::new();

    let mapping = match value {
        Value::Null => return Ok(variables),
        Value::Mapping(mapping) => mapping,
        _ => return Err(Error::inventory(path, "variables must be a mapping")),
    };

    for (key, value) in mapping {
        let Some(key) = key.as_str() else {
            return Err(Error::inventory(path, "variable names must be strings"));
        };
        variables.insert(key.to_string(), variable_from_value(value));
    }

    Ok(variables)
}

fn variable_from_value(value: &Value) -> Variable {
    if let Value::Tagged(tagged) = value {
        if tagged.tag == Tag::new(VAULT_TAG) {
            if let Some(text) = tagged.value.as_str() {
                return Variable::Vaulted(text.to_string());
            }
        }
    }

    if let Some(text) = value.as_str() {
        if envelope::is_encrypted(text) {
            return Variable::Vaulted(text.to_string());
        }
    }

    Variable::Plain(value.clone())
}

/// Renders a plain YAML value as command line text.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(boolean) => boolean.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Tagged(tagged) => render_value(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => serde_json::to_string(value)
            .unwrap_or_else(|_| serde_yaml::to_string(value).unwrap_or_default()),
    }
}
