use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not parse command: {}", .0)]
    Parse(String),

    #[error("Unknown scope `{}`{}", .target, suggestion_suffix(.suggestions))]
    UnknownScope {
        target: String,
        suggestions: Vec<String>,
    },

    #[error("Vault password is unavailable: {}", .0)]
    SecretUnavailable(String),

    #[error("Encrypted variables need the vault password")]
    SecretRequired,

    #[error("Execution engine failed: {}", .0)]
    EngineFatal(String),

    #[error("Command interrupted, remaining batches were skipped")]
    Interrupted,

    #[error("Error in inventory `{}`: {}", .path, .message)]
    Inventory { path: String, message: String },

    #[error("Vault error: {}", .0)]
    Vault(String),

    #[error("Error {} {} file at `{}`: {}", .action, .file_description, .path, .original)]
    Yaml {
        action: String,
        file_description: String,
        path: String,
        original: serde_yaml::Error,
    },

    #[error("IO error with {} file at path `{}`: {}", .file_description, .path, .original)]
    Io {
        file_description: String,
        path: String,
        original: std::io::Error,
    },

    #[error("STDIO error: {}", .0)]
    Stdio(#[from] std::io::Error),
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn unknown_scope(target: String, suggestions: Vec<String>) -> Self {
        Self::UnknownScope {
            target,
            suggestions,
        }
    }

    pub fn inventory(path: &str, message: impl Into<String>) -> Self {
        Self::Inventory {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn yaml_error(
        action: String,
        file_description: String,
        path: String,
        original: serde_yaml::Error,
    ) -> Self {
        Self::Yaml {
            action,
            file_description,
            path,
            original,
        }
    }

    pub fn io_error(file_description: String, path: String, original: std::io::Error) -> Self {
        Self::Io {
            file_description,
            path,
            original,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_scope_without_suggestions() {
        let error = Error::unknown_scope("dbx".to_string(), vec![]);
        assert_eq!(error.to_string(), "Unknown scope `dbx`");
    }

    #[test]
    fn test_unknown_scope_with_suggestions() {
        let error = Error::unknown_scope("dbx".to_string(), vec!["db".to_string(), "dbs".to_string()]);
        assert_eq!(error.to_string(), "Unknown scope `dbx` (did you mean: db, dbs?)");
    }
}
