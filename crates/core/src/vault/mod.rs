//! Vault password handling and the encrypted variable format.
//!
//! The [`VaultPasswordBroker`] owns the session's [`Secret`]. It reads the
//! password from a file or prompts for it on the terminal the first time a
//! command needs it, then hands out the cached value for the rest of the
//! session. The secret never leaves process memory.

use std::fmt::{Debug, Formatter};

pub mod broker;
pub mod envelope;

pub use broker::{Prompter, SecretSource, TerminalPrompter, VaultPasswordBroker};

/// The vault decryption password.
///
/// An opaque byte sequence. Has no `Display` implementation and a redacted
/// `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self(value.into())
    }

    /// Raw bytes for key derivation.
    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = Secret::new("hunter2".to_string());
        let rendered = format!("{secret:?}");
        assert_eq!(rendered, "Secret(<redacted>)");
        assert!(!rendered.contains("hunter2"));
    }
}
