use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::{debug, info};

use crate::error::{Error, Result};
use crate::vault::Secret;

const PROMPT: &str = "Vault password: ";

/// Where the vault password comes from, fixed at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    File(PathBuf),
    Prompt,
}

/// Reads a password without echoing it.
pub trait Prompter: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if there is no terminal to prompt on.
    fn prompt(&self, message: &str) -> std::io::Result<String>;
}

/// Prompts on the controlling terminal with echo disabled.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt(&self, message: &str) -> std::io::Result<String> {
        rpassword::prompt_password(message)
    }
}

enum BrokerState {
    Unrequested,
    Acquired(Secret),
}

/// Acquires the vault password once per session and caches it.
///
/// The state lock is held for the whole acquisition, so callers arriving
/// while a prompt is open wait for its result instead of prompting again.
pub struct VaultPasswordBroker {
    source: SecretSource,
    prompter: Box<dyn Prompter>,
    state: Mutex<BrokerState>,
}

impl VaultPasswordBroker {
    #[must_use]
    pub fn new(source: SecretSource) -> Self {
        Self::with_prompter(source, Box::new(TerminalPrompter))
    }

    /// Uses the password file when one is given, otherwise the terminal.
    #[must_use]
    pub fn from_password_file(password_file: Option<PathBuf>) -> Self {
        match password_file {
            Some(path) => Self::new(SecretSource::File(path)),
            None => Self::new(SecretSource::Prompt),
        }
    }

    #[must_use]
    pub fn with_prompter(source: SecretSource, prompter: Box<dyn Prompter>) -> Self {
        Self {
            source,
            prompter,
            state: Mutex::new(BrokerState::Unrequested),
        }
    }

    /// Returns the session secret, reading or prompting for it on first use.
    ///
    /// A failed acquisition leaves the broker unrequested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SecretUnavailable`] if the password file is missing or
    /// unreadable, or if there is no terminal to prompt on.
    pub fn acquire(&self) -> Result<Secret> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let BrokerState::Acquired(secret) = &*state {
            return Ok(secret.clone());
        }

        let secret = match &self.source {
            SecretSource::File(path) => read_password_file(path)?,
            SecretSource::Prompt => self.prompt()?,
        };

        info!("Vault password acquired");
        *state = BrokerState::Acquired(secret.clone());
        Ok(secret)
    }

    /// Returns the secret only if it has already been acquired.
    #[must_use]
    pub fn peek(&self) -> Option<Secret> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            BrokerState::Acquired(secret) => Some(secret.clone()),
            BrokerState::Unrequested => None,
        }
    }

    fn prompt(&self) -> Result<Secret> {
        debug!("Prompting for vault password");
        self.prompter
            .prompt(PROMPT)
            .map(Secret::new)
            .map_err(|e| Error::SecretUnavailable(format!("cannot prompt for a password: {e}")))
    }
}

fn read_password_file(path: &Path) -> Result<Secret> {
    debug!("Reading vault password from `{}`", path.display());

    let contents = fs::read(path).map_err(|e| {
        let reason = match e.kind() {
            ErrorKind::NotFound => "does not exist".to_string(),
            _ => format!("is not readable: {e}"),
        };
        Error::SecretUnavailable(format!("password file `{}` {reason}", path.display()))
    })?;

    Ok(Secret::new(trim_single_newline(contents)))
}

fn trim_single_newline(mut contents: Vec<u8>) -> Vec<u8> {
    if contents.ends_with(b"\n") {
        contents.pop();
        if contents.ends_with(b"\r") {
            contents.pop();
        }
    }
    contents
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    struct CountingPrompter {
        calls: Arc<AtomicUsize>,
        answer: std::io::Result<String>,
    }

    impl Prompter for CountingPrompter {
        fn prompt(&self, _message: &str) -> std::io::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Ok(answer) => Ok(answer.clone()),
                Err(e) => Err(std::io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    fn counting_broker(answer: std::io::Result<String>) -> (VaultPasswordBroker, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let prompter = CountingPrompter {
            calls: Arc::clone(&calls),
            answer,
        };
        (
            VaultPasswordBroker::with_prompter(SecretSource::Prompt, Box::new(prompter)),
            calls,
        )
    }

    #[test]
    fn test_prompt_happens_once() {
        let (broker, calls) = counting_broker(Ok("s3cret".to_string()));

        assert!(broker.peek().is_none());
        let first = broker.acquire().unwrap();
        let second = broker.acquire().unwrap();

        assert_eq!(first, second);
        assert_eq!(first, Secret::new("s3cret".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(broker.peek().is_some());
    }

    #[test]
    fn test_prompt_is_lazy() {
        let (_broker, calls) = counting_broker(Ok("s3cret".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_concurrent_acquire_prompts_once() {
        let (broker, calls) = counting_broker(Ok("s3cret".to_string()));
        let broker = Arc::new(broker);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let broker = Arc::clone(&broker);
                std::thread::spawn(move || broker.acquire().unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Secret::new("s3cret".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prompt_without_terminal() {
        let (broker, calls) = counting_broker(Err(std::io::Error::new(
            ErrorKind::NotFound,
            "no such device or address",
        )));

        assert!(matches!(broker.acquire(), Err(Error::SecretUnavailable(_))));
        // A failed attempt stays unrequested, so the next command tries again.
        assert!(matches!(broker.acquire(), Err(Error::SecretUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(broker.peek().is_none());
    }

    #[test]
    fn test_password_file_trims_single_newline() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "pass word\n\n").unwrap();

        let broker = VaultPasswordBroker::from_password_file(Some(file.path().to_path_buf()));
        assert_eq!(broker.acquire().unwrap(), Secret::new("pass word\n".to_string()));
    }

    #[test]
    fn test_password_file_without_newline() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "pass").unwrap();

        let broker = VaultPasswordBroker::new(SecretSource::File(file.path().to_path_buf()));
        assert_eq!(broker.acquire().unwrap(), Secret::new("pass".to_string()));
    }

    #[test]
    fn test_password_file_crlf() {
        assert_eq!(trim_single_newline(b"pass\r\n".to_vec()), b"pass");
    }

    #[test]
    fn test_password_file_with_non_utf8_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"caf\xe9\xff\n").unwrap();

        let broker = VaultPasswordBroker::from_password_file(Some(file.path().to_path_buf()));
        assert_eq!(broker.acquire().unwrap(), Secret::new(b"caf\xe9\xff".to_vec()));
    }

    #[test]
    fn test_missing_password_file() {
        let broker = VaultPasswordBroker::from_password_file(Some(PathBuf::from(
            "/this/path/does/not/exist",
        )));

        let error = broker.acquire().unwrap_err();
        assert!(matches!(error, Error::SecretUnavailable(_)));
        assert!(error.to_string().contains("does not exist"));
    }

    #[test]
    fn test_file_source_is_read_only_once() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "first").unwrap();
        let broker = VaultPasswordBroker::from_password_file(Some(file.path().to_path_buf()));

        assert_eq!(broker.acquire().unwrap(), Secret::new("first".to_string()));

        std::fs::write(file.path(), "second\n").unwrap();
        assert_eq!(broker.acquire().unwrap(), Secret::new("first".to_string()));
    }
}
