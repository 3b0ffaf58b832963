use std::env;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};

/// Environment variable consulted for an API token
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Token file looked up in the user's home directory
pub const TOKEN_FILE_NAME: &str = ".github-token";

/// Supplies an optional API token. `None` means "send the request unauthenticated".
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

fn non_blank(token: impl AsRef<str>) -> Option<String> {
    let token = token.as_ref().trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Never provides a token
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CredentialProvider for Anonymous {
    fn token(&self) -> Option<String> {
        None
    }
}

/// A fixed token, e.g. from `--token`
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn token(&self) -> Option<String> {
        non_blank(&self.0)
    }
}

/// Token read from an environment variable at request time
#[derive(Debug, Clone)]
pub struct EnvToken(pub String);

impl Default for EnvToken {
    fn default() -> Self {
        EnvToken(TOKEN_ENV_VAR.to_string())
    }
}

impl CredentialProvider for EnvToken {
    fn token(&self) -> Option<String> {
        env::var(&self.0).ok().and_then(non_blank)
    }
}

/// Token stored as the first line of a file.
///
/// A missing file means no token. Other read errors are logged and also treated
/// as no token.
#[derive(Debug, Clone)]
pub struct TokenFile(pub PathBuf);

impl TokenFile {
    /// `~/.github-token`, if a home directory can be determined
    pub fn in_home_dir() -> Option<Self> {
        dirs::home_dir().map(|home| TokenFile(home.join(TOKEN_FILE_NAME)))
    }
}

impl CredentialProvider for TokenFile {
    fn token(&self) -> Option<String> {
        match std::fs::read_to_string(&self.0) {
            Ok(contents) => contents.lines().next().and_then(non_blank),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No token file at {}", self.0.display());
                None
            }
            Err(e) => {
                warn!("Could not read token file {}: {}", self.0.display(), e);
                None
            }
        }
    }
}

/// Asks each provider in turn and returns the first token found
#[derive(Default)]
pub struct CredentialChain {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

impl CredentialProvider for CredentialChain {
    fn token(&self) -> Option<String> {
        self.providers.iter().find_map(|provider| provider.token())
    }
}
