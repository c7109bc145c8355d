//! Secret wrappers that keep credentials out of logs.

use secrecy::{ExposeSecret, SecretBox};

/// Bot or RPC credential wrapper that prevents accidental logging.
///
/// The inner value is wrapped with `secrecy::SecretBox` so it is never
/// printed by Debug or Display formatting.
#[derive(Clone)]
pub struct BotToken(SecretBox<str>);

impl BotToken {
    /// Wrap a credential.
    #[must_use]
    pub fn new(token: String) -> Self {
        Self(SecretBox::new(token.into_boxed_str()))
    }

    /// Expose the secret for building an auth header.
    ///
    /// Use sparingly - only when actually sending to an API.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for BotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BotToken([REDACTED])")
    }
}

impl std::fmt::Display for BotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}
