//! Model-hosting credentials.
//!
//! The Hugging Face token is read once, explicitly, by the hosting
//! application at startup. Nothing here runs at load time: callers decide
//! whether a missing token is fatal.

use thiserror::Error;

use crate::config::AuthConfig;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("API token not found: set the {0} environment variable")]
    MissingToken(String),
}

/// Credentials for the model-hosting provider.
#[derive(Clone, Default)]
pub struct Credentials {
    token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Read the token named by `auth.token_env` from the environment.
    ///
    /// Blank values count as missing. When `auth.required` is false a
    /// missing token yields empty credentials instead of an error.
    pub fn from_env(config: &AuthConfig) -> Result<Self, AuthError> {
        let token = std::env::var(&config.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self::resolve(token, config)
    }

    fn resolve(token: Option<String>, config: &AuthConfig) -> Result<Self, AuthError> {
        match token {
            Some(token) => {
                tracing::info!(var = %config.token_env, "model hub credentials loaded");
                Ok(Self { token: Some(token) })
            }
            None if config.required => Err(AuthError::MissingToken(config.token_env.clone())),
            None => {
                tracing::debug!(var = %config.token_env, "no model hub token; continuing without one");
                Ok(Self::default())
            }
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}
