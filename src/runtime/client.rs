//! Model provider clients
//!
//! The runtime talks to language-model providers through the [`ModelClient`]
//! trait: one prompt in, one raw text response out. Providers are injected,
//! so tests and offline use never touch a network.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// Transport-level failure while talking to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    pub message: String,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConnectionError {}

/// A connection to a language-model provider
///
/// `invoke` sends exactly one prompt and must return within `timeout`.
/// The runtime never retries on its own; a failed call surfaces to the
/// caller, who decides whether to call again.
pub trait ModelClient: Send + Sync {
    fn invoke(&self, prompt: &str, timeout: Duration) -> Result<String, ConnectionError>;
}

/// Replays queued responses and records every prompt it receives
///
/// Once the queue is exhausted, further calls fail with a connection error,
/// which doubles as a way to exercise transport-failure paths.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt seen so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ModelClient for ScriptedClient {
    fn invoke(&self, prompt: &str, _timeout: Duration) -> Result<String, ConnectionError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| ConnectionError::new("no response available from scripted client"))
    }
}

/// Client used when no provider is configured; every call fails
pub struct NullClient;

impl ModelClient for NullClient {
    fn invoke(&self, _prompt: &str, _timeout: Duration) -> Result<String, ConnectionError> {
        Err(ConnectionError::new("no model provider configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scripted_client_replays_in_order() {
        let client = ScriptedClient::new(["first", "second"]);
        let timeout = Duration::from_secs(1);
        assert_eq!(client.invoke("a", timeout).unwrap(), "first");
        assert_eq!(client.invoke("b", timeout).unwrap(), "second");
        assert!(client.invoke("c", timeout).is_err());
        assert_eq!(client.prompts(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_null_client_always_fails() {
        let err = NullClient
            .invoke("hello", Duration::from_secs(1))
            .unwrap_err();
        assert!(err.message.contains("no model provider"));
    }
}
