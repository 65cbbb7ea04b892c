//! Execution context for agents
//!
//! The `Context` struct is a small key-value store that travels with a single
//! chat request: which chat asked, who asked, and anything an agent wants to
//! leave behind for the next step (for example the model that answered).

use std::collections::HashMap;

/// Well-known context keys
pub mod keys {
    /// Telegram chat the request came from
    pub const CHAT_ID: &str = "chat_id";
    /// Display name of the requesting user
    pub const USER_NAME: &str = "user_name";
    /// Model that served the most recent completion
    pub const MODEL: &str = "model";
}

/// Context passed to agents during execution
///
/// # Example
///
/// ```
/// use nifty_core::Context;
///
/// let ctx = Context::new()
///     .with_chat_id(123_456)
///     .with_user_name("ravi");
///
/// assert_eq!(ctx.chat_id(), Some(123_456));
/// assert_eq!(ctx.user_name(), Some("ravi"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    data: HashMap<String, serde_json::Value>,
}

impl Context {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    // =========== Builder Methods ===========

    /// Set the originating chat
    pub fn with_chat_id(mut self, chat_id: i64) -> Self {
        self.insert(keys::CHAT_ID, serde_json::json!(chat_id));
        self
    }

    /// Set the requesting user's display name
    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.insert(keys::USER_NAME, serde_json::json!(name.into()));
        self
    }

    // =========== Common Accessors ===========

    /// Get the originating chat
    pub fn chat_id(&self) -> Option<i64> {
        self.get(keys::CHAT_ID).and_then(serde_json::Value::as_i64)
    }

    /// Get the requesting user's display name
    pub fn user_name(&self) -> Option<&str> {
        self.get(keys::USER_NAME).and_then(|v| v.as_str())
    }

    /// Get the model recorded by the last agent
    pub fn model(&self) -> Option<&str> {
        self.get(keys::MODEL).and_then(|v| v.as_str())
    }

    /// Record the model that served a completion
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.insert(keys::MODEL, serde_json::json!(model.into()));
    }

    // =========== Generic Key-Value Operations ===========

    /// Insert a value into the context
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Get a value from the context
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut ctx = Context::new();
        assert_eq!(ctx.get("key"), None);

        ctx.insert("key", serde_json::json!("value"));
        assert_eq!(ctx.get("key"), Some(&serde_json::json!("value")));
    }

    #[test]
    fn test_builder_chain() {
        let mut ctx = Context::new().with_chat_id(-100_200).with_user_name("asha");
        ctx.set_model("mistralai/mistral-7b-instruct");

        assert_eq!(ctx.chat_id(), Some(-100_200));
        assert_eq!(ctx.user_name(), Some("asha"));
        assert_eq!(ctx.model(), Some("mistralai/mistral-7b-instruct"));
    }

    #[test]
    fn test_wrong_type_reads_as_none() {
        let mut ctx = Context::new();
        ctx.insert(keys::CHAT_ID, serde_json::json!("not a number"));
        assert_eq!(ctx.chat_id(), None);
    }
}
