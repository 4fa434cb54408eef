use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::PublishError;

/// Host pub/sub runtime, as seen from one invocation.
///
/// Implementations must be cheap to share: the relay holds the context in an
/// `Arc` and hands a clone to the detached republish task.
#[async_trait]
pub trait FunctionContext: Send + Sync + 'static {
    /// Topic that receives the republished payload.
    fn output_topic(&self) -> String;

    /// Raw user configuration value, if set.
    fn user_config_value(&self, key: &str) -> Option<String>;

    fn user_config_value_or_default(&self, key: &str, default: &str) -> String {
        self.user_config_value(key)
            .unwrap_or_else(|| default.to_string())
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<(), PublishError>;
}

/// In-memory context for local runs and tests.
///
/// Published messages are kept in order and can be inspected afterwards.
#[derive(Default)]
pub struct InMemoryContext {
    output_topic: String,
    config: HashMap<String, String>,
    published: Mutex<Vec<(String, String)>>,
    fail_publish: bool,
}

impl InMemoryContext {
    pub fn new(output_topic: impl Into<String>) -> Self {
        Self {
            output_topic: output_topic.into(),
            ..Self::default()
        }
    }

    /// Set a user configuration value.
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Make every publish fail, to exercise the republish error path.
    pub fn with_failing_publish(mut self) -> Self {
        self.fail_publish = true;
        self
    }

    /// Snapshot of `(topic, payload)` pairs published so far.
    pub async fn published(&self) -> Vec<(String, String)> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl FunctionContext for InMemoryContext {
    fn output_topic(&self) -> String {
        self.output_topic.clone()
    }

    fn user_config_value(&self, key: &str) -> Option<String> {
        self.config.get(key).cloned()
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<(), PublishError> {
        if self.fail_publish {
            return Err(PublishError {
                topic: topic.to_string(),
                message: "publishing disabled".to_string(),
            });
        }
        self.published.lock().await.push((topic.to_string(), payload));
        Ok(())
    }
}
