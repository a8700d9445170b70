//! Command registry: `command-name -> handler`, with unique names.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::channel::ValidatedChannelString;
use crate::error::CommandMonitorError;

/// A successful handler response: a status (0 by default, but handlers
/// whose own response carries a richer status range — e.g. the hostname
/// reconfigure command's 0-3 — can set it directly) plus any extra
/// response fields.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutcome {
    pub status: i32,
    pub status_message: String,
    pub fields: Map<String, Value>,
}

impl HandlerOutcome {
    pub fn ok(fields: Map<String, Value>) -> Self {
        Self {
            status: 0,
            status_message: String::new(),
            fields,
        }
    }
}

/// Stateless-from-the-monitor's-perspective request handler.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, fields: &Map<String, Value>) -> Result<HandlerOutcome, String>;
}

#[derive(Default)]
pub struct Registry {
    handlers: RwLock<HashMap<ValidatedChannelString, Arc<dyn Handler>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        name: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), CommandMonitorError> {
        let key = ValidatedChannelString::new(name)
            .ok_or_else(|| CommandMonitorError::UnparseableJson(format!("invalid command name {name:?}")))?;
        let mut handlers = self.handlers.write().await;
        if handlers.contains_key(&key) {
            return Err(CommandMonitorError::DuplicateHandler(name.to_string()));
        }
        handlers.insert(key, handler);
        Ok(())
    }

    pub async fn unregister(&self, name: &str) {
        if let Some(key) = ValidatedChannelString::new(name) {
            self.handlers.write().await.remove(&key);
        }
    }

    pub async fn dispatch(&self, command: &str, fields: &Map<String, Value>) -> Result<HandlerOutcome, CommandMonitorError> {
        let key = ValidatedChannelString::new(command)
            .ok_or_else(|| CommandMonitorError::NoHandler(command.to_string()))?;
        let handler = self
            .handlers
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| CommandMonitorError::NoHandler(command.to_string()))?;
        handler.handle(fields).await.map_err(CommandMonitorError::Handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, fields: &Map<String, Value>) -> Result<HandlerOutcome, String> {
            Ok(HandlerOutcome::ok(fields.clone()))
        }
    }

    #[tokio::test]
    async fn duplicate_registration_is_an_error() {
        let registry = Registry::new();
        registry.register("agent.ping", Arc::new(Echo)).await.unwrap();
        let err = registry.register("agent.ping", Arc::new(Echo)).await.unwrap_err();
        assert!(matches!(err, CommandMonitorError::DuplicateHandler(_)));
    }

    #[tokio::test]
    async fn dispatch_to_an_unregistered_command_is_no_handler() {
        let registry = Registry::new();
        let err = registry.dispatch("missing", &Map::new()).await.unwrap_err();
        assert!(matches!(err, CommandMonitorError::NoHandler(_)));
    }
}
