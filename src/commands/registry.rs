use crate::commands::{CommandEntry, CommandHandler};
use crate::core::error::LainError;
use std::collections::HashMap;
use std::sync::Arc;

/// Name to handler table, filled once at startup and read-only afterwards.
///
/// Names are unique. `list` reports them in registration order.
#[derive(Default)]
pub struct CommandRegistry {
    order: Vec<String>,
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `command` under `name`, refusing names already taken.
    pub fn register<C: CommandHandler + 'static>(
        &mut self,
        name: &str,
        command: C,
    ) -> Result<(), LainError> {
        self.insert(name, Arc::new(command))
    }

    /// Registers every candidate whose name is still free and returns how
    /// many were added. Colliding names are skipped, not treated as errors.
    pub fn discover<I>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = CommandEntry>,
    {
        let mut added = 0;
        for entry in candidates {
            match self.insert(&entry.name, entry.handler) {
                Ok(()) => added += 1,
                Err(_) => tracing::warn!(
                    "Skipping discovered command '{}' which is already registered",
                    entry.name
                ),
            }
        }
        added
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        match self.handlers.get(name) {
            Some(handler) => {
                tracing::info!("Command '{}' was found and will be executed", name);
                Some(Arc::clone(handler))
            }
            None => {
                tracing::warn!("Command '{}' was not found", name);
                None
            }
        }
    }

    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Names with their descriptions, in registration order.
    pub fn descriptions(&self) -> Vec<(String, &'static str)> {
        self.order
            .iter()
            .filter_map(|name| {
                self.handlers
                    .get(name)
                    .map(|handler| (name.clone(), handler.description()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, name: &str, handler: Arc<dyn CommandHandler>) -> Result<(), LainError> {
        if self.handlers.contains_key(name) {
            return Err(LainError::DuplicateCommand(name.to_string()));
        }
        self.handlers.insert(name.to_string(), handler);
        self.order.push(name.to_string());
        tracing::info!("Command '{}' has been registered", name);
        Ok(())
    }
}
