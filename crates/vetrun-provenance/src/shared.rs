//! Shared data channel
//!
//! Keyed registry through which the orchestrator injects services, most
//! importantly the compile-to-artifact callable, before any execution
//! starts. Last writer wins per key.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Key of the injected compile callable
pub const COMPILE_TO_PDF_KEY: &str = "compile_to_pdf_func";

/// Result of compiling rendered source
#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutcome {
    /// Rendered width relative to the available text width
    Width(f64),
    /// Compiler error text
    Failed(String),
}

/// `(rendered_source, target_name) -> width ratio | error`
pub type CompileFn = Arc<dyn Fn(&str, &str) -> CompileOutcome + Send + Sync>;

/// Item stored in the channel
#[derive(Clone)]
pub enum SharedItem {
    /// Compile callable
    Compiler(CompileFn),
    /// Plain data
    Value(serde_json::Value),
    /// Anything else
    Any(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for SharedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compiler(_) => f.write_str("Compiler(..)"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Any(_) => f.write_str("Any(..)"),
        }
    }
}

/// Keyed service registry
#[derive(Debug, Default)]
pub struct SharedDataChannel {
    items: RwLock<HashMap<String, SharedItem>>,
    generation: AtomicU64,
}

static GLOBAL_CHANNEL: Lazy<SharedDataChannel> = Lazy::new(SharedDataChannel::new);

impl SharedDataChannel {
    /// Empty channel
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide channel
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL_CHANNEL
    }

    /// Store `item` under `key`, replacing any previous item
    pub fn provide(&self, key: impl Into<String>, item: SharedItem) {
        let key = key.into();
        tracing::debug!(key = %key, "shared item provided");
        self.items.write().insert(key, item);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Counter bumped whenever an item is provided or removed
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store a compile callable under [`COMPILE_TO_PDF_KEY`]
    pub fn provide_compiler<F>(&self, compile: F)
    where
        F: Fn(&str, &str) -> CompileOutcome + Send + Sync + 'static,
    {
        self.provide(COMPILE_TO_PDF_KEY, SharedItem::Compiler(Arc::new(compile)));
    }

    /// Item under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<SharedItem> {
        self.items.read().get(key).cloned()
    }

    /// Compile callable under `key`, if that is what is stored
    #[must_use]
    pub fn compiler(&self, key: &str) -> Option<CompileFn> {
        match self.get(key)? {
            SharedItem::Compiler(f) => Some(f),
            _ => None,
        }
    }

    /// Data under `key`, if that is what is stored
    #[must_use]
    pub fn value(&self, key: &str) -> Option<serde_json::Value> {
        match self.get(key)? {
            SharedItem::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Typed object under `key`
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        match self.get(key)? {
            SharedItem::Any(item) => item.downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Remove and return the item under `key`
    pub fn remove(&self, key: &str) -> Option<SharedItem> {
        let removed = self.items.write().remove(key);
        if removed.is_some() {
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_writer_wins() {
        let channel = SharedDataChannel::new();
        channel.provide("k", SharedItem::Value(serde_json::json!(1)));
        channel.provide("k", SharedItem::Value(serde_json::json!(2)));
        assert_eq!(channel.value("k"), Some(serde_json::json!(2)));
        assert_eq!(channel.generation(), 2);
        assert!(channel.remove("missing").is_none());
        assert_eq!(channel.generation(), 2);
    }

    #[test]
    fn compiler_is_callable() {
        let channel = SharedDataChannel::new();
        channel.provide_compiler(|source, _name| CompileOutcome::Width(source.len() as f64 / 100.0));
        let compile = channel.compiler(COMPILE_TO_PDF_KEY).unwrap();
        assert_eq!(compile(&"x".repeat(50), "df_a"), CompileOutcome::Width(0.5));
        assert!(channel.value(COMPILE_TO_PDF_KEY).is_none());
    }

    #[test]
    fn typed_objects_downcast() {
        let channel = SharedDataChannel::new();
        channel.provide("limits", SharedItem::Any(Arc::new(42_u32)));
        assert_eq!(channel.downcast::<u32>("limits").as_deref(), Some(&42));
        assert!(channel.downcast::<String>("limits").is_none());
        assert!(channel.remove("limits").is_some());
        assert!(channel.get("limits").is_none());
    }
}
