//! Services consulted by checkers
//!
//! Compilation is delegated to the callable injected through the
//! [`SharedDataChannel`]; results are cached by a SHA-256 digest of the
//! channel generation, the target and the rendered source, so repeated
//! checks of an unchanged table do not recompile it while a newly provided
//! compiler is always consulted.

use moka::sync::Cache;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use vetrun_provenance::{CompileOutcome, OverrideRegistry, SharedDataChannel, COMPILE_TO_PDF_KEY};

/// Default number of cached compile results
pub const DEFAULT_COMPILE_CACHE_CAPACITY: u64 = 1_000;

/// Shared channel, override registry and compile cache
#[derive(Clone)]
pub struct CheckServices {
    channel: Option<Arc<SharedDataChannel>>,
    registry: Arc<OverrideRegistry>,
    compiled: Cache<String, CompileOutcome>,
}

impl CheckServices {
    /// Services backed by the process-wide channel and a private registry
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_COMPILE_CACHE_CAPACITY)
    }

    /// Services with a compile cache of `capacity` entries
    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            channel: None,
            registry: Arc::new(OverrideRegistry::new()),
            compiled: Cache::new(capacity),
        }
    }

    /// Use `channel` instead of the process-wide one
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<SharedDataChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Suspend the contexts of `registry` while the compiler runs
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<OverrideRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Channel the compiler is looked up in
    #[must_use]
    pub fn channel(&self) -> &SharedDataChannel {
        self.channel.as_deref().unwrap_or_else(|| SharedDataChannel::global())
    }

    /// Registry whose contexts are suspended while the compiler runs
    #[must_use]
    pub fn registry(&self) -> &OverrideRegistry {
        &self.registry
    }

    /// Compile `source` as `target`; `None` when no compiler was provided
    #[must_use]
    pub fn compile(&self, source: &str, target: &str) -> Option<CompileOutcome> {
        let channel = self.channel();
        let generation = channel.generation();
        let compile = channel.compiler(COMPILE_TO_PDF_KEY)?;
        let key = cache_key(generation, source, target);
        if let Some(cached) = self.compiled.get(&key) {
            tracing::trace!(target, key = %&key[..12], "compile cache hit");
            return Some(cached);
        }
        let _suspended = self.registry().temporarily_disable_all();
        let outcome = compile(source, target);
        tracing::debug!(target, ?outcome, "compiled");
        self.compiled.insert(key, outcome.clone());
        Some(outcome)
    }

    /// Number of cached compile results
    #[must_use]
    pub fn cached_compilations(&self) -> u64 {
        self.compiled.run_pending_tasks();
        self.compiled.entry_count()
    }
}

fn cache_key(generation: u64, source: &str, target: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(generation.to_le_bytes());
    hasher.update(target.as_bytes());
    hasher.update([0]);
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

impl Default for CheckServices {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CheckServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckServices")
            .field("channel", &self.channel.as_ref().map(|_| "custom"))
            .field("suspended_contexts", &self.registry.depth())
            .field("compiled", &self.compiled.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn compile_is_cached_by_source_and_target() {
        let calls = Arc::new(AtomicUsize::new(0));
        let channel = Arc::new(SharedDataChannel::new());
        let counter = calls.clone();
        channel.provide_compiler(move |source, target| {
            counter.fetch_add(1, Ordering::SeqCst);
            #[allow(clippy::cast_precision_loss)]
            let width = source.len() as f64 / 100.0;
            CompileOutcome::Width(if target.ends_with("_transpose") { width / 2.0 } else { width })
        });
        let services = CheckServices::new().with_channel(channel);

        assert_eq!(services.compile("abcd", "t"), Some(CompileOutcome::Width(0.04)));
        assert_eq!(services.compile("abcd", "t"), Some(CompileOutcome::Width(0.04)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(services.compile("abcd", "t_transpose"), Some(CompileOutcome::Width(0.02)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let _ = services.compile("abcdef", "t");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(services.cached_compilations(), 3);
    }

    #[test]
    fn replaced_compiler_is_consulted() {
        let channel = Arc::new(SharedDataChannel::new());
        channel.provide_compiler(|_, _| CompileOutcome::Failed("old compiler".into()));
        let services = CheckServices::new().with_channel(channel.clone());
        let source = r"\begin{table}x\end{table}";
        assert_eq!(
            services.compile(source, "df_a"),
            Some(CompileOutcome::Failed("old compiler".into()))
        );

        channel.provide_compiler(|_, _| CompileOutcome::Width(0.5));
        assert_eq!(services.compile(source, "df_a"), Some(CompileOutcome::Width(0.5)));
        assert_eq!(services.compile(source, "df_b"), Some(CompileOutcome::Width(0.5)));
    }

    #[test]
    fn no_compiler_means_no_outcome() {
        let services = CheckServices::new().with_channel(Arc::new(SharedDataChannel::new()));
        assert_eq!(services.compile("x", "t"), None);
    }

    #[test]
    fn contexts_are_suspended_while_compiling() {
        let registry = Arc::new(OverrideRegistry::new());
        let channel = Arc::new(SharedDataChannel::new());
        let seen = registry.clone();
        channel.provide_compiler(move |_, _| {
            #[allow(clippy::cast_precision_loss)]
            CompileOutcome::Width(seen.depth() as f64)
        });
        let _stats = registry.enter(vetrun_provenance::OverrideContext::statistics());
        let services = CheckServices::new().with_channel(channel).with_registry(registry.clone());
        assert_eq!(services.compile("x", "t"), Some(CompileOutcome::Width(0.0)));
        assert_eq!(registry.depth(), 1);
    }

    #[test]
    fn unrelated_registries_stay_active_while_compiling() {
        let executions = Arc::new(OverrideRegistry::new());
        let _stats = executions.enter(vetrun_provenance::OverrideContext::statistics());
        let channel = Arc::new(SharedDataChannel::new());
        let seen = executions.clone();
        channel.provide_compiler(move |_, _| {
            #[allow(clippy::cast_precision_loss)]
            CompileOutcome::Width(seen.snapshot().contexts().len() as f64)
        });
        let services = CheckServices::new().with_channel(channel);
        assert_eq!(services.compile("x", "t"), Some(CompileOutcome::Width(1.0)));
    }
}
