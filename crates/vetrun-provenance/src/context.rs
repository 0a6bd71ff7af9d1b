//! Override contexts
//!
//! An [`OverrideContext`] names the statistics entry points whose results
//! must be tagged with provenance. Contexts are activated on an
//! [`OverrideRegistry`] through RAII guards, so leaving a scope by any path
//! (return, `?`, panic) deactivates them. A [`DisableAllGuard`] suspends every
//! active context and restores them on drop; suspensions nest.

use crate::seal::RunContexts;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A function whose return values are tagged while intercepted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterceptTarget {
    /// Dotted module path, e.g. `scipy.stats`
    pub module: String,
    /// Function name within the module
    pub function: String,
}

impl InterceptTarget {
    /// Target `module.function`
    #[inline]
    #[must_use]
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
        }
    }

    /// `module.function`
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.function)
    }
}

/// Named set of intercepted functions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideContext {
    name: String,
    targets: Vec<InterceptTarget>,
}

impl OverrideContext {
    /// Empty context
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: Vec::new(),
        }
    }

    /// Add an intercepted function
    #[must_use]
    pub fn with_target(mut self, module: impl Into<String>, function: impl Into<String>) -> Self {
        self.targets.push(InterceptTarget::new(module, function));
        self
    }

    /// Default context over the common hypothesis tests
    #[must_use]
    pub fn statistics() -> Self {
        const SCIPY_STATS: &[&str] = &[
            "ttest_ind",
            "ttest_rel",
            "ttest_1samp",
            "mannwhitneyu",
            "wilcoxon",
            "kruskal",
            "f_oneway",
            "chi2_contingency",
            "fisher_exact",
            "pearsonr",
            "spearmanr",
            "kendalltau",
            "shapiro",
            "levene",
        ];
        let mut ctx = Self::new("statistics");
        for function in SCIPY_STATS {
            ctx = ctx.with_target("scipy.stats", *function);
        }
        ctx.with_target("statsmodels.stats.multitest", "multipletests")
    }

    /// Context name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Intercepted functions
    #[inline]
    #[must_use]
    pub fn targets(&self) -> &[InterceptTarget] {
        &self.targets
    }

    /// Whether `function` (bare or qualified name) is intercepted
    #[must_use]
    pub fn intercepts(&self, function: &str) -> bool {
        self.targets
            .iter()
            .any(|t| t.function == function || t.qualified_name() == function)
    }
}

#[derive(Debug)]
struct ActiveEntry {
    id: u64,
    context: OverrideContext,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    active: Vec<ActiveEntry>,
    suspended: Vec<Vec<ActiveEntry>>,
}

/// Stack of active override contexts
#[derive(Debug, Default)]
pub struct OverrideRegistry {
    state: Mutex<RegistryState>,
}

static GLOBAL_REGISTRY: Lazy<OverrideRegistry> = Lazy::new(OverrideRegistry::new);

impl OverrideRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL_REGISTRY
    }

    /// Activate `context` until the returned guard is dropped
    #[must_use = "the context is deactivated when the guard is dropped"]
    pub fn enter(&self, context: OverrideContext) -> OverrideGuard<'_> {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        tracing::debug!(context = %context.name(), id, "override context entered");
        state.active.push(ActiveEntry { id, context });
        OverrideGuard { registry: self, id }
    }

    /// Suspend every active context until the returned guard is dropped
    #[must_use = "contexts are restored when the guard is dropped"]
    pub fn temporarily_disable_all(&self) -> DisableAllGuard<'_> {
        let mut state = self.state.lock();
        let frame = std::mem::take(&mut state.active);
        tracing::trace!(suspended = frame.len(), "override contexts suspended");
        state.suspended.push(frame);
        DisableAllGuard { registry: self }
    }

    fn exit(&self, id: u64) {
        let mut state = self.state.lock();
        if let Some(pos) = state.active.iter().position(|e| e.id == id) {
            let entry = state.active.remove(pos);
            tracing::debug!(context = %entry.context.name(), id, "override context exited");
            return;
        }
        for frame in &mut state.suspended {
            if let Some(pos) = frame.iter().position(|e| e.id == id) {
                frame.remove(pos);
                return;
            }
        }
    }

    fn restore(&self) {
        let mut state = self.state.lock();
        if let Some(mut frame) = state.suspended.pop() {
            tracing::trace!(restored = frame.len(), "override contexts restored");
            frame.append(&mut state.active);
            state.active = frame;
        }
    }

    /// Number of active contexts
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Names of active contexts, outermost first
    #[must_use]
    pub fn active_names(&self) -> Vec<String> {
        self.state
            .lock()
            .active
            .iter()
            .map(|e| e.context.name().to_string())
            .collect()
    }

    /// Distinct functions intercepted by any active context
    #[must_use]
    pub fn active_targets(&self) -> Vec<InterceptTarget> {
        let state = self.state.lock();
        let mut targets: Vec<InterceptTarget> = Vec::new();
        for target in state.active.iter().flat_map(|e| e.context.targets()) {
            if !targets.contains(target) {
                targets.push(target.clone());
            }
        }
        targets
    }

    /// Whether any active context intercepts `function`
    #[must_use]
    pub fn is_intercepted(&self, function: &str) -> bool {
        self.state
            .lock()
            .active
            .iter()
            .any(|e| e.context.intercepts(function))
    }

    /// Freeze the active contexts for one execution, with a fresh seal
    #[must_use]
    pub fn snapshot(&self) -> RunContexts {
        let state = self.state.lock();
        RunContexts::new(state.active.iter().map(|e| e.context.clone()).collect())
    }
}

/// Keeps one context active; deactivates it on drop
#[derive(Debug)]
pub struct OverrideGuard<'r> {
    registry: &'r OverrideRegistry,
    id: u64,
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        self.registry.exit(self.id);
    }
}

/// Keeps all earlier contexts suspended; restores them on drop
#[derive(Debug)]
pub struct DisableAllGuard<'r> {
    registry: &'r OverrideRegistry,
}

impl Drop for DisableAllGuard<'_> {
    fn drop(&mut self) {
        self.registry.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx(name: &str, function: &str) -> OverrideContext {
        OverrideContext::new(name).with_target("scipy.stats", function)
    }

    #[test]
    fn guard_releases_on_drop() {
        let registry = OverrideRegistry::new();
        {
            let _g = registry.enter(ctx("a", "ttest_ind"));
            assert!(registry.is_intercepted("ttest_ind"));
            assert!(registry.is_intercepted("scipy.stats.ttest_ind"));
        }
        assert!(!registry.is_intercepted("ttest_ind"));
        assert_eq!(registry.depth(), 0);
    }

    #[test]
    fn guard_releases_on_panic() {
        let registry = OverrideRegistry::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _g = registry.enter(ctx("a", "f_oneway"));
            panic!("generated code failed");
        }));
        assert!(result.is_err());
        assert_eq!(registry.depth(), 0);
    }

    #[test]
    fn disable_all_nests_and_restores_in_order() {
        let registry = OverrideRegistry::new();
        let _a = registry.enter(ctx("a", "ttest_ind"));
        let _b = registry.enter(ctx("b", "pearsonr"));
        {
            let _off = registry.temporarily_disable_all();
            assert_eq!(registry.depth(), 0);
            let _c = registry.enter(ctx("c", "kruskal"));
            {
                let _off_again = registry.temporarily_disable_all();
                assert!(!registry.is_intercepted("kruskal"));
            }
            assert_eq!(registry.active_names(), vec!["c"]);
        }
        assert_eq!(registry.active_names(), vec!["a", "b"]);
    }

    #[test]
    fn exit_while_suspended_is_not_restored() {
        let registry = OverrideRegistry::new();
        let outer = registry.enter(ctx("a", "ttest_ind"));
        let off = registry.temporarily_disable_all();
        drop(outer);
        drop(off);
        assert_eq!(registry.depth(), 0);
    }

    #[test]
    fn statistics_context_lists_targets() {
        let stats = OverrideContext::statistics();
        assert!(stats.intercepts("ttest_ind"));
        assert!(stats.intercepts("statsmodels.stats.multitest.multipletests"));
        assert!(!stats.intercepts("mean"));
    }
}
